//! Tracing setup for the binary

use tracing::{debug, trace};
use tracing_subscriber::EnvFilter;

/// Initialize tracing from the `-v` count; `RUST_LOG` takes precedence when set.
pub fn init_tracing(verbose: u8) {
    let log_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose >= 1)
        .with_thread_ids(verbose >= 2) // -vv shows which runtime thread ran a worker
        .init();

    debug!("mapreduce started with verbosity level: {}", verbose);
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());
}
