use anyhow::Context;
use clap::{Parser, Subcommand};
use std::{fs, sync::Arc};
use tracing::{error, info};

use mapreduce_coordinator::logging::init_tracing;
use mapreduce_coordinator::{
    Config, MapReduce, ParallelMapReduce, RunSummary, SequentialMapReduce, WordCount,
};

/// Word count over a directory with a local MapReduce coordinator
#[derive(Parser, Debug)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the job on a pool of workers
    Run {
        #[command(flatten)]
        config: Config,

        /// Delete the staging directories before running
        #[arg(long)]
        clean: bool,
    },
    /// Run the job in-process, without workers or bucket files
    Sequential {
        #[command(flatten)]
        config: Config,

        #[arg(long)]
        clean: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli.command).await {
        error!("Fatal error: {:#}", e);
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(command: Commands) -> anyhow::Result<()> {
    let wc = Arc::new(WordCount::new());

    let summary = match command {
        Commands::Run { config, clean } => {
            prepare(&config, clean)?;
            ParallelMapReduce::new(config, wc)
                .run()
                .await
                .context("parallel run failed")?
        }
        Commands::Sequential { config, clean } => {
            prepare(&config, clean)?;
            SequentialMapReduce::new(config, wc)
                .run()
                .await
                .context("sequential run failed")?
        }
    };

    report(&summary);
    Ok(())
}

fn prepare(config: &Config, clean: bool) -> anyhow::Result<()> {
    if !clean {
        return Ok(());
    }
    for dir in config.staging_dirs() {
        if dir.exists() {
            fs::remove_dir_all(dir)
                .with_context(|| format!("failed to clean {}", dir.display()))?;
            info!("removed {}", dir.display());
        }
    }
    Ok(())
}

fn report(summary: &RunSummary) {
    info!(
        "{} map tasks, {} reduce tasks, {} worker errors, shutdown {:?}",
        summary.map_tasks, summary.reduce_tasks, summary.worker_errors, summary.shutdown
    );
    for path in &summary.output_files {
        println!("{}", path.display());
    }
}
