//! Run configuration shared by the CLI and programmatic callers

use clap::Args;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory whose regular files become map tasks
    #[arg(short, long, default_value = "input")]
    pub input_dir: PathBuf,

    /// Where map tasks write their per-bucket files
    #[arg(long, default_value = "output/buckets")]
    pub buckets_dir: PathBuf,

    /// Where the merge step writes one file per bucket
    #[arg(long, default_value = "output/merged")]
    pub merged_dir: PathBuf,

    /// Where reduce tasks write their output
    #[arg(short, long, default_value = "output/out")]
    pub output_dir: PathBuf,

    /// Number of concurrent workers
    #[arg(short, long, default_value_t = 4)]
    pub workers: usize,

    /// Number of shuffle buckets (and reduce tasks)
    #[arg(short, long, default_value_t = 8)]
    pub buckets: usize,

    /// Worker back-off when no task is ready, in milliseconds
    #[arg(long, default_value_t = 10)]
    pub poll_interval_ms: u64,

    /// How often the harness checks for completion, in milliseconds
    #[arg(long, default_value_t = 50)]
    pub finish_poll_ms: u64,

    /// Bounded wait for the pool before workers are aborted, in seconds
    #[arg(long, default_value_t = 50)]
    pub shutdown_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self::with_staging_root("input", "output")
    }
}

impl Config {
    /// Config reading from `input_dir` and staging everything under `root`.
    pub fn with_staging_root(input_dir: impl Into<PathBuf>, root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            input_dir: input_dir.into(),
            buckets_dir: root.join("buckets"),
            merged_dir: root.join("merged"),
            output_dir: root.join("out"),
            workers: 4,
            buckets: 8,
            poll_interval_ms: 10,
            finish_poll_ms: 50,
            shutdown_timeout_secs: 50,
        }
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn buckets(mut self, buckets: usize) -> Self {
        self.buckets = buckets;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.buckets == 0 {
            return Err(Error::invalid_config("bucket count must be positive"));
        }
        if self.workers == 0 {
            return Err(Error::invalid_config("worker count must be positive"));
        }
        if !self.input_dir.is_dir() {
            return Err(Error::invalid_config(format!(
                "input directory {} does not exist",
                self.input_dir.display()
            )));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn finish_poll_interval(&self) -> Duration {
        Duration::from_millis(self.finish_poll_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Directories written during a run.
    pub fn staging_dirs(&self) -> [&Path; 3] {
        [
            self.buckets_dir.as_path(),
            self.merged_dir.as_path(),
            self.output_dir.as_path(),
        ]
    }
}
