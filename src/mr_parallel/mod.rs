mod coordinator;
mod files;
mod task;
mod worker_pool;

use async_trait::async_trait;
use std::sync::Arc;

use crate::common::{MapReduce, MapReduceApp, RunSummary};
use crate::config::Config;
use crate::error::Result;

pub use coordinator::{Coordinator, Phase, WorkerFailure};
pub use files::{
    bucket_file_name, construct_merged_file_path, construct_o_file_path, parse_bucket_file_name,
};
pub use task::Task;
pub use worker_pool::{ShutdownOutcome, Worker, WorkerPool};

/// Runs a job on a pool of workers pulling tasks from a shared coordinator.
pub struct ParallelMapReduce {
    config: Config,
    mr_app: Arc<dyn MapReduceApp>,
}

impl ParallelMapReduce {
    pub fn new(config: Config, mr_app: Arc<dyn MapReduceApp>) -> Self {
        Self { config, mr_app }
    }
}

#[async_trait]
impl MapReduce for ParallelMapReduce {
    async fn run(self) -> Result<RunSummary> {
        let coord = Arc::new(Coordinator::new(self.mr_app, &self.config)?);
        coord.run().await
    }
}
