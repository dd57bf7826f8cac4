use async_trait::async_trait;
use std::{fs, sync::Arc};
use tracing::{debug, info};

use crate::common::{partition_pairs, read_files_from_dir, MapReduce, MapReduceApp, RunSummary};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::mr_parallel::{construct_o_file_path, ShutdownOutcome};

/// Runs a whole job in the calling task, without workers or bucket files.
///
/// Produces the same `mr-out-<bucket>.txt` files as the parallel runner for
/// the same input, logic and bucket count.
pub struct SequentialMapReduce {
    config: Config,
    mr_app: Arc<dyn MapReduceApp>,
}

impl SequentialMapReduce {
    pub fn new(config: Config, mr_app: Arc<dyn MapReduceApp>) -> Self {
        Self { config, mr_app }
    }

    pub fn run_sync(self) -> Result<RunSummary> {
        self.config.validate()?;
        let files = read_files_from_dir(&self.config.input_dir)?;
        info!("running {} files sequentially", files.len());

        let intermediate_key_values = files.iter().try_fold(Vec::new(), |mut acc, path| {
            let contents = fs::read_to_string(path)
                .map_err(|e| Error::io(path, e))?
                .replace('\n', " ");
            acc.extend(self.mr_app.map(&contents));
            Ok::<_, Error>(acc)
        })?;
        debug!("{} intermediate key-values", intermediate_key_values.len());

        let output_dir = &self.config.output_dir;
        fs::create_dir_all(output_dir).map_err(|e| Error::io(output_dir, e))?;

        let output_files = partition_pairs(intermediate_key_values, self.config.buckets)
            .into_iter()
            .enumerate()
            .map(|(bucket, key_values)| {
                let lines = self.mr_app.reduce(key_values);
                let output_file = construct_o_file_path(output_dir, bucket);
                let contents: String = lines.iter().map(|line| format!("{}\n", line)).collect();
                fs::write(&output_file, contents).map_err(|e| Error::io(&output_file, e))?;
                Ok(output_file)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(RunSummary {
            map_tasks: files.len(),
            reduce_tasks: self.config.buckets,
            worker_errors: 0,
            output_files,
            shutdown: ShutdownOutcome::Graceful,
        })
    }
}

#[async_trait]
impl MapReduce for SequentialMapReduce {
    async fn run(self) -> Result<RunSummary> {
        self.run_sync()
    }
}
