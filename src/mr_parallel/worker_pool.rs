use futures::future::join_all;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::{fs, task::JoinHandle, time};
use tracing::{debug, info, info_span, trace, warn, Instrument};
use uuid::Uuid;

use crate::common::{partition_pairs, KeyValue};
use crate::error::{Error, Result};

use super::coordinator::Coordinator;
use super::files::{
    construct_bucket_file_path, construct_o_file_path, decode_line, encode_lines, encode_pairs,
};
use super::task::Task;

/// How the pool went down once all work was done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    Graceful,
    /// Some workers outlived the shutdown timeout and were aborted.
    Forced,
}

struct WorkerHandle {
    id: Uuid,
    handle: JoinHandle<()>,
}

pub struct WorkerPool {
    workers: Vec<WorkerHandle>,
}

impl WorkerPool {
    pub fn spawn(size: usize, coordinator: &Arc<Coordinator>) -> WorkerPool {
        let mut workers = Vec::with_capacity(size);

        for _ in 0..size {
            let worker = Worker::new(Arc::clone(coordinator));
            let id = worker.id;
            workers.push(WorkerHandle {
                id,
                handle: tokio::spawn(worker.run()),
            });
        }

        WorkerPool { workers }
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Waits up to `timeout` for every worker, then aborts the stragglers.
    pub async fn shutdown(self, timeout: Duration) -> ShutdownOutcome {
        let abort_handles: Vec<_> = self
            .workers
            .iter()
            .map(|w| (w.id, w.handle.abort_handle()))
            .collect();

        let handles = self.workers.into_iter().map(|w| w.handle);
        match time::timeout(timeout, join_all(handles)).await {
            Ok(results) => {
                for (result, (id, _)) in results.into_iter().zip(&abort_handles) {
                    if let Err(err) = result {
                        // cancellation is a clean stop
                        if err.is_panic() {
                            warn!(worker = %id, "worker panicked: {}", err);
                        }
                    }
                }
                info!("worker pool shut down successfully");
                ShutdownOutcome::Graceful
            }
            Err(_) => {
                warn!("worker pool did not terminate gracefully, forcing shutdown");
                for (_, handle) in abort_handles {
                    handle.abort();
                }
                ShutdownOutcome::Forced
            }
        }
    }

    pub fn abort(self) {
        for worker in self.workers {
            worker.handle.abort();
        }
    }
}

pub struct Worker {
    pub id: Uuid,
    coordinator: Arc<Coordinator>,
    poll_interval: Duration,
}

impl Worker {
    pub fn new(coordinator: Arc<Coordinator>) -> Worker {
        let poll_interval = coordinator.config().poll_interval();
        Worker {
            id: Uuid::new_v4(),
            coordinator,
            poll_interval,
        }
    }

    /// Pulls and executes tasks until the exit sentinel, completion or a failure.
    pub async fn run(self) {
        let span = info_span!("worker", id = %self.id);
        let outcome = AssertUnwindSafe(self.work())
            .catch_unwind()
            .instrument(span)
            .await;

        if let Err(payload) = outcome {
            let error = Error::WorkerPanicked(panic_message(payload.as_ref()));
            self.coordinator.report_worker_error(self.id, error);
        }
    }

    async fn work(&self) {
        info!("worker started");

        loop {
            let task = match self.coordinator.take_task().await {
                Ok(task) => task,
                Err(err) => {
                    self.coordinator.report_worker_error(self.id, err);
                    return;
                }
            };

            let Some(task) = task else {
                if self.coordinator.is_finished() {
                    info!("all work finished, worker stopping");
                    return;
                }
                trace!("no task available, waiting");
                time::sleep(self.poll_interval).await;
                continue;
            };

            let result = match &task {
                Task::Map {
                    map_id,
                    input,
                    bucket_count,
                } => self
                    .execute_map(*map_id, input, *bucket_count)
                    .await
                    .map(|()| self.coordinator.on_map_done()),
                Task::Reduce { bucket, merged } => self
                    .execute_reduce(*bucket, merged)
                    .await
                    .map(|()| self.coordinator.on_reduce_done()),
                Task::Exit => {
                    info!("received exit signal, shutting down");
                    return;
                }
            };

            if let Err(err) = result {
                self.coordinator.report_worker_error(self.id, err);
                return;
            }
        }
    }

    pub async fn execute_map(
        &self,
        map_id: usize,
        input: &Path,
        bucket_count: usize,
    ) -> Result<()> {
        debug!(map_id, "starting map task for file: {}", input.display());

        let contents = fs::read_to_string(input)
            .await
            .map_err(|e| Error::io(input, e))?
            .replace('\n', " ");
        let key_values = self.coordinator.app().map(&contents);

        debug!(
            "distributing {} key-value pairs into {} buckets",
            key_values.len(),
            bucket_count
        );
        let buckets = partition_pairs(key_values, bucket_count);

        let buckets_dir = self.coordinator.buckets_dir();
        fs::create_dir_all(buckets_dir)
            .await
            .map_err(|e| Error::io(buckets_dir, e))?;

        for (bucket, key_values) in buckets.iter().enumerate() {
            let path = construct_bucket_file_path(buckets_dir, map_id, bucket);
            fs::write(&path, encode_pairs(key_values))
                .await
                .map_err(|e| Error::io(&path, e))?;
        }

        debug!(map_id, "map task completed for file: {}", input.display());
        Ok(())
    }

    pub async fn execute_reduce(&self, bucket: usize, merged: &Path) -> Result<()> {
        debug!(bucket, "starting reduce task");

        let contents = fs::read_to_string(merged)
            .await
            .map_err(|e| Error::io(merged, e))?;

        let mut skipped = 0;
        let key_values: Vec<KeyValue> = contents
            .lines()
            .filter_map(|line| {
                let kv = decode_line(line);
                if kv.is_none() {
                    skipped += 1;
                }
                kv
            })
            .collect();
        if skipped > 0 {
            debug!(bucket, "skipped {} malformed lines", skipped);
        }

        let lines = self.coordinator.app().reduce(key_values);

        let output_dir = self.coordinator.output_dir();
        fs::create_dir_all(output_dir)
            .await
            .map_err(|e| Error::io(output_dir, e))?;
        let output_file = construct_o_file_path(output_dir, bucket);
        fs::write(&output_file, encode_lines(&lines))
            .await
            .map_err(|e| Error::io(&output_file, e))?;

        debug!(bucket, "reduce task completed, wrote {} lines", lines.len());
        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
