use async_channel::{Receiver, Sender};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::{fs, time::sleep};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::common::{read_files_from_dir, MapReduceApp, RunSummary};
use crate::config::Config;
use crate::error::{Error, Result};

use super::files::{construct_merged_file_path, construct_o_file_path, parse_bucket_file_name};
use super::task::Task;
use super::worker_pool::WorkerPool;

/// Where the run is. Moves forward only; `Failed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Phase {
    Mapping = 0,
    Transitioning = 1,
    Reducing = 2,
    Done = 3,
    Failed = 4,
}

impl Phase {
    fn from_u8(value: u8) -> Phase {
        match value {
            0 => Phase::Mapping,
            1 => Phase::Transitioning,
            2 => Phase::Reducing,
            3 => Phase::Done,
            _ => Phase::Failed,
        }
    }

    fn reduce_started(self) -> bool {
        matches!(self, Phase::Reducing | Phase::Done)
    }
}

#[derive(Debug)]
pub struct WorkerFailure {
    pub worker: Uuid,
    pub error: Error,
}

pub struct Coordinator {
    app: Arc<dyn MapReduceApp>,
    config: Config,
    map_tasks: usize,
    map_queue: Receiver<Task>,
    reduce_sender: Sender<Task>,
    reduce_queue: Receiver<Task>,
    remaining_maps: AtomicUsize,
    remaining_reduces: AtomicUsize,
    phase: AtomicU8,
    // held for the whole merge so it runs once
    transition: tokio::sync::Mutex<()>,
    failures: Mutex<Vec<WorkerFailure>>,
}

impl Coordinator {
    pub fn new(app: Arc<dyn MapReduceApp>, config: &Config) -> Result<Self> {
        config.validate()?;

        let files = read_files_from_dir(&config.input_dir)?;
        let (map_sender, map_queue) = async_channel::unbounded();
        for (map_id, input) in files.into_iter().enumerate() {
            map_sender
                .try_send(Task::Map {
                    map_id,
                    input,
                    bucket_count: config.buckets,
                })
                .map_err(|_| Error::QueueClosed)?;
        }
        // no map task is ever added after construction
        drop(map_sender);

        let map_tasks = map_queue.len();
        let (reduce_sender, reduce_queue) = async_channel::unbounded();
        debug!(
            "enumerated {} map tasks from {}",
            map_tasks,
            config.input_dir.display()
        );

        Ok(Self {
            app,
            config: config.clone(),
            map_tasks,
            map_queue,
            reduce_sender,
            reduce_queue,
            remaining_maps: AtomicUsize::new(map_tasks),
            remaining_reduces: AtomicUsize::new(config.buckets),
            phase: AtomicU8::new(Phase::Mapping as u8),
            transition: tokio::sync::Mutex::new(()),
            failures: Mutex::new(Vec::new()),
        })
    }

    pub fn app(&self) -> &Arc<dyn MapReduceApp> {
        &self.app
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn buckets_dir(&self) -> &Path {
        &self.config.buckets_dir
    }

    pub fn merged_dir(&self) -> &Path {
        &self.config.merged_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }

    pub fn bucket_count(&self) -> usize {
        self.config.buckets
    }

    pub fn map_task_count(&self) -> usize {
        self.map_tasks
    }

    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    pub fn remaining_maps(&self) -> usize {
        self.remaining_maps.load(Ordering::SeqCst)
    }

    pub fn remaining_reduces(&self) -> usize {
        self.remaining_reduces.load(Ordering::SeqCst)
    }

    /// Hands out the next task without blocking on other workers.
    ///
    /// `Ok(None)` means nothing is ready yet but the run is not over. The only
    /// error is a failed bucket merge, returned to the worker that ran it.
    pub async fn take_task(&self) -> Result<Option<Task>> {
        trace!("worker requesting a new task");

        if let Ok(task) = self.map_queue.try_recv() {
            if let Task::Map { map_id, input, .. } = &task {
                debug!(map_id, input = %input.display(), "assigned map task");
            }
            return Ok(Some(task));
        }

        if self.phase().reduce_started() {
            if let Ok(task) = self.reduce_queue.try_recv() {
                debug!("assigned {} task", task.kind());
                return Ok(Some(task));
            }
        }

        let maps_done = self.remaining_maps() == 0;
        if maps_done && matches!(self.phase(), Phase::Mapping | Phase::Transitioning) {
            self.start_reduce_phase().await?;
            return Ok(self.reduce_queue.try_recv().ok());
        }

        if maps_done && self.phase().reduce_started() && self.reduce_queue.is_empty() {
            debug!("all work completed, issuing exit signal");
            return Ok(Some(Task::Exit));
        }

        trace!("no task available at the moment");
        Ok(None)
    }

    pub fn on_map_done(&self) {
        if Self::decrement(&self.remaining_maps).is_none() {
            warn!("map completion reported with no map task outstanding");
        }
    }

    pub fn on_reduce_done(&self) {
        match Self::decrement(&self.remaining_reduces) {
            Some(0) => {
                let _ = self.phase.compare_exchange(
                    Phase::Reducing as u8,
                    Phase::Done as u8,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                );
            }
            Some(_) => {}
            None => warn!("reduce completion reported with no reduce task outstanding"),
        }
    }

    pub fn is_finished(&self) -> bool {
        let outstanding = self.remaining_maps() + self.remaining_reduces();
        outstanding == 0 && self.reduce_queue.is_empty()
    }

    /// Records a worker failure. The failed task is not requeued.
    pub fn report_worker_error(&self, worker: Uuid, error: Error) {
        if error.is_fatal() {
            error!(%worker, "worker failed fatally: {}", error);
        } else {
            error!(%worker, "worker failed: {}", error);
        }
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(WorkerFailure { worker, error });
    }

    pub fn worker_error_count(&self) -> usize {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Removes and returns the first recorded fatal error.
    pub fn take_fatal_error(&self) -> Option<Error> {
        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        let index = failures.iter().position(|f| f.error.is_fatal())?;
        Some(failures.remove(index).error)
    }

    /// Runs a pool of workers until every task is done, then shuts it down.
    pub async fn run(self: Arc<Self>) -> Result<RunSummary> {
        info!(
            "starting coordinator with {} workers and {} buckets",
            self.config.workers, self.config.buckets
        );

        let pool = WorkerPool::spawn(self.config.workers, &self);
        info!("all workers submitted, awaiting completion");

        while !self.is_finished() {
            if let Some(err) = self.take_fatal_error() {
                error!("aborting run: {}", err);
                pool.abort();
                return Err(err);
            }
            sleep(self.config.finish_poll_interval()).await;
        }

        info!("all tasks completed, shutting down worker pool");
        let shutdown = pool.shutdown(self.config.shutdown_timeout()).await;

        Ok(RunSummary {
            map_tasks: self.map_tasks,
            reduce_tasks: self.config.buckets,
            worker_errors: self.worker_error_count(),
            output_files: (0..self.config.buckets)
                .map(|bucket| construct_o_file_path(self.output_dir(), bucket))
                .collect(),
            shutdown,
        })
    }

    fn decrement(counter: &AtomicUsize) -> Option<usize> {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .ok()
            .map(|previous| previous - 1)
    }

    async fn start_reduce_phase(&self) -> Result<()> {
        let _guard = self.transition.lock().await;
        if self
            .phase
            .compare_exchange(
                Phase::Mapping as u8,
                Phase::Transitioning as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            return Ok(());
        }

        info!("all map tasks done, starting reduce phase");
        match self.enqueue_reduce_tasks().await {
            Ok(()) => {
                self.phase.store(Phase::Reducing as u8, Ordering::SeqCst);
                info!("reduce phase initialized");
                Ok(())
            }
            Err(err) => {
                self.phase.store(Phase::Failed as u8, Ordering::SeqCst);
                Err(Error::Merge(Box::new(err)))
            }
        }
    }

    async fn enqueue_reduce_tasks(&self) -> Result<()> {
        for task in self.merge_buckets().await? {
            self.reduce_sender
                .try_send(task)
                .map_err(|_| Error::QueueClosed)?;
        }
        Ok(())
    }

    /// Concatenates every bucket file of bucket `b` into `merged-<b>.txt`.
    async fn merge_buckets(&self) -> Result<Vec<Task>> {
        debug!("starting bucket merging phase");
        let merged_dir = self.merged_dir();
        fs::create_dir_all(merged_dir)
            .await
            .map_err(|e| Error::io(merged_dir, e))?;

        let bucket_files = self.list_bucket_files().await?;
        let mut tasks = Vec::with_capacity(self.bucket_count());

        for bucket in 0..self.bucket_count() {
            let files: Vec<_> = bucket_files
                .iter()
                .filter(|(_, b, _)| *b == bucket)
                .collect();
            trace!("found {} files for bucket {}", files.len(), bucket);

            let mut merged = String::new();
            for (_, _, path) in files {
                let contents = fs::read_to_string(path)
                    .await
                    .map_err(|e| Error::io(path, e))?;
                merged.push_str(&contents);
                if !contents.is_empty() && !contents.ends_with('\n') {
                    merged.push('\n');
                }
            }

            let merged_file = construct_merged_file_path(merged_dir, bucket);
            fs::write(&merged_file, merged)
                .await
                .map_err(|e| Error::io(&merged_file, e))?;
            tasks.push(Task::Reduce {
                bucket,
                merged: merged_file,
            });
        }

        debug!(
            "bucket merging completed for {} buckets",
            self.bucket_count()
        );
        Ok(tasks)
    }

    /// `(map_id, bucket, path)` of every bucket file, in map id order.
    async fn list_bucket_files(&self) -> Result<Vec<(usize, usize, PathBuf)>> {
        let dir = self.buckets_dir();
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            // no map task ever wrote anything
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(dir, e)),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| Error::io(dir, e))? {
            let ids = entry.file_name().to_str().and_then(parse_bucket_file_name);
            if let Some((map_id, bucket)) = ids {
                files.push((map_id, bucket, entry.path()));
            }
        }
        files.sort();
        Ok(files)
    }
}
