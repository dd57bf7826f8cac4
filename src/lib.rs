//! Single-machine MapReduce: a coordinator hands map tasks and, once every
//! map task has completed, reduce tasks over merged buckets to a pool of
//! workers, then stops the pool with an exit sentinel.

pub mod common;
pub mod config;
pub mod error;
pub mod logging;
pub mod map_reduce_apps;
pub mod map_reduce_seq;
pub mod mr_parallel;

pub use common::{KeyValue, MapReduce, MapReduceApp, RunSummary};
pub use config::Config;
pub use error::{Error, Result};
pub use map_reduce_apps::WordCount;
pub use map_reduce_seq::SequentialMapReduce;
pub use mr_parallel::{Coordinator, ParallelMapReduce, Task};
