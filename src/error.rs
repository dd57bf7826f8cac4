//! Error types for the coordinator, its workers and the runners

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for coordinator operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Reading or writing a task file failed
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The one-time bucket merge failed; the reduce phase can never start
    #[error("bucket merge failed: {0}")]
    Merge(#[source] Box<Error>),

    /// Construction arguments were rejected
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A task queue was closed while still in use
    #[error("task queue closed")]
    QueueClosed,

    /// A worker task panicked
    #[error("worker panicked: {0}")]
    WorkerPanicked(String),
}

impl Error {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Fatal errors stop the whole run rather than a single worker.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Merge(_))
    }
}
