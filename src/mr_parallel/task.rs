use std::path::PathBuf;

/// Unit of work handed to a worker by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    /// Partition one input file into `bucket_count` bucket files.
    Map {
        map_id: usize,
        input: PathBuf,
        bucket_count: usize,
    },
    /// Reduce one merged bucket file into an output file.
    Reduce { bucket: usize, merged: PathBuf },
    /// No work is left; the worker must stop asking.
    Exit,
}

impl Task {
    pub fn kind(&self) -> &'static str {
        match self {
            Task::Map { .. } => "map",
            Task::Reduce { .. } => "reduce",
            Task::Exit => "exit",
        }
    }
}
