use async_trait::async_trait;
use fnv::FnvHasher;
use std::{
    fs,
    hash::Hasher,
    path::{Path, PathBuf},
};

use crate::error::{Error, Result};
use crate::mr_parallel::ShutdownOutcome;

/// One record emitted by `map` and consumed by `reduce`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// The pluggable business logic a run is parameterized over.
///
/// Keys must not contain a tab or a newline: intermediate files store one
/// `key<TAB>value` pair per line. Values may contain tabs.
pub trait MapReduceApp: Send + Sync {
    fn map(&self, contents: &str) -> Vec<KeyValue>;
    fn reduce(&self, key_values: Vec<KeyValue>) -> Vec<String>;
}

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub map_tasks: usize,
    pub reduce_tasks: usize,
    pub worker_errors: usize,
    pub output_files: Vec<PathBuf>,
    pub shutdown: ShutdownOutcome,
}

#[async_trait]
pub trait MapReduce {
    async fn run(self) -> Result<RunSummary>;
}

/// Regular files directly under `input_dir`, sorted by path.
pub fn read_files_from_dir(input_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut input = Vec::new();
    for entry in fs::read_dir(input_dir).map_err(|e| Error::io(input_dir, e))? {
        let path = entry.map_err(|e| Error::io(input_dir, e))?.path();
        if path.is_file() {
            input.push(path);
        }
    }
    input.sort();
    Ok(input)
}

/// Signed FNV-1a hash code of a key.
pub fn hash_code(key: &str) -> i64 {
    let mut hasher = FnvHasher::default();
    hasher.write(key.as_bytes());
    hasher.finish() as i64
}

/// Floor modulo of a hash code, always in `[0, bucket_count)`.
pub fn partition(hash: i64, bucket_count: usize) -> usize {
    assert!(bucket_count > 0, "bucket count must be positive");
    hash.rem_euclid(bucket_count as i64) as usize
}

pub fn bucket_for(key: &str, bucket_count: usize) -> usize {
    partition(hash_code(key), bucket_count)
}

/// Splits `key_values` into `bucket_count` buckets by key.
pub fn partition_pairs(key_values: Vec<KeyValue>, bucket_count: usize) -> Vec<Vec<KeyValue>> {
    let mut buckets = vec![Vec::new(); bucket_count];
    for kv in key_values {
        let bucket = bucket_for(&kv.key, bucket_count);
        buckets[bucket].push(kv);
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partition_handles_negative_hash_codes() {
        for hash in [i64::MIN, -17, -1, 0, 1, 17, i64::MAX] {
            for n in 1..=13 {
                let bucket = partition(hash, n);
                assert!(bucket < n, "hash {hash} mod {n} gave {bucket}");
            }
        }
        assert_eq!(partition(-1, 4), 3);
        assert_eq!(partition(-8, 4), 0);
    }

    #[test]
    fn test_bucket_for_is_deterministic_and_in_range() {
        let keys = ["the", "cat", "sat", "dog", "", "Ünïcode", "a\u{0}b"];
        for n in [1, 2, 7, 11, 64] {
            for key in keys {
                let first = bucket_for(key, n);
                assert_eq!(first, bucket_for(key, n));
                assert!(first < n);
            }
        }
    }

    #[test]
    fn test_partition_pairs_keeps_every_pair_exactly_once() {
        let pairs: Vec<_> = (0..200)
            .map(|i| KeyValue::new(format!("k{}", i % 37), "1"))
            .collect();
        let buckets = partition_pairs(pairs.clone(), 5);

        assert_eq!(buckets.len(), 5);
        assert_eq!(buckets.iter().map(Vec::len).sum::<usize>(), pairs.len());
        for (b, bucket) in buckets.iter().enumerate() {
            assert!(bucket.iter().all(|kv| bucket_for(&kv.key, 5) == b));
        }
    }

    #[test]
    fn test_read_files_from_dir_skips_directories() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.txt"), "b").unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("c.txt"), "c").unwrap();

        let files = read_files_from_dir(dir.path()).unwrap();
        assert_eq!(
            files,
            vec![dir.path().join("a.txt"), dir.path().join("b.txt")]
        );
    }

    #[test]
    fn test_read_files_from_missing_dir_fails() {
        let dir = TempDir::new().unwrap();
        let err = read_files_from_dir(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
