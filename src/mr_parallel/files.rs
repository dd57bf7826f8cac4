//! Staging file names and the intermediate line format.
//!
//! Bucket files are named `mr-<map_id>-<bucket>.txt`. Both ids are decoded as
//! integers, so bucket 1 never matches a file of bucket 11.

use std::path::{Path, PathBuf};

use crate::common::KeyValue;

const DELIMITER: char = '\t';

pub fn bucket_file_name(map_id: usize, bucket: usize) -> String {
    format!("mr-{}-{}.txt", map_id, bucket)
}

/// `(map_id, bucket)` of a bucket file name, `None` for anything else.
pub fn parse_bucket_file_name(name: &str) -> Option<(usize, usize)> {
    let ids = name.strip_prefix("mr-")?.strip_suffix(".txt")?;
    let (map_id, bucket) = ids.split_once('-')?;
    Some((map_id.parse().ok()?, bucket.parse().ok()?))
}

pub fn construct_bucket_file_path(buckets_dir: &Path, map_id: usize, bucket: usize) -> PathBuf {
    buckets_dir.join(bucket_file_name(map_id, bucket))
}

pub fn construct_merged_file_path(merged_dir: &Path, bucket: usize) -> PathBuf {
    merged_dir.join(format!("merged-{}.txt", bucket))
}

pub fn construct_o_file_path(output_dir: &Path, bucket: usize) -> PathBuf {
    output_dir.join(format!("mr-out-{}.txt", bucket))
}

pub fn encode_pairs(key_values: &[KeyValue]) -> String {
    key_values.iter().fold(String::new(), |mut acc, kv| {
        acc.push_str(&kv.key);
        acc.push(DELIMITER);
        acc.push_str(&kv.value);
        acc.push('\n');
        acc
    })
}

/// Splits a line at its first tab; lines without one yield `None`.
pub fn decode_line(line: &str) -> Option<KeyValue> {
    line.split_once(DELIMITER)
        .map(|(key, value)| KeyValue::new(key, value))
}

pub fn encode_lines(lines: &[String]) -> String {
    lines.iter().fold(String::new(), |mut acc, line| {
        acc.push_str(line);
        acc.push('\n');
        acc
    })
}
