use regex::Regex;
use std::{cmp::Ordering, collections::HashMap};
use tracing::debug;

use crate::common::{KeyValue, MapReduceApp};

pub struct WordCount {
    non_word: Regex,
}

impl WordCount {
    pub fn new() -> Self {
        Self {
            non_word: Regex::new(r"[^\p{L}\p{N}]").expect("invalid regex"),
        }
    }
}

impl Default for WordCount {
    fn default() -> Self {
        Self::new()
    }
}

/// Case-insensitive order, char by char, case-sensitive on ties.
fn word_order(a: &str, b: &str) -> Ordering {
    a.chars()
        .map(fold_case)
        .cmp(b.chars().map(fold_case))
        .then_with(|| a.cmp(b))
}

/// One char in, one char out: upper then lower case, ignoring expansions.
fn fold_case(c: char) -> char {
    let mut upper = c.to_uppercase();
    let c = match (upper.next(), upper.next()) {
        (Some(u), None) => u,
        _ => c,
    };
    c.to_lowercase().next().unwrap_or(c)
}

impl MapReduceApp for WordCount {
    fn map(&self, contents: &str) -> Vec<KeyValue> {
        debug!("processing input text of {} characters", contents.len());
        contents
            .split_whitespace()
            .map(|word| self.non_word.replace_all(word, ""))
            .filter(|word| !word.is_empty())
            .map(|word| KeyValue::new(word, "1"))
            .collect()
    }

    fn reduce(&self, key_values: Vec<KeyValue>) -> Vec<String> {
        debug!("reducing {} key-value pairs", key_values.len());
        let mut counts: HashMap<String, usize> = HashMap::new();
        for kv in key_values {
            *counts.entry(kv.key).or_insert(0) += 1;
        }

        let mut output_values: Vec<_> = counts.into_iter().collect();
        output_values.sort_by(|a, b| word_order(&a.0, &b.0));

        output_values
            .into_iter()
            .map(|(key, count)| format!("{} {}", key, count))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(pairs: &[KeyValue]) -> Vec<&str> {
        pairs.iter().map(|kv| kv.key.as_str()).collect()
    }

    #[test]
    fn test_map_strips_punctuation_and_keeps_case() {
        let wc = WordCount::new();
        let pairs = wc.map("Hello, world!  it's 2024 -- ok? Café");
        assert_eq!(
            keys(&pairs),
            ["Hello", "world", "its", "2024", "ok", "Café"]
        );
        assert!(pairs.iter().all(|kv| kv.value == "1"));
    }

    #[test]
    fn test_map_of_blank_text_is_empty() {
        let wc = WordCount::new();
        assert!(wc.map("").is_empty());
        assert!(wc.map("   \t -- !! ").is_empty());
    }

    #[test]
    fn test_reduce_counts_pairs_not_values() {
        let wc = WordCount::new();
        let lines = wc.reduce(vec![
            KeyValue::new("sat", "1"),
            KeyValue::new("sat", "5"),
            KeyValue::new("cat", "1"),
        ]);
        assert_eq!(lines, ["cat 1", "sat 2"]);
    }

    #[test]
    fn test_reduce_orders_case_insensitively_with_case_tie_break() {
        let wc = WordCount::new();
        let lines = wc.reduce(
            ["b", "The", "a", "the", "B", "the"]
                .into_iter()
                .map(|k| KeyValue::new(k, "1"))
                .collect(),
        );
        assert_eq!(lines, ["a 1", "B 1", "b 1", "The 1", "the 2"]);
    }

    #[test]
    fn test_reduce_folds_case_per_char() {
        let wc = WordCount::new();
        let lines = wc.reduce(vec![
            KeyValue::new("ib", "1"),
            KeyValue::new("İa", "1"),
            KeyValue::new("ss", "1"),
            KeyValue::new("ß", "1"),
        ]);
        assert_eq!(lines, ["İa 1", "ib 1", "ss 1", "ß 1"]);
    }

    #[test]
    fn test_fold_case_keeps_one_char() {
        assert_eq!(fold_case('İ'), 'i');
        assert_eq!(fold_case('ß'), 'ß');
        assert_eq!(fold_case('ς'), 'σ');
        assert_eq!(fold_case('Q'), 'q');
    }
}
