use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use mapreduce_coordinator::mr_parallel::{construct_o_file_path, Phase, ShutdownOutcome, Task};
use mapreduce_coordinator::{
    Config, Coordinator, Error, MapReduce, ParallelMapReduce, SequentialMapReduce, WordCount,
};

fn input_dir(root: &Path, files: &[(&str, &str)]) -> PathBuf {
    let dir = root.join("input");
    fs::create_dir_all(&dir).unwrap();
    for (name, contents) in files {
        fs::write(dir.join(name), contents).unwrap();
    }
    dir
}

fn read_lines(paths: &[PathBuf]) -> Vec<String> {
    let mut lines: Vec<String> = paths
        .iter()
        .flat_map(|path| {
            fs::read_to_string(path)
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect();
    lines.sort();
    lines
}

fn fast_config(input: &Path, staging: PathBuf, buckets: usize) -> Config {
    Config {
        poll_interval_ms: 1,
        finish_poll_ms: 5,
        shutdown_timeout_secs: 5,
        ..Config::with_staging_root(input, staging).buckets(buckets)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_files_two_buckets() {
    let root = TempDir::new().unwrap();
    let files = [("a.txt", "the cat sat"), ("b.txt", "the dog sat")];
    let input = input_dir(root.path(), &files);
    let config = fast_config(&input, root.path().join("staging"), 2);

    let summary = ParallelMapReduce::new(config.clone(), Arc::new(WordCount::new()))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.map_tasks, 2);
    assert_eq!(summary.reduce_tasks, 2);
    assert_eq!(summary.worker_errors, 0);
    assert_eq!(summary.shutdown, ShutdownOutcome::Graceful);
    let lines = read_lines(&summary.output_files);
    assert_eq!(lines, ["cat 1", "dog 1", "sat 2", "the 2"]);

    for (bucket, path) in summary.output_files.iter().enumerate() {
        assert_eq!(*path, construct_o_file_path(&config.output_dir, bucket));
        let lines: Vec<String> = fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect();
        let mut ordered = lines.clone();
        ordered.sort_by_key(|line| line.to_lowercase());
        assert_eq!(lines, ordered, "bucket {} is not in word order", bucket);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_matches_sequential() {
    let root = TempDir::new().unwrap();
    let texts: Vec<(String, String)> = (0..12)
        .map(|i| {
            let text = (0..200)
                .map(|w| format!("Word{} word{} shared, {}!", w % 17, (w * i) % 23, i))
                .collect::<Vec<_>>()
                .join(if i % 2 == 0 { " " } else { "\n" });
            (format!("part-{:02}.txt", i), text)
        })
        .collect();
    let files: Vec<(&str, &str)> = texts
        .iter()
        .map(|(n, t)| (n.as_str(), t.as_str()))
        .collect();
    let input = input_dir(root.path(), &files);

    let parallel = fast_config(&input, root.path().join("par"), 13).workers(6);
    let sequential = Config::with_staging_root(&input, root.path().join("seq")).buckets(13);

    let par = ParallelMapReduce::new(parallel, Arc::new(WordCount::new()))
        .run()
        .await
        .unwrap();
    let seq = SequentialMapReduce::new(sequential, Arc::new(WordCount::new()))
        .run()
        .await
        .unwrap();

    assert_eq!(par.output_files.len(), 13);
    for (p, s) in par.output_files.iter().zip(&seq.output_files) {
        assert_eq!(fs::read_to_string(p).unwrap(), fs::read_to_string(s).unwrap());
    }
    let lines = read_lines(&par.output_files);
    assert!(lines.iter().any(|line| line == "shared 2400"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_empty_input_produces_empty_outputs() {
    let root = TempDir::new().unwrap();
    let input = input_dir(root.path(), &[]);
    let config = fast_config(&input, root.path().join("staging"), 3);

    let summary = ParallelMapReduce::new(config, Arc::new(WordCount::new()))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.map_tasks, 0);
    assert_eq!(summary.output_files.len(), 3);
    assert!(read_lines(&summary.output_files).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_coordinator_reports_done_after_run() {
    let root = TempDir::new().unwrap();
    let input = input_dir(root.path(), &[("a.txt", "one two two")]);
    let config = fast_config(&input, root.path().join("staging"), 2);
    let coord = Coordinator::new(Arc::new(WordCount::new()), &config).unwrap();
    let coord = Arc::new(coord);

    Arc::clone(&coord).run().await.unwrap();

    assert!(coord.is_finished());
    assert_eq!(coord.phase(), Phase::Done);
    for _ in 0..3 {
        assert_eq!(coord.take_task().await.unwrap(), Some(Task::Exit));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_merge_failure_surfaces_as_run_error() {
    let root = TempDir::new().unwrap();
    let input = input_dir(root.path(), &[("a.txt", "x y z")]);
    let config = fast_config(&input, root.path().join("staging"), 2);
    fs::create_dir_all(root.path().join("staging")).unwrap();
    fs::write(&config.merged_dir, "not a directory").unwrap();

    let err = ParallelMapReduce::new(config, Arc::new(WordCount::new()))
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Merge(_)), "unexpected error {}", err);
}
