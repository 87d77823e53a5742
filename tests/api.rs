//! Entry-point behavior.

use std::sync::{Arc, Mutex};

use featstats::testing::*;
use featstats::{
    DEFAULT_SLICE_KEY, RecordBatch, Runner, StatsOptions, generate_statistics,
    generate_statistics_in_memory,
};

#[macro_use]
mod macros;

#[test]
fn test_empty_input_yields_one_empty_record() {
    let stats = generate_statistics(Vec::<RecordBatch>::new(), &StatsOptions::default()).unwrap();
    assert_eq!(stats.datasets.len(), 1);
    let all = &stats.datasets[0];
    assert_eq!(all.name, DEFAULT_SLICE_KEY);
    assert_eq!(all.num_examples, 0);
    assert!(all.features.is_empty());
}

#[test]
fn test_empty_batches_are_harmless() {
    let stats = generate_statistics(
        [
            RecordBatch::new(0),
            BatchBuilder::new().examples(numeric_examples()).build(),
            RecordBatch::new(0),
        ],
        &StatsOptions::default(),
    )
    .unwrap();
    assert_eq!(stats.datasets[0].num_examples, 3);
}

#[test]
fn test_allowlist_limits_features() {
    let batch = BatchBuilder::new()
        .examples(numeric_examples())
        .examples(string_examples())
        .build();
    let options = StatsOptions::default().with_feature_allowlist(["b"]);
    let stats = generate_statistics([batch], &options).unwrap();
    let all = &stats.datasets[0];
    assert_eq!(all.num_examples, 6);
    assert!(all.feature("a").is_none());
    let b = expect_feature(all, "b");
    assert_eq!(b.common_stats().unwrap().num_missing, 3);
}

#[test]
fn test_allowlist_keeps_the_weight_feature_usable() {
    let examples = (1..=4).map(|i| {
        ExampleBuilder::new()
            .floats("x", [f64::from(i)])
            .strings("tag", ["t"])
            .floats("w", [2.0])
            .build()
    });
    let batch = BatchBuilder::new().examples(examples).build();
    let options = StatsOptions::default()
        .with_feature_allowlist(["x"])
        .with_weight_feature("w");
    let stats = generate_statistics([batch], &options).unwrap();
    let all = &stats.datasets[0];
    assert_approx_eq!(all.weighted_num_examples, 8.0);
    let names: Vec<&str> = all.features.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["x"]);
}

#[test]
fn test_in_memory_matches_the_pipeline() {
    let mut examples = numeric_examples();
    examples.extend(string_examples());
    let options = StatsOptions::default().with_desired_batch_size(2);

    let in_memory = generate_statistics_in_memory(&examples, &options).unwrap();
    assert_eq!(in_memory.name, "");

    let batch = BatchBuilder::new().examples(examples).build();
    let mut pipeline = generate_statistics([batch], &options.with_runner(Runner::sequential()))
        .unwrap()
        .datasets
        .remove(0);
    assert_eq!(pipeline.name, DEFAULT_SLICE_KEY);
    pipeline.name.clear();
    assert_eq!(in_memory, pipeline);
}

/// Collects formatted log lines written by a `tracing` subscriber.
struct LogCapture {
    logs: Arc<Mutex<Vec<String>>>,
}

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.logs
            .lock()
            .unwrap()
            .push(String::from_utf8_lossy(buf).to_string());
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_in_memory_warns_about_ignored_slicers() {
    let logs = Arc::new(Mutex::new(Vec::new()));
    let writer_logs = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || LogCapture {
            logs: writer_logs.clone(),
        })
        .with_ansi(false)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let options = StatsOptions::default().with_feature_value_slicer(
        featstats::FeatureValueSlicer::new().by_feature("b"),
    );
    let stats = generate_statistics_in_memory(&string_examples(), &options).unwrap();
    assert_eq!(stats.num_examples, 3);
    assert_eq!(stats.name, "");

    let captured = logs.lock().unwrap().concat();
    assert!(captured.contains("WARN"), "{captured}");
    assert!(captured.contains("slicing functions are ignored"), "{captured}");
    assert!(captured.contains("slicers=1"), "{captured}");
}

#[test]
fn test_in_memory_without_slicers_does_not_warn() {
    let logs = Arc::new(Mutex::new(Vec::new()));
    let writer_logs = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || LogCapture {
            logs: writer_logs.clone(),
        })
        .with_ansi(false)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    generate_statistics_in_memory(&string_examples(), &StatsOptions::default()).unwrap();
    let captured = logs.lock().unwrap().concat();
    assert!(!captured.contains("slicing functions are ignored"), "{captured}");
}

#[test]
fn test_feature_order_is_first_seen() {
    let batch = BatchBuilder::new()
        .example(ExampleBuilder::new().ints("z", [1]).build())
        .example(ExampleBuilder::new().strings("y", ["q"]).ints("z", [2]).build())
        .example(ExampleBuilder::new().floats("x", [0.5]).build())
        .build();
    let stats = generate_statistics([batch], &StatsOptions::default()).unwrap();
    let names: Vec<&str> = stats.datasets[0]
        .features
        .iter()
        .map(|f| f.name.as_str())
        .collect();
    assert_eq!(names, ["z", "y", "x"]);
}
