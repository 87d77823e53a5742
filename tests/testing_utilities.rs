//! The testing helpers themselves.

use featstats::statistics::{Bucket, CommonStatistics, Histogram, NumericStatistics};
use featstats::testing::*;
use featstats::{
    DatasetFeatureStatistics, FeatureNameStatistics, FeatureValues, RecordBatch, example,
};

fn histogram(bounds: &[(f64, f64, f64)]) -> Histogram {
    Histogram {
        buckets: bounds
            .iter()
            .map(|&(low_value, high_value, sample_count)| Bucket {
                low_value,
                high_value,
                sample_count,
            })
            .collect(),
        ..Histogram::default()
    }
}

fn with_counts(num_examples: u64, non_missing: u64, missing: u64) -> DatasetFeatureStatistics {
    let mut feature = FeatureNameStatistics::new("f");
    feature.set_num_stats(NumericStatistics {
        common_stats: Some(CommonStatistics {
            num_non_missing: non_missing,
            num_missing: missing,
            ..CommonStatistics::default()
        }),
        ..NumericStatistics::default()
    });
    DatasetFeatureStatistics {
        num_examples,
        features: vec![feature],
        ..DatasetFeatureStatistics::default()
    }
}

#[test]
fn test_builders_match_manual_construction() {
    let built = BatchBuilder::new()
        .example(ExampleBuilder::new().ints("a", [1, 2]).missing("b").build())
        .example(ExampleBuilder::new().strings("b", ["x"]).build())
        .build();
    let manual = RecordBatch::from_examples(&[
        example([("a", Some(FeatureValues::ints([1, 2]))), ("b", None)]),
        example([("b", Some(FeatureValues::strings(["x"])))]),
    ]);
    assert_eq!(built, manual);
    assert_eq!(built.num_rows(), 2);
    assert_eq!(built.column("a").unwrap()[1], None);
}

#[test]
fn test_repeat_and_len() {
    let ex = ExampleBuilder::new().floats("x", [1.5]).build();
    let builder = BatchBuilder::new().repeat(&ex, 4);
    assert_eq!(builder.len(), 4);
    assert!(!builder.is_empty());
    let examples = builder.build_examples();
    assert!(examples.iter().all(|e| e == &ex));
    assert!(BatchBuilder::new().is_empty());
}

#[test]
fn test_fixtures() {
    assert_eq!(numeric_examples().len(), 3);
    assert_eq!(string_examples().len(), 3);
    let text = text_examples(3, 2);
    assert_eq!(text.len(), 5);
    assert_eq!(
        text[4]["text"],
        Some(FeatureValues::strings(["id_000001"]))
    );
}

#[test]
fn test_histogram_assertions_accept_good_input() {
    let hist = histogram(&[(0.0, 1.0, 2.0), (1.0, 2.0, 3.5)]);
    assert_histogram_sample_total(&hist, 5.5, 1e-12);
    assert_histogram_boundaries_non_decreasing(&hist);
    assert_count_conservation(&with_counts(5, 3, 2));
}

#[test]
#[should_panic(expected = "histogram sample total")]
fn test_sample_total_mismatch_panics() {
    assert_histogram_sample_total(&histogram(&[(0.0, 1.0, 2.0)]), 3.0, 1e-9);
}

#[test]
#[should_panic(expected = "breaks ordering")]
fn test_decreasing_bounds_panic() {
    assert_histogram_boundaries_non_decreasing(&histogram(&[(0.0, 2.0, 1.0), (1.0, 3.0, 1.0)]));
}

#[test]
#[should_panic(expected = "count conservation broken")]
fn test_count_conservation_violation_panics() {
    assert_count_conservation(&with_counts(5, 3, 1));
}

#[test]
#[should_panic(expected = "not in slice")]
fn test_expect_feature_panics_on_absent_name() {
    let _ = expect_feature(&with_counts(1, 1, 0), "missing");
}
