//! String and categorical statistics.

use featstats::histogram::NON_UTF8_LABEL;
use featstats::testing::*;
use featstats::{FeatureType, RecordBatch, Schema, StatsOptions, generate_statistics};

#[macro_use]
mod macros;

fn all_examples(batch: RecordBatch, options: &StatsOptions) -> featstats::DatasetFeatureStatistics {
    generate_statistics([batch], options)
        .unwrap()
        .datasets
        .remove(0)
}

#[test]
fn test_string_scenario() {
    let batch = BatchBuilder::new().examples(string_examples()).build();
    let options = StatsOptions::default()
        .with_num_top_values(2)
        .with_num_rank_histogram_buckets(2);
    let stats = all_examples(batch, &options);

    let b = expect_feature(&stats, "b");
    assert_eq!(b.feature_type, Some(FeatureType::String));
    let strings = b.string_stats.as_ref().unwrap();
    assert_eq!(strings.unique, 6);
    assert_approx_eq!(strings.avg_length, 1.0);

    let top: Vec<(&str, f64)> = strings
        .top_values
        .iter()
        .map(|t| (t.value.as_str(), t.frequency))
        .collect();
    assert_eq!(top, [("a", 2.0), ("b", 2.0)]);

    let ranks = strings.rank_histogram.as_ref().unwrap();
    assert_eq!(ranks.buckets.len(), 2);
    assert_eq!(ranks.buckets[0].label, "a");
    assert_eq!(ranks.buckets[0].low_rank, 0);
    assert_eq!(ranks.buckets[1].high_rank, 1);

    let common = strings.common_stats.as_ref().unwrap();
    assert_eq!(common.num_non_missing, 3);
    assert_eq!(common.tot_num_values, 10);
    assert_eq!(common.min_num_values, 3);
    assert_eq!(common.max_num_values, 4);
    assert!(b.num_stats.is_none());
}

#[test]
fn test_rank_histogram_can_be_longer_than_top_values() {
    let batch = BatchBuilder::new().examples(string_examples()).build();
    let options = StatsOptions::default()
        .with_num_top_values(1)
        .with_num_rank_histogram_buckets(5);
    let stats = all_examples(batch, &options);
    let strings = expect_feature(&stats, "b").string_stats.as_ref().unwrap();
    assert_eq!(strings.top_values.len(), 1);
    let labels: Vec<&str> = strings
        .rank_histogram
        .as_ref()
        .unwrap()
        .buckets
        .iter()
        .map(|b| b.label.as_str())
        .collect();
    assert_eq!(labels, ["a", "b", "c", "e", "d"]);
}

#[test]
fn test_categorical_ints_take_the_string_path() {
    let batch = BatchBuilder::new()
        .example(ExampleBuilder::new().ints("zip", [10, 200]).build())
        .example(ExampleBuilder::new().ints("zip", [10]).build())
        .build();
    let schema = Schema::new().with_feature("zip", None, true);
    let stats = all_examples(batch, &StatsOptions::default().with_schema(schema));

    let zip = expect_feature(&stats, "zip");
    assert_eq!(zip.feature_type, Some(FeatureType::Int));
    assert!(zip.num_stats.is_none());
    let strings = zip.string_stats.as_ref().unwrap();
    assert_eq!(strings.unique, 2);
    assert_eq!(strings.top_values[0].value, "10");
    assert_approx_eq!(strings.top_values[0].frequency, 2.0);
    // "10", "200", "10"
    assert_approx_eq!(strings.avg_length, 7.0 / 3.0);
}

#[test]
fn test_non_utf8_values_share_a_label() {
    let batch = BatchBuilder::new()
        .example(ExampleBuilder::new().bytes("raw", [vec![0xff_u8, 0xfe]]).build())
        .example(ExampleBuilder::new().bytes("raw", [vec![0xff_u8, 0xfe]]).build())
        .example(ExampleBuilder::new().bytes("raw", [b"ok".to_vec()]).build())
        .build();
    let stats = all_examples(batch, &StatsOptions::default());
    let strings = expect_feature(&stats, "raw").string_stats.as_ref().unwrap();
    assert_eq!(strings.unique, 2);
    assert_eq!(strings.top_values[0].value, NON_UTF8_LABEL);
    assert_approx_eq!(strings.top_values[0].frequency, 2.0);
    assert_eq!(strings.top_values[1].value, "ok");
}

#[test]
fn test_empty_strings_count_toward_length() {
    let batch = BatchBuilder::new()
        .example(ExampleBuilder::new().strings("s", ["", "abcd"]).build())
        .build();
    let stats = all_examples(batch, &StatsOptions::default());
    let strings = expect_feature(&stats, "s").string_stats.as_ref().unwrap();
    assert_eq!(strings.unique, 2);
    assert_approx_eq!(strings.avg_length, 2.0);
}
