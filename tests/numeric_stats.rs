//! Common and numeric statistics through the public entry points.

use featstats::combiners::QuantileSketch;
use featstats::statistics::HistogramType;
use featstats::testing::*;
use featstats::{FeatureType, RecordBatch, StatsOptions, generate_statistics};

#[macro_use]
mod macros;

fn all_examples(batch: RecordBatch, options: &StatsOptions) -> featstats::DatasetFeatureStatistics {
    generate_statistics([batch], options)
        .unwrap()
        .datasets
        .remove(0)
}

#[test]
fn test_numeric_scenario() {
    let batch = BatchBuilder::new().examples(numeric_examples()).build();
    let stats = all_examples(batch, &StatsOptions::default());
    assert_eq!(stats.num_examples, 3);

    let a = expect_feature(&stats, "a");
    assert_eq!(a.feature_type, Some(FeatureType::Float));
    let num = a.num_stats.as_ref().unwrap();
    assert_approx_eq!(num.mean, 16.0 / 6.0);
    assert_approx_eq!(num.min, 1.0);
    assert_approx_eq!(num.max, 5.0);
    assert_approx_eq!(num.median, 3.0);
    assert_approx_eq!(num.std_dev, 1.490_711_984_999_86, 1e-9);
    assert_eq!(num.num_zeros, 0);

    let common = num.common_stats.as_ref().unwrap();
    assert_eq!(common.num_non_missing, 3);
    assert_eq!(common.num_missing, 0);
    assert_eq!(common.min_num_values, 1);
    assert_eq!(common.max_num_values, 4);
    assert_eq!(common.tot_num_values, 7);
    assert_approx_eq!(common.avg_num_values, 7.0 / 3.0);

    for kind in [HistogramType::Standard, HistogramType::Quantiles] {
        let hist = num.histogram(kind).unwrap();
        assert_eq!(hist.num_nan, 1);
        assert_histogram_sample_total(hist, 6.0, 1e-9);
        assert_histogram_boundaries_non_decreasing(hist);
    }
}

#[test]
fn test_value_count_histogram() {
    let batch = BatchBuilder::new().examples(numeric_examples()).build();
    let stats = all_examples(batch, &StatsOptions::default().with_num_values_histogram_buckets(3));
    let common = expect_feature(&stats, "a").common_stats().unwrap();
    let hist = common.num_values_histogram.as_ref().unwrap();
    assert_eq!(hist.histogram_type, HistogramType::Quantiles);
    assert_eq!(hist.buckets.len(), 3);
    assert_histogram_sample_total(hist, 3.0, 1e-9);
}

#[test]
fn test_quantile_histogram_has_k_buckets_and_k_plus_one_cuts() {
    let examples: Vec<_> = (0..500)
        .map(|i| ExampleBuilder::new().floats("x", [f64::from(i % 97) * 1.5]).build())
        .collect();
    let batch = BatchBuilder::new().examples(examples).build();
    let options = StatsOptions::default().with_num_quantiles_histogram_buckets(7);
    let stats = all_examples(batch, &options);
    let num = expect_feature(&stats, "x").num_stats.as_ref().unwrap();
    let hist = num.histogram(HistogramType::Quantiles).unwrap();
    assert_eq!(hist.buckets.len(), 7);
    assert_histogram_boundaries_non_decreasing(hist);
    assert_histogram_sample_total(hist, 500.0, 1e-9);
    assert_approx_eq!(hist.buckets[0].low_value, num.min);
    assert_approx_eq!(hist.buckets[6].high_value, num.max);

    let mut sketch = QuantileSketch::default();
    (0..10_000).for_each(|i| sketch.add(f64::from(i)));
    let cuts = sketch.cut_points(7);
    assert_eq!(cuts.len(), 8);
    assert!(cuts.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_standard_histogram_is_equal_width() {
    let examples: Vec<_> = (0..=100)
        .map(|i| ExampleBuilder::new().ints("n", [i]).build())
        .collect();
    let batch = BatchBuilder::new().examples(examples).build();
    let options = StatsOptions::default().with_num_histogram_buckets(4);
    let stats = all_examples(batch, &options);
    let num = expect_feature(&stats, "n").num_stats.as_ref().unwrap();
    let hist = num.histogram(HistogramType::Standard).unwrap();
    assert_eq!(hist.buckets.len(), 4);
    for b in &hist.buckets {
        assert_approx_eq!(b.high_value - b.low_value, 25.0);
    }
    assert_histogram_sample_total(hist, 101.0, 1e-9);
}

#[test]
fn test_infinities_reach_the_outer_buckets() {
    let batch = BatchBuilder::new()
        .example(ExampleBuilder::new().floats("x", [f64::NEG_INFINITY, 1.0]).build())
        .example(ExampleBuilder::new().floats("x", [2.0, f64::INFINITY]).build())
        .build();
    let stats = all_examples(batch, &StatsOptions::default().with_num_histogram_buckets(2));
    let num = expect_feature(&stats, "x").num_stats.as_ref().unwrap();
    assert_eq!(num.min, f64::NEG_INFINITY);
    assert_eq!(num.max, f64::INFINITY);
    let hist = num.histogram(HistogramType::Standard).unwrap();
    assert_eq!(hist.buckets[0].low_value, f64::NEG_INFINITY);
    assert_eq!(hist.buckets[1].high_value, f64::INFINITY);
    assert_histogram_sample_total(hist, 4.0, 1e-9);
}

#[test]
fn test_zeros_and_empty_value_lists() {
    let batch = BatchBuilder::new()
        .example(ExampleBuilder::new().ints("z", [0, 0, 3]).build())
        .example(ExampleBuilder::new().ints("z", []).build())
        .example(ExampleBuilder::new().missing("z").build())
        .build();
    let stats = all_examples(batch, &StatsOptions::default());
    let num = expect_feature(&stats, "z").num_stats.as_ref().unwrap();
    assert_eq!(num.num_zeros, 2);
    let common = num.common_stats.as_ref().unwrap();
    assert_eq!(common.num_non_missing, 2);
    assert_eq!(common.num_missing, 1);
    assert_eq!(common.min_num_values, 0);
    assert_eq!(common.max_num_values, 3);
}

#[test]
fn test_mixed_kinds_resolve_by_majority() {
    let batch = BatchBuilder::new()
        .example(ExampleBuilder::new().ints("m", [1]).build())
        .example(ExampleBuilder::new().floats("m", [2.5]).build())
        .example(ExampleBuilder::new().strings("m", ["x"]).build())
        .example(ExampleBuilder::new().strings("t", ["x"]).build())
        .example(ExampleBuilder::new().ints("t", [1]).build())
        .build();
    let stats = all_examples(batch, &StatsOptions::default());
    assert_count_conservation(&stats);

    let m = expect_feature(&stats, "m");
    assert_eq!(m.feature_type, Some(FeatureType::Float));
    let common = m.common_stats().unwrap();
    assert_eq!(common.num_non_missing, 2);
    assert_eq!(common.num_missing, 3);
    assert_approx_eq!(m.num_stats.as_ref().unwrap().mean, 1.75);

    // a tie goes to STRING
    let t = expect_feature(&stats, "t");
    assert_eq!(t.feature_type, Some(FeatureType::String));
    assert_eq!(t.common_stats().unwrap().num_non_missing, 1);
}

#[test]
fn test_declared_type_wins() {
    let batch = BatchBuilder::new()
        .example(ExampleBuilder::new().strings("d", ["1"]).build())
        .example(ExampleBuilder::new().strings("d", ["2"]).build())
        .example(ExampleBuilder::new().ints("d", [3]).build())
        .build();
    let schema = featstats::Schema::new().with_feature("d", Some(FeatureType::Int), false);
    let stats = all_examples(batch, &StatsOptions::default().with_schema(schema));
    let d = expect_feature(&stats, "d");
    assert_eq!(d.feature_type, Some(FeatureType::Int));
    let num = d.num_stats.as_ref().unwrap();
    assert_eq!(num.common_stats.as_ref().unwrap().num_non_missing, 1);
    assert_approx_eq!(num.mean, 3.0);
}

#[test]
fn test_large_input_stays_close_to_exact() {
    let examples: Vec<_> = (1..=20_000)
        .map(|i| ExampleBuilder::new().floats("v", [f64::from(i)]).build())
        .collect();
    let batch = BatchBuilder::new().examples(examples).build();
    let stats = all_examples(batch, &StatsOptions::default());
    let num = expect_feature(&stats, "v").num_stats.as_ref().unwrap();
    assert_approx_eq!(num.min, 1.0);
    assert_approx_eq!(num.max, 20_000.0);
    assert!((num.median - 10_000.0).abs() / 10_000.0 <= 0.011, "median {}", num.median);
    let hist = num.histogram(HistogramType::Standard).unwrap();
    assert_histogram_sample_total(hist, 20_000.0, 1e-6);
}

#[test]
fn test_all_missing_feature_is_reported() {
    let batch = BatchBuilder::new()
        .example(ExampleBuilder::new().missing("ghost").ints("x", [1]).build())
        .example(ExampleBuilder::new().missing("ghost").ints("x", [2]).build())
        .build();
    let stats = all_examples(batch, &StatsOptions::default());
    let ghost = expect_feature(&stats, "ghost");
    assert_eq!(ghost.feature_type, None);
    let common = ghost.common_stats().unwrap();
    assert_eq!(common.num_non_missing, 0);
    assert_eq!(common.num_missing, 2);
    assert!(matches!(
        stats.feature("x").unwrap().num_stats.as_ref().map(|n| &n.histograms),
        Some(h) if h.len() == 2
    ));
}
