//! Assertions over statistics output.

use crate::statistics::{DatasetFeatureStatistics, FeatureNameStatistics, Histogram};

/// Look up a feature, panicking with the available names when it is absent.
///
/// # Panics
/// Panics if `stats` has no feature called `name`.
#[must_use]
pub fn expect_feature<'a>(stats: &'a DatasetFeatureStatistics, name: &str) -> &'a FeatureNameStatistics {
    stats.feature(name).unwrap_or_else(|| {
        let names: Vec<&str> = stats.features.iter().map(|f| f.name.as_str()).collect();
        panic!("feature `{name}` not in slice `{}`; have {names:?}", stats.name)
    })
}

/// Assert `num_non_missing + num_missing == num_examples` for every feature
/// that carries common stats.
///
/// # Panics
/// Panics on the first feature that violates the equation.
pub fn assert_count_conservation(stats: &DatasetFeatureStatistics) {
    for feature in &stats.features {
        if let Some(common) = feature.common_stats() {
            assert_eq!(
                common.num_non_missing + common.num_missing,
                stats.num_examples,
                "count conservation broken for feature `{}` in slice `{}`: {} non-missing + {} missing",
                feature.name,
                stats.name,
                common.num_non_missing,
                common.num_missing
            );
        }
    }
}

/// Assert the bucket sample counts of `hist` add up to `expected` within
/// `tolerance`.
///
/// # Panics
/// Panics if the total is off by more than `tolerance`.
pub fn assert_histogram_sample_total(hist: &Histogram, expected: f64, tolerance: f64) {
    let total = hist.total_sample_count();
    assert!(
        (total - expected).abs() <= tolerance,
        "histogram sample total {total} differs from {expected} by more than {tolerance}\n  Buckets: {:?}",
        hist.buckets
    );
}

/// Assert bucket bounds never decrease, within and across buckets.
///
/// # Panics
/// Panics on the first decreasing bound.
pub fn assert_histogram_boundaries_non_decreasing(hist: &Histogram) {
    let mut last = f64::NEG_INFINITY;
    for (i, bucket) in hist.buckets.iter().enumerate() {
        assert!(
            bucket.low_value >= last && bucket.high_value >= bucket.low_value,
            "bucket {i} breaks ordering: [{}, {}] after {last}",
            bucket.low_value,
            bucket.high_value
        );
        last = bucket.high_value;
    }
}
