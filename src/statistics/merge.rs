//! Field-union merge of statistics records.
//!
//! Singular scalars are overwritten by the later contribution when it sets
//! them (non-default), nested messages merge field by field, repeated fields
//! concatenate. `num_stats` / `string_stats` behave as a one-of.

use indexmap::IndexMap;

use super::{
    CommonStatistics, CustomStatistic, DatasetFeatureStatistics, FeatureNameStatistics, Histogram,
    NumericStatistics, RankHistogram, StringStatistics, WeightedCommonStatistics,
    WeightedNumericStatistics, WeightedStringStatistics,
};

/// Merge `other` into `self` with field-union semantics.
pub trait MergeFrom {
    fn merge_from(&mut self, other: &Self);
}

fn scalar<T: PartialEq + Default + Clone>(dst: &mut T, src: &T) {
    if *src != T::default() {
        dst.clone_from(src);
    }
}

fn message<T: MergeFrom + Clone>(dst: &mut Option<T>, src: Option<&T>) {
    match (dst.as_mut(), src) {
        (Some(d), Some(s)) => d.merge_from(s),
        (None, Some(s)) => *dst = Some(s.clone()),
        (_, None) => {}
    }
}

fn repeated<T: Clone>(dst: &mut Vec<T>, src: &[T]) {
    dst.extend_from_slice(src);
}

impl MergeFrom for DatasetFeatureStatistics {
    fn merge_from(&mut self, other: &Self) {
        scalar(&mut self.name, &other.name);
        scalar(&mut self.num_examples, &other.num_examples);
        scalar(&mut self.weighted_num_examples, &other.weighted_num_examples);
        repeated(&mut self.features, &other.features);
    }
}

impl MergeFrom for FeatureNameStatistics {
    fn merge_from(&mut self, other: &Self) {
        scalar(&mut self.name, &other.name);
        if other.feature_type.is_some() {
            self.feature_type = other.feature_type;
        }
        if let Some(n) = &other.num_stats {
            self.string_stats = None;
            message(&mut self.num_stats, Some(n));
        }
        if let Some(s) = &other.string_stats {
            self.num_stats = None;
            message(&mut self.string_stats, Some(s));
        }
        repeated(&mut self.custom_stats, &other.custom_stats);
    }
}

impl MergeFrom for CommonStatistics {
    fn merge_from(&mut self, other: &Self) {
        scalar(&mut self.num_non_missing, &other.num_non_missing);
        scalar(&mut self.num_missing, &other.num_missing);
        scalar(&mut self.min_num_values, &other.min_num_values);
        scalar(&mut self.max_num_values, &other.max_num_values);
        scalar(&mut self.avg_num_values, &other.avg_num_values);
        scalar(&mut self.tot_num_values, &other.tot_num_values);
        message(
            &mut self.num_values_histogram,
            other.num_values_histogram.as_ref(),
        );
        message(
            &mut self.weighted_common_stats,
            other.weighted_common_stats.as_ref(),
        );
    }
}

impl MergeFrom for WeightedCommonStatistics {
    fn merge_from(&mut self, other: &Self) {
        scalar(&mut self.num_non_missing, &other.num_non_missing);
        scalar(&mut self.num_missing, &other.num_missing);
        scalar(&mut self.avg_num_values, &other.avg_num_values);
        scalar(&mut self.tot_num_values, &other.tot_num_values);
    }
}

impl MergeFrom for NumericStatistics {
    fn merge_from(&mut self, other: &Self) {
        message(&mut self.common_stats, other.common_stats.as_ref());
        scalar(&mut self.mean, &other.mean);
        scalar(&mut self.std_dev, &other.std_dev);
        scalar(&mut self.num_zeros, &other.num_zeros);
        scalar(&mut self.min, &other.min);
        scalar(&mut self.median, &other.median);
        scalar(&mut self.max, &other.max);
        repeated(&mut self.histograms, &other.histograms);
        message(
            &mut self.weighted_numeric_stats,
            other.weighted_numeric_stats.as_ref(),
        );
    }
}

impl MergeFrom for WeightedNumericStatistics {
    fn merge_from(&mut self, other: &Self) {
        scalar(&mut self.mean, &other.mean);
        scalar(&mut self.std_dev, &other.std_dev);
        scalar(&mut self.median, &other.median);
        repeated(&mut self.histograms, &other.histograms);
    }
}

impl MergeFrom for StringStatistics {
    fn merge_from(&mut self, other: &Self) {
        message(&mut self.common_stats, other.common_stats.as_ref());
        scalar(&mut self.unique, &other.unique);
        repeated(&mut self.top_values, &other.top_values);
        scalar(&mut self.avg_length, &other.avg_length);
        message(&mut self.rank_histogram, other.rank_histogram.as_ref());
        message(
            &mut self.weighted_string_stats,
            other.weighted_string_stats.as_ref(),
        );
    }
}

impl MergeFrom for WeightedStringStatistics {
    fn merge_from(&mut self, other: &Self) {
        repeated(&mut self.top_values, &other.top_values);
        message(&mut self.rank_histogram, other.rank_histogram.as_ref());
    }
}

impl MergeFrom for Histogram {
    fn merge_from(&mut self, other: &Self) {
        scalar(&mut self.num_nan, &other.num_nan);
        scalar(&mut self.num_undefined, &other.num_undefined);
        repeated(&mut self.buckets, &other.buckets);
        scalar(&mut self.histogram_type, &other.histogram_type);
        scalar(&mut self.name, &other.name);
    }
}

impl MergeFrom for RankHistogram {
    fn merge_from(&mut self, other: &Self) {
        repeated(&mut self.buckets, &other.buckets);
        scalar(&mut self.name, &other.name);
    }
}

impl MergeFrom for CustomStatistic {
    fn merge_from(&mut self, other: &Self) {
        scalar(&mut self.name, &other.name);
        // value is a one-of: a set value replaces whichever was set before
        if other.num.is_some() {
            self.str = None;
            self.histogram = None;
            self.rank_histogram = None;
            self.num = other.num;
        } else if other.str.is_some() {
            self.num = None;
            self.histogram = None;
            self.rank_histogram = None;
            self.str.clone_from(&other.str);
        } else if let Some(h) = &other.histogram {
            self.num = None;
            self.str = None;
            self.rank_histogram = None;
            message(&mut self.histogram, Some(h));
        } else if let Some(r) = &other.rank_histogram {
            self.num = None;
            self.str = None;
            self.histogram = None;
            message(&mut self.rank_histogram, Some(r));
        }
    }
}

/// Combine several partial dataset records for the same slice into one.
///
/// Dataset-level scalars merge in order; feature records sharing a name are
/// merged into a single record placed where that name was first seen.
#[must_use]
pub fn merge_dataset_feature_statistics(
    parts: &[DatasetFeatureStatistics],
) -> DatasetFeatureStatistics {
    let mut out = DatasetFeatureStatistics::default();
    let mut by_name: IndexMap<&str, FeatureNameStatistics> = IndexMap::new();
    for part in parts {
        scalar(&mut out.name, &part.name);
        scalar(&mut out.num_examples, &part.num_examples);
        scalar(&mut out.weighted_num_examples, &part.weighted_num_examples);
        for feature in &part.features {
            by_name
                .entry(feature.name.as_str())
                .and_modify(|f| f.merge_from(feature))
                .or_insert_with(|| feature.clone());
        }
    }
    out.features = by_name.into_values().collect();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistics::FeatureType;

    #[test]
    fn zero_scalars_do_not_overwrite() {
        let mut a = CommonStatistics {
            num_non_missing: 3,
            ..CommonStatistics::default()
        };
        a.merge_from(&CommonStatistics {
            num_missing: 1,
            ..CommonStatistics::default()
        });
        assert_eq!(a.num_non_missing, 3);
        assert_eq!(a.num_missing, 1);
    }

    #[test]
    fn custom_stats_concatenate_in_order() {
        let mut a = FeatureNameStatistics::new("f");
        a.custom_stats.push(CustomStatistic::num("one", 1.0));
        let mut b = FeatureNameStatistics::new("f");
        b.feature_type = Some(FeatureType::Float);
        b.custom_stats.push(CustomStatistic::num("two", 2.0));
        a.merge_from(&b);
        let names: Vec<_> = a.custom_stats.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["one", "two"]);
        assert_eq!(a.feature_type, Some(FeatureType::Float));
    }
}
