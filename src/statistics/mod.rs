//! Output records: the statistics schema consumed by downstream validators.
//!
//! Field names and nesting are a compatibility contract. Scalars follow
//! "unset = default" semantics, which is what the field-union merge in
//! [`merge`] relies on. Histogram `sample_count`s are fractional.

pub mod merge;

use serde::{Deserialize, Serialize};

pub use merge::{MergeFrom, merge_dataset_feature_statistics};

/// Name of the slice that every example belongs to.
pub const DEFAULT_SLICE_KEY: &str = "All Examples";

/// Primitive type of a feature in the output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeatureType {
    Int,
    Float,
    String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistogramType {
    #[default]
    Standard,
    Quantiles,
}

/// Result collection: one record per observed slice.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetFeatureStatisticsList {
    pub datasets: Vec<DatasetFeatureStatistics>,
}

/// Statistics for one slice.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetFeatureStatistics {
    /// Slice name; empty when slicing output was not requested.
    pub name: String,
    pub num_examples: u64,
    #[serde(with = "proto_f64")]
    pub weighted_num_examples: f64,
    pub features: Vec<FeatureNameStatistics>,
}

impl DatasetFeatureStatistics {
    #[must_use]
    pub fn feature(&self, name: &str) -> Option<&FeatureNameStatistics> {
        self.features.iter().find(|f| f.name == name)
    }
}

/// Statistics for one feature.
///
/// `num_stats` and `string_stats` are mutually exclusive; use the setters to
/// keep it that way.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureNameStatistics {
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub feature_type: Option<FeatureType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_stats: Option<NumericStatistics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub string_stats: Option<StringStatistics>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub custom_stats: Vec<CustomStatistic>,
}

impl FeatureNameStatistics {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn set_num_stats(&mut self, stats: NumericStatistics) {
        self.string_stats = None;
        self.num_stats = Some(stats);
    }

    pub fn set_string_stats(&mut self, stats: StringStatistics) {
        self.num_stats = None;
        self.string_stats = Some(stats);
    }

    /// Common stats from whichever typed block is present.
    #[must_use]
    pub fn common_stats(&self) -> Option<&CommonStatistics> {
        self.num_stats
            .as_ref()
            .and_then(|n| n.common_stats.as_ref())
            .or_else(|| {
                self.string_stats
                    .as_ref()
                    .and_then(|s| s.common_stats.as_ref())
            })
    }

    #[must_use]
    pub fn custom_stat(&self, name: &str) -> Option<&CustomStatistic> {
        self.custom_stats.iter().find(|c| c.name == name)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommonStatistics {
    pub num_non_missing: u64,
    pub num_missing: u64,
    pub min_num_values: u64,
    pub max_num_values: u64,
    #[serde(with = "proto_f64")]
    pub avg_num_values: f64,
    pub tot_num_values: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_values_histogram: Option<Histogram>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weighted_common_stats: Option<WeightedCommonStatistics>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightedCommonStatistics {
    #[serde(with = "proto_f64")]
    pub num_non_missing: f64,
    #[serde(with = "proto_f64")]
    pub num_missing: f64,
    #[serde(with = "proto_f64")]
    pub avg_num_values: f64,
    #[serde(with = "proto_f64")]
    pub tot_num_values: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumericStatistics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub common_stats: Option<CommonStatistics>,
    #[serde(with = "proto_f64")]
    pub mean: f64,
    #[serde(with = "proto_f64")]
    pub std_dev: f64,
    pub num_zeros: u64,
    #[serde(with = "proto_f64")]
    pub min: f64,
    #[serde(with = "proto_f64")]
    pub median: f64,
    #[serde(with = "proto_f64")]
    pub max: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub histograms: Vec<Histogram>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weighted_numeric_stats: Option<WeightedNumericStatistics>,
}

impl NumericStatistics {
    #[must_use]
    pub fn histogram(&self, kind: HistogramType) -> Option<&Histogram> {
        self.histograms.iter().find(|h| h.histogram_type == kind)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightedNumericStatistics {
    #[serde(with = "proto_f64")]
    pub mean: f64,
    #[serde(with = "proto_f64")]
    pub std_dev: f64,
    #[serde(with = "proto_f64")]
    pub median: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub histograms: Vec<Histogram>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StringStatistics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub common_stats: Option<CommonStatistics>,
    pub unique: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub top_values: Vec<FreqAndValue>,
    #[serde(with = "proto_f64")]
    pub avg_length: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank_histogram: Option<RankHistogram>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weighted_string_stats: Option<WeightedStringStatistics>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightedStringStatistics {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub top_values: Vec<FreqAndValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank_histogram: Option<RankHistogram>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreqAndValue {
    pub value: String,
    #[serde(with = "proto_f64")]
    pub frequency: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Histogram {
    pub num_nan: u64,
    pub num_undefined: u64,
    pub buckets: Vec<Bucket>,
    #[serde(rename = "type")]
    pub histogram_type: HistogramType,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
}

impl Histogram {
    /// Sum of all bucket sample counts.
    #[must_use]
    pub fn total_sample_count(&self) -> f64 {
        self.buckets.iter().map(|b| b.sample_count).sum()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bucket {
    #[serde(with = "proto_f64")]
    pub low_value: f64,
    #[serde(with = "proto_f64")]
    pub high_value: f64,
    #[serde(with = "proto_f64")]
    pub sample_count: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankHistogram {
    pub buckets: Vec<RankBucket>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankBucket {
    pub low_rank: u64,
    pub high_rank: u64,
    pub label: String,
    #[serde(with = "proto_f64")]
    pub sample_count: f64,
}

/// A named extra statistic. Exactly one of the value fields is set.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomStatistic {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", with = "proto_f64::option")]
    pub num: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub str: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub histogram: Option<Histogram>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank_histogram: Option<RankHistogram>,
}

impl CustomStatistic {
    pub fn num(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            num: Some(value),
            ..Self::default()
        }
    }

    pub fn str(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            str: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn histogram(name: impl Into<String>, histogram: Histogram) -> Self {
        Self {
            name: name.into(),
            histogram: Some(histogram),
            ..Self::default()
        }
    }

    pub fn rank_histogram(name: impl Into<String>, histogram: RankHistogram) -> Self {
        Self {
            name: name.into(),
            rank_histogram: Some(histogram),
            ..Self::default()
        }
    }
}

/// Doubles encoded the way proto3 JSON does: non-finite values become the
/// strings `"NaN"`, `"Infinity"` and `"-Infinity"`. Every `f64` field of the
/// output records goes through here.
mod proto_f64 {
    use serde::de::{self, Deserializer, Visitor};
    use serde::ser::Serializer;
    use std::fmt;

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
        if v.is_nan() {
            s.serialize_str("NaN")
        } else if v.is_infinite() {
            s.serialize_str(if *v > 0.0 { "Infinity" } else { "-Infinity" })
        } else {
            s.serialize_f64(*v)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        struct F64Visitor;

        impl Visitor<'_> for F64Visitor {
            type Value = f64;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a number or one of \"NaN\", \"Infinity\", \"-Infinity\"")
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<f64, E> {
                Ok(v)
            }

            #[allow(clippy::cast_precision_loss)]
            fn visit_i64<E: de::Error>(self, v: i64) -> Result<f64, E> {
                Ok(v as f64)
            }

            #[allow(clippy::cast_precision_loss)]
            fn visit_u64<E: de::Error>(self, v: u64) -> Result<f64, E> {
                Ok(v as f64)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<f64, E> {
                match v {
                    "NaN" => Ok(f64::NAN),
                    "Infinity" => Ok(f64::INFINITY),
                    "-Infinity" => Ok(f64::NEG_INFINITY),
                    other => other.parse().map_err(E::custom),
                }
            }
        }

        d.deserialize_any(F64Visitor)
    }

    /// Same encoding for optional doubles.
    pub mod option {
        use serde::{Deserializer, Serializer};

        #[allow(clippy::ref_option)]
        pub fn serialize<S: Serializer>(v: &Option<f64>, s: S) -> Result<S::Ok, S::Error> {
            match v {
                Some(v) => super::serialize(v, s),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
            super::deserialize(d).map(Some)
        }
    }
}
