//! Common, numeric and string-length statistics for every feature.
//!
//! One accumulator tracks every kind (int, float, bytes) separately so the
//! feature type can be resolved at extraction from the merged kind tally;
//! examples whose kind does not fit the resolved type are reported as
//! missing.

use anyhow::Result;
use indexmap::IndexMap;
use tracing::debug;

use super::{CombinerStatsGenerator, batch_weights};
use crate::combiners::{ExactSum, Moments, QuantileSketch};
use crate::histogram::{quantiles_histogram, standard_histogram};
use crate::options::{Schema, StatsOptions};
use crate::statistics::{
    CommonStatistics, DatasetFeatureStatistics, FeatureNameStatistics, FeatureType,
    NumericStatistics, StringStatistics, WeightedCommonStatistics, WeightedNumericStatistics,
};
use crate::types::{FeatureKind, FeatureValues, KindTally, RecordBatch, kind_accepted};

pub const BASIC_STATS_GENERATOR_NAME: &str = "basic_stats";

/// Computes `num_examples`, common stats, numeric stats and string lengths,
/// plus their weighted counterparts when a weight feature is set.
#[derive(Clone, Debug)]
pub struct BasicStatsGenerator {
    schema: Schema,
    weight_feature: Option<String>,
    num_values_histogram_buckets: usize,
    num_histogram_buckets: usize,
    num_quantiles_histogram_buckets: usize,
    relative_accuracy: f64,
}

impl Default for BasicStatsGenerator {
    fn default() -> Self {
        Self::from_options(&StatsOptions::default())
    }
}

impl BasicStatsGenerator {
    #[must_use]
    pub fn from_options(options: &StatsOptions) -> Self {
        Self {
            schema: options.schema.clone().unwrap_or_default(),
            weight_feature: options.weight_feature.clone(),
            num_values_histogram_buckets: options.num_values_histogram_buckets,
            num_histogram_buckets: options.num_histogram_buckets,
            num_quantiles_histogram_buckets: options.num_quantiles_histogram_buckets,
            relative_accuracy: options.quantile_relative_accuracy,
        }
    }

    const fn weighted(&self) -> bool {
        self.weight_feature.is_some()
    }
}

/// Accumulator of [`BasicStatsGenerator`].
#[derive(Clone, Debug, Default)]
pub struct BasicStatsAccumulator {
    num_examples: u64,
    weighted_num_examples: ExactSum,
    features: IndexMap<String, FeaturePartial>,
}

#[derive(Clone, Debug)]
struct FeaturePartial {
    tally: KindTally,
    int: KindPartial,
    float: KindPartial,
    bytes: KindPartial,
}

impl FeaturePartial {
    fn new(alpha: f64) -> Self {
        Self {
            tally: KindTally::default(),
            int: KindPartial::new(alpha),
            float: KindPartial::new(alpha),
            bytes: KindPartial::new(alpha),
        }
    }

    fn kind_mut(&mut self, kind: FeatureKind) -> &mut KindPartial {
        match kind {
            FeatureKind::Int => &mut self.int,
            FeatureKind::Float => &mut self.float,
            FeatureKind::Bytes => &mut self.bytes,
        }
    }

    fn merge(&mut self, other: &Self) {
        self.tally.merge(&other.tally);
        self.int.merge(&other.int);
        self.float.merge(&other.float);
        self.bytes.merge(&other.bytes);
    }

    /// The partials whose kind fits `resolved`, merged.
    fn accepted(&self, resolved: Option<FeatureType>, alpha: f64) -> KindPartial {
        let mut out = KindPartial::new(alpha);
        let Some(t) = resolved else { return out };
        for (kind, part) in [
            (FeatureKind::Int, &self.int),
            (FeatureKind::Float, &self.float),
            (FeatureKind::Bytes, &self.bytes),
        ] {
            if kind_accepted(t, kind) {
                out.merge(part);
            }
        }
        out
    }
}

/// Everything tracked for the examples of one kind.
#[derive(Clone, Debug)]
struct KindPartial {
    num_non_missing: u64,
    min_num_values: Option<u64>,
    max_num_values: u64,
    tot_num_values: u64,
    num_values: QuantileSketch,
    weighted_non_missing: ExactSum,
    weighted_tot_num_values: ExactSum,

    moments: Moments,
    weighted_moments: Moments,
    values: QuantileSketch,
    weighted_values: QuantileSketch,
    num_zeros: u64,
    num_nan: u64,

    total_length: u64,
    num_strings: u64,
}

impl KindPartial {
    fn new(alpha: f64) -> Self {
        Self {
            num_non_missing: 0,
            min_num_values: None,
            max_num_values: 0,
            tot_num_values: 0,
            num_values: QuantileSketch::new(alpha),
            weighted_non_missing: ExactSum::new(),
            weighted_tot_num_values: ExactSum::new(),
            moments: Moments::default(),
            weighted_moments: Moments::default(),
            values: QuantileSketch::new(alpha),
            weighted_values: QuantileSketch::new(alpha),
            num_zeros: 0,
            num_nan: 0,
            total_length: 0,
            num_strings: 0,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn add(&mut self, values: &FeatureValues, weight: Option<f64>, categorical: bool) {
        let n = values.len() as u64;
        self.num_non_missing += 1;
        self.min_num_values = Some(self.min_num_values.map_or(n, |m| m.min(n)));
        self.max_num_values = self.max_num_values.max(n);
        self.tot_num_values += n;
        self.num_values.add(n as f64);
        if let Some(w) = weight {
            self.weighted_non_missing.add(w);
            self.weighted_tot_num_values.add(w * n as f64);
        }
        match values {
            FeatureValues::Int(v) if !categorical => {
                for x in v {
                    self.add_number(*x as f64, weight);
                }
            }
            FeatureValues::Float(v) if !categorical => {
                for x in v {
                    self.add_number(*x, weight);
                }
            }
            FeatureValues::Bytes(v) => {
                for b in v {
                    self.add_string(b.len());
                }
            }
            numeric => {
                for s in numeric.to_byte_values() {
                    self.add_string(s.len());
                }
            }
        }
    }

    fn add_number(&mut self, x: f64, weight: Option<f64>) {
        if x.is_nan() {
            self.num_nan += 1;
            return;
        }
        if x == 0.0 {
            self.num_zeros += 1;
        }
        self.moments.add(x, 1.0);
        self.values.add(x);
        if let Some(w) = weight {
            self.weighted_moments.add(x, w);
            self.weighted_values.add_weighted(x, w);
        }
    }

    fn add_string(&mut self, len: usize) {
        self.total_length += len as u64;
        self.num_strings += 1;
    }

    fn merge(&mut self, other: &Self) {
        self.num_non_missing += other.num_non_missing;
        self.min_num_values = match (self.min_num_values, other.min_num_values) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.max_num_values = self.max_num_values.max(other.max_num_values);
        self.tot_num_values += other.tot_num_values;
        self.num_values.merge(&other.num_values);
        self.weighted_non_missing.merge(&other.weighted_non_missing);
        self.weighted_tot_num_values.merge(&other.weighted_tot_num_values);
        self.moments.merge(&other.moments);
        self.weighted_moments.merge(&other.weighted_moments);
        self.values.merge(&other.values);
        self.weighted_values.merge(&other.weighted_values);
        self.num_zeros += other.num_zeros;
        self.num_nan += other.num_nan;
        self.total_length += other.total_length;
        self.num_strings += other.num_strings;
    }
}

#[allow(clippy::cast_precision_loss)]
fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 { num / den } else { 0.0 }
}

impl BasicStatsGenerator {
    #[allow(clippy::cast_precision_loss)]
    fn common_stats(&self, part: &KindPartial, acc: &BasicStatsAccumulator) -> CommonStatistics {
        let num_values_histogram = (part.num_non_missing > 0)
            .then(|| quantiles_histogram(&part.num_values, self.num_values_histogram_buckets));
        let weighted_common_stats = self.weighted().then(|| {
            let non_missing = part.weighted_non_missing.value();
            let tot_num_values = part.weighted_tot_num_values.value();
            WeightedCommonStatistics {
                num_non_missing: non_missing,
                num_missing: (acc.weighted_num_examples.value() - non_missing).max(0.0),
                avg_num_values: ratio(tot_num_values, non_missing),
                tot_num_values,
            }
        });
        CommonStatistics {
            num_non_missing: part.num_non_missing,
            num_missing: acc.num_examples.saturating_sub(part.num_non_missing),
            min_num_values: part.min_num_values.unwrap_or(0),
            max_num_values: part.max_num_values,
            avg_num_values: ratio(part.tot_num_values as f64, part.num_non_missing as f64),
            tot_num_values: part.tot_num_values,
            num_values_histogram,
            weighted_common_stats,
        }
    }

    fn numeric_stats(&self, part: &KindPartial, common: CommonStatistics) -> NumericStatistics {
        let histograms = |sketch: &QuantileSketch| {
            let mut standard = standard_histogram(sketch, self.num_histogram_buckets);
            let mut quantiles = quantiles_histogram(sketch, self.num_quantiles_histogram_buckets);
            standard.num_nan = part.num_nan;
            quantiles.num_nan = part.num_nan;
            vec![standard, quantiles]
        };
        let weighted_numeric_stats = self.weighted().then(|| WeightedNumericStatistics {
            mean: part.weighted_moments.mean().unwrap_or(0.0),
            std_dev: part.weighted_moments.std_dev().unwrap_or(0.0),
            median: part.weighted_values.quantile(0.5).unwrap_or(0.0),
            histograms: histograms(&part.weighted_values),
        });
        NumericStatistics {
            common_stats: Some(common),
            mean: part.moments.mean().unwrap_or(0.0),
            std_dev: part.moments.std_dev().unwrap_or(0.0),
            num_zeros: part.num_zeros,
            min: part.values.min().unwrap_or(0.0),
            median: part.values.quantile(0.5).unwrap_or(0.0),
            max: part.values.max().unwrap_or(0.0),
            histograms: histograms(&part.values),
            weighted_numeric_stats,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn feature_stats(
        &self,
        name: &str,
        partial: &FeaturePartial,
        acc: &BasicStatsAccumulator,
    ) -> FeatureNameStatistics {
        let resolved = partial.tally.resolve(self.schema.declared_type(name));
        if let Some(t) = resolved {
            let mismatched = partial.tally.mismatched(t);
            if mismatched > 0 {
                debug!(
                    feature = name,
                    resolved = ?t,
                    mismatched,
                    "examples with values of another type counted as missing"
                );
            }
        }
        let part = partial.accepted(resolved, self.relative_accuracy);
        let common = self.common_stats(&part, acc);

        let mut out = FeatureNameStatistics::new(name);
        out.feature_type = resolved;
        let as_string = match resolved {
            Some(FeatureType::String) => true,
            Some(FeatureType::Int | FeatureType::Float) => self.schema.is_categorical(name),
            None => false,
        };
        if as_string {
            out.set_string_stats(StringStatistics {
                common_stats: Some(common),
                avg_length: ratio(part.total_length as f64, part.num_strings as f64),
                ..StringStatistics::default()
            });
        } else if resolved.is_some() {
            out.set_num_stats(self.numeric_stats(&part, common));
        } else {
            // never present: only the counts are meaningful
            out.set_num_stats(NumericStatistics {
                common_stats: Some(common),
                ..NumericStatistics::default()
            });
        }
        out
    }
}

impl CombinerStatsGenerator for BasicStatsGenerator {
    type Accumulator = BasicStatsAccumulator;

    fn name(&self) -> &str {
        BASIC_STATS_GENERATOR_NAME
    }

    fn create_accumulator(&self) -> BasicStatsAccumulator {
        BasicStatsAccumulator::default()
    }

    fn add_input(&self, acc: &mut BasicStatsAccumulator, batch: &RecordBatch) {
        acc.num_examples += batch.num_rows() as u64;
        let weights = batch_weights(batch, self.weight_feature.as_deref()).map(|(w, _)| w);
        if let Some(w) = &weights {
            w.iter().for_each(|x| acc.weighted_num_examples.add(*x));
        }
        for (name, column) in batch.columns() {
            if self.weight_feature.as_deref() == Some(name) {
                continue;
            }
            let categorical = self.schema.is_categorical(name);
            let partial = acc
                .features
                .entry(name.to_string())
                .or_insert_with(|| FeaturePartial::new(self.relative_accuracy));
            for (row, cell) in column.iter().enumerate() {
                let Some(values) = cell else { continue };
                let weight = weights.as_ref().map(|w| w[row]);
                partial.tally.record(values.kind());
                partial
                    .kind_mut(values.kind())
                    .add(values, weight, categorical);
            }
        }
    }

    fn merge_into(&self, acc: &mut BasicStatsAccumulator, other: &BasicStatsAccumulator) {
        acc.num_examples += other.num_examples;
        acc.weighted_num_examples.merge(&other.weighted_num_examples);
        for (name, theirs) in &other.features {
            acc.features
                .entry(name.clone())
                .and_modify(|mine| mine.merge(theirs))
                .or_insert_with(|| theirs.clone());
        }
    }

    fn extract_output(&self, acc: &BasicStatsAccumulator) -> Result<DatasetFeatureStatistics> {
        Ok(DatasetFeatureStatistics {
            name: String::new(),
            num_examples: acc.num_examples,
            weighted_num_examples: acc.weighted_num_examples.value(),
            features: acc
                .features
                .iter()
                .map(|(name, partial)| self.feature_stats(name, partial, acc))
                .collect(),
        })
    }
}
