//! Distinct-value counts, top values and rank histograms for string and
//! categorical features.

use anyhow::Result;
use indexmap::IndexMap;

use super::{CombinerStatsGenerator, batch_weights};
use crate::combiners::FrequencyTable;
use crate::histogram::top_values_and_ranks;
use crate::options::{Schema, StatsOptions};
use crate::statistics::{
    DatasetFeatureStatistics, FeatureNameStatistics, FeatureType, StringStatistics,
    WeightedStringStatistics,
};
use crate::types::{FeatureKind, FeatureValues, KindTally, RecordBatch, kind_accepted};

pub const TOP_K_GENERATOR_NAME: &str = "top_k_uniques";

/// Exact frequency counting per feature.
///
/// Only features resolved to STRING, or declared categorical in the schema,
/// produce output. Numeric categorical values are counted by their decimal
/// rendering.
#[derive(Clone, Debug)]
pub struct TopKUniquesStatsGenerator {
    schema: Schema,
    weight_feature: Option<String>,
    num_top_values: usize,
    num_rank_histogram_buckets: usize,
}

impl Default for TopKUniquesStatsGenerator {
    fn default() -> Self {
        Self::from_options(&StatsOptions::default())
    }
}

impl TopKUniquesStatsGenerator {
    #[must_use]
    pub fn from_options(options: &StatsOptions) -> Self {
        Self {
            schema: options.schema.clone().unwrap_or_default(),
            weight_feature: options.weight_feature.clone(),
            num_top_values: options.num_top_values,
            num_rank_histogram_buckets: options.num_rank_histogram_buckets,
        }
    }
}

#[derive(Clone, Debug, Default)]
struct Tables {
    counts: FrequencyTable,
    weighted: FrequencyTable,
}

impl Tables {
    fn merge(&mut self, other: &Self) {
        self.counts.merge(&other.counts);
        self.weighted.merge(&other.weighted);
    }
}

#[derive(Clone, Debug, Default)]
struct FeatureTables {
    tally: KindTally,
    int: Tables,
    float: Tables,
    bytes: Tables,
}

impl FeatureTables {
    fn kind_mut(&mut self, kind: FeatureKind) -> &mut Tables {
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
}

/// Accumulator of [`TopKUniquesStatsGenerator`]: frequency tables per
/// feature and value kind.
#[derive(Clone, Debug, Default)]
pub struct TopKAccumulator {
    features: IndexMap<String, FeatureTables>,
}

impl TopKUniquesStatsGenerator {
    fn counted(&self, name: &str, values: &FeatureValues) -> bool {
        matches!(values, FeatureValues::Bytes(_)) || self.schema.is_categorical(name)
    }

    fn feature_stats(&self, name: &str, tables: &FeatureTables) -> Option<FeatureNameStatistics> {
        let resolved = tables.tally.resolve(self.schema.declared_type(name))?;
        if resolved != FeatureType::String && !self.schema.is_categorical(name) {
            return None;
        }
        let mut accepted = Tables::default();
        for (kind, t) in [
            (FeatureKind::Int, &tables.int),
            (FeatureKind::Float, &tables.float),
            (FeatureKind::Bytes, &tables.bytes),
        ] {
            if kind_accepted(resolved, kind) {
                accepted.merge(t);
            }
        }

        let (top_values, rank_histogram) = top_values_and_ranks(
            &accepted.counts,
            self.num_top_values,
            self.num_rank_histogram_buckets,
        );
        let weighted_string_stats = self.weight_feature.is_some().then(|| {
            let (top_values, rank_histogram) = top_values_and_ranks(
                &accepted.weighted,
                self.num_top_values,
                self.num_rank_histogram_buckets,
            );
            WeightedStringStatistics {
                top_values,
                rank_histogram: Some(rank_histogram),
            }
        });

        let mut out = FeatureNameStatistics::new(name);
        out.feature_type = Some(resolved);
        out.set_string_stats(StringStatistics {
            unique: accepted.counts.unique() as u64,
            top_values,
            rank_histogram: Some(rank_histogram),
            weighted_string_stats,
            ..StringStatistics::default()
        });
        Some(out)
    }
}

impl CombinerStatsGenerator for TopKUniquesStatsGenerator {
    type Accumulator = TopKAccumulator;

    fn name(&self) -> &str {
        TOP_K_GENERATOR_NAME
    }

    fn create_accumulator(&self) -> TopKAccumulator {
        TopKAccumulator::default()
    }

    fn add_input(&self, acc: &mut TopKAccumulator, batch: &RecordBatch) {
        let weights = batch_weights(batch, self.weight_feature.as_deref()).map(|(w, _)| w);
        for (name, column) in batch.columns() {
            if self.weight_feature.as_deref() == Some(name) {
                continue;
            }
            let tables = acc.features.entry(name.to_string()).or_default();
            for (row, cell) in column.iter().enumerate() {
                let Some(values) = cell else { continue };
                tables.tally.record(values.kind());
                if !self.counted(name, values) {
                    continue;
                }
                let slot = tables.kind_mut(values.kind());
                for value in values.to_byte_values() {
                    slot.counts.add(&value);
                    if let Some(w) = &weights {
                        slot.weighted.add_weighted(&value, w[row]);
                    }
                }
            }
        }
    }

    fn merge_into(&self, acc: &mut TopKAccumulator, other: &TopKAccumulator) {
        for (name, theirs) in &other.features {
            acc.features
                .entry(name.clone())
                .and_modify(|mine| mine.merge(theirs))
                .or_insert_with(|| theirs.clone());
        }
    }

    fn extract_output(&self, acc: &TopKAccumulator) -> Result<DatasetFeatureStatistics> {
        Ok(DatasetFeatureStatistics {
            features: acc
                .features
                .iter()
                .filter_map(|(name, tables)| self.feature_stats(name, tables))
                .collect(),
            ..DatasetFeatureStatistics::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::example;

    #[test]
    fn numeric_features_are_skipped_unless_categorical() {
        let batch = RecordBatch::from_examples(&[
            example([("n", Some(FeatureValues::ints([1, 1, 2])))]),
            example([("s", Some(FeatureValues::strings(["x", "y", "x"])))]),
        ]);
        let generator = TopKUniquesStatsGenerator::default();
        let mut acc = generator.create_accumulator();
        generator.add_input(&mut acc, &batch);
        let stats = generator.extract_output(&acc).unwrap();
        assert!(stats.feature("n").is_none());
        let s = stats.feature("s").unwrap().string_stats.as_ref().unwrap();
        assert_eq!(s.unique, 2);
        assert_eq!(s.top_values[0].value, "x");
        assert!((s.top_values[0].frequency - 2.0).abs() < f64::EPSILON);

        let options = StatsOptions::default()
            .with_schema(Schema::new().with_feature("n", None, true));
        let generator = TopKUniquesStatsGenerator::from_options(&options);
        let mut acc = generator.create_accumulator();
        generator.add_input(&mut acc, &batch);
        let stats = generator.extract_output(&acc).unwrap();
        let n = stats.feature("n").unwrap().string_stats.as_ref().unwrap();
        assert_eq!(n.top_values[0].value, "1");
    }

    #[test]
    fn weighted_counts_follow_the_weight_feature() {
        let batch = RecordBatch::from_examples(&[
            example([
                ("s", Some(FeatureValues::strings(["a"]))),
                ("w", Some(FeatureValues::floats([3.0]))),
            ]),
            example([
                ("s", Some(FeatureValues::strings(["b", "b"]))),
                ("w", Some(FeatureValues::floats([1.0]))),
            ]),
        ]);
        let options = StatsOptions::default().with_weight_feature("w");
        let generator = TopKUniquesStatsGenerator::from_options(&options);
        let mut acc = generator.create_accumulator();
        generator.add_input(&mut acc, &batch);
        let stats = generator.extract_output(&acc).unwrap();
        assert!(stats.feature("w").is_none());
        let s = stats.feature("s").unwrap().string_stats.as_ref().unwrap();
        assert_eq!(s.top_values[0].value, "b");
        let weighted = s.weighted_string_stats.as_ref().unwrap();
        assert_eq!(weighted.top_values[0].value, "a");
        assert!((weighted.top_values[0].frequency - 3.0).abs() < f64::EPSILON);
    }
}
