//! Statistics generators and the accumulator protocol they implement.
//!
//! There are three generator shapes:
//!
//! - [`CombinerStatsGenerator`]: whole-dataset combiners whose `add_input`
//!   sees a full [`RecordBatch`].
//! - [`CombinerFeatureStatsGenerator`]: single-feature combiners, fed one
//!   feature column at a time and extracted per feature.
//! - [`TransformStatsGenerator`]: opaque transforms from sliced examples to
//!   sliced statistics, bypassing the accumulator protocol.
//!
//! All of them are handed to the engine as a [`StatsGenerator`].
//!
//! # Examples
//! ```
//! use featstats::generators::{CombinerFeatureStatsGenerator, StatsGenerator};
//! use featstats::statistics::{CustomStatistic, FeatureNameStatistics};
//! use featstats::types::FeatureColumn;
//!
//! /// Counts present values per feature.
//! struct ValueCounter;
//!
//! impl CombinerFeatureStatsGenerator for ValueCounter {
//!     type Accumulator = u64;
//!
//!     fn name(&self) -> &str {
//!         "value_counter"
//!     }
//!     fn create_accumulator(&self) -> u64 {
//!         0
//!     }
//!     fn add_input(&self, acc: &mut u64, _feature: &str, column: &FeatureColumn) {
//!         *acc += column.iter().flatten().map(|v| v.len() as u64).sum::<u64>();
//!     }
//!     fn merge_into(&self, acc: &mut u64, other: &u64) {
//!         *acc += other;
//!     }
//!     fn extract_output(&self, feature: &str, acc: &u64) -> anyhow::Result<FeatureNameStatistics> {
//!         let mut out = FeatureNameStatistics::new(feature);
//!         out.custom_stats.push(CustomStatistic::num("value_count", *acc as f64));
//!         Ok(out)
//!     }
//! }
//!
//! let generator = StatsGenerator::feature(ValueCounter);
//! assert_eq!(generator.name(), "value_counter");
//! ```

pub mod basic;
pub mod image;
pub mod natural_language;
pub mod top_k;

pub use basic::BasicStatsGenerator;
pub use image::ImageDomainGenerator;
pub use natural_language::NaturalLanguageDomainGenerator;
pub use top_k::TopKUniquesStatsGenerator;

use anyhow::Result;
use indexmap::IndexMap;
use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;

use crate::error::StatsError;
use crate::slicing::SliceKey;
use crate::statistics::{DatasetFeatureStatistics, FeatureNameStatistics};
use crate::types::{Example, FeatureColumn, FeatureValues, RecordBatch};

/// Type-erased accumulator as it moves through the driver.
pub(crate) type Partition = Box<dyn Any + Send + Sync>;

/* ===================== Combiner protocol ===================== */

/// A whole-dataset combiner: create, add, merge, extract.
///
/// `merge_into` and `extract_output` must not depend on anything but their
/// inputs; the driver may merge in any tree shape and may extract twice.
pub trait CombinerStatsGenerator: Send + Sync {
    type Accumulator: Send + Sync + 'static;

    /// Unique name, used in logs and errors.
    fn name(&self) -> &str;

    fn create_accumulator(&self) -> Self::Accumulator;

    /// Fold one batch into `acc`. Data problems are recorded, never raised.
    fn add_input(&self, acc: &mut Self::Accumulator, batch: &RecordBatch);

    /// Fold `other` into `acc`; `other` stays valid.
    fn merge_into(&self, acc: &mut Self::Accumulator, other: &Self::Accumulator);

    /// Merge any number of accumulators into a fresh one.
    fn merge_accumulators<'a, I>(&self, accumulators: I) -> Self::Accumulator
    where
        I: IntoIterator<Item = &'a Self::Accumulator>,
        Self::Accumulator: 'a,
    {
        let mut out = self.create_accumulator();
        for acc in accumulators {
            self.merge_into(&mut out, acc);
        }
        out
    }

    /// Convert the final state into statistics.
    ///
    /// # Errors
    /// Only on broken internal invariants.
    fn extract_output(&self, acc: &Self::Accumulator) -> Result<DatasetFeatureStatistics>;
}

/// A single-feature combiner. The driver keeps one accumulator per feature
/// name and merges them feature by feature.
pub trait CombinerFeatureStatsGenerator: Send + Sync {
    type Accumulator: Send + Sync + 'static;

    fn name(&self) -> &str;

    fn create_accumulator(&self) -> Self::Accumulator;

    fn add_input(&self, acc: &mut Self::Accumulator, feature: &str, column: &FeatureColumn);

    fn merge_into(&self, acc: &mut Self::Accumulator, other: &Self::Accumulator);

    /// # Errors
    /// Only on broken internal invariants.
    fn extract_output(&self, feature: &str, acc: &Self::Accumulator) -> Result<FeatureNameStatistics>;
}

/// Lifts a [`CombinerFeatureStatsGenerator`] to the whole-dataset protocol.
pub struct FeatureWise<G>(pub G);

impl<G: CombinerFeatureStatsGenerator> CombinerStatsGenerator for FeatureWise<G> {
    type Accumulator = IndexMap<String, G::Accumulator>;

    fn name(&self) -> &str {
        self.0.name()
    }

    fn create_accumulator(&self) -> Self::Accumulator {
        IndexMap::new()
    }

    fn add_input(&self, acc: &mut Self::Accumulator, batch: &RecordBatch) {
        for (feature, column) in batch.columns() {
            let slot = acc
                .entry(feature.to_string())
                .or_insert_with(|| self.0.create_accumulator());
            self.0.add_input(slot, feature, column);
        }
    }

    fn merge_into(&self, acc: &mut Self::Accumulator, other: &Self::Accumulator) {
        for (feature, theirs) in other {
            let slot = acc
                .entry(feature.clone())
                .or_insert_with(|| self.0.create_accumulator());
            self.0.merge_into(slot, theirs);
        }
    }

    fn extract_output(&self, acc: &Self::Accumulator) -> Result<DatasetFeatureStatistics> {
        let features = acc
            .iter()
            .map(|(feature, a)| self.0.extract_output(feature, a))
            .collect::<Result<Vec<_>>>()?;
        Ok(DatasetFeatureStatistics {
            features,
            ..DatasetFeatureStatistics::default()
        })
    }
}

/* ===================== Transform generators ===================== */

/// An example tagged with the slice it belongs to.
pub type SlicedExample = (Option<SliceKey>, Example);

/// Statistics tagged with the slice they describe.
pub type SlicedStatistics = (Option<SliceKey>, DatasetFeatureStatistics);

type TransformFn = dyn Fn(&[SlicedExample]) -> Result<Vec<SlicedStatistics>> + Send + Sync;

/// An opaque batch-to-batch statistics transform.
///
/// Its output is field-union merged into the slices it names; naming a slice
/// that was never observed is an error.
#[derive(Clone)]
pub struct TransformStatsGenerator {
    name: String,
    transform: Arc<TransformFn>,
}

impl TransformStatsGenerator {
    pub fn new<F>(name: impl Into<String>, transform: F) -> Self
    where
        F: Fn(&[SlicedExample]) -> Result<Vec<SlicedStatistics>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            transform: Arc::new(transform),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the transform and check its output is mergeable.
    ///
    /// # Errors
    /// Propagates transform failures; rejects features without a name.
    pub fn apply(&self, input: &[SlicedExample]) -> Result<Vec<SlicedStatistics>> {
        let out = (self.transform)(input)?;
        for (_, stats) in &out {
            if stats.features.iter().any(|f| f.name.is_empty()) {
                return Err(StatsError::InvalidTransformOutput {
                    generator: self.name.clone(),
                    reason: "feature statistics without a feature name".into(),
                }
                .into());
            }
        }
        Ok(out)
    }
}

impl fmt::Debug for TransformStatsGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformStatsGenerator")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/* ===================== Erasure ===================== */

/// Object-safe view of a combiner whose accumulator travels as a [`Partition`].
pub(crate) trait ErasedCombiner: Send + Sync {
    fn name(&self) -> &str;
    fn create(&self) -> Partition;
    fn add_input(&self, acc: &mut Partition, batch: &RecordBatch) -> Result<()>;
    fn merge(&self, accs: &[Partition]) -> Result<Partition>;
    fn extract(&self, acc: &Partition) -> Result<DatasetFeatureStatistics>;
}

struct Erased<G>(G);

impl<G> Erased<G>
where
    G: CombinerStatsGenerator,
{
    fn mismatch(&self) -> anyhow::Error {
        StatsError::AccumulatorMismatch {
            generator: self.0.name().to_string(),
            expected: type_name::<G::Accumulator>(),
        }
        .into()
    }

    fn downcast<'a>(&self, acc: &'a Partition) -> Result<&'a G::Accumulator> {
        acc.downcast_ref::<G::Accumulator>()
            .ok_or_else(|| self.mismatch())
    }
}

impl<G> ErasedCombiner for Erased<G>
where
    G: CombinerStatsGenerator,
{
    fn name(&self) -> &str {
        self.0.name()
    }

    fn create(&self) -> Partition {
        Box::new(self.0.create_accumulator())
    }

    fn add_input(&self, acc: &mut Partition, batch: &RecordBatch) -> Result<()> {
        let acc = acc
            .downcast_mut::<G::Accumulator>()
            .ok_or_else(|| self.mismatch())?;
        self.0.add_input(acc, batch);
        Ok(())
    }

    fn merge(&self, accs: &[Partition]) -> Result<Partition> {
        let typed = accs
            .iter()
            .map(|a| self.downcast(a))
            .collect::<Result<Vec<_>>>()?;
        Ok(Box::new(self.0.merge_accumulators(typed)))
    }

    fn extract(&self, acc: &Partition) -> Result<DatasetFeatureStatistics> {
        self.0.extract_output(self.downcast(acc)?)
    }
}

#[derive(Clone)]
pub(crate) enum GeneratorKind {
    Combiner(Arc<dyn ErasedCombiner>),
    Transform(TransformStatsGenerator),
}

/// A generator of any shape, ready to be handed to the engine.
#[derive(Clone)]
pub struct StatsGenerator {
    pub(crate) kind: GeneratorKind,
}

impl StatsGenerator {
    pub fn combiner<G>(generator: G) -> Self
    where
        G: CombinerStatsGenerator + 'static,
    {
        Self {
            kind: GeneratorKind::Combiner(Arc::new(Erased(generator))),
        }
    }

    pub fn feature<G>(generator: G) -> Self
    where
        G: CombinerFeatureStatsGenerator + 'static,
    {
        Self::combiner(FeatureWise(generator))
    }

    #[must_use]
    pub const fn transform(generator: TransformStatsGenerator) -> Self {
        Self {
            kind: GeneratorKind::Transform(generator),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match &self.kind {
            GeneratorKind::Combiner(c) => c.name(),
            GeneratorKind::Transform(t) => t.name(),
        }
    }

    #[must_use]
    pub const fn is_transform(&self) -> bool {
        matches!(self.kind, GeneratorKind::Transform(_))
    }
}

impl fmt::Debug for StatsGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shape = if self.is_transform() { "transform" } else { "combiner" };
        f.debug_struct("StatsGenerator")
            .field("name", &self.name())
            .field("shape", &shape)
            .finish()
    }
}

/* ===================== Weights ===================== */

/// Why an example's weight could not be used.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvalidWeight {
    Missing,
    NotSingleValued,
    NotNumeric,
    Negative,
    NotFinite,
}

/// Weight of one example: the single numeric value of the weight feature.
///
/// # Errors
/// Returns the reason the cell is not a usable weight.
pub fn example_weight(cell: Option<&FeatureValues>) -> Result<f64, InvalidWeight> {
    #[allow(clippy::cast_precision_loss)]
    let w = match cell {
        None => return Err(InvalidWeight::Missing),
        Some(v) if v.len() != 1 => return Err(InvalidWeight::NotSingleValued),
        Some(FeatureValues::Int(v)) => v[0] as f64,
        Some(FeatureValues::Float(v)) => v[0],
        Some(FeatureValues::Bytes(_)) => return Err(InvalidWeight::NotNumeric),
    };
    if !w.is_finite() {
        Err(InvalidWeight::NotFinite)
    } else if w < 0.0 {
        Err(InvalidWeight::Negative)
    } else {
        Ok(w)
    }
}

/// Per-row weights of a batch plus the number of rows whose weight was
/// invalid (those rows get weight 0). `None` when no weight feature is set.
#[must_use]
pub fn batch_weights(batch: &RecordBatch, weight_feature: Option<&str>) -> Option<(Vec<f64>, u64)> {
    let feature = weight_feature?;
    let column = batch.column(feature);
    let mut invalid = 0_u64;
    let weights = (0..batch.num_rows())
        .map(|row| {
            let cell = column.and_then(|c| c.get(row)).and_then(Option::as_ref);
            example_weight(cell).unwrap_or_else(|_| {
                invalid += 1;
                0.0
            })
        })
        .collect();
    Some((weights, invalid))
}
