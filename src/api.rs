//! Entry points: batches in, one statistics record per slice out.
//!
//! All three paths validate the options first, then slice, filter, run the
//! combiners through the [`Runner`], field-union merge the per-generator
//! outputs of each slice in generator order, and finally merge transform
//! outputs into the slices they name.

use anyhow::{Result, bail};
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::StatsError;
use crate::generators::{GeneratorKind, SlicedExample, TransformStatsGenerator};
use crate::options::StatsOptions;
use crate::runner::Runner;
use crate::slicing::{SliceKey, SlicedBatch, slice_batch};
use crate::statistics::{
    DEFAULT_SLICE_KEY, DatasetFeatureStatistics, DatasetFeatureStatisticsList,
    merge_dataset_feature_statistics,
};
use crate::types::{Example, RecordBatch, filter_features};

type SliceGroups = IndexMap<Option<SliceKey>, Vec<RecordBatch>>;

/// Compute statistics with slicing output enabled.
///
/// The first record is always [`DEFAULT_SLICE_KEY`]; slices produced by the
/// configured slicers follow in order of first observation.
///
/// # Errors
/// Invalid options, failing transform generators, or broken accumulator
/// invariants.
///
/// # Examples
/// ```
/// use featstats::{FeatureValues, RecordBatch, StatsOptions, example, generate_statistics};
///
/// let batch = RecordBatch::from_examples(&[
///     example([("x", Some(FeatureValues::floats([1.0, 2.0])))]),
///     example([("x", None)]),
/// ]);
/// let stats = generate_statistics([batch], &StatsOptions::default()).unwrap();
/// let all = &stats.datasets[0];
/// assert_eq!(all.name, "All Examples");
/// assert_eq!(all.num_examples, 2);
/// assert_eq!(all.feature("x").unwrap().common_stats().unwrap().num_missing, 1);
/// ```
pub fn generate_statistics<I>(batches: I, options: &StatsOptions) -> Result<DatasetFeatureStatisticsList>
where
    I: IntoIterator<Item = RecordBatch>,
{
    generate_sliced_statistics(batches.into_iter().map(|b| (None, b)), options, true)
}

/// Compute statistics for batches that may already carry a slice key.
///
/// With `slicing_enabled`, a keyed batch goes to its slice as is and an
/// unkeyed batch is run through the configured slicers (which also put it
/// under [`DEFAULT_SLICE_KEY`]). Without it, every batch belongs to a single
/// record with an empty name; keyed batches and configured slicers are then
/// rejected.
///
/// # Errors
/// See [`generate_statistics`]; additionally [`StatsError::InvalidOptions`]
/// when slice keys or slicers are used with slicing disabled.
pub fn generate_sliced_statistics<I>(
    batches: I,
    options: &StatsOptions,
    slicing_enabled: bool,
) -> Result<DatasetFeatureStatisticsList>
where
    I: IntoIterator<Item = SlicedBatch>,
{
    options.validate()?;
    let slice_fns = options.all_slice_functions();
    if !slicing_enabled && !slice_fns.is_empty() {
        bail!(StatsError::options(
            "slice functions are configured but slicing output is disabled"
        ));
    }

    let mut groups: SliceGroups = IndexMap::new();
    let default_key = slicing_enabled.then(|| DEFAULT_SLICE_KEY.to_string());
    groups.insert(default_key.clone(), Vec::new());
    let mut num_batches = 0_usize;

    for (key, batch) in batches {
        num_batches += 1;
        observe_batch(&batch, options);
        match (key, slicing_enabled) {
            (Some(key), true) => push_chunks(&mut groups, Some(key), &batch, options),
            (Some(key), false) => {
                bail!(StatsError::options(format!(
                    "batch keyed `{key}` but slicing output is disabled"
                )));
            }
            (None, true) => {
                for (key, sliced) in slice_batch(&batch, &slice_fns) {
                    push_chunks(&mut groups, Some(key), &sliced, options);
                }
            }
            (None, false) => push_chunks(&mut groups, None, &batch, options),
        }
    }
    // pre-keyed input may never touch the default slice
    if groups.len() > 1 && groups.get(&default_key).is_some_and(Vec::is_empty) {
        groups.shift_remove(&default_key);
    }

    info!(
        batches = num_batches,
        slices = groups.len(),
        generators = options.all_generators().len(),
        "computing statistics"
    );
    let datasets = aggregate(groups, options, &options.runner)?;
    info!(datasets = datasets.len(), "statistics computed");
    Ok(DatasetFeatureStatisticsList { datasets })
}

/// Compute statistics over examples already in memory.
///
/// Runs sequentially over the single "all examples" slice and returns its
/// record (with an empty name). Configured slicers are skipped with a
/// warning. Transform generators are not supported.
///
/// # Errors
/// Invalid options, a configured transform generator, or broken accumulator
/// invariants.
pub fn generate_statistics_in_memory(
    examples: &[Example],
    options: &StatsOptions,
) -> Result<DatasetFeatureStatistics> {
    options.validate()?;
    if let Some(t) = options.generators.iter().find(|g| g.is_transform()) {
        bail!(StatsError::UnsupportedGenerator {
            name: t.name().to_string(),
            reason: "transform generators need the pipeline entry points".into(),
        });
    }
    let slicers = options.all_slice_functions().len();
    if slicers > 0 {
        warn!(slicers, "slicing functions are ignored by the in-memory entry point");
    }
    let batch = RecordBatch::from_examples(examples);
    observe_batch(&batch, options);
    let mut groups: SliceGroups = IndexMap::new();
    groups.insert(None, Vec::new());
    push_chunks(&mut groups, None, &batch, options);

    let mut datasets = aggregate(groups, options, &Runner::sequential())?;
    datasets
        .pop()
        .ok_or_else(|| StatsError::Internal("no dataset produced".into()).into())
}

/// Telemetry and invalid-weight logging for one input batch.
fn observe_batch(batch: &RecordBatch, options: &StatsOptions) {
    let weight_feature = options.weight_feature.as_deref();
    let invalid = match &options.metrics {
        Some(metrics) => metrics.record_batch(batch, weight_feature),
        None => crate::generators::batch_weights(batch, weight_feature).map_or(0, |(_, n)| n),
    };
    if invalid > 0 {
        warn!(
            weight_feature,
            invalid,
            "examples with an invalid weight are given weight 0"
        );
    }
}

fn push_chunks(
    groups: &mut SliceGroups,
    key: Option<SliceKey>,
    batch: &RecordBatch,
    options: &StatsOptions,
) {
    groups
        .entry(key)
        .or_default()
        .extend(batch.chunks(options.desired_batch_size));
}

fn aggregate(groups: SliceGroups, options: &StatsOptions, runner: &Runner) -> Result<Vec<DatasetFeatureStatistics>> {
    let generators = options.all_generators();
    let mut combiners = Vec::new();
    let mut transforms: Vec<&TransformStatsGenerator> = Vec::new();
    for generator in &generators {
        match &generator.kind {
            GeneratorKind::Combiner(c) => combiners.push(Arc::clone(c)),
            GeneratorKind::Transform(t) => transforms.push(t),
        }
    }

    let sliced_examples: Vec<SlicedExample> = if transforms.is_empty() {
        Vec::new()
    } else {
        groups
            .iter()
            .flat_map(|(key, batches)| {
                batches
                    .iter()
                    .flat_map(RecordBatch::examples)
                    .map(move |ex| (key.clone(), ex))
            })
            .collect()
    };

    let filtered: Vec<(Option<SliceKey>, Vec<RecordBatch>)> = groups
        .into_iter()
        .map(|(key, batches)| {
            let batches = match &options.feature_allowlist {
                Some(allow) => {
                    let mut allow = allow.clone();
                    allow.extend(options.weight_feature.clone());
                    batches.iter().map(|b| filter_features(b, &allow)).collect()
                }
                None => batches,
            };
            (key, batches)
        })
        .collect();

    let mut datasets: IndexMap<Option<SliceKey>, DatasetFeatureStatistics> = runner
        .run_slices(&combiners, filtered)?
        .into_iter()
        .map(|(key, outputs)| {
            let mut merged = merge_dataset_feature_statistics(&outputs);
            merged.name = key.clone().unwrap_or_default();
            (key, merged)
        })
        .collect();

    for transform in transforms {
        for (key, stats) in transform.apply(&sliced_examples)? {
            let Some(target) = datasets.get_mut(&key) else {
                bail!(StatsError::InvalidTransformOutput {
                    generator: transform.name().to_string(),
                    reason: format!("statistics for unobserved slice {key:?}"),
                });
            };
            let name = target.name.clone();
            *target = merge_dataset_feature_statistics(&[target.clone(), stats]);
            target.name = name;
        }
    }

    Ok(datasets
        .into_values()
        .map(|mut d| {
            if let Some(w) = &options.weight_feature {
                d.features.retain(|f| &f.name != w);
            }
            d
        })
        .collect())
}
