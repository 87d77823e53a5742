//! # featstats
//!
//! Mergeable, slice-aware **descriptive statistics** for columnar ML input
//! data. Every statistic is computed by a combiner (create, add, merge,
//! extract), so batches can be processed in any grouping, in parallel, and
//! reconciled into one deterministic result.
//!
//! ## Key Features
//!
//! - **Common and numeric stats** - counts, missing values, value-count
//!   histograms, mean/std-dev/min/median/max, equal-width and quantile
//!   histograms from a bounded quantile sketch
//! - **String stats** - exact distinct counts, top values and rank
//!   histograms, average length
//! - **Weighted stats** - a weight feature scales every weighted counterpart
//! - **Semantic domains** - natural-language text and image formats
//! - **Slicing** - overlapping named subsets, each aggregated independently
//! - **Custom generators** - whole-dataset or per-feature combiners, and
//!   opaque transforms
//! - **Sequential and parallel execution** on rayon
//!
//! ## Quick Start
//!
//! ```
//! use featstats::*;
//! # use anyhow::Result;
//!
//! # fn main() -> Result<()> {
//! let batch = RecordBatch::from_examples(&[
//!     example([("age", Some(FeatureValues::ints([31]))), ("city", Some(FeatureValues::strings(["Oslo"])))]),
//!     example([("age", Some(FeatureValues::ints([45]))), ("city", Some(FeatureValues::strings(["Lima"])))]),
//!     example([("age", None), ("city", Some(FeatureValues::strings(["Oslo"])))]),
//! ]);
//!
//! let options = StatsOptions::default()
//!     .with_feature_value_slicer(FeatureValueSlicer::new().by_feature("city"));
//! let stats = generate_statistics([batch], &options)?;
//!
//! let names: Vec<&str> = stats.datasets.iter().map(|d| d.name.as_str()).collect();
//! assert_eq!(names, ["All Examples", "city_Oslo", "city_Lima"]);
//!
//! let city = stats.datasets[0].feature("city").unwrap();
//! assert_eq!(city.string_stats.as_ref().unwrap().top_values[0].value, "Oslo");
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! 1. Input batches are cut to `desired_batch_size` and split into slices by
//!    the [`slicing`] functions.
//! 2. The [`runner`] feeds every (slice, generator) accumulator, merges the
//!    partials and extracts once.
//! 3. Per-generator outputs of a slice are field-union merged into one
//!    [`DatasetFeatureStatistics`] ([`statistics::merge`]).
//!
//! ## Module Overview
//!
//! - [`api`] - entry points
//! - [`generators`] - generator traits and the built-in generators
//! - [`combiners`] - mergeable building blocks (quantile sketch, frequency
//!   table, moments)
//! - [`histogram`] - histogram construction
//! - [`statistics`] - output records
//! - [`options`] - configuration and schema
//! - [`io`] - JSON output, Arrow input (feature `io-arrow`)
//! - [`metrics`] - telemetry side-channel
//! - [`testing`] - builders, assertions and fixtures

pub mod api;
pub mod combiners;
pub mod error;
pub mod generators;
pub mod histogram;
pub mod io;
pub mod metrics;
pub mod options;
pub mod runner;
pub mod slicing;
pub mod statistics;
pub mod testing;
pub mod types;

pub use api::{generate_sliced_statistics, generate_statistics, generate_statistics_in_memory};
pub use error::StatsError;
pub use generators::{
    CombinerFeatureStatsGenerator, CombinerStatsGenerator, SlicedExample, SlicedStatistics,
    StatsGenerator, TransformStatsGenerator,
};
pub use io::{read_statistics_json, write_statistics_json};
pub use metrics::MetricsCollector;
pub use options::{Schema, StatsOptions};
pub use runner::{ExecMode, Runner};
pub use slicing::{FeatureValueSlicer, SliceFn, SliceKey, SlicedBatch};
pub use statistics::{
    CustomStatistic, DEFAULT_SLICE_KEY, DatasetFeatureStatistics, DatasetFeatureStatisticsList,
    FeatureNameStatistics, FeatureType, HistogramType, merge_dataset_feature_statistics,
};
pub use types::{Example, FeatureColumn, FeatureValues, RecordBatch, example, filter_features};
