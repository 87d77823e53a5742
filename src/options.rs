//! Options surface: what to compute and how.
//!
//! [`StatsOptions`] is a plain struct with defaults and `with_*` builders.
//! Its serialisable part (scalars, allow-list, weight feature, schema,
//! feature-value slicers) can be loaded from JSON; generators, slice
//! functions, the runner and the metrics collector are attached in code.

use anyhow::{Context, Result};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::error::StatsError;
use crate::generators::{
    BasicStatsGenerator, ImageDomainGenerator, NaturalLanguageDomainGenerator, StatsGenerator,
    TopKUniquesStatsGenerator,
};
use crate::metrics::MetricsCollector;
use crate::runner::Runner;
use crate::slicing::{FeatureValueSlicer, SliceFn};
use crate::statistics::FeatureType;

/// Declared type information for a feature.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaFeature {
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub feature_type: Option<FeatureType>,
    /// Treat numeric values as categories (stringified, top-k path).
    pub is_categorical: bool,
}

/// Optional schema: declared types and categorical markers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Schema {
    pub features: Vec<SchemaFeature>,
}

impl Schema {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_feature(
        mut self,
        name: impl Into<String>,
        feature_type: Option<FeatureType>,
        is_categorical: bool,
    ) -> Self {
        self.features.push(SchemaFeature {
            name: name.into(),
            feature_type,
            is_categorical,
        });
        self
    }

    #[must_use]
    pub fn feature(&self, name: &str) -> Option<&SchemaFeature> {
        self.features.iter().find(|f| f.name == name)
    }

    #[must_use]
    pub fn declared_type(&self, name: &str) -> Option<FeatureType> {
        self.feature(name).and_then(|f| f.feature_type)
    }

    #[must_use]
    pub fn is_categorical(&self, name: &str) -> bool {
        self.feature(name).is_some_and(|f| f.is_categorical)
    }
}

pub const DEFAULT_NUM_TOP_VALUES: usize = 20;
pub const DEFAULT_NUM_RANK_HISTOGRAM_BUCKETS: usize = 1000;
pub const DEFAULT_NUM_VALUES_HISTOGRAM_BUCKETS: usize = 10;
pub const DEFAULT_NUM_HISTOGRAM_BUCKETS: usize = 10;
pub const DEFAULT_NUM_QUANTILES_HISTOGRAM_BUCKETS: usize = 10;
pub const DEFAULT_SEMANTIC_DOMAIN_MIN_EXAMPLES: u64 = 100;
pub const DEFAULT_NATURAL_LANGUAGE_MATCH_THRESHOLD: f64 = 0.8;
pub const DEFAULT_IMAGE_MATCH_THRESHOLD: f64 = 0.8;
pub const DEFAULT_DESIRED_BATCH_SIZE: usize = 1000;

/// Everything that configures a statistics run.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsOptions {
    /// Only these features are fed to combiner generators. `None` = all.
    pub feature_allowlist: Option<Vec<String>>,
    /// Feature whose single numeric value weighs each example.
    pub weight_feature: Option<String>,
    pub num_top_values: usize,
    pub num_rank_histogram_buckets: usize,
    pub num_values_histogram_buckets: usize,
    pub num_histogram_buckets: usize,
    pub num_quantiles_histogram_buckets: usize,
    /// Relative accuracy of the quantile sketches, in `(0, 1)`.
    pub quantile_relative_accuracy: f64,
    pub enable_semantic_domain_stats: bool,
    /// Semantic domains are not inferred for features with fewer
    /// non-missing examples than this.
    pub semantic_domain_min_examples: u64,
    pub natural_language_match_threshold: f64,
    pub image_match_threshold: f64,
    /// Examples per batch when the engine batches examples itself.
    pub desired_batch_size: usize,
    pub schema: Option<Schema>,
    /// Declarative slicers, applied before `slice_functions`.
    pub slice_by_feature_values: Vec<FeatureValueSlicer>,
    /// Extra generators, run after the built-ins in this order.
    #[serde(skip)]
    pub generators: Vec<StatsGenerator>,
    #[serde(skip)]
    pub slice_functions: Vec<Arc<dyn SliceFn>>,
    #[serde(skip)]
    pub runner: Runner,
    #[serde(skip)]
    pub metrics: Option<MetricsCollector>,
}

impl Default for StatsOptions {
    fn default() -> Self {
        Self {
            feature_allowlist: None,
            weight_feature: None,
            num_top_values: DEFAULT_NUM_TOP_VALUES,
            num_rank_histogram_buckets: DEFAULT_NUM_RANK_HISTOGRAM_BUCKETS,
            num_values_histogram_buckets: DEFAULT_NUM_VALUES_HISTOGRAM_BUCKETS,
            num_histogram_buckets: DEFAULT_NUM_HISTOGRAM_BUCKETS,
            num_quantiles_histogram_buckets: DEFAULT_NUM_QUANTILES_HISTOGRAM_BUCKETS,
            quantile_relative_accuracy: crate::combiners::DEFAULT_RELATIVE_ACCURACY,
            enable_semantic_domain_stats: false,
            semantic_domain_min_examples: DEFAULT_SEMANTIC_DOMAIN_MIN_EXAMPLES,
            natural_language_match_threshold: DEFAULT_NATURAL_LANGUAGE_MATCH_THRESHOLD,
            image_match_threshold: DEFAULT_IMAGE_MATCH_THRESHOLD,
            desired_batch_size: DEFAULT_DESIRED_BATCH_SIZE,
            schema: None,
            slice_by_feature_values: Vec::new(),
            generators: Vec::new(),
            slice_functions: Vec::new(),
            runner: Runner::default(),
            metrics: None,
        }
    }
}

impl fmt::Debug for StatsOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatsOptions")
            .field("feature_allowlist", &self.feature_allowlist)
            .field("weight_feature", &self.weight_feature)
            .field("num_top_values", &self.num_top_values)
            .field("num_rank_histogram_buckets", &self.num_rank_histogram_buckets)
            .field("num_values_histogram_buckets", &self.num_values_histogram_buckets)
            .field("num_histogram_buckets", &self.num_histogram_buckets)
            .field(
                "num_quantiles_histogram_buckets",
                &self.num_quantiles_histogram_buckets,
            )
            .field("quantile_relative_accuracy", &self.quantile_relative_accuracy)
            .field(
                "enable_semantic_domain_stats",
                &self.enable_semantic_domain_stats,
            )
            .field("schema", &self.schema)
            .field("generators", &self.generators)
            .field("slice_functions", &self.slice_functions.len())
            .field("runner", &self.runner)
            .finish_non_exhaustive()
    }
}

impl StatsOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the serialisable options from a JSON string.
    ///
    /// # Errors
    /// Fails on malformed JSON or invalid values.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json).context("parse stats options JSON")?;
        options.validate()?;
        Ok(options)
    }

    /// Load the serialisable options from a JSON file.
    ///
    /// # Errors
    /// Fails if the file cannot be read or [`from_json`](Self::from_json) fails.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read {}", path.display()))?;
        Self::from_json(&text)
    }

    #[must_use]
    pub fn with_feature_allowlist<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.feature_allowlist = Some(features.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_weight_feature(mut self, feature: impl Into<String>) -> Self {
        self.weight_feature = Some(feature.into());
        self
    }

    #[must_use]
    pub const fn with_num_top_values(mut self, n: usize) -> Self {
        self.num_top_values = n;
        self
    }

    #[must_use]
    pub const fn with_num_rank_histogram_buckets(mut self, n: usize) -> Self {
        self.num_rank_histogram_buckets = n;
        self
    }

    #[must_use]
    pub const fn with_num_values_histogram_buckets(mut self, n: usize) -> Self {
        self.num_values_histogram_buckets = n;
        self
    }

    #[must_use]
    pub const fn with_num_histogram_buckets(mut self, n: usize) -> Self {
        self.num_histogram_buckets = n;
        self
    }

    #[must_use]
    pub const fn with_num_quantiles_histogram_buckets(mut self, n: usize) -> Self {
        self.num_quantiles_histogram_buckets = n;
        self
    }

    #[must_use]
    pub const fn with_quantile_relative_accuracy(mut self, alpha: f64) -> Self {
        self.quantile_relative_accuracy = alpha;
        self
    }

    #[must_use]
    pub const fn with_semantic_domain_stats(mut self, enabled: bool) -> Self {
        self.enable_semantic_domain_stats = enabled;
        self
    }

    #[must_use]
    pub const fn with_semantic_domain_min_examples(mut self, n: u64) -> Self {
        self.semantic_domain_min_examples = n;
        self
    }

    #[must_use]
    pub const fn with_natural_language_match_threshold(mut self, t: f64) -> Self {
        self.natural_language_match_threshold = t;
        self
    }

    #[must_use]
    pub const fn with_image_match_threshold(mut self, t: f64) -> Self {
        self.image_match_threshold = t;
        self
    }

    #[must_use]
    pub const fn with_desired_batch_size(mut self, n: usize) -> Self {
        self.desired_batch_size = n;
        self
    }

    #[must_use]
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    #[must_use]
    pub fn with_generator(mut self, generator: StatsGenerator) -> Self {
        self.generators.push(generator);
        self
    }

    #[must_use]
    pub fn with_slice_function(mut self, f: impl SliceFn + 'static) -> Self {
        self.slice_functions.push(Arc::new(f));
        self
    }

    #[must_use]
    pub fn with_feature_value_slicer(mut self, slicer: FeatureValueSlicer) -> Self {
        self.slice_by_feature_values.push(slicer);
        self
    }

    #[must_use]
    pub fn with_runner(mut self, runner: Runner) -> Self {
        self.runner = runner;
        self
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: MetricsCollector) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// All slicers in application order.
    #[must_use]
    pub fn all_slice_functions(&self) -> Vec<Arc<dyn SliceFn>> {
        self.slice_by_feature_values
            .iter()
            .map(|s| Arc::new(s.clone()) as Arc<dyn SliceFn>)
            .chain(self.slice_functions.iter().cloned())
            .collect()
    }

    /// Built-in generators followed by the configured ones.
    #[must_use]
    pub fn all_generators(&self) -> Vec<StatsGenerator> {
        let mut out = vec![
            StatsGenerator::combiner(BasicStatsGenerator::from_options(self)),
            StatsGenerator::combiner(TopKUniquesStatsGenerator::from_options(self)),
        ];
        if self.enable_semantic_domain_stats {
            out.push(StatsGenerator::feature(
                NaturalLanguageDomainGenerator::from_options(self),
            ));
            out.push(StatsGenerator::feature(ImageDomainGenerator::from_options(self)));
        }
        out.extend(self.generators.iter().cloned());
        out
    }

    /// Check the options for configuration errors.
    ///
    /// # Errors
    /// Returns [`StatsError::InvalidOptions`] describing the first problem.
    pub fn validate(&self) -> Result<()> {
        self.check().map_err(anyhow::Error::from)
    }

    fn check(&self) -> Result<(), StatsError> {
        let positive = [
            ("num_top_values", self.num_top_values),
            ("num_rank_histogram_buckets", self.num_rank_histogram_buckets),
            ("num_values_histogram_buckets", self.num_values_histogram_buckets),
            ("num_histogram_buckets", self.num_histogram_buckets),
            (
                "num_quantiles_histogram_buckets",
                self.num_quantiles_histogram_buckets,
            ),
            ("desired_batch_size", self.desired_batch_size),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(StatsError::options(format!("{name} must be positive")));
            }
        }
        let alpha = self.quantile_relative_accuracy;
        if !(alpha > 0.0 && alpha < 1.0) {
            return Err(StatsError::options(format!(
                "quantile_relative_accuracy must be in (0, 1), got {alpha}"
            )));
        }
        for (name, t) in [
            (
                "natural_language_match_threshold",
                self.natural_language_match_threshold,
            ),
            ("image_match_threshold", self.image_match_threshold),
        ] {
            if !(0.0..=1.0).contains(&t) {
                return Err(StatsError::options(format!(
                    "{name} must be in [0, 1], got {t}"
                )));
            }
        }
        if let Some(weight) = &self.weight_feature {
            if weight.is_empty() {
                return Err(StatsError::options("weight_feature must not be empty"));
            }
            if let Some(schema) = &self.schema {
                if schema.declared_type(weight) == Some(FeatureType::String) {
                    return Err(StatsError::options(format!(
                        "weight feature `{weight}` is declared STRING in the schema"
                    )));
                }
                if schema.is_categorical(weight) {
                    return Err(StatsError::options(format!(
                        "weight feature `{weight}` is declared categorical in the schema"
                    )));
                }
            }
        }
        for slicer in &self.slice_by_feature_values {
            if slicer.features.is_empty() {
                return Err(StatsError::options("feature-value slicer without features"));
            }
        }
        let mut names = IndexSet::new();
        for generator in self.all_generators() {
            if !names.insert(generator.name().to_string()) {
                return Err(StatsError::options(format!(
                    "duplicate generator name `{}`",
                    generator.name()
                )));
            }
        }
        self.runner.check()
    }
}
