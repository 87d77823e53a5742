//! Telemetry side-channel for statistics runs.
//!
//! Collection is optional: attach a [`MetricsCollector`] to the options and
//! the engine reports input counters to it. None of these numbers feed back
//! into the statistics.
//!
//! Built-in names:
//!
//! - `num_instances`, `num_missing_feature_values`, `num_invalid_weights`
//! - `num_{int,float,string}_feature_values` (present cells per kind)
//! - `{int,float,string}_feature_values_{min,max,mean}_count` (values per
//!   present cell, derived from a distribution metric)
//!
//! # Example
//!
//! ```
//! use featstats::metrics::MetricsCollector;
//!
//! let metrics = MetricsCollector::new();
//! metrics.increment_counter("num_instances", 3);
//! metrics.record_distribution("int_feature_values", 2.0);
//! metrics.record_distribution("int_feature_values", 4.0);
//!
//! assert_eq!(metrics.counter("num_instances"), Some(3));
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot["int_feature_values_mean_count"], serde_json::json!(3.0));
//! ```

use serde_json::{Value, json};
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::generators::batch_weights;
use crate::types::{FeatureKind, RecordBatch};

/// A metric stored under a name in [`MetricsCollector`].
pub trait Metric: Send + Sync + Any {
    /// Current value as JSON.
    fn value(&self) -> Value;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Thread-safe metric registry. Clones share state.
#[derive(Clone, Default)]
pub struct MetricsCollector {
    inner: Arc<Mutex<BTreeMap<String, Box<dyn Metric>>>>,
}

impl MetricsCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Box<dyn Metric>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add `value` to a counter, creating it at zero first if needed.
    pub fn increment_counter(&self, name: &str, value: u64) {
        let mut metrics = self.lock();
        let metric = metrics
            .entry(name.to_string())
            .or_insert_with(|| Box::new(CounterMetric::default()));
        if let Some(counter) = metric.as_any_mut().downcast_mut::<CounterMetric>() {
            counter.count += value;
        }
    }

    /// Record one observation in a distribution.
    pub fn record_distribution(&self, name: &str, value: f64) {
        let mut metrics = self.lock();
        let metric = metrics
            .entry(name.to_string())
            .or_insert_with(|| Box::new(DistributionMetric::default()));
        if let Some(dist) = metric.as_any_mut().downcast_mut::<DistributionMetric>() {
            dist.record(value);
        }
    }

    #[must_use]
    pub fn counter(&self, name: &str) -> Option<u64> {
        self.lock()
            .get(name)
            .and_then(|m| m.as_any().downcast_ref::<CounterMetric>())
            .map(|c| c.count)
    }

    #[must_use]
    pub fn distribution(&self, name: &str) -> Option<DistributionStats> {
        self.lock()
            .get(name)
            .and_then(|m| m.as_any().downcast_ref::<DistributionMetric>())
            .map(DistributionMetric::stats)
    }

    /// Flat name -> value view. A distribution `d` shows up as
    /// `d_min_count`, `d_max_count` and `d_mean_count`.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        let metrics = self.lock();
        let mut out = BTreeMap::new();
        for (name, metric) in metrics.iter() {
            if let Some(dist) = metric.as_any().downcast_ref::<DistributionMetric>() {
                let stats = dist.stats();
                out.insert(format!("{name}_min_count"), json!(stats.min));
                out.insert(format!("{name}_max_count"), json!(stats.max));
                out.insert(format!("{name}_mean_count"), json!(stats.mean));
            } else {
                out.insert(name.clone(), metric.value());
            }
        }
        out
    }

    /// Report input-level counters for one (unsliced) batch.
    ///
    /// Returns the number of invalid weights seen.
    pub fn record_batch(&self, batch: &RecordBatch, weight_feature: Option<&str>) -> u64 {
        self.increment_counter("num_instances", batch.num_rows() as u64);
        for (name, column) in batch.columns() {
            if Some(name) == weight_feature {
                continue;
            }
            let mut missing = 0_u64;
            for cell in column {
                let Some(values) = cell else {
                    missing += 1;
                    continue;
                };
                let kind = match values.kind() {
                    FeatureKind::Int => "int",
                    FeatureKind::Float => "float",
                    FeatureKind::Bytes => "string",
                };
                #[allow(clippy::cast_precision_loss)]
                let num_values = values.len() as f64;
                self.increment_counter(&format!("num_{kind}_feature_values"), 1);
                self.record_distribution(&format!("{kind}_feature_values"), num_values);
            }
            self.increment_counter("num_missing_feature_values", missing);
        }
        let invalid = batch_weights(batch, weight_feature).map_or(0, |(_, invalid)| invalid);
        self.increment_counter("num_invalid_weights", invalid);
        invalid
    }
}

/* ===================== Built-in metrics ===================== */

/// A monotonically increasing count.
#[derive(Default)]
pub struct CounterMetric {
    count: u64,
}

impl Metric for CounterMetric {
    fn value(&self) -> Value {
        json!(self.count)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Running count/sum/min/max of observations; memory does not grow.
pub struct DistributionMetric {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
}

impl Default for DistributionMetric {
    fn default() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl DistributionMetric {

    pub fn record(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> DistributionStats {
        if self.count == 0 {
            return DistributionStats::default();
        }
        DistributionStats {
            count: self.count,
            sum: self.sum,
            mean: self.sum / self.count as f64,
            min: self.min,
            max: self.max,
        }
    }
}

impl Metric for DistributionMetric {
    fn value(&self) -> Value {
        let s = self.stats();
        json!({
            "count": s.count,
            "sum": s.sum,
            "mean": s.mean,
            "min": s.min,
            "max": s.max,
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DistributionStats {
    pub count: u64,
    pub sum: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}
