//! Slicing: route examples to named, possibly overlapping subsets.
//!
//! A [`SliceFn`] maps one example to any number of slice keys. The engine
//! always adds [`DEFAULT_SLICE_KEY`] for every example, so every slicing run
//! reports the whole dataset first.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::statistics::DEFAULT_SLICE_KEY;
use crate::types::{Example, RecordBatch};

/// Names a slice. Composite keys are joined with `_`.
pub type SliceKey = String;

/// A batch tagged with its slice; `None` when slicing output is not requested.
pub type SlicedBatch = (Option<SliceKey>, RecordBatch);

/// Maps an example to the slices it belongs to.
pub trait SliceFn: Send + Sync {
    fn slice_keys(&self, example: &Example) -> Vec<SliceKey>;
}

impl<F> SliceFn for F
where
    F: Fn(&Example) -> Vec<SliceKey> + Send + Sync,
{
    fn slice_keys(&self, example: &Example) -> Vec<SliceKey> {
        self(example)
    }
}

/// Slices by the values of one or more features.
///
/// Each configured feature maps to an optional allow-list of values. An
/// example yields one key per combination of its distinct (allowed) values
/// across the features, e.g. `country_US_lang_en`. An example missing any
/// configured feature, or with no allowed value for it, yields no key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureValueSlicer {
    pub features: IndexMap<String, Option<Vec<String>>>,
}

impl FeatureValueSlicer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Slice by every value of `feature`.
    #[must_use]
    pub fn by_feature(mut self, feature: impl Into<String>) -> Self {
        self.features.insert(feature.into(), None);
        self
    }

    /// Slice by `feature`, keeping only the listed values.
    #[must_use]
    pub fn by_feature_values<I, S>(mut self, feature: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.features.insert(
            feature.into(),
            Some(values.into_iter().map(Into::into).collect()),
        );
        self
    }
}

impl SliceFn for FeatureValueSlicer {
    fn slice_keys(&self, example: &Example) -> Vec<SliceKey> {
        let mut keys: Vec<String> = vec![String::new()];
        for (feature, allowed) in &self.features {
            let Some(Some(values)) = example.get(feature) else {
                return Vec::new();
            };
            let parts: IndexSet<String> = values
                .to_byte_values()
                .into_iter()
                .map(|v| String::from_utf8_lossy(&v).into_owned())
                .filter(|v| allowed.as_ref().is_none_or(|a| a.contains(v)))
                .map(|v| format!("{feature}_{v}"))
                .collect();
            if parts.is_empty() {
                return Vec::new();
            }
            keys = keys
                .iter()
                .flat_map(|prefix| {
                    parts.iter().map(move |p| {
                        if prefix.is_empty() {
                            p.clone()
                        } else {
                            format!("{prefix}_{p}")
                        }
                    })
                })
                .collect();
        }
        if self.features.is_empty() {
            return Vec::new();
        }
        keys
    }
}

/// Split a batch into per-slice batches.
///
/// The first entry is always the whole batch under [`DEFAULT_SLICE_KEY`];
/// the rest follow in order of first observation. An example lands in each
/// distinct slice it maps to exactly once.
#[must_use]
pub fn slice_batch(batch: &RecordBatch, slice_fns: &[Arc<dyn SliceFn>]) -> Vec<(SliceKey, RecordBatch)> {
    let mut out = vec![(DEFAULT_SLICE_KEY.to_string(), batch.clone())];
    if slice_fns.is_empty() {
        return out;
    }
    let mut rows_by_key: IndexMap<SliceKey, Vec<usize>> = IndexMap::new();
    for row in 0..batch.num_rows() {
        let example = batch.example(row);
        let keys: IndexSet<SliceKey> = slice_fns
            .iter()
            .flat_map(|f| f.slice_keys(&example))
            .filter(|k| k != DEFAULT_SLICE_KEY)
            .collect();
        for key in keys {
            rows_by_key.entry(key).or_default().push(row);
        }
    }
    out.extend(
        rows_by_key
            .into_iter()
            .map(|(key, rows)| (key, batch.take_rows(&rows))),
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FeatureValues, example};

    #[test]
    fn cross_product_of_two_features() {
        let slicer = FeatureValueSlicer::new().by_feature("a").by_feature("b");
        let ex = example([
            ("a", Some(FeatureValues::strings(["x", "y"]))),
            ("b", Some(FeatureValues::ints([1]))),
        ]);
        assert_eq!(slicer.slice_keys(&ex), ["a_x_b_1", "a_y_b_1"]);
    }

    #[test]
    fn missing_or_disallowed_values_yield_nothing() {
        let slicer = FeatureValueSlicer::new().by_feature_values("a", ["z"]);
        let ex = example([("a", Some(FeatureValues::strings(["x"])))]);
        assert!(slicer.slice_keys(&ex).is_empty());
        let missing = example([("a", None)]);
        assert!(slicer.slice_keys(&missing).is_empty());
    }
}
