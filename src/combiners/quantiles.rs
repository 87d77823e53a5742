//! Mergeable, bounded quantile sketch.
//!
//! Keeps exact `(value, weight)` pairs while the number of distinct values is
//! small, then switches to logarithmically spaced buckets with a fixed
//! relative accuracy. When the bucket count exceeds its limit the lowest
//! bucket is folded into the next one up.
//!
//! Every structural decision (exact vs. bucketed, which buckets collapse)
//! depends only on the multiset of inserted values, never on insertion or
//! merge order, and weights are held as [`ExactSum`]s, so any merge tree
//! yields the same sketch.
//!
//! The bucketed store is a DDSketch logarithmic mapping over a
//! collapsing-lowest store.

use ordered_float::OrderedFloat;
use std::collections::BTreeMap;

use super::ExactSum;

/// Relative accuracy used by [`QuantileSketch::default`].
pub const DEFAULT_RELATIVE_ACCURACY: f64 = 0.01;
/// Distinct values kept exactly before switching to buckets.
pub const DEFAULT_EXACT_CAPACITY: usize = 1024;
/// Upper bound on log buckets.
pub const DEFAULT_MAX_BUCKETS: usize = 2048;

/// Magnitudes below this are mapped to the zero bucket.
const MIN_INDEXABLE: f64 = f64::MIN_POSITIVE;
const POS_INF_KEY: i32 = i32::MAX;
const NEG_INF_KEY: i32 = -i32::MAX;
const MAX_FINITE_KEY: i64 = (i32::MAX - 1) as i64;

/* ===================== LogMapping ===================== */

/// Value <-> bucket-key mapping with relative accuracy `alpha`.
///
/// Key `0` holds zero; positive keys hold positive values in increasing
/// order; negative keys mirror them. Key order matches value order.
#[derive(Clone, Copy, Debug, PartialEq)]
struct LogMapping {
    gamma: f64,
    ln_gamma: f64,
    min_idx: i64,
}

impl LogMapping {
    #[allow(clippy::cast_possible_truncation)]
    fn new(alpha: f64) -> Self {
        let gamma = (1.0 + alpha) / (1.0 - alpha);
        let ln_gamma = gamma.ln();
        let min_idx = (MIN_INDEXABLE.ln() / ln_gamma).ceil() as i64;
        Self {
            gamma,
            ln_gamma,
            min_idx,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn key(&self, v: f64) -> i32 {
        if v.is_infinite() {
            return if v > 0.0 { POS_INF_KEY } else { NEG_INF_KEY };
        }
        let a = v.abs();
        if a < MIN_INDEXABLE {
            return 0;
        }
        let idx = (a.ln() / self.ln_gamma).ceil() as i64;
        let k = (idx - self.min_idx + 1).clamp(1, MAX_FINITE_KEY) as i32;
        if v > 0.0 { k } else { -k }
    }

    #[allow(clippy::cast_precision_loss)]
    fn upper(&self, key: i32) -> f64 {
        let idx = i64::from(key.abs()) + self.min_idx - 1;
        (idx as f64 * self.ln_gamma).exp()
    }

    /// Value reported for everything in `key`'s bucket.
    fn representative(&self, key: i32) -> f64 {
        match key {
            0 => 0.0,
            POS_INF_KEY => f64::INFINITY,
            NEG_INF_KEY => f64::NEG_INFINITY,
            k => {
                let v = 2.0 * self.upper(k) / (1.0 + self.gamma);
                if k > 0 { v } else { -v }
            }
        }
    }

    /// Closed value range covered by `key`'s bucket.
    fn bounds(&self, key: i32) -> (f64, f64) {
        match key {
            0 => (0.0, 0.0),
            POS_INF_KEY => (f64::INFINITY, f64::INFINITY),
            NEG_INF_KEY => (f64::NEG_INFINITY, f64::NEG_INFINITY),
            k => {
                let hi = self.upper(k);
                let lo = hi / self.gamma;
                if k > 0 { (lo, hi) } else { (-hi, -lo) }
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Store {
    Exact(BTreeMap<OrderedFloat<f64>, ExactSum>),
    Buckets(BTreeMap<i32, ExactSum>),
}

/// A run of sketch mass over `[low, high]`, in ascending order.
///
/// In exact mode `low == high` is the stored value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SketchSpan {
    pub low: f64,
    pub high: f64,
    pub representative: f64,
    pub weight: f64,
}

/* ===================== QuantileSketch ===================== */

/// Weighted quantile sketch over `f64` values.
///
/// - NaN values and non-positive or non-finite weights are ignored.
/// - `min`/`max` are tracked exactly; quantile 0 and 1 return them.
/// - Reported bucket values are clamped to `[min, max]`.
#[derive(Clone, Debug, PartialEq)]
pub struct QuantileSketch {
    mapping: LogMapping,
    exact_capacity: usize,
    max_buckets: usize,
    store: Store,
    count: ExactSum,
    min: f64,
    max: f64,
}

impl Default for QuantileSketch {
    fn default() -> Self {
        Self::new(DEFAULT_RELATIVE_ACCURACY)
    }
}

impl QuantileSketch {
    /// Sketch with the given relative accuracy (in `(0, 1)`) and default limits.
    #[must_use]
    pub fn new(relative_accuracy: f64) -> Self {
        Self::with_limits(relative_accuracy, DEFAULT_EXACT_CAPACITY, DEFAULT_MAX_BUCKETS)
    }

    #[must_use]
    pub fn with_limits(relative_accuracy: f64, exact_capacity: usize, max_buckets: usize) -> Self {
        Self {
            mapping: LogMapping::new(relative_accuracy),
            exact_capacity,
            max_buckets: max_buckets.max(1),
            store: Store::Exact(BTreeMap::new()),
            count: ExactSum::new(),
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    pub fn add(&mut self, value: f64) {
        self.add_weighted(value, 1.0);
    }

    pub fn add_weighted(&mut self, value: f64, weight: f64) {
        if value.is_nan() || !weight.is_finite() || weight <= 0.0 {
            return;
        }
        // fold -0.0 into 0.0 so the exact map has one key for zero
        let value = if value == 0.0 { 0.0 } else { value };
        self.count.add(weight);
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        let mapping = self.mapping;
        match &mut self.store {
            Store::Exact(m) => m.entry(OrderedFloat(value)).or_default().add(weight),
            Store::Buckets(b) => b.entry(mapping.key(value)).or_default().add(weight),
        }
        self.compact();
    }

    /// Fold `other` into `self`. `other` is left untouched.
    pub fn merge(&mut self, other: &Self) {
        if other.is_empty() {
            return;
        }
        self.count.merge(&other.count);
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        if matches!(other.store, Store::Buckets(_)) {
            self.switch_to_buckets();
        }
        let mapping = self.mapping;
        match &mut self.store {
            Store::Exact(a) => {
                if let Store::Exact(b) = &other.store {
                    for (v, w) in b {
                        a.entry(*v).or_default().merge(w);
                    }
                }
            }
            Store::Buckets(a) => match &other.store {
                Store::Exact(b) => {
                    for (v, w) in b {
                        a.entry(mapping.key(v.0)).or_default().merge(w);
                    }
                }
                Store::Buckets(b) => {
                    for (k, w) in b {
                        a.entry(*k).or_default().merge(w);
                    }
                }
            },
        }
        self.compact();
    }

    fn switch_to_buckets(&mut self) {
        if let Store::Exact(m) = &self.store {
            let mut buckets: BTreeMap<i32, ExactSum> = BTreeMap::new();
            for (v, w) in m {
                buckets.entry(self.mapping.key(v.0)).or_default().merge(w);
            }
            self.store = Store::Buckets(buckets);
        }
    }

    fn compact(&mut self) {
        if let Store::Exact(m) = &self.store
            && m.len() > self.exact_capacity
        {
            self.switch_to_buckets();
        }
        if let Store::Buckets(b) = &mut self.store {
            while b.len() > self.max_buckets {
                let Some((_, w)) = b.pop_first() else { break };
                if let Some(mut next) = b.first_entry() {
                    next.get_mut().merge(&w);
                }
            }
        }
    }

    /// Total inserted weight.
    #[must_use]
    pub fn count(&self) -> f64 {
        self.count.value()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count.is_zero()
    }

    /// Whether every inserted value is still held exactly.
    #[must_use]
    pub const fn is_exact(&self) -> bool {
        matches!(self.store, Store::Exact(_))
    }

    #[must_use]
    pub fn min(&self) -> Option<f64> {
        (!self.is_empty()).then_some(self.min)
    }

    #[must_use]
    pub fn max(&self) -> Option<f64> {
        (!self.is_empty()).then_some(self.max)
    }

    /// Weighted spans in ascending value order.
    #[must_use]
    pub fn spans(&self) -> Vec<SketchSpan> {
        match &self.store {
            Store::Exact(m) => m
                .iter()
                .map(|(v, w)| SketchSpan {
                    low: v.0,
                    high: v.0,
                    representative: v.0,
                    weight: w.value(),
                })
                .collect(),
            Store::Buckets(b) => b
                .iter()
                .map(|(k, w)| {
                    let (lo, hi) = self.mapping.bounds(*k);
                    SketchSpan {
                        low: lo.clamp(self.min, self.max),
                        high: hi.clamp(self.min, self.max),
                        representative: self.mapping.representative(*k).clamp(self.min, self.max),
                        weight: w.value(),
                    }
                })
                .collect(),
        }
    }

    /// The smallest retained value whose cumulative weight exceeds
    /// `q * count`. `None` when empty.
    #[must_use]
    pub fn quantile(&self, q: f64) -> Option<f64> {
        if self.is_empty() {
            return None;
        }
        if q <= 0.0 {
            return Some(self.min);
        }
        if q >= 1.0 {
            return Some(self.max);
        }
        let target = q * self.count();
        let mut cumulative = 0.0;
        for span in self.spans() {
            cumulative += span.weight;
            if cumulative > target {
                return Some(span.representative);
            }
        }
        Some(self.max)
    }

    /// `k + 1` cut points at `0, 1/k, ..., 1`. Empty when the sketch is.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn cut_points(&self, k: usize) -> Vec<f64> {
        if self.is_empty() || k == 0 {
            return Vec::new();
        }
        (0..=k)
            .filter_map(|i| self.quantile(i as f64 / k as f64))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_order_matches_value_order() {
        let m = LogMapping::new(0.01);
        let values = [f64::NEG_INFINITY, -1e9, -3.5, -1e-300, 0.0, 1e-300, 2.0, 7e12, f64::INFINITY];
        let keys: Vec<i32> = values.iter().map(|v| m.key(*v)).collect();
        assert!(keys.windows(2).all(|w| w[0] < w[1]), "{keys:?}");
    }

    #[test]
    fn representative_is_within_relative_accuracy() {
        let m = LogMapping::new(0.01);
        for v in [1e-200, 0.003, 1.0, 42.0, 123_456.0, -17.25] {
            let r = m.representative(m.key(v));
            assert!(((r - v) / v).abs() <= 0.0100001, "v={v} r={r}");
        }
    }

    #[test]
    fn bounded_buckets_collapse_from_the_bottom() {
        let mut s = QuantileSketch::with_limits(0.01, 0, 4);
        for v in [1.0, 10.0, 100.0, 1000.0, 10_000.0, 100_000.0] {
            s.add(v);
        }
        let spans = s.spans();
        assert_eq!(spans.len(), 4);
        assert!((spans[0].weight - 3.0).abs() < f64::EPSILON);
        assert_eq!(s.max(), Some(100_000.0));
    }

    #[test]
    fn merge_order_does_not_change_state() {
        let values: Vec<f64> = (0..3000).map(|i| f64::from(i).mul_add(0.37, -200.0)).collect();
        let mut whole = QuantileSketch::with_limits(0.02, 100, 64);
        for v in &values {
            whole.add(*v);
        }
        let mut parts: Vec<QuantileSketch> = values
            .chunks(7)
            .map(|c| {
                let mut s = QuantileSketch::with_limits(0.02, 100, 64);
                c.iter().for_each(|v| s.add(*v));
                s
            })
            .collect();
        parts.reverse();
        let mut merged = QuantileSketch::with_limits(0.02, 100, 64);
        for p in &parts {
            merged.merge(p);
        }
        assert_eq!(merged, whole);
    }
}
