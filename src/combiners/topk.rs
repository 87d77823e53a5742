//! Exact frequency table with first-occurrence tie-breaking.

use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use std::cmp::Reverse;

use super::ExactSum;

/* ===================== FrequencyTable ===================== */

/// Exact (optionally weighted) occurrence counts per distinct byte value.
///
/// - Accumulator: `IndexMap<Vec<u8>, ExactSum>` in first-occurrence order.
/// - Output: [`top_k`](Self::top_k), most frequent first.
///
/// # Notes
/// - Equal counts are ordered by first occurrence, so `merge` must be called
///   in processing order for the tie-break to be meaningful.
/// - Memory grows with the number of distinct values.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrequencyTable {
    counts: IndexMap<Vec<u8>, ExactSum>,
}

impl FrequencyTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, value: &[u8]) {
        self.add_weighted(value, 1.0);
    }

    /// Non-positive weights are ignored.
    pub fn add_weighted(&mut self, value: &[u8], weight: f64) {
        if weight <= 0.0 || !weight.is_finite() {
            return;
        }
        if let Some(c) = self.counts.get_mut(value) {
            c.add(weight);
        } else {
            self.counts.insert(value.to_vec(), std::iter::once(weight).collect());
        }
    }

    /// Add `other`'s counts; values new to `self` are appended after its own.
    pub fn merge(&mut self, other: &Self) {
        for (value, count) in &other.counts {
            if let Some(c) = self.counts.get_mut(value) {
                c.merge(count);
            } else {
                self.counts.insert(value.clone(), count.clone());
            }
        }
    }

    /// Number of distinct values.
    #[must_use]
    pub fn unique(&self) -> usize {
        self.counts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    #[must_use]
    pub fn get(&self, value: &[u8]) -> Option<f64> {
        self.counts.get(value).map(ExactSum::value)
    }

    /// The `k` most frequent values with their counts.
    #[must_use]
    pub fn top_k(&self, k: usize) -> Vec<(&[u8], f64)> {
        let mut entries: Vec<(&[u8], f64)> = self
            .counts
            .iter()
            .map(|(v, c)| (v.as_slice(), c.value()))
            .collect();
        // stable: ties keep first-occurrence order
        entries.sort_by_key(|(_, c)| Reverse(OrderedFloat(*c)));
        entries.truncate(k);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ties_break_by_first_occurrence() {
        let mut t = FrequencyTable::new();
        for v in ["z", "a", "m", "a", "z"] {
            t.add(v.as_bytes());
        }
        let top: Vec<&[u8]> = t.top_k(3).into_iter().map(|(v, _)| v).collect();
        assert_eq!(top, vec![b"z".as_slice(), b"a".as_slice(), b"m".as_slice()]);
    }

    #[test]
    fn merge_keeps_left_order_and_sums() {
        let mut a = FrequencyTable::new();
        a.add(b"x");
        let mut b = FrequencyTable::new();
        b.add(b"y");
        b.add(b"x");
        a.merge(&b);
        assert_eq!(a.get(b"x"), Some(2.0));
        assert_eq!(a.top_k(2)[1].0, b"y");
        assert_eq!(b.unique(), 2);
    }
}
