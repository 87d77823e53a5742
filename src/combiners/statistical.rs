//! Running weighted moments.

use super::ExactSum;

/* ===================== Moments ===================== */

/// Weighted count, sum and sum of squares.
///
/// - Accumulator: three [`ExactSum`]s, so merge order never shows in the
///   result.
/// - Output: mean and population standard deviation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Moments {
    weight: ExactSum,
    sum: ExactSum,
    sum_sq: ExactSum,
}

impl Moments {
    pub fn add(&mut self, value: f64, weight: f64) {
        let weighted = weight * value;
        self.weight.add(weight);
        self.sum.add(weighted);
        self.sum_sq.add(weighted * value);
    }

    pub fn merge(&mut self, other: &Self) {
        self.weight.merge(&other.weight);
        self.sum.merge(&other.sum);
        self.sum_sq.merge(&other.sum_sq);
    }

    /// Total weight added.
    #[must_use]
    pub fn weight(&self) -> f64 {
        self.weight.value()
    }

    #[must_use]
    pub fn mean(&self) -> Option<f64> {
        let weight = self.weight();
        (weight > 0.0).then(|| self.sum.value() / weight)
    }

    /// Population standard deviation; `None` with no weight.
    #[must_use]
    pub fn std_dev(&self) -> Option<f64> {
        let mean = self.mean()?;
        let variance = mean.mul_add(-mean, self.sum_sq.value() / self.weight());
        Some(variance.max(0.0).sqrt())
    }
}
