//! Exact floating-point summation.
//!
//! Finite inputs are accumulated as a wide fixed-point integer in units of
//! the smallest subnormal (2^-1074), so no rounding happens until
//! [`ExactSum::value`]. The state is a function of the multiset of inputs
//! alone: any insertion order and any merge tree give equal accumulators and
//! the same read-out, bit for bit.

/* ===================== Magnitude ===================== */

/// Unsigned fixed-point integer; limb `i` weighs `2^(32 * (base + i) - 1074)`.
///
/// Kept trimmed: `digits` is empty for zero, otherwise its first and last
/// limbs are non-zero, so equal values have equal representations.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct Magnitude {
    base: usize,
    digits: Vec<u32>,
}

impl Magnitude {
    /// Add `mantissa * 2^offset` (in units of 2^-1074).
    #[allow(clippy::cast_possible_truncation)]
    fn add_shifted(&mut self, mantissa: u64, offset: usize) {
        let limb = offset / 32;
        let wide = u128::from(mantissa) << (offset % 32);
        for k in 0..3 {
            self.add_limb(limb + k, (wide >> (32 * k)) as u32);
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn add_limb(&mut self, at: usize, value: u32) {
        if value == 0 {
            return;
        }
        if self.digits.is_empty() {
            self.base = at;
        } else if at < self.base {
            self.digits.splice(0..0, std::iter::repeat_n(0, self.base - at));
            self.base = at;
        }
        let mut i = at - self.base;
        let mut carry = u64::from(value);
        while carry != 0 {
            if i >= self.digits.len() {
                self.digits.resize(i + 1, 0);
            }
            let sum = u64::from(self.digits[i]) + carry;
            self.digits[i] = sum as u32;
            carry = sum >> 32;
            i += 1;
        }
        let zeros = self.digits.iter().take_while(|d| **d == 0).count();
        if zeros > 0 {
            self.digits.drain(..zeros);
            self.base += zeros;
        }
    }

    fn merge(&mut self, other: &Self) {
        for (i, d) in other.digits.iter().enumerate() {
            self.add_limb(other.base + i, *d);
        }
    }

    fn is_zero(&self) -> bool {
        self.digits.is_empty()
    }

    /// Limbs over the absolute range `[lo, lo + len)`.
    fn window(&self, lo: usize, len: usize) -> Vec<u32> {
        let mut out = vec![0; len];
        for (i, d) in self.digits.iter().enumerate() {
            out[self.base + i - lo] = *d;
        }
        out
    }
}

/// `a - b` over aligned little-endian limbs; requires `a >= b`.
#[allow(clippy::cast_possible_truncation)]
fn sub_limbs(a: &[u32], b: &[u32]) -> Vec<u32> {
    let mut borrow = 0_i64;
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let mut d = i64::from(*x) - i64::from(*y) - borrow;
            borrow = i64::from(d < 0);
            if d < 0 {
                d += 1 << 32;
            }
            d as u32
        })
        .collect()
}

/// Nearest `f64` to the non-negative integer in `digits`, scaled by
/// `2^(32 * base - 1074)`.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
fn limbs_to_f64(digits: &[u32], base: usize) -> f64 {
    let Some(top) = digits.iter().rposition(|d| *d != 0) else {
        return 0.0;
    };
    let mut head = 0_u128;
    for k in 0..3 {
        head <<= 32;
        if let Some(i) = top.checked_sub(k) {
            head |= u128::from(digits[i]);
        }
    }
    // sticky bit: keeps round-to-nearest-even correct for the dropped limbs
    if top >= 3 && digits[..top - 2].iter().any(|d| *d != 0) {
        head |= 1;
    }
    let exponent = 32 * (base as i64 + top as i64 - 2) - 1074;
    scale_by_pow2(head as f64, exponent)
}

#[allow(clippy::cast_sign_loss)]
fn pow2(e: i64) -> f64 {
    // e in [-1022, 1023]
    f64::from_bits(((e + 1023) as u64) << 52)
}

fn scale_by_pow2(mut x: f64, mut e: i64) -> f64 {
    const STEP: i64 = 1000;
    while e > STEP {
        x *= pow2(STEP);
        e -= STEP;
    }
    while e < -STEP {
        x *= pow2(-STEP);
        e += STEP;
    }
    x * pow2(e)
}

/* ===================== ExactSum ===================== */

/// Order-insensitive sum of `f64` values with a single rounding on read.
///
/// - Positive and negative finite inputs are kept in separate exact
///   magnitudes; their difference is rounded once in [`value`](Self::value).
/// - Infinities and NaN are remembered as flags: NaN or both infinities give
///   NaN, otherwise a single infinity wins.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExactSum {
    positive: Magnitude,
    negative: Magnitude,
    nan: bool,
    pos_inf: bool,
    neg_inf: bool,
}

impl ExactSum {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn add(&mut self, x: f64) {
        if x.is_nan() {
            self.nan = true;
            return;
        }
        if x.is_infinite() {
            if x > 0.0 {
                self.pos_inf = true;
            } else {
                self.neg_inf = true;
            }
            return;
        }
        if x == 0.0 {
            return;
        }
        let bits = x.to_bits();
        let exponent = ((bits >> 52) & 0x7ff) as usize;
        let fraction = bits & ((1 << 52) - 1);
        let (mantissa, offset) = if exponent == 0 {
            (fraction, 0)
        } else {
            (fraction | (1 << 52), exponent - 1)
        };
        let target = if x < 0.0 {
            &mut self.negative
        } else {
            &mut self.positive
        };
        target.add_shifted(mantissa, offset);
    }

    pub fn merge(&mut self, other: &Self) {
        self.positive.merge(&other.positive);
        self.negative.merge(&other.negative);
        self.nan |= other.nan;
        self.pos_inf |= other.pos_inf;
        self.neg_inf |= other.neg_inf;
    }

    /// Whether nothing but zeros has been added.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.positive.is_zero()
            && self.negative.is_zero()
            && !(self.nan || self.pos_inf || self.neg_inf)
    }

    /// The exact sum rounded to the nearest `f64`.
    #[must_use]
    pub fn value(&self) -> f64 {
        if self.nan || (self.pos_inf && self.neg_inf) {
            return f64::NAN;
        }
        if self.pos_inf {
            return f64::INFINITY;
        }
        if self.neg_inf {
            return f64::NEG_INFINITY;
        }
        let (p, n) = (&self.positive, &self.negative);
        if n.is_zero() {
            return limbs_to_f64(&p.digits, p.base);
        }
        if p.is_zero() {
            return -limbs_to_f64(&n.digits, n.base);
        }
        let lo = p.base.min(n.base);
        let hi = (p.base + p.digits.len()).max(n.base + n.digits.len());
        let (a, b) = (p.window(lo, hi - lo), n.window(lo, hi - lo));
        // compare from the most significant limb down
        if a.iter().rev().ge(b.iter().rev()) {
            limbs_to_f64(&sub_limbs(&a, &b), lo)
        } else {
            -limbs_to_f64(&sub_limbs(&b, &a), lo)
        }
    }
}

impl FromIterator<f64> for ExactSum {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut sum = Self::new();
        iter.into_iter().for_each(|x| sum.add(x));
        sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenths_sum_exactly() {
        let sum: ExactSum = std::iter::repeat_n(0.1, 10).collect();
        // 0.1 is not representable; the exact sum of ten copies rounds to 1.0
        assert_eq!(sum.value(), 1.0);
        let naive: f64 = std::iter::repeat_n(0.1, 10).sum();
        assert_ne!(naive, 1.0);
    }

    #[test]
    fn order_and_grouping_do_not_matter() {
        let values: Vec<f64> = (1..200)
            .map(|i| f64::from(i).mul_add(0.731, -41.3) / 7.0)
            .collect();
        let forward: ExactSum = values.iter().copied().collect();
        let backward: ExactSum = values.iter().rev().copied().collect();
        let mut chunked = ExactSum::new();
        for chunk in values.chunks(13).rev() {
            chunked.merge(&chunk.iter().copied().collect());
        }
        assert_eq!(forward, backward);
        assert_eq!(forward, chunked);
        assert_eq!(forward.value().to_bits(), chunked.value().to_bits());
    }

    #[test]
    fn cancellation_and_extremes() {
        let sum: ExactSum = [1e308, 1e308, -1e308, 1.0, -1.0].into_iter().collect();
        assert_eq!(sum.value(), 1e308);
        let tiny: ExactSum = [f64::from_bits(1), f64::from_bits(1)].into_iter().collect();
        assert_eq!(tiny.value(), f64::from_bits(2));
        let mixed: ExactSum = [1e-300, 1e300, -1e300].into_iter().collect();
        assert_eq!(mixed.value(), 1e-300);
        let negative: ExactSum = [-2.5, 1.0].into_iter().collect();
        assert_eq!(negative.value(), -1.5);
        let overflow: ExactSum = [f64::MAX, f64::MAX].into_iter().collect();
        assert_eq!(overflow.value(), f64::INFINITY);
        assert_eq!(ExactSum::new().value(), 0.0);
        assert!(ExactSum::new().is_zero());
    }

    #[test]
    fn non_finite_inputs() {
        let inf: ExactSum = [1.0, f64::INFINITY].into_iter().collect();
        assert_eq!(inf.value(), f64::INFINITY);
        let both: ExactSum = [f64::INFINITY, f64::NEG_INFINITY].into_iter().collect();
        assert!(both.value().is_nan());
        let nan: ExactSum = [1.0, f64::NAN].into_iter().collect();
        assert!(nan.value().is_nan());
    }
}
