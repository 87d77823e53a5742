//! Histogram construction from merged accumulator state.
//!
//! Everything here runs at extraction time only; partial histograms are never
//! built mid-merge.

use crate::combiners::{FrequencyTable, QuantileSketch};
use crate::statistics::{Bucket, FreqAndValue, Histogram, HistogramType, RankBucket, RankHistogram};

/// Label used for byte values that are not valid UTF-8.
pub const NON_UTF8_LABEL: &str = "__BYTES_VALUE__";

/// Display label for a raw value.
#[must_use]
pub fn value_label(value: &[u8]) -> String {
    std::str::from_utf8(value).map_or_else(|_| NON_UTF8_LABEL.to_string(), str::to_string)
}

/// Equal-mass histogram: `num_buckets` buckets between the sketch's
/// `num_buckets + 1` cut points, each holding `count / num_buckets`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn quantiles_histogram(sketch: &QuantileSketch, num_buckets: usize) -> Histogram {
    let mut hist = Histogram {
        histogram_type: HistogramType::Quantiles,
        ..Histogram::default()
    };
    let cuts = sketch.cut_points(num_buckets);
    if cuts.len() < 2 {
        return hist;
    }
    let per_bucket = sketch.count() / num_buckets as f64;
    hist.buckets = cuts
        .windows(2)
        .map(|w| Bucket {
            low_value: w[0],
            high_value: w[1],
            sample_count: per_bucket,
        })
        .collect();
    hist
}

/// Equal-width histogram over `[min, max]`.
///
/// Exact points land in one bucket (the last bucket is closed on the right).
/// Bucketed sketch mass is spread over the equal-width buckets in proportion
/// to overlap, which is why `sample_count` can be fractional. Infinite values
/// go to the outermost buckets, whose outer edges become infinite.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn standard_histogram(sketch: &QuantileSketch, num_buckets: usize) -> Histogram {
    let mut hist = Histogram {
        histogram_type: HistogramType::Standard,
        ..Histogram::default()
    };
    let (Some(min), Some(max)) = (sketch.min(), sketch.max()) else {
        return hist;
    };
    if num_buckets == 0 {
        return hist;
    }
    let spans = sketch.spans();
    let finite = spans
        .iter()
        .flat_map(|s| [s.low, s.high])
        .filter(|v| v.is_finite());
    let (lo, hi) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    // scaled before subtracting: `hi - lo` overflows for spans near 2 * f64::MAX
    let width = hi / num_buckets as f64 - lo / num_buckets as f64;
    if lo >= hi || width <= 0.0 {
        hist.buckets.push(Bucket {
            low_value: min,
            high_value: max,
            sample_count: sketch.count(),
        });
        return hist;
    }

    let edge = |i: usize| {
        if i == num_buckets {
            hi
        } else {
            width.mul_add(i as f64, lo)
        }
    };
    let index =
        |v: f64| ((v / width - lo / width).floor().max(0.0) as usize).min(num_buckets - 1);
    let mut counts = vec![0.0_f64; num_buckets];
    for span in &spans {
        if span.low == f64::NEG_INFINITY {
            counts[0] += span.weight;
        } else if span.high == f64::INFINITY {
            counts[num_buckets - 1] += span.weight;
        } else if span.low >= span.high {
            counts[index(span.low)] += span.weight;
        } else {
            let len = span.high - span.low;
            let (first, last) = (index(span.low), index(span.high));
            let mut spread = false;
            for (i, count) in counts.iter_mut().enumerate().take(last + 1).skip(first) {
                let overlap = edge(i + 1).min(span.high) - edge(i).max(span.low);
                if overlap > 0.0 {
                    *count += span.weight * overlap / len;
                    spread = true;
                }
            }
            if !spread {
                counts[index(span.representative)] += span.weight;
            }
        }
    }

    hist.buckets = counts
        .into_iter()
        .enumerate()
        .map(|(i, sample_count)| Bucket {
            low_value: if i == 0 { min.min(lo) } else { edge(i) },
            high_value: if i + 1 == num_buckets { max.max(hi) } else { edge(i + 1) },
            sample_count,
        })
        .collect();
    hist
}

/// Top values and the rank histogram for a frequency table.
///
/// `top_values` holds up to `num_top_values` entries; the rank histogram
/// holds one bucket per rank for up to `num_rank_buckets` ranks.
#[must_use]
pub fn top_values_and_ranks(
    table: &FrequencyTable,
    num_top_values: usize,
    num_rank_buckets: usize,
) -> (Vec<FreqAndValue>, RankHistogram) {
    let ranked = table.top_k(num_top_values.max(num_rank_buckets));
    let top_values = ranked
        .iter()
        .take(num_top_values)
        .map(|(v, c)| FreqAndValue {
            value: value_label(v),
            frequency: *c,
        })
        .collect();
    let rank_histogram = rank_histogram(
        ranked
            .iter()
            .take(num_rank_buckets)
            .map(|(v, c)| (value_label(v), *c)),
    );
    (top_values, rank_histogram)
}

/// Rank histogram from `(label, count)` pairs already in rank order.
pub fn rank_histogram(ranked: impl IntoIterator<Item = (String, f64)>) -> RankHistogram {
    RankHistogram {
        buckets: ranked
            .into_iter()
            .zip(0_u64..)
            .map(|((label, sample_count), rank)| RankBucket {
                low_rank: rank,
                high_rank: rank,
                label,
                sample_count,
            })
            .collect(),
        name: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sketch(values: &[f64]) -> QuantileSketch {
        let mut s = QuantileSketch::default();
        values.iter().for_each(|v| s.add(*v));
        s
    }

    #[test]
    fn standard_histogram_counts_every_value_once() {
        let h = standard_histogram(&sketch(&[1.0, 2.0, 3.0, 4.0, 5.0, 1.0]), 4);
        assert_eq!(h.buckets.len(), 4);
        assert!((h.total_sample_count() - 6.0).abs() < 1e-9);
        assert!((h.buckets[0].sample_count - 2.0).abs() < 1e-9);
        assert!((h.buckets[3].sample_count - 2.0).abs() < 1e-9);
        assert!((h.buckets[3].high_value - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn constant_values_make_one_bucket() {
        let h = standard_histogram(&sketch(&[7.0, 7.0]), 10);
        assert_eq!(h.buckets.len(), 1);
        assert!((h.buckets[0].sample_count - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn bucketed_mass_is_conserved() {
        let mut s = QuantileSketch::with_limits(0.05, 8, 64);
        for i in 1..=500 {
            s.add(f64::from(i));
        }
        assert!(!s.is_exact());
        let h = standard_histogram(&s, 10);
        assert!((h.total_sample_count() - 500.0).abs() < 1e-6);
    }

    #[test]
    fn extreme_finite_span_keeps_its_buckets() {
        let h = standard_histogram(&sketch(&[-1e308, 1e308, f64::INFINITY]), 10);
        assert_eq!(h.buckets.len(), 10);
        assert!(h.buckets.iter().all(|b| b.low_value < f64::INFINITY));
        assert!((h.buckets[0].low_value + 1e308).abs() < 1e293);
        assert!((h.buckets[5].low_value).abs() < 1e293);
        assert!((h.buckets[0].sample_count - 1.0).abs() < f64::EPSILON);
        // 1e308 and +inf both land in the top bucket
        assert!((h.buckets[9].sample_count - 2.0).abs() < f64::EPSILON);
        assert_eq!(h.buckets[9].high_value, f64::INFINITY);
        assert!((h.total_sample_count() - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn non_utf8_values_get_placeholder_label() {
        assert_eq!(value_label(&[0xff, 0xfe]), NON_UTF8_LABEL);
        assert_eq!(value_label(b"ok"), "ok");
    }
}
