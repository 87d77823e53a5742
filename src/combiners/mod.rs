//! Mergeable building blocks shared by the statistics generators.
//!
//! Each type here is a small accumulator with `add`, `merge` and a read-out,
//! and is safe to merge in any tree shape:
//!
//! - [`QuantileSketch`] -- bounded weighted quantile summary.
//! - [`FrequencyTable`] -- exact per-value counts for top-k and rank histograms.
//! - [`Moments`] -- weighted count/sum/sum-of-squares for mean and std-dev.
//! - [`ExactSum`] -- rounding-free `f64` sum under every weighted total above.
//!
//! # Examples
//! ```
//! use featstats::combiners::{FrequencyTable, QuantileSketch};
//!
//! let mut left = QuantileSketch::default();
//! let mut right = QuantileSketch::default();
//! left.add(1.0);
//! right.add(3.0);
//! right.add(2.0);
//! left.merge(&right);
//! assert_eq!(left.quantile(0.5), Some(2.0));
//!
//! let mut freq = FrequencyTable::new();
//! freq.add(b"a");
//! freq.add(b"b");
//! freq.add(b"b");
//! assert_eq!(freq.top_k(1)[0].0, b"b");
//! ```

mod exact_sum;
mod quantiles;
mod statistical;
mod topk;

pub use exact_sum::ExactSum;
pub use quantiles::{
    DEFAULT_EXACT_CAPACITY, DEFAULT_MAX_BUCKETS, DEFAULT_RELATIVE_ACCURACY, QuantileSketch,
    SketchSpan,
};
pub use statistical::Moments;
pub use topk::FrequencyTable;
