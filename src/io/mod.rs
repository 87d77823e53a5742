//! Statistics output and columnar input.
//!
//! - [`json`]: write/read a [`DatasetFeatureStatisticsList`](crate::statistics::DatasetFeatureStatisticsList)
//!   as JSON, keeping the output field names.
//! - `arrow` (feature `io-arrow`): decode Arrow record batches into
//!   [`RecordBatch`](crate::types::RecordBatch).

pub mod json;

#[cfg_attr(docsrs, doc(cfg(feature = "io-arrow")))]
#[cfg(feature = "io-arrow")]
pub mod arrow;

pub use json::{read_statistics_json, statistics_to_json_string, write_statistics_json};
