//! Testing utilities for statistics runs.
//!
//! - **Builders**: [`ExampleBuilder`] and [`BatchBuilder`] assemble inputs
//!   fluently.
//! - **Assertions**: invariants every result should satisfy, such as
//!   [`assert_count_conservation`] and [`assert_histogram_sample_total`].
//! - **Fixtures**: small datasets with known statistics.
//!
//! # Quick Start
//!
//! ```
//! use featstats::testing::*;
//! use featstats::{StatsOptions, generate_statistics};
//!
//! let batch = BatchBuilder::new()
//!     .example(ExampleBuilder::new().floats("x", [1.0, 2.0]).build())
//!     .example(ExampleBuilder::new().missing("x").build())
//!     .build();
//! let stats = generate_statistics([batch], &StatsOptions::default()).unwrap();
//! assert_count_conservation(&stats.datasets[0]);
//! ```

pub mod assertions;
pub mod builders;
pub mod fixtures;

pub use assertions::*;
pub use builders::*;
pub use fixtures::*;
