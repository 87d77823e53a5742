//! Error taxonomy for the statistics engine.
//!
//! Public functions return `anyhow::Result`; the variants below are the typed
//! causes carried inside those errors. Recover them with
//! `err.downcast_ref::<StatsError>()`.

use thiserror::Error;

/// Typed failure causes raised by the engine.
///
/// Per-example data problems are never reported through this type: they are
/// recorded in the statistics themselves.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatsError {
    /// Malformed or conflicting options, detected before aggregation starts.
    #[error("invalid stats options: {0}")]
    InvalidOptions(String),

    /// A generator cannot be used on the requested execution path.
    #[error("statistics generator `{name}` is not supported here: {reason}")]
    UnsupportedGenerator { name: String, reason: String },

    /// An accumulator of the wrong concrete type reached a generator.
    #[error("accumulator type mismatch in generator `{generator}`: expected {expected}")]
    AccumulatorMismatch {
        generator: String,
        expected: &'static str,
    },

    /// A transform-style generator produced output the driver cannot merge.
    #[error("transform generator `{generator}` produced invalid output: {reason}")]
    InvalidTransformOutput { generator: String, reason: String },

    /// Broken internal invariant.
    #[error("internal error: {0}")]
    Internal(String),
}

impl StatsError {
    pub(crate) fn options(msg: impl Into<String>) -> Self {
        Self::InvalidOptions(msg.into())
    }
}
