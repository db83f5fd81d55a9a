//! Structured error types for the coverage core.

use super::unit::DiscreteUnit;
use chrono::NaiveDate;
use thiserror::Error;

/// Errors raised by coverage-set construction and set algebra.
///
/// All of these are synchronous validation failures: an operation either
/// fully succeeds or raises one of these with the structure unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoverageError {
    /// The serialized sparsity mapping is malformed.
    #[error("malformed sparsity mapping '{input}': {reason}")]
    Format { input: String, reason: String },

    /// Set algebra between coverage sets built with different discrete units.
    #[error("discrete unit mismatch: {left} vs {right}")]
    UnitMismatch {
        left: DiscreteUnit,
        right: DiscreteUnit,
    },

    /// An interval whose stop precedes its start.
    #[error("invalid interval: stop {stop} precedes start {start}")]
    InvalidRange { start: NaiveDate, stop: NaiveDate },
}

impl CoverageError {
    pub(crate) fn format(input: &str, reason: impl Into<String>) -> Self {
        Self::Format {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}
