//! Domain types: discrete units, closed date intervals, coverage sets.

pub mod coverage;
pub mod error;
pub mod interval;
pub mod unit;

pub use coverage::{CoverageSet, DATE_FORMAT};
pub use error::CoverageError;
pub use interval::DateInterval;
pub use unit::DiscreteUnit;
