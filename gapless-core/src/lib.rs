//! Gapless Core — sparse coverage tracking for end-of-day market data.
//!
//! This crate keeps, per (ticker, resampling-unit) pair, a record of which
//! contiguous date ranges have already been fetched from the upstream
//! provider, so repeated collection requests only ever fetch what is missing:
//! - Domain types: discrete units, closed date intervals, and coverage sets
//!   ("sparsity mappings") with union/difference set algebra
//! - Data layer: Tiingo provider behind a retriever trait, circuit breaker,
//!   Parquet-backed store with per-(ticker, unit) coverage records, and the
//!   gap-driven collection orchestrator

pub mod data;
pub mod domain;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: the types handed across the collector boundary
    /// are Send + Sync, so callers can drive collection from worker threads.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::DiscreteUnit>();
        require_sync::<domain::DiscreteUnit>();
        require_send::<domain::DateInterval>();
        require_sync::<domain::DateInterval>();
        require_send::<domain::CoverageSet>();
        require_sync::<domain::CoverageSet>();
        require_send::<domain::CoverageError>();
        require_sync::<domain::CoverageError>();

        require_send::<data::EodRow>();
        require_sync::<data::EodRow>();
        require_send::<data::DataError>();
        require_sync::<data::DataError>();
        require_send::<data::EodStore>();
        require_sync::<data::EodStore>();
        require_send::<data::CircuitBreaker>();
        require_sync::<data::CircuitBreaker>();
        require_send::<data::TiingoProvider>();
        require_sync::<data::TiingoProvider>();
    }
}
