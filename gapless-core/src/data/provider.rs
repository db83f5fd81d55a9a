//! Provider trait and structured error types for EOD data retrieval.
//!
//! A retriever is anything that can produce adjusted end-of-day rows for one
//! ticker over one contiguous date range. The collector sits above this trait
//! and only ever asks for the gaps a coverage set reports as missing.

use crate::domain::{CoverageError, DateInterval, DiscreteUnit};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One adjusted end-of-day row, as stored per (ticker, unit).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EodRow {
    pub date: NaiveDate,
    pub adj_open: f64,
    pub adj_high: f64,
    pub adj_low: f64,
    pub adj_close: f64,
    pub adj_volume: f64,
}

/// Structured error types for retrieval, storage, and coverage bookkeeping.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication rejected: {0}")]
    AuthenticationRejected(String),

    #[error("ticker not found: {ticker}")]
    TickerNotFound { ticker: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("store error: {0}")]
    StoreError(String),

    #[error("parquet I/O error: {0}")]
    ParquetError(String),

    #[error("corrupt coverage record: {0}")]
    Coverage(#[from] CoverageError),

    #[error("no collected data for ticker '{ticker}' — run `collect {ticker}` first")]
    NoCollectedData { ticker: String },

    #[error("data error: {0}")]
    Other(String),
}

/// Result of a successful retrieval for a single contiguous range.
///
/// `rows` may be empty: a range falling entirely on non-trading days is a
/// successful fetch of zero rows, and still counts as collected.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub ticker: String,
    pub rows: Vec<EodRow>,
}

/// Trait for EOD data retrievers.
///
/// Implementations handle the specifics of one upstream source. They know
/// nothing about coverage tracking — the collector computes gaps and calls
/// `retrieve` once per gap.
pub trait EodProvider: Send + Sync {
    /// Human-readable name of this provider, shown in collection output.
    fn name(&self) -> &str;

    /// Retrieve rows for `ticker` covering exactly `[start, stop]` at the
    /// given resampling unit.
    fn retrieve(
        &self,
        ticker: &str,
        start: NaiveDate,
        stop: NaiveDate,
        unit: DiscreteUnit,
    ) -> Result<FetchResult, DataError>;

    /// Check if the provider is currently available (not rate-limited, not
    /// blocked).
    fn is_available(&self) -> bool;
}

/// Progress callback for multi-ticker collection runs.
pub trait CollectProgress: Send {
    /// Called when starting a ticker.
    fn on_ticker_start(&self, ticker: &str, index: usize, total: usize);

    /// Called once per gap interval about to be fetched.
    fn on_gap(&self, ticker: &str, gap: &DateInterval);

    /// Called when a ticker finishes; `result` carries the rows written.
    fn on_ticker_complete(
        &self,
        ticker: &str,
        index: usize,
        total: usize,
        result: &Result<usize, DataError>,
    );

    /// Called when the entire batch is done.
    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Simple progress reporter that prints to stdout.
pub struct StdoutProgress;

impl CollectProgress for StdoutProgress {
    fn on_ticker_start(&self, ticker: &str, index: usize, total: usize) {
        println!("[{}/{}] Collecting {ticker}...", index + 1, total);
    }

    fn on_gap(&self, ticker: &str, gap: &DateInterval) {
        println!("  gap {gap} for {ticker}");
    }

    fn on_ticker_complete(
        &self,
        ticker: &str,
        _index: usize,
        _total: usize,
        result: &Result<usize, DataError>,
    ) {
        match result {
            Ok(rows) => println!("  OK: {ticker} ({rows} rows written)"),
            Err(e) => println!("  FAIL: {ticker}: {e}"),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        println!("\nCollection complete: {succeeded}/{total} succeeded, {failed} failed");
    }
}

/// Progress reporter that says nothing. Used by tests and library callers.
pub struct SilentProgress;

impl CollectProgress for SilentProgress {
    fn on_ticker_start(&self, _ticker: &str, _index: usize, _total: usize) {}
    fn on_gap(&self, _ticker: &str, _gap: &DateInterval) {}
    fn on_ticker_complete(
        &self,
        _ticker: &str,
        _index: usize,
        _total: usize,
        _result: &Result<usize, DataError>,
    ) {
    }
    fn on_batch_complete(&self, _succeeded: usize, _failed: usize, _total: usize) {}
}
