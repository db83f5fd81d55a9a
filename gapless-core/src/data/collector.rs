//! Collection orchestrator — fetches only the date ranges not already held.
//!
//! Per ticker: load the persisted coverage set, compute
//! `requested − existing` to find the gaps, retrieve each gap from the
//! provider, persist the rows, and only then union the gap into coverage.
//! Coverage is written back after every gap, so a failure mid-batch never
//! loses ranges that were already collected and never records ranges that
//! were not.

use super::provider::{CollectProgress, DataError, EodProvider};
use super::store::EodStore;
use crate::domain::{DateInterval, DiscreteUnit};
use std::time::Duration;

/// Summary of a batch collection run.
#[derive(Debug)]
pub struct CollectSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub rows_written: usize,
    pub errors: Vec<(String, DataError)>,
}

impl CollectSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Summary of a batch deletion.
#[derive(Debug)]
pub struct DeleteSummary {
    pub total: usize,
    pub rows_removed: usize,
    pub records_deleted: usize,
}

/// Coordinates provider and store for gap-driven collection.
pub struct Collector<'a> {
    provider: &'a dyn EodProvider,
    store: &'a EodStore,
    pacing: Duration,
}

impl<'a> Collector<'a> {
    pub fn new(provider: &'a dyn EodProvider, store: &'a EodStore) -> Self {
        Self {
            provider,
            store,
            pacing: Duration::ZERO,
        }
    }

    /// Sleep this long between gap fetches (provider rate budgets).
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Collect `range` for every ticker, fetching only uncovered gaps.
    ///
    /// Re-collecting an already-covered range is a no-op: no requests are
    /// made and coverage is unchanged.
    pub fn collect(
        &self,
        tickers: &[&str],
        range: DateInterval,
        unit: DiscreteUnit,
        progress: &dyn CollectProgress,
    ) -> CollectSummary {
        let total = tickers.len();
        let mut succeeded = 0;
        let mut failed = 0;
        let mut rows_written = 0;
        let mut errors: Vec<(String, DataError)> = Vec::new();

        for (i, ticker) in tickers.iter().enumerate() {
            progress.on_ticker_start(ticker, i, total);

            let result = self.collect_one(ticker, range, unit, progress);
            progress.on_ticker_complete(ticker, i, total, &result);

            match result {
                Ok(rows) => {
                    succeeded += 1;
                    rows_written += rows;
                }
                Err(e) => {
                    errors.push((ticker.to_string(), e));
                    failed += 1;
                }
            }

            // Bail out early if the provider has been blocked
            if !self.provider.is_available() {
                for ticker in &tickers[(i + 1)..total] {
                    errors.push((ticker.to_string(), DataError::CircuitBreakerTripped));
                    failed += 1;
                }
                break;
            }
        }

        progress.on_batch_complete(succeeded, failed, total);

        CollectSummary {
            total,
            succeeded,
            failed,
            rows_written,
            errors,
        }
    }

    /// Collect one ticker: gaps → fetch → persist rows → widen coverage.
    fn collect_one(
        &self,
        ticker: &str,
        range: DateInterval,
        unit: DiscreteUnit,
        progress: &dyn CollectProgress,
    ) -> Result<usize, DataError> {
        let mut coverage = self.store.load_coverage(ticker, unit)?;
        let gaps = coverage.gaps(range);

        let mut written = 0;
        for (i, gap) in gaps.iter().enumerate() {
            progress.on_gap(ticker, gap);

            let fetched = self
                .provider
                .retrieve(ticker, gap.start(), gap.stop(), unit)?;
            written += self.store.append_rows(ticker, unit, &fetched.rows)?;

            // Coverage widens only after the rows are safely on disk
            coverage.insert(*gap);
            self.store.store_coverage(ticker, unit, &coverage)?;

            if !self.pacing.is_zero() && i + 1 < gaps.len() {
                std::thread::sleep(self.pacing);
            }
        }
        Ok(written)
    }

    /// Delete `range` for every ticker: rows first, then shrink coverage.
    ///
    /// A coverage set emptied by the deletion has its persisted record
    /// removed entirely.
    pub fn delete(
        &self,
        tickers: &[&str],
        range: DateInterval,
        unit: DiscreteUnit,
    ) -> Result<DeleteSummary, DataError> {
        let mut rows_removed = 0;
        let mut records_deleted = 0;

        for ticker in tickers {
            rows_removed += self.store.delete_rows(ticker, unit, range)?;

            let mut coverage = self.store.load_coverage(ticker, unit)?;
            if coverage.is_empty() {
                continue;
            }
            coverage.remove(range);
            if coverage.is_empty() {
                records_deleted += 1;
            }
            self.store.store_coverage(ticker, unit, &coverage)?;
        }

        Ok(DeleteSummary {
            total: tickers.len(),
            rows_removed,
            records_deleted,
        })
    }

    /// Shrink coverage by `range` without touching stored rows.
    ///
    /// Used to invalidate a previously-recorded range after a downstream
    /// failure, so the next collect re-fetches it.
    pub fn invalidate(
        &self,
        ticker: &str,
        range: DateInterval,
        unit: DiscreteUnit,
    ) -> Result<(), DataError> {
        let mut coverage = self.store.load_coverage(ticker, unit)?;
        if coverage.is_empty() {
            return Ok(());
        }
        coverage.remove(range);
        self.store.store_coverage(ticker, unit, &coverage)
    }
}
