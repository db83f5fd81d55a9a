//! File-backed EOD store with Hive-style partitioning.
//!
//! Layout: `{root}/ticker={TICKER}/{unit}.parquet` for rows, with a
//! `{unit}.coverage.json` sidecar per (ticker, unit) holding the serialized
//! sparsity mapping.
//!
//! Features:
//! - Atomic writes (write to .tmp, rename into place)
//! - Row appends deduplicate by date
//! - Quarantine for corrupt row files ({filename}.quarantined)
//! - Empty coverage deletes the record instead of storing `/`
//! - blake3 content hash of the stored rows in the sidecar

use super::provider::{DataError, EodRow};
use crate::domain::{CoverageSet, DateInterval, DiscreteUnit};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Persisted coverage record for one (ticker, unit) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageRecord {
    pub ticker: String,
    pub unit: DiscreteUnit,
    pub sparsity_mapping: String,
    pub row_count: usize,
    pub data_hash: String,
    pub updated_at: chrono::NaiveDateTime,
}

/// Coverage and row-count summary for one ticker.
#[derive(Debug, Clone)]
pub struct StoreStatus {
    pub ticker: String,
    pub records: Vec<CoverageRecord>,
}

/// The EOD store.
pub struct EodStore {
    root: PathBuf,
}

impl EodStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the store root if it does not exist yet.
    pub fn provision(&self) -> Result<(), DataError> {
        fs::create_dir_all(&self.root)
            .map_err(|e| DataError::StoreError(format!("failed to create store root: {e}")))
    }

    /// Directory for a ticker: `{root}/ticker={TICKER}/`
    fn ticker_dir(&self, ticker: &str) -> PathBuf {
        self.root.join(format!("ticker={ticker}"))
    }

    fn rows_path(&self, ticker: &str, unit: DiscreteUnit) -> PathBuf {
        self.ticker_dir(ticker).join(format!("{unit}.parquet"))
    }

    fn coverage_path(&self, ticker: &str, unit: DiscreteUnit) -> PathBuf {
        self.ticker_dir(ticker).join(format!("{unit}.coverage.json"))
    }

    /// Load the coverage set for a (ticker, unit) pair.
    ///
    /// A missing record is the empty set — the record is only created once
    /// the first collection succeeds.
    pub fn load_coverage(
        &self,
        ticker: &str,
        unit: DiscreteUnit,
    ) -> Result<CoverageSet, DataError> {
        match self.coverage_record(ticker, unit)? {
            None => Ok(CoverageSet::empty(unit)),
            Some(record) => Ok(CoverageSet::parse(&record.sparsity_mapping, unit)?),
        }
    }

    /// Read the raw coverage sidecar, if present.
    pub fn coverage_record(
        &self,
        ticker: &str,
        unit: DiscreteUnit,
    ) -> Result<Option<CoverageRecord>, DataError> {
        let path = self.coverage_path(ticker, unit);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .map_err(|e| DataError::StoreError(format!("coverage read: {e}")))?;
        let record = serde_json::from_str(&content)
            .map_err(|e| DataError::StoreError(format!("coverage sidecar parse: {e}")))?;
        Ok(Some(record))
    }

    /// Persist a coverage set, serializing through the string form.
    ///
    /// An empty set deletes the record outright rather than storing `/`.
    pub fn store_coverage(
        &self,
        ticker: &str,
        unit: DiscreteUnit,
        coverage: &CoverageSet,
    ) -> Result<(), DataError> {
        let path = self.coverage_path(ticker, unit);
        if coverage.is_empty() {
            if path.exists() {
                fs::remove_file(&path)
                    .map_err(|e| DataError::StoreError(format!("coverage delete: {e}")))?;
            }
            return Ok(());
        }

        let rows = self.read_rows_file(ticker, unit)?;
        let record = CoverageRecord {
            ticker: ticker.to_string(),
            unit,
            sparsity_mapping: coverage.to_string(),
            row_count: rows.len(),
            data_hash: hash_rows(&rows)?,
            updated_at: chrono::Local::now().naive_local(),
        };

        let json = serde_json::to_string_pretty(&record)
            .map_err(|e| DataError::StoreError(format!("coverage serialization: {e}")))?;

        fs::create_dir_all(self.ticker_dir(ticker))
            .map_err(|e| DataError::StoreError(format!("failed to create dir: {e}")))?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| DataError::StoreError(format!("coverage write: {e}")))?;
        fs::rename(&tmp, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            DataError::StoreError(format!("atomic rename failed: {e}"))
        })?;
        Ok(())
    }

    /// Append rows for a (ticker, unit) pair, deduplicating by date.
    ///
    /// Rows at dates already present overwrite the stored row. Returns the
    /// number of dates that were new.
    pub fn append_rows(
        &self,
        ticker: &str,
        unit: DiscreteUnit,
        rows: &[EodRow],
    ) -> Result<usize, DataError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let existing = self.read_rows_file(ticker, unit)?;
        let before = existing.len();

        let mut by_date: BTreeMap<chrono::NaiveDate, EodRow> = existing
            .into_iter()
            .map(|row| (row.date, row))
            .collect();
        for row in rows {
            by_date.insert(row.date, row.clone());
        }
        let added = by_date.len() - before;

        let merged: Vec<EodRow> = by_date.into_values().collect();
        self.write_rows_file(ticker, unit, &merged)?;
        Ok(added)
    }

    /// Delete every stored row whose date falls inside `range`.
    ///
    /// Returns the number of rows removed. Removes the row file entirely if
    /// nothing is left.
    pub fn delete_rows(
        &self,
        ticker: &str,
        unit: DiscreteUnit,
        range: DateInterval,
    ) -> Result<usize, DataError> {
        let existing = self.read_rows_file(ticker, unit)?;
        if existing.is_empty() {
            return Ok(0);
        }

        let before = existing.len();
        let kept: Vec<EodRow> = existing
            .into_iter()
            .filter(|row| !range.contains(row.date))
            .collect();
        let removed = before - kept.len();

        if kept.is_empty() {
            let path = self.rows_path(ticker, unit);
            fs::remove_file(&path)
                .map_err(|e| DataError::StoreError(format!("row file delete: {e}")))?;
        } else if removed > 0 {
            self.write_rows_file(ticker, unit, &kept)?;
        }
        Ok(removed)
    }

    /// Load all stored rows for a (ticker, unit) pair, ascending by date.
    pub fn load_rows(&self, ticker: &str, unit: DiscreteUnit) -> Result<Vec<EodRow>, DataError> {
        let rows = self.read_rows_file(ticker, unit)?;
        if rows.is_empty() {
            return Err(DataError::NoCollectedData {
                ticker: ticker.to_string(),
            });
        }
        Ok(rows)
    }

    /// Coverage summary across all units for the given tickers.
    ///
    /// An unreadable sidecar is reported on stderr and skipped, so one
    /// corrupt record cannot hide the rest of the summary.
    pub fn status(&self, tickers: &[&str]) -> Vec<StoreStatus> {
        tickers
            .iter()
            .map(|ticker| {
                let records = DiscreteUnit::ALL
                    .into_iter()
                    .filter_map(|unit| match self.coverage_record(ticker, unit) {
                        Ok(record) => record,
                        Err(e) => {
                            eprintln!(
                                "WARNING: unreadable coverage record for {ticker} ({unit}): {e}"
                            );
                            None
                        }
                    })
                    .collect();
                StoreStatus {
                    ticker: ticker.to_string(),
                    records,
                }
            })
            .collect()
    }

    /// Read the row file, quarantining it if corrupt. Missing file is empty.
    fn read_rows_file(&self, ticker: &str, unit: DiscreteUnit) -> Result<Vec<EodRow>, DataError> {
        let path = self.rows_path(ticker, unit);
        if !path.exists() {
            return Ok(Vec::new());
        }
        match load_parquet_rows(&path) {
            Ok(rows) => Ok(rows),
            Err(e) => {
                let quarantine = path.with_extension("parquet.quarantined");
                eprintln!(
                    "WARNING: quarantining corrupt row file {}: {e}",
                    path.display()
                );
                let _ = fs::rename(&path, &quarantine);
                Ok(Vec::new())
            }
        }
    }

    fn write_rows_file(
        &self,
        ticker: &str,
        unit: DiscreteUnit,
        rows: &[EodRow],
    ) -> Result<(), DataError> {
        fs::create_dir_all(self.ticker_dir(ticker))
            .map_err(|e| DataError::StoreError(format!("failed to create dir: {e}")))?;

        let df = rows_to_dataframe(rows)?;
        let path = self.rows_path(ticker, unit);
        let tmp = path.with_extension("parquet.tmp");

        write_parquet(&df, &tmp)?;
        fs::rename(&tmp, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            DataError::StoreError(format!("atomic rename failed: {e}"))
        })?;
        Ok(())
    }
}

fn hash_rows(rows: &[EodRow]) -> Result<String, DataError> {
    let bytes = serde_json::to_vec(rows)
        .map_err(|e| DataError::StoreError(format!("hash serialization: {e}")))?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn epoch() -> chrono::NaiveDate {
    chrono::NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()
}

/// Convert rows to a Polars DataFrame.
fn rows_to_dataframe(rows: &[EodRow]) -> Result<DataFrame, DataError> {
    let dates: Vec<i32> = rows
        .iter()
        .map(|r| (r.date - epoch()).num_days() as i32)
        .collect();
    let opens: Vec<f64> = rows.iter().map(|r| r.adj_open).collect();
    let highs: Vec<f64> = rows.iter().map(|r| r.adj_high).collect();
    let lows: Vec<f64> = rows.iter().map(|r| r.adj_low).collect();
    let closes: Vec<f64> = rows.iter().map(|r| r.adj_close).collect();
    let volumes: Vec<f64> = rows.iter().map(|r| r.adj_volume).collect();

    DataFrame::new(vec![
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| DataError::ParquetError(format!("date cast: {e}")))?,
        Column::new("adj_open".into(), opens),
        Column::new("adj_high".into(), highs),
        Column::new("adj_low".into(), lows),
        Column::new("adj_close".into(), closes),
        Column::new("adj_volume".into(), volumes),
    ])
    .map_err(|e| DataError::ParquetError(format!("dataframe creation: {e}")))
}

/// Write a DataFrame to a Parquet file.
fn write_parquet(df: &DataFrame, path: &Path) -> Result<(), DataError> {
    let file =
        fs::File::create(path).map_err(|e| DataError::ParquetError(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(&mut df.clone())
        .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))?;
    Ok(())
}

/// Load a Parquet row file and validate its shape.
fn load_parquet_rows(path: &Path) -> Result<Vec<EodRow>, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::ParquetError(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::ParquetError(format!("read: {e}")))?;

    if df.height() == 0 {
        return Err(DataError::StoreError("empty parquet file".into()));
    }
    for col_name in ["date", "adj_open", "adj_high", "adj_low", "adj_close", "adj_volume"] {
        if df.column(col_name).is_err() {
            return Err(DataError::StoreError(format!("missing column '{col_name}'")));
        }
    }

    dataframe_to_rows(&df)
}

/// Convert a DataFrame back to rows.
fn dataframe_to_rows(df: &DataFrame) -> Result<Vec<EodRow>, DataError> {
    let map_err = |e: PolarsError| DataError::ParquetError(format!("column read: {e}"));

    let date_ca = df
        .column("date")
        .map_err(map_err)?
        .date()
        .map_err(|e| DataError::ParquetError(format!("date column type: {e}")))?;
    let f64_col = |name: &str| -> Result<Float64Chunked, DataError> {
        df.column(name)
            .map_err(map_err)?
            .f64()
            .map_err(|e| DataError::ParquetError(format!("{name} column type: {e}")))
            .map(|ca| ca.clone())
    };
    let open_ca = f64_col("adj_open")?;
    let high_ca = f64_col("adj_high")?;
    let low_ca = f64_col("adj_low")?;
    let close_ca = f64_col("adj_close")?;
    let vol_ca = f64_col("adj_volume")?;

    let n = df.height();
    let mut rows = Vec::with_capacity(n);
    for i in 0..n {
        let date_days = date_ca
            .get(i)
            .ok_or_else(|| DataError::ParquetError(format!("null date at row {i}")))?;
        let date = epoch() + chrono::Duration::days(date_days as i64);

        rows.push(EodRow {
            date,
            adj_open: open_ca.get(i).unwrap_or(f64::NAN),
            adj_high: high_ca.get(i).unwrap_or(f64::NAN),
            adj_low: low_ca.get(i).unwrap_or(f64::NAN),
            adj_close: close_ca.get(i).unwrap_or(f64::NAN),
            adj_volume: vol_ca.get(i).unwrap_or(f64::NAN),
        });
    }

    rows.sort_by_key(|r| r.date);
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::env;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_store_root() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = env::temp_dir().join(format!("gapless_store_test_{}_{id}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn row(date: NaiveDate, close: f64) -> EodRow {
        EodRow {
            date,
            adj_open: close - 1.0,
            adj_high: close + 1.0,
            adj_low: close - 2.0,
            adj_close: close,
            adj_volume: 1_000.0,
        }
    }

    #[test]
    fn append_and_load_roundtrip() {
        let root = temp_store_root();
        let store = EodStore::new(&root);

        let rows = vec![row(d(2020, 1, 2), 100.0), row(d(2020, 1, 3), 101.0)];
        let added = store.append_rows("AAPL", DiscreteUnit::Day, &rows).unwrap();
        assert_eq!(added, 2);

        let loaded = store.load_rows("AAPL", DiscreteUnit::Day).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].date, d(2020, 1, 2));
        assert!((loaded[1].adj_close - 101.0).abs() < 1e-9);

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn append_deduplicates_by_date() {
        let root = temp_store_root();
        let store = EodStore::new(&root);

        store
            .append_rows("AAPL", DiscreteUnit::Day, &[row(d(2020, 1, 2), 100.0)])
            .unwrap();
        let added = store
            .append_rows(
                "AAPL",
                DiscreteUnit::Day,
                &[row(d(2020, 1, 2), 105.0), row(d(2020, 1, 3), 101.0)],
            )
            .unwrap();
        assert_eq!(added, 1);

        let loaded = store.load_rows("AAPL", DiscreteUnit::Day).unwrap();
        assert_eq!(loaded.len(), 2);
        // The re-appended row wins
        assert!((loaded[0].adj_close - 105.0).abs() < 1e-9);

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn load_missing_ticker_returns_clear_error() {
        let root = temp_store_root();
        let store = EodStore::new(&root);

        match store.load_rows("NONEXISTENT", DiscreteUnit::Day) {
            Err(DataError::NoCollectedData { ticker }) => assert_eq!(ticker, "NONEXISTENT"),
            other => panic!("expected NoCollectedData, got {other:?}"),
        }

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn coverage_roundtrips_through_string_form() {
        let root = temp_store_root();
        let store = EodStore::new(&root);

        let coverage =
            CoverageSet::parse("/2020-01-01|2020-06-30/2020-09-01|2020-12-31", DiscreteUnit::Day)
                .unwrap();
        store
            .store_coverage("AAPL", DiscreteUnit::Day, &coverage)
            .unwrap();

        let loaded = store.load_coverage("AAPL", DiscreteUnit::Day).unwrap();
        assert_eq!(loaded, coverage);

        let record = store
            .coverage_record("AAPL", DiscreteUnit::Day)
            .unwrap()
            .unwrap();
        assert_eq!(
            record.sparsity_mapping,
            "/2020-01-01|2020-06-30/2020-09-01|2020-12-31"
        );

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn missing_coverage_is_the_empty_set() {
        let root = temp_store_root();
        let store = EodStore::new(&root);

        let coverage = store.load_coverage("AAPL", DiscreteUnit::Day).unwrap();
        assert!(coverage.is_empty());

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn empty_coverage_deletes_the_record() {
        let root = temp_store_root();
        let store = EodStore::new(&root);

        let coverage = CoverageSet::parse("/2020-01-01|2020-01-31", DiscreteUnit::Day).unwrap();
        store
            .store_coverage("AAPL", DiscreteUnit::Day, &coverage)
            .unwrap();
        assert!(store
            .coverage_record("AAPL", DiscreteUnit::Day)
            .unwrap()
            .is_some());

        store
            .store_coverage("AAPL", DiscreteUnit::Day, &CoverageSet::empty(DiscreteUnit::Day))
            .unwrap();
        assert!(store
            .coverage_record("AAPL", DiscreteUnit::Day)
            .unwrap()
            .is_none());

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn units_are_stored_separately() {
        let root = temp_store_root();
        let store = EodStore::new(&root);

        store
            .append_rows("AAPL", DiscreteUnit::Day, &[row(d(2020, 1, 2), 100.0)])
            .unwrap();
        store
            .append_rows("AAPL", DiscreteUnit::Month, &[row(d(2020, 1, 31), 102.0)])
            .unwrap();

        assert_eq!(store.load_rows("AAPL", DiscreteUnit::Day).unwrap().len(), 1);
        assert_eq!(
            store.load_rows("AAPL", DiscreteUnit::Month).unwrap().len(),
            1
        );

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn delete_rows_filters_the_range() {
        let root = temp_store_root();
        let store = EodStore::new(&root);

        let rows: Vec<EodRow> = (2..=6).map(|day| row(d(2020, 1, day), 100.0)).collect();
        store.append_rows("AAPL", DiscreteUnit::Day, &rows).unwrap();

        let removed = store
            .delete_rows(
                "AAPL",
                DiscreteUnit::Day,
                DateInterval::new(d(2020, 1, 3), d(2020, 1, 5)).unwrap(),
            )
            .unwrap();
        assert_eq!(removed, 3);

        let remaining = store.load_rows("AAPL", DiscreteUnit::Day).unwrap();
        let dates: Vec<NaiveDate> = remaining.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![d(2020, 1, 2), d(2020, 1, 6)]);

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn delete_all_rows_removes_the_file() {
        let root = temp_store_root();
        let store = EodStore::new(&root);

        store
            .append_rows("AAPL", DiscreteUnit::Day, &[row(d(2020, 1, 2), 100.0)])
            .unwrap();
        store
            .delete_rows(
                "AAPL",
                DiscreteUnit::Day,
                DateInterval::new(d(2020, 1, 1), d(2020, 1, 31)).unwrap(),
            )
            .unwrap();

        assert!(matches!(
            store.load_rows("AAPL", DiscreteUnit::Day),
            Err(DataError::NoCollectedData { .. })
        ));

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn status_reports_coverage_per_ticker() {
        let root = temp_store_root();
        let store = EodStore::new(&root);

        let coverage = CoverageSet::parse("/2020-01-01|2020-01-31", DiscreteUnit::Day).unwrap();
        store
            .store_coverage("AAPL", DiscreteUnit::Day, &coverage)
            .unwrap();

        let statuses = store.status(&["AAPL", "MSFT"]);
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].records.len(), 1);
        assert_eq!(statuses[0].records[0].sparsity_mapping, "/2020-01-01|2020-01-31");
        assert!(statuses[1].records.is_empty());

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn status_skips_corrupt_sidecar_but_keeps_readable_records() {
        let root = temp_store_root();
        let store = EodStore::new(&root);

        let coverage = CoverageSet::parse("/2020-01-01|2020-01-31", DiscreteUnit::Month).unwrap();
        store
            .store_coverage("AAPL", DiscreteUnit::Month, &coverage)
            .unwrap();

        // Clobber the day sidecar with garbage
        let day_sidecar = root.join("ticker=AAPL").join("day.coverage.json");
        fs::write(&day_sidecar, "not json {{{").unwrap();
        assert!(store.coverage_record("AAPL", DiscreteUnit::Day).is_err());

        let statuses = store.status(&["AAPL"]);
        assert_eq!(statuses.len(), 1);
        // The corrupt day record is dropped, the month record survives
        assert_eq!(statuses[0].records.len(), 1);
        assert_eq!(statuses[0].records[0].unit, DiscreteUnit::Month);

        let _ = fs::remove_dir_all(&root);
    }
}
