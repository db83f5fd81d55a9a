//! Gapless CLI — collect, delete, and status commands.
//!
//! Commands:
//! - `collect` — fetch EOD data from Tiingo for the uncovered parts of a range
//! - `delete` — remove stored rows and shrink coverage over a range
//! - `status` — report per-ticker coverage, row counts, and store size

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use gapless_core::data::{
    CircuitBreaker, Collector, CollectorConfig, DataError, EodProvider, EodStore, FetchResult,
    StdoutProgress, TiingoProvider,
};
use gapless_core::domain::{DateInterval, DiscreteUnit, DATE_FORMAT};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "gapless",
    about = "Gapless CLI — sparse EOD data collection with coverage tracking"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch EOD data from Tiingo for the uncovered parts of a date range.
    Collect {
        /// Tickers to collect (e.g., AAPL MSFT SPY).
        #[arg(required = true)]
        tickers: Vec<String>,

        /// Start date (YYYY-MM-DD). Defaults to 5 years ago.
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        end: Option<String>,

        /// Resampling unit: day, month, or year.
        #[arg(long, default_value = "day")]
        unit: String,

        /// Path to a TOML config file (data_dir, api_key, request_delay_ms).
        #[arg(long)]
        config: Option<PathBuf>,

        /// Store directory. Overrides the config file.
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Remove stored rows and shrink coverage over a date range.
    Delete {
        /// Tickers to delete from.
        #[arg(required = true)]
        tickers: Vec<String>,

        /// Start date (YYYY-MM-DD).
        #[arg(long)]
        start: String,

        /// End date (YYYY-MM-DD).
        #[arg(long)]
        end: String,

        /// Resampling unit: day, month, or year.
        #[arg(long, default_value = "day")]
        unit: String,

        /// Store directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
    },
    /// Report per-ticker coverage, row counts, and store size.
    Status {
        /// Tickers to report. Defaults to every ticker in the store.
        tickers: Vec<String>,

        /// Store directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Collect {
            tickers,
            start,
            end,
            unit,
            config,
            data_dir,
        } => run_collect(tickers, start, end, &unit, config, data_dir),
        Commands::Delete {
            tickers,
            start,
            end,
            unit,
            data_dir,
        } => run_delete(tickers, &start, &end, &unit, data_dir),
        Commands::Status { tickers, data_dir } => run_status(tickers, &data_dir),
    }
}

/// Stand-in provider for commands that never fetch (delete, status).
struct NoProvider;

impl EodProvider for NoProvider {
    fn name(&self) -> &str {
        "none"
    }

    fn retrieve(
        &self,
        ticker: &str,
        _start: NaiveDate,
        _stop: NaiveDate,
        _unit: DiscreteUnit,
    ) -> std::result::Result<FetchResult, DataError> {
        Err(DataError::Other(format!(
            "no provider configured for {ticker}"
        )))
    }

    fn is_available(&self) -> bool {
        false
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).with_context(|| format!("invalid date '{s}'"))
}

fn parse_unit(s: &str) -> Result<DiscreteUnit> {
    s.parse::<DiscreteUnit>().map_err(|e| anyhow::anyhow!(e))
}

fn run_collect(
    tickers: Vec<String>,
    start: Option<String>,
    end: Option<String>,
    unit: &str,
    config_path: Option<PathBuf>,
    data_dir: Option<PathBuf>,
) -> Result<()> {
    let unit = parse_unit(unit)?;

    let start_date = start
        .as_deref()
        .map(parse_date)
        .transpose()?
        .unwrap_or_else(|| chrono::Local::now().date_naive() - chrono::Duration::days(365 * 5));
    let end_date = end
        .as_deref()
        .map(parse_date)
        .transpose()?
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let range = DateInterval::new(start_date, end_date)
        .with_context(|| format!("invalid range {start_date} to {end_date}"))?;

    let mut config = match config_path {
        Some(path) => CollectorConfig::from_toml_file(&path)?,
        None => CollectorConfig::default(),
    };
    if let Some(dir) = data_dir {
        config.data_dir = dir;
    }
    let api_key = config.resolve_api_key()?;

    let store = EodStore::new(&config.data_dir);
    store.provision()?;

    let breaker = Arc::new(CircuitBreaker::tiingo_default());
    let provider = TiingoProvider::new(api_key, breaker);
    let collector = Collector::new(&provider, &store).with_pacing(config.request_delay());

    println!(
        "Collecting {} ticker(s) from {} into {} ({unit} resolution)",
        tickers.len(),
        provider.name(),
        config.data_dir.display()
    );

    let ticker_refs: Vec<&str> = tickers.iter().map(|t| t.as_str()).collect();
    let summary = collector.collect(&ticker_refs, range, unit, &StdoutProgress);

    if !summary.all_succeeded() {
        for (ticker, err) in &summary.errors {
            eprintln!("Error for {ticker}: {err}");
        }
        std::process::exit(1);
    }

    Ok(())
}

fn run_delete(
    tickers: Vec<String>,
    start: &str,
    end: &str,
    unit: &str,
    data_dir: PathBuf,
) -> Result<()> {
    let unit = parse_unit(unit)?;
    let start_date = parse_date(start)?;
    let end_date = parse_date(end)?;
    let range = DateInterval::new(start_date, end_date)
        .with_context(|| format!("invalid range {start_date} to {end_date}"))?;

    if !data_dir.exists() {
        bail!("store directory does not exist: {}", data_dir.display());
    }

    let store = EodStore::new(&data_dir);
    let ticker_refs: Vec<&str> = tickers.iter().map(|t| t.as_str()).collect();

    // Deletes never hit the network, so no provider is configured
    let collector = Collector::new(&NoProvider, &store);
    let summary = collector.delete(&ticker_refs, range, unit)?;

    println!(
        "Deleted {} row(s) across {} ticker(s); {} coverage record(s) removed entirely.",
        summary.rows_removed, summary.total, summary.records_deleted
    );
    Ok(())
}

fn run_status(tickers: Vec<String>, data_dir: &Path) -> Result<()> {
    if !data_dir.exists() {
        println!("Store directory does not exist: {}", data_dir.display());
        return Ok(());
    }

    let tickers = if tickers.is_empty() {
        discover_tickers(data_dir)?
    } else {
        tickers
    };
    if tickers.is_empty() {
        println!("Store is empty: {}", data_dir.display());
        return Ok(());
    }

    let store = EodStore::new(data_dir);
    let ticker_refs: Vec<&str> = tickers.iter().map(|t| t.as_str()).collect();
    let statuses = store.status(&ticker_refs);

    let total_size = dir_size_recursive(data_dir);
    println!("Store: {}", data_dir.display());
    println!("Tickers: {}", statuses.len());
    println!("Total size: {}", format_size(total_size));
    println!();
    println!("{:<8} {:<7} {:>8} {}", "Ticker", "Unit", "Rows", "Coverage");
    println!("{}", "-".repeat(60));
    for status in &statuses {
        if status.records.is_empty() {
            println!("{:<8} (no coverage)", status.ticker);
            continue;
        }
        for record in &status.records {
            println!(
                "{:<8} {:<7} {:>8} {}",
                status.ticker, record.unit, record.row_count, record.sparsity_mapping
            );
        }
    }

    Ok(())
}

/// Every `ticker=` partition directory under the store root, sorted.
fn discover_tickers(data_dir: &Path) -> Result<Vec<String>> {
    let mut tickers = Vec::new();
    for entry in std::fs::read_dir(data_dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if let Some(ticker) = name.strip_prefix("ticker=") {
            tickers.push(ticker.to_string());
        }
    }
    tickers.sort();
    Ok(tickers)
}

fn dir_size_recursive(path: &Path) -> u64 {
    let mut size = 0u64;
    if let Ok(entries) = std::fs::read_dir(path) {
        for entry in entries.flatten() {
            if let Ok(meta) = entry.metadata() {
                if meta.is_dir() {
                    size += dir_size_recursive(&entry.path());
                } else {
                    size += meta.len();
                }
            }
        }
    }
    size
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
