//! Tiingo end-of-day price provider.
//!
//! Fetches adjusted OHLCV rows from Tiingo's daily prices endpoint in CSV
//! form. Handles token auth, rate limiting, retries with exponential backoff,
//! and the circuit breaker. Tiingo reports most request-level failures as a
//! plain-text body starting with "Error", not as an HTTP error status.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{DataError, EodProvider, EodRow, FetchResult};
use crate::domain::{DiscreteUnit, DATE_FORMAT};
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const BASE_URL: &str = "https://api.tiingo.com/tiingo/daily";

/// One CSV record from the daily prices endpoint. Unadjusted columns and
/// corporate-action columns (divCash, splitFactor) are ignored.
#[derive(Debug, Deserialize)]
struct PriceRecord {
    date: NaiveDate,
    #[serde(rename = "adjOpen")]
    adj_open: f64,
    #[serde(rename = "adjHigh")]
    adj_high: f64,
    #[serde(rename = "adjLow")]
    adj_low: f64,
    #[serde(rename = "adjClose")]
    adj_close: f64,
    #[serde(rename = "adjVolume")]
    adj_volume: f64,
}

/// Tiingo EOD data provider.
pub struct TiingoProvider {
    client: reqwest::blocking::Client,
    api_key: String,
    breaker: Arc<CircuitBreaker>,
    max_retries: u32,
    base_delay: Duration,
}

impl TiingoProvider {
    pub fn new(api_key: impl Into<String>, breaker: Arc<CircuitBreaker>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            api_key: api_key.into(),
            breaker,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }

    /// Build the prices URL for a ticker, range, and resampling unit.
    fn prices_url(ticker: &str, start: NaiveDate, stop: NaiveDate, unit: DiscreteUnit) -> String {
        format!(
            "{BASE_URL}/{ticker}/prices?startDate={}&endDate={}&resampleFreq={}&format=csv",
            start.format(DATE_FORMAT),
            stop.format(DATE_FORMAT),
            unit.resample_freq()
        )
    }

    /// Parse a CSV response body into rows.
    ///
    /// A header-only body is a successful empty fetch: Tiingo returns zero
    /// rows for ranges that fall entirely on non-trading days. Unknown
    /// tickers arrive as an `Error...` body instead.
    fn parse_csv(ticker: &str, body: &str) -> Result<Vec<EodRow>, DataError> {
        let trimmed = body.trim_start();
        if trimmed.starts_with("Error") {
            if trimmed.contains("not found") {
                return Err(DataError::TickerNotFound {
                    ticker: ticker.to_string(),
                });
            }
            return Err(DataError::ResponseFormatChanged(trimmed.to_string()));
        }

        let mut reader = csv::Reader::from_reader(body.as_bytes());
        let mut rows = Vec::new();
        for record in reader.deserialize::<PriceRecord>() {
            let record = record.map_err(|e| {
                DataError::ResponseFormatChanged(format!("bad CSV record for {ticker}: {e}"))
            })?;
            rows.push(EodRow {
                date: record.date,
                adj_open: record.adj_open,
                adj_high: record.adj_high,
                adj_low: record.adj_low,
                adj_close: record.adj_close,
                adj_volume: record.adj_volume,
            });
        }

        Ok(rows)
    }

    /// Execute the request with retry and circuit breaker logic.
    fn retrieve_with_retry(
        &self,
        ticker: &str,
        start: NaiveDate,
        stop: NaiveDate,
        unit: DiscreteUnit,
    ) -> Result<Vec<EodRow>, DataError> {
        if self.breaker.is_open() {
            return Err(DataError::CircuitBreakerTripped);
        }

        let url = Self::prices_url(ticker, start, stop, unit);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                std::thread::sleep(delay);
            }

            if self.breaker.is_open() {
                return Err(DataError::CircuitBreakerTripped);
            }

            let request = self
                .client
                .get(&url)
                .header("Content-Type", "application/json")
                .header("Authorization", format!("Token {}", self.api_key));

            match request.send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::FORBIDDEN {
                        self.breaker.force_open();
                        return Err(DataError::CircuitBreakerTripped);
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        self.breaker.note_failure();
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(60);
                        last_error = Some(DataError::RateLimited {
                            retry_after_secs: retry_after,
                        });
                        continue;
                    }

                    if status == reqwest::StatusCode::UNAUTHORIZED {
                        return Err(DataError::AuthenticationRejected(
                            "Tiingo rejected the API token".into(),
                        ));
                    }

                    if !status.is_success() {
                        self.breaker.note_failure();
                        last_error = Some(DataError::Other(format!("HTTP {status} for {ticker}")));
                        continue;
                    }

                    let body = resp.text().map_err(|e| {
                        DataError::ResponseFormatChanged(format!(
                            "failed to read response for {ticker}: {e}"
                        ))
                    })?;

                    let rows = Self::parse_csv(ticker, &body)?;
                    self.breaker.note_success();
                    return Ok(rows);
                }
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                        continue;
                    }
                    return Err(DataError::NetworkUnreachable(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

impl EodProvider for TiingoProvider {
    fn name(&self) -> &str {
        "tiingo"
    }

    fn retrieve(
        &self,
        ticker: &str,
        start: NaiveDate,
        stop: NaiveDate,
        unit: DiscreteUnit,
    ) -> Result<FetchResult, DataError> {
        let rows = self.retrieve_with_retry(ticker, start, stop, unit)?;
        Ok(FetchResult {
            ticker: ticker.to_string(),
            rows,
        })
    }

    fn is_available(&self) -> bool {
        !self.breaker.is_open()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CSV: &str = "\
date,close,high,low,open,volume,adjClose,adjHigh,adjLow,adjOpen,adjVolume,divCash,splitFactor
2020-01-02,300.35,300.6,295.19,296.24,33870100,297.83,298.08,292.71,293.75,33870100.0,0.0,1.0
2020-01-03,297.43,300.58,296.5,297.15,36580700,294.93,298.06,294.01,294.65,36580700.0,0.0,1.0
";

    #[test]
    fn parses_sample_csv() {
        let rows = TiingoProvider::parse_csv("AAPL", SAMPLE_CSV).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2020, 1, 2).unwrap());
        assert!((rows[0].adj_close - 297.83).abs() < 1e-9);
        assert!((rows[1].adj_open - 294.65).abs() < 1e-9);
    }

    #[test]
    fn error_body_maps_to_ticker_not_found() {
        let body = "Error: Ticker 'NOPE' not found";
        match TiingoProvider::parse_csv("NOPE", body) {
            Err(DataError::TickerNotFound { ticker }) => assert_eq!(ticker, "NOPE"),
            other => panic!("expected TickerNotFound, got {other:?}"),
        }
    }

    #[test]
    fn other_error_body_maps_to_format_change() {
        let body = "Error: You have run out of requests";
        assert!(matches!(
            TiingoProvider::parse_csv("AAPL", body),
            Err(DataError::ResponseFormatChanged(_))
        ));
    }

    #[test]
    fn header_only_body_is_a_successful_empty_fetch() {
        // A gap that lands entirely on non-trading days yields zero rows;
        // the range still has to count as collected.
        let rows = TiingoProvider::parse_csv(
            "AAPL",
            "date,adjOpen,adjHigh,adjLow,adjClose,adjVolume\n",
        )
        .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn provider_reports_its_name() {
        let provider = TiingoProvider::new(
            "test-token",
            Arc::new(CircuitBreaker::tiingo_default()),
        );
        assert_eq!(provider.name(), "tiingo");
        assert!(provider.is_available());
    }

    #[test]
    fn url_carries_range_and_resample_freq() {
        let url = TiingoProvider::prices_url(
            "AAPL",
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2020, 12, 31).unwrap(),
            DiscreteUnit::Month,
        );
        assert!(url.contains("/AAPL/prices?"));
        assert!(url.contains("startDate=2020-01-01"));
        assert!(url.contains("endDate=2020-12-31"));
        assert!(url.contains("resampleFreq=monthly"));
        assert!(url.contains("format=csv"));
    }
}
