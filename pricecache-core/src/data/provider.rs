//! Price provider trait and structured error types.
//!
//! The PriceProvider trait abstracts over the remote source so the pipeline
//! can run against Yahoo Finance in production and a scripted provider in tests.

use crate::table::PriceTable;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// One adjusted-close observation returned by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    /// Absent when the source reports the date but no adjusted close.
    pub adj_close: Option<f64>,
}

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("ticker list error: {0}")]
    Portfolio(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("access denied by provider (HTTP {status})")]
    AccessDenied { status: u16 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("provider returned no prices for {start}..={end}")]
    EmptyFetch { start: NaiveDate, end: NaiveDate },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("parquet I/O error: {0}")]
    Parquet(String),

    #[error("no cached snapshot at {path}")]
    NoCachedData { path: String },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("data error: {0}")]
    Other(String),
}

/// Result of a successful fetch for a single symbol.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub symbol: String,
    pub points: Vec<PricePoint>,
}

/// Source of adjusted-close history.
///
/// Implementations fetch one symbol at a time; `fetch_table` assembles the
/// per-symbol results into a date-indexed price table.
pub trait PriceProvider {
    /// Human-readable name, recorded in snapshot metadata.
    fn name(&self) -> &str;

    /// Fetch daily adjusted closes for a symbol over `[start, end]`.
    fn fetch(&self, symbol: &str, start: NaiveDate, end: NaiveDate)
        -> Result<FetchResult, DataError>;

    /// Fetch every ticker and join them on the union of their dates.
    ///
    /// Any single failure aborts the whole fetch. A ticker with no rows in the
    /// range still gets a column, entirely absent.
    fn fetch_table(
        &self,
        tickers: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceTable, DataError> {
        let mut series = Vec::with_capacity(tickers.len());
        for ticker in tickers {
            let result = self.fetch(ticker, start, end)?;
            if result.points.is_empty() {
                warn!(ticker = %ticker, %start, %end, "provider returned no rows");
            } else {
                debug!(ticker = %ticker, rows = result.points.len(), "fetched");
            }
            let points = result
                .points
                .into_iter()
                .map(|p| (p.date, p.adj_close))
                .collect::<Vec<_>>();
            series.push((ticker.clone(), points));
        }
        PriceTable::from_series(series)
    }
}
