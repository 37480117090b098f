//! Yahoo Finance price provider.
//!
//! Fetches daily adjusted closes from Yahoo's v8 chart API, one symbol per
//! request. Transient failures (connect errors, timeouts, 429, 5xx) are retried
//! with exponential backoff up to `max_retries` times; the default is zero.
//!
//! Yahoo Finance has no official API and is subject to unannounced format changes.

use super::provider::{DataError, FetchResult, PricePoint, PriceProvider};
use crate::config::ProviderSettings;
use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

const BASE_URL: &str = "https://query2.finance.yahoo.com";

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

/// Exchange metadata; `gmtoffset` is the exchange's UTC offset in seconds.
#[derive(Debug, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

/// What to do with an HTTP response status.
#[derive(Debug)]
enum StatusAction {
    /// Success; parse the body.
    Parse,
    /// Transient failure; try again if attempts remain.
    Retry(DataError),
    /// Permanent failure.
    Fail(DataError),
}

/// Map a chart API response status to the action the retry loop takes.
fn classify_status(
    status: reqwest::StatusCode,
    symbol: &str,
    retry_after_secs: Option<u64>,
) -> StatusAction {
    use reqwest::StatusCode;

    match status {
        s if s.is_success() => StatusAction::Parse,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            StatusAction::Fail(DataError::AccessDenied {
                status: status.as_u16(),
            })
        }
        StatusCode::NOT_FOUND => StatusAction::Fail(DataError::SymbolNotFound {
            symbol: symbol.to_string(),
        }),
        StatusCode::TOO_MANY_REQUESTS => StatusAction::Retry(DataError::RateLimited {
            retry_after_secs: retry_after_secs.unwrap_or(60),
        }),
        s if s.is_server_error() => {
            StatusAction::Retry(DataError::Other(format!("HTTP {status} for {symbol}")))
        }
        _ => StatusAction::Fail(DataError::Other(format!("HTTP {status} for {symbol}"))),
    }
}

/// Yahoo Finance price provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    base_url: String,
    max_retries: u32,
    base_delay: Duration,
}

impl YahooProvider {
    pub fn new(settings: &ProviderSettings) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: BASE_URL.to_string(),
            max_retries: settings.max_retries,
            base_delay: Duration::from_millis(settings.retry_base_delay_ms),
        })
    }

    /// Build the chart API URL for a symbol and an inclusive date range.
    fn chart_url(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        let start_ts = start.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
        let end_ts = (end + chrono::Duration::days(1))
            .and_time(chrono::NaiveTime::MIN)
            .and_utc()
            .timestamp()
            - 1;
        format!(
            "{}/v8/finance/chart/{symbol}\
             ?period1={start_ts}&period2={end_ts}&interval=1d\
             &includeAdjustedClose=true",
            self.base_url
        )
    }

    /// Parse the chart API response into price points.
    ///
    /// A response with no timestamps means the range held no trading days and
    /// yields an empty list rather than an error.
    fn parse_response(symbol: &str, resp: ChartResponse) -> Result<Vec<PricePoint>, DataError> {
        let result = resp.chart.result.ok_or_else(|| {
            if let Some(err) = resp.chart.error {
                if err.code == "Not Found" {
                    DataError::SymbolNotFound {
                        symbol: symbol.to_string(),
                    }
                } else {
                    DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
                }
            } else {
                DataError::ResponseFormatChanged("empty result with no error".into())
            }
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))?;

        let Some(timestamps) = data.timestamp else {
            return Ok(Vec::new());
        };
        // Session timestamps are UTC; dates are the exchange's local trading day.
        let gmtoffset = data.meta.map_or(0, |m| m.gmtoffset);

        let adj_closes = data
            .indicators
            .adjclose
            .and_then(|v| v.into_iter().next())
            .map(|a| a.adjclose)
            .ok_or_else(|| DataError::ResponseFormatChanged("no adjclose indicator".into()))?;

        let mut points: Vec<PricePoint> = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let date = ts
                .checked_add(gmtoffset)
                .and_then(|local| chrono::DateTime::from_timestamp(local, 0))
                .map(|dt| dt.naive_utc().date())
                .ok_or_else(|| {
                    DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
                })?;
            let adj_close = adj_closes.get(i).copied().flatten();

            // Intraday snapshots can repeat the last session's date; keep the latest.
            match points.last_mut() {
                Some(last) if last.date == date => last.adj_close = adj_close,
                _ => points.push(PricePoint { date, adj_close }),
            }
        }

        Ok(points)
    }

    /// Execute a single request, retrying transient failures.
    fn fetch_with_retry(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, DataError> {
        let url = self.chart_url(symbol, start, end);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                warn!(symbol, attempt, ?delay, "retrying Yahoo request");
                std::thread::sleep(delay);
            }

            debug!(symbol, %url, "GET");
            match self.client.get(&url).send() {
                Ok(resp) => {
                    let retry_after = resp
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok());

                    match classify_status(resp.status(), symbol, retry_after) {
                        StatusAction::Parse => {}
                        StatusAction::Retry(err) => {
                            last_error = Some(err);
                            continue;
                        }
                        StatusAction::Fail(err) => return Err(err),
                    }

                    let chart: ChartResponse = resp.json().map_err(|e| {
                        DataError::ResponseFormatChanged(format!(
                            "failed to parse response for {symbol}: {e}"
                        ))
                    })?;

                    return Self::parse_response(symbol, chart);
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

impl PriceProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        let points = self.fetch_with_retry(symbol, start, end)?;
        Ok(FetchResult {
            symbol: symbol.to_string(),
            points,
        })
    }
}
