//! Pipeline configuration and the ticker list.
//!
//! Settings come from an optional TOML file; every key has a default so an
//! absent file runs the fixed pipeline. The ticker list is read from a CSV with
//! a `Ticker` column. Both are loaded once at startup into a [`Config`] that is
//! passed by reference through every stage.

use crate::data::provider::DataError;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Column holding symbols in the portfolio CSV.
pub const TICKER_COLUMN: &str = "Ticker";

/// Upper bound for day-count settings, about a century.
pub const MAX_WINDOW_DAYS: i64 = 100 * 366;

/// Settings for the pipeline stages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding the Parquet snapshots.
    pub data_dir: PathBuf,
    /// CSV listing the tickers to track.
    pub portfolio_file: PathBuf,
    /// Length of the initial history fetch, in calendar days.
    pub history_days: i64,
    /// Cached prices older than this many days trigger an incremental fetch.
    pub stale_after_days: i64,
    pub provider: ProviderSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            portfolio_file: PathBuf::from("data/portfolio.csv"),
            history_days: 5 * 365,
            stale_after_days: 2,
            provider: ProviderSettings::default(),
        }
    }
}

/// HTTP settings for the remote provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderSettings {
    pub timeout_secs: u64,
    /// Retries for transient failures. Zero means a failed request is fatal.
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 0,
            retry_base_delay_ms: 500,
        }
    }
}

impl PipelineConfig {
    /// Load settings from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, DataError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DataError::Config(format!("read {}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    /// Parse settings from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, DataError> {
        let config: Self =
            toml::from_str(content).map_err(|e| DataError::Config(format!("parse TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), DataError> {
        if !(1..=MAX_WINDOW_DAYS).contains(&self.history_days) {
            return Err(DataError::Config(format!(
                "history_days must be between 1 and {MAX_WINDOW_DAYS}"
            )));
        }
        if !(0..=MAX_WINDOW_DAYS).contains(&self.stale_after_days) {
            return Err(DataError::Config(format!(
                "stale_after_days must be between 0 and {MAX_WINDOW_DAYS}"
            )));
        }
        Ok(())
    }
}

/// Everything a run needs, loaded once at process start.
#[derive(Debug, Clone)]
pub struct Config {
    pub settings: PipelineConfig,
    pub tickers: Vec<String>,
}

impl Config {
    /// Read the ticker list named by `settings`.
    pub fn load(settings: PipelineConfig) -> Result<Self, DataError> {
        let tickers = read_ticker_list(&settings.portfolio_file)?;
        Ok(Self { settings, tickers })
    }
}

/// Read tickers from the `Ticker` column of a CSV file.
pub fn read_ticker_list(path: &Path) -> Result<Vec<String>, DataError> {
    let file = std::fs::File::open(path)
        .map_err(|e| DataError::Portfolio(format!("open {}: {e}", path.display())))?;
    parse_ticker_list(file)
}

/// Parse tickers from CSV data, preserving file order.
///
/// Blank cells are skipped; a repeated ticker keeps its first position.
pub fn parse_ticker_list<R: Read>(reader: R) -> Result<Vec<String>, DataError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|e| DataError::Portfolio(format!("read header: {e}")))?;
    let idx = headers
        .iter()
        .position(|h| h == TICKER_COLUMN)
        .ok_or_else(|| DataError::Portfolio(format!("missing column '{TICKER_COLUMN}'")))?;

    let mut tickers: Vec<String> = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        let record =
            record.map_err(|e| DataError::Portfolio(format!("record {}: {e}", line + 1)))?;
        let Some(ticker) = record.get(idx).filter(|t| !t.is_empty()) else {
            continue;
        };
        if !tickers.iter().any(|t| t == ticker) {
            tickers.push(ticker.to_string());
        }
    }

    if tickers.is_empty() {
        return Err(DataError::Portfolio("ticker list is empty".into()));
    }
    Ok(tickers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = PipelineConfig::from_toml("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.history_days, 1825);
        assert_eq!(config.stale_after_days, 2);
        assert_eq!(config.provider.max_retries, 0);
    }

    #[test]
    fn partial_toml_overrides_keys() {
        let config = PipelineConfig::from_toml(
            r#"
data_dir = "/tmp/prices"
stale_after_days = 4

[provider]
max_retries = 3
"#,
        )
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/prices"));
        assert_eq!(config.stale_after_days, 4);
        assert_eq!(config.provider.max_retries, 3);
        assert_eq!(config.provider.timeout_secs, 30);
    }

    #[test]
    fn rejects_non_positive_history() {
        assert!(matches!(
            PipelineConfig::from_toml("history_days = 0"),
            Err(DataError::Config(_))
        ));
    }

    #[test]
    fn rejects_out_of_range_history() {
        assert!(matches!(
            PipelineConfig::from_toml("history_days = 1000000000"),
            Err(DataError::Config(_))
        ));
        let max = format!("history_days = {MAX_WINDOW_DAYS}");
        assert!(PipelineConfig::from_toml(&max).is_ok());
    }

    #[test]
    fn rejects_out_of_range_staleness() {
        assert!(matches!(
            PipelineConfig::from_toml("stale_after_days = 1000000000"),
            Err(DataError::Config(_))
        ));
        assert!(matches!(
            PipelineConfig::from_toml("stale_after_days = -1"),
            Err(DataError::Config(_))
        ));
    }

    #[test]
    fn parses_ticker_column() {
        let csv = "Name,Ticker,Weight\nApple, AAPL ,0.5\nAlphabet,GOOGL,0.3\nBlank,,0.1\nApple again,AAPL,0.1\n";
        let tickers = parse_ticker_list(csv.as_bytes()).unwrap();
        assert_eq!(tickers, vec!["AAPL", "GOOGL"]);
    }

    #[test]
    fn missing_ticker_column_is_an_error() {
        let err = parse_ticker_list("Symbol\nAAPL\n".as_bytes()).unwrap_err();
        assert!(matches!(err, DataError::Portfolio(msg) if msg.contains("Ticker")));
    }

    #[test]
    fn empty_ticker_list_is_an_error() {
        assert!(parse_ticker_list("Ticker\n".as_bytes()).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = read_ticker_list(Path::new("/nonexistent/portfolio.csv")).unwrap_err();
        assert!(matches!(err, DataError::Portfolio(_)));
    }
}
