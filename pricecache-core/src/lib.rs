//! pricecache core — cached adjusted-close prices and derived return series.
//!
//! This crate contains:
//! - A date-indexed price/return table with strict ascending, unique dates
//! - A price provider trait and the Yahoo Finance implementation
//! - A Parquet snapshot store with atomic writes and metadata sidecars
//! - Loader, updater and return calculator stages
//! - The pipeline that sequences them behind a staleness check

pub mod config;
pub mod data;
pub mod loader;
pub mod pipeline;
pub mod returns;
pub mod table;
pub mod updater;

pub use config::{Config, PipelineConfig, ProviderSettings};
pub use data::{DataError, ParquetStore, PriceProvider, Snapshot, YahooProvider};
pub use pipeline::{is_stale, run, RunReport};
pub use returns::{build_returns, compute_daily_returns, compute_weekly_returns, ReturnSet};
pub use table::{PriceTable, ReturnTable, TimeTable};
