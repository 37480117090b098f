//! Incremental refresh of the cached price table.
//!
//! The merge concatenates the cached and incremental tables and keeps one row
//! per date. On a duplicate date the incremental row replaces the cached row
//! whole, so a same-day value in the cache is overwritten by the newer fetch.

use crate::data::provider::{DataError, PriceProvider};
use crate::data::store::{ParquetStore, Snapshot};
use crate::table::PriceTable;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Fetch `[since, today]` for every ticker.
pub fn get_incremental_data(
    provider: &dyn PriceProvider,
    tickers: &[String],
    since: NaiveDate,
    today: NaiveDate,
) -> Result<PriceTable, DataError> {
    info!(%since, end = %today, "fetching incremental prices");
    let incremental = provider.fetch_table(tickers, since, today)?;
    if incremental.is_empty() {
        warn!(%since, end = %today, "incremental fetch returned no rows");
    }
    Ok(incremental)
}

/// Merge `incremental` into `existing`, newer rows winning on duplicate dates.
///
/// Columns are the union of both tables: the cached tickers in their order,
/// then tickers only the incremental table carries.
pub fn merge_prices(
    existing: &PriceTable,
    incremental: &PriceTable,
) -> Result<PriceTable, DataError> {
    let mut tickers = existing.tickers().to_vec();
    for ticker in incremental.tickers() {
        if !tickers.contains(ticker) {
            tickers.push(ticker.clone());
        }
    }

    let mut rows: BTreeMap<NaiveDate, Vec<Option<f64>>> = BTreeMap::new();
    for table in [existing, incremental] {
        let positions: Vec<Option<usize>> =
            tickers.iter().map(|t| table.ticker_index(t)).collect();
        for (row, date) in table.dates().iter().enumerate() {
            let cells = positions
                .iter()
                .map(|col| col.and_then(|c| table.value(row, c)))
                .collect();
            rows.insert(*date, cells);
        }
    }

    PriceTable::from_rows(tickers, rows)
}

/// Merge and persist the result as the new price snapshot.
pub fn update_prices(
    store: &ParquetStore,
    existing: &PriceTable,
    incremental: &PriceTable,
    source: &str,
) -> Result<PriceTable, DataError> {
    let merged = merge_prices(existing, incremental)?;
    store.write(Snapshot::Prices, &merged, source)?;
    info!(
        before = existing.len(),
        fetched = incremental.len(),
        after = merged.len(),
        latest = ?merged.latest_date(),
        "prices updated"
    );
    Ok(merged)
}
