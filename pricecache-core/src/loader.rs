//! Price table loading: full history on first run, cached snapshot after.

use crate::data::provider::{DataError, PriceProvider};
use crate::data::store::{ParquetStore, Snapshot};
use crate::table::PriceTable;
use chrono::{Duration, NaiveDate};
use tracing::info;

/// Fetch `[today - days, today]` for every ticker and persist it as the price snapshot.
///
/// A fetch that returns no rows at all is an error: there is nothing to cache.
pub fn get_initial_data(
    provider: &dyn PriceProvider,
    store: &ParquetStore,
    tickers: &[String],
    days: i64,
    today: NaiveDate,
) -> Result<PriceTable, DataError> {
    let start = Duration::try_days(days)
        .and_then(|window| today.checked_sub_signed(window))
        .ok_or_else(|| {
            DataError::Config(format!("history window of {days} days is out of range"))
        })?;
    info!(days, %start, end = %today, tickers = tickers.len(), "fetching initial price history");

    let prices = provider.fetch_table(tickers, start, today)?;
    if prices.is_empty() {
        return Err(DataError::EmptyFetch { start, end: today });
    }

    store.write(Snapshot::Prices, &prices, provider.name())?;
    Ok(prices)
}

/// Load the cached price snapshot.
pub fn read_prices(store: &ParquetStore) -> Result<PriceTable, DataError> {
    let prices = store.read(Snapshot::Prices)?;
    info!(rows = prices.len(), latest = ?prices.latest_date(), "read cached prices");
    Ok(prices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::provider::FetchResult;

    struct NoFetch;

    impl PriceProvider for NoFetch {
        fn name(&self) -> &str {
            "none"
        }

        fn fetch(&self, _: &str, _: NaiveDate, _: NaiveDate) -> Result<FetchResult, DataError> {
            panic!("no fetch expected")
        }
    }

    #[test]
    fn out_of_range_window_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetStore::new(dir.path());
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        let result = get_initial_data(&NoFetch, &store, &["SPY".into()], 1_000_000_000, today);
        assert!(matches!(result, Err(DataError::Config(_))));
        assert!(!store.exists(Snapshot::Prices));
    }
}
