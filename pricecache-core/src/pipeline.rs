//! Run orchestration: load or bootstrap, refresh if stale, rebuild returns.
//!
//! Sequence for one run:
//! 1. Ensure the data directory exists
//! 2. No cached prices → fetch the full history window; otherwise read the cache
//! 3. Cached prices older than the staleness threshold → fetch since the latest
//!    cached date (inclusive) and merge
//! 4. Recompute and persist daily and weekly returns
//!
//! Any fetch or storage failure aborts the run.

use crate::config::Config;
use crate::data::provider::{DataError, PriceProvider};
use crate::data::store::{ParquetStore, Snapshot};
use crate::loader::{get_initial_data, read_prices};
use crate::returns::get_returns;
use crate::updater::{get_incremental_data, update_prices};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use tracing::info;

/// What a run did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    /// True when no cache existed and the full history was fetched.
    pub initial_load: bool,
    /// True when the cache was stale and an incremental fetch was merged.
    pub updated: bool,
    /// Rows returned by the incremental fetch, zero when no update ran.
    pub fetched_rows: usize,
    pub price_rows: usize,
    pub latest_price_date: NaiveDate,
    pub latest_daily_return: Option<NaiveDate>,
    pub latest_weekly_return: Option<NaiveDate>,
}

/// Whether data ending on `latest` is more than `stale_after_days` behind `now`.
///
/// `latest` counts from midnight, so with a 2-day threshold a Friday close is
/// stale from Sunday 00:00:01 onward. Weekends and holidays are not excluded.
pub fn is_stale(latest: NaiveDate, now: NaiveDateTime, stale_after_days: i64) -> bool {
    // A threshold before the earliest representable time can never be passed.
    Duration::try_days(stale_after_days)
        .and_then(|window| now.checked_sub_signed(window))
        .is_some_and(|threshold| latest.and_time(NaiveTime::MIN) < threshold)
}

/// Run the pipeline once against `provider`, with `now` as the current time.
pub fn run(
    config: &Config,
    provider: &dyn PriceProvider,
    now: NaiveDateTime,
) -> Result<RunReport, DataError> {
    let settings = &config.settings;
    let store = ParquetStore::new(&settings.data_dir);
    let today = now.date();

    store.ensure_dir()?;

    let initial_load = !store.exists(Snapshot::Prices);
    let mut prices = if initial_load {
        info!("no cached prices; fetching initial history");
        get_initial_data(
            provider,
            &store,
            &config.tickers,
            settings.history_days,
            today,
        )?
    } else {
        read_prices(&store)?
    };

    let latest = prices
        .latest_date()
        .ok_or_else(|| DataError::Validation("cached price table has no rows".into()))?;
    info!(rows = prices.len(), %latest, %now, "prices loaded");

    let mut fetched_rows = 0;
    let updated = is_stale(latest, now, settings.stale_after_days);
    if updated {
        info!(%latest, threshold_days = settings.stale_after_days, "prices are stale; updating");
        let incremental = get_incremental_data(provider, &config.tickers, latest, today)?;
        fetched_rows = incremental.len();
        prices = update_prices(&store, &prices, &incremental, provider.name())?;
    }

    let returns = get_returns(&store, &prices)?;

    Ok(RunReport {
        initial_load,
        updated,
        fetched_rows,
        price_rows: prices.len(),
        latest_price_date: prices.latest_date().unwrap_or(latest),
        latest_daily_return: returns.daily.latest_date(),
        latest_weekly_return: returns.weekly.latest_date(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn fresh_data_is_not_stale() {
        assert!(!is_stale(d("2024-03-14"), at("2024-03-15 10:00:00"), 2));
        assert!(!is_stale(d("2024-03-13"), at("2024-03-15 00:00:00"), 2));
    }

    #[test]
    fn two_days_and_a_moment_is_stale() {
        assert!(is_stale(d("2024-03-13"), at("2024-03-15 00:00:01"), 2));
        assert!(is_stale(d("2024-03-10"), at("2024-03-15 10:00:00"), 2));
    }

    #[test]
    fn huge_threshold_is_never_stale() {
        assert!(!is_stale(d("1970-01-01"), at("2024-03-15 10:00:00"), 1_000_000_000));
        assert!(!is_stale(d("1970-01-01"), at("2024-03-15 10:00:00"), i64::MAX));
    }

    #[test]
    fn friday_cache_is_stale_on_monday() {
        // 2024-03-15 is a Friday.
        assert!(is_stale(d("2024-03-15"), at("2024-03-18 09:00:00"), 2));
    }
}
