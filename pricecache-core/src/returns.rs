//! Daily and weekly return series.
//!
//! Returns are simple period-over-period changes, `(p[t] - p[t-1]) / p[t-1]`,
//! computed per ticker over available observations only: missing prices are
//! dropped first, so a gap is bridged by the next observation rather than
//! producing a zero or an error. The first observation of each series has no
//! return and is stored as absent.
//!
//! Weekly series resample to weeks ending Sunday. Each Sunday label takes the
//! last price observed on or before it, from the first observation's week to
//! the last observation's week, before returns are taken.

use crate::data::provider::DataError;
use crate::data::store::{ParquetStore, Snapshot};
use crate::table::{PriceTable, ReturnTable};
use chrono::{Datelike, Duration, NaiveDate};
use tracing::{info, warn};

/// Source tag recorded in return snapshot metadata.
const RETURNS_SOURCE: &str = "returns";

/// Daily and weekly return tables derived from one price table.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnSet {
    pub daily: ReturnTable,
    pub weekly: ReturnTable,
}

/// Period returns between consecutive available observations.
pub fn compute_daily_returns(
    series: &[(NaiveDate, Option<f64>)],
) -> Vec<(NaiveDate, Option<f64>)> {
    pct_change(&observations(series))
}

/// Period returns between consecutive Sunday-labelled weekly prices.
pub fn compute_weekly_returns(
    series: &[(NaiveDate, Option<f64>)],
) -> Vec<(NaiveDate, Option<f64>)> {
    pct_change(&resample_weekly(&observations(series)))
}

/// Sunday closing the week that contains `date`.
pub fn week_ending(date: NaiveDate) -> NaiveDate {
    let offset = 6 - date.weekday().num_days_from_monday();
    date + Duration::days(i64::from(offset))
}

/// Derive both return tables without touching storage.
///
/// Each ticker's series is computed independently, the results are joined on
/// the union of their dates, and rows empty across every ticker are dropped.
pub fn build_returns(prices: &PriceTable) -> Result<ReturnSet, DataError> {
    let mut daily = Vec::with_capacity(prices.tickers().len());
    let mut weekly = Vec::with_capacity(prices.tickers().len());

    for ticker in prices.tickers() {
        let series = prices.series(ticker).unwrap_or_default();
        daily.push((ticker.clone(), compute_daily_returns(&series)));
        weekly.push((ticker.clone(), compute_weekly_returns(&series)));
    }

    Ok(ReturnSet {
        daily: ReturnTable::from_series(daily)?.drop_empty_rows(),
        weekly: ReturnTable::from_series(weekly)?.drop_empty_rows(),
    })
}

/// Recompute both return tables from `prices` and persist them.
pub fn get_returns(store: &ParquetStore, prices: &PriceTable) -> Result<ReturnSet, DataError> {
    for ticker in prices.empty_tickers() {
        warn!(ticker, "no prices for ticker; its return columns will be empty");
    }

    let returns = build_returns(prices)?;
    store.write(Snapshot::DailyReturns, &returns.daily, RETURNS_SOURCE)?;
    store.write(Snapshot::WeeklyReturns, &returns.weekly, RETURNS_SOURCE)?;

    info!(
        daily_rows = returns.daily.len(),
        weekly_rows = returns.weekly.len(),
        daily_latest = ?returns.daily.latest_date(),
        weekly_latest = ?returns.weekly.latest_date(),
        "returns written"
    );
    Ok(returns)
}

fn observations(series: &[(NaiveDate, Option<f64>)]) -> Vec<(NaiveDate, f64)> {
    series
        .iter()
        .filter_map(|&(date, price)| price.filter(|p| p.is_finite()).map(|p| (date, p)))
        .collect()
}

fn resample_weekly(points: &[(NaiveDate, f64)]) -> Vec<(NaiveDate, f64)> {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return Vec::new();
    };

    let end = week_ending(last.0);
    let mut label = week_ending(first.0);
    let mut next = 0;
    let mut carried = None;
    let mut weekly = Vec::new();

    while label <= end {
        while let Some(&(date, price)) = points.get(next) {
            if date > label {
                break;
            }
            carried = Some(price);
            next += 1;
        }
        if let Some(price) = carried {
            weekly.push((label, price));
        }
        label += Duration::weeks(1);
    }

    weekly
}

/// A zero previous price has no defined return and yields an absent cell.
fn pct_change(points: &[(NaiveDate, f64)]) -> Vec<(NaiveDate, Option<f64>)> {
    points
        .iter()
        .enumerate()
        .map(|(i, &(date, price))| {
            let ret = i
                .checked_sub(1)
                .map(|prev| (price - points[prev].1) / points[prev].1)
                .filter(|r| r.is_finite());
            (date, ret)
        })
        .collect()
}
