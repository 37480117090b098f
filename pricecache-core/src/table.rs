//! Date-indexed table with one column per ticker.
//!
//! The same shape carries adjusted-close prices and return series. Rows are
//! keyed by date, strictly ascending; every column holds exactly one cell per
//! row. Cells are `Option<f64>`: non-finite values are stored as absent.

use crate::data::provider::DataError;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Name of the index column in persisted snapshots.
pub const DATE_COLUMN: &str = "date";

/// Date-indexed, column-oriented table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimeTable {
    dates: Vec<NaiveDate>,
    tickers: Vec<String>,
    columns: Vec<Vec<Option<f64>>>,
}

/// Adjusted closes per ticker.
pub type PriceTable = TimeTable;

/// Fractional period-over-period changes per ticker.
pub type ReturnTable = TimeTable;

impl TimeTable {
    /// Build a table, validating its invariants.
    pub fn new(
        dates: Vec<NaiveDate>,
        tickers: Vec<String>,
        columns: Vec<Vec<Option<f64>>>,
    ) -> Result<Self, DataError> {
        if tickers.len() != columns.len() {
            return Err(DataError::Validation(format!(
                "{} tickers but {} columns",
                tickers.len(),
                columns.len()
            )));
        }

        let mut seen = BTreeSet::new();
        for ticker in &tickers {
            if ticker == DATE_COLUMN {
                return Err(DataError::Validation(format!(
                    "ticker may not be named '{DATE_COLUMN}'"
                )));
            }
            if !seen.insert(ticker.as_str()) {
                return Err(DataError::Validation(format!("duplicate ticker '{ticker}'")));
            }
        }

        for (ticker, column) in tickers.iter().zip(&columns) {
            if column.len() != dates.len() {
                return Err(DataError::Validation(format!(
                    "column '{ticker}' has {} cells for {} dates",
                    column.len(),
                    dates.len()
                )));
            }
        }

        if let Some(pair) = dates.windows(2).find(|w| w[0] >= w[1]) {
            return Err(DataError::Validation(format!(
                "dates not strictly ascending: {} then {}",
                pair[0], pair[1]
            )));
        }

        let columns = columns
            .into_iter()
            .map(|c| c.into_iter().map(finite).collect())
            .collect();

        Ok(Self {
            dates,
            tickers,
            columns,
        })
    }

    /// A table with the given columns and no rows.
    pub fn empty(tickers: Vec<String>) -> Self {
        let columns = vec![Vec::new(); tickers.len()];
        Self {
            dates: Vec::new(),
            tickers,
            columns,
        }
    }

    /// Build from date-keyed rows. Each row holds one cell per ticker.
    pub fn from_rows(
        tickers: Vec<String>,
        rows: BTreeMap<NaiveDate, Vec<Option<f64>>>,
    ) -> Result<Self, DataError> {
        let mut dates = Vec::with_capacity(rows.len());
        let mut columns = vec![Vec::with_capacity(rows.len()); tickers.len()];

        for (date, row) in rows {
            if row.len() != tickers.len() {
                return Err(DataError::Validation(format!(
                    "row {date} has {} cells for {} tickers",
                    row.len(),
                    tickers.len()
                )));
            }
            dates.push(date);
            for (column, cell) in columns.iter_mut().zip(row) {
                column.push(cell);
            }
        }

        Self::new(dates, tickers, columns)
    }

    /// Outer-join per-ticker series on the union of their dates.
    ///
    /// Dates missing from a series become absent cells. Within one series a
    /// repeated date keeps its last value.
    pub fn from_series(
        series: Vec<(String, Vec<(NaiveDate, Option<f64>)>)>,
    ) -> Result<Self, DataError> {
        let dates: Vec<NaiveDate> = series
            .iter()
            .flat_map(|(_, points)| points.iter().map(|(d, _)| *d))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut tickers = Vec::with_capacity(series.len());
        let mut columns = Vec::with_capacity(series.len());
        for (ticker, points) in series {
            let lookup: HashMap<NaiveDate, Option<f64>> = points.into_iter().collect();
            columns.push(
                dates
                    .iter()
                    .map(|d| lookup.get(d).copied().flatten())
                    .collect(),
            );
            tickers.push(ticker);
        }

        Self::new(dates, tickers, columns)
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    /// Most recent row date.
    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    pub fn ticker_index(&self, ticker: &str) -> Option<usize> {
        self.tickers.iter().position(|t| t == ticker)
    }

    /// Cells of one ticker, aligned with `dates()`.
    pub fn column(&self, ticker: &str) -> Option<&[Option<f64>]> {
        self.ticker_index(ticker).map(|i| self.columns[i].as_slice())
    }

    /// Columns in ticker order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &[Option<f64>])> {
        self.tickers
            .iter()
            .map(String::as_str)
            .zip(self.columns.iter().map(Vec::as_slice))
    }

    /// Cell at `row` for the ticker at column index `col`.
    pub fn value(&self, row: usize, col: usize) -> Option<f64> {
        self.columns.get(col).and_then(|c| c.get(row)).copied().flatten()
    }

    /// Look up a cell by date and ticker.
    pub fn get(&self, date: NaiveDate, ticker: &str) -> Option<f64> {
        let row = self.dates.binary_search(&date).ok()?;
        let col = self.ticker_index(ticker)?;
        self.value(row, col)
    }

    /// One ticker as `(date, cell)` pairs.
    pub fn series(&self, ticker: &str) -> Option<Vec<(NaiveDate, Option<f64>)>> {
        self.column(ticker)
            .map(|cells| self.dates.iter().copied().zip(cells.iter().copied()).collect())
    }

    /// Tickers whose column holds no value at all.
    pub fn empty_tickers(&self) -> Vec<&str> {
        self.columns()
            .filter(|(_, cells)| cells.iter().all(Option::is_none))
            .map(|(t, _)| t)
            .collect()
    }

    /// Drop rows that are absent across every ticker.
    pub fn drop_empty_rows(self) -> Self {
        let keep: Vec<bool> = (0..self.dates.len())
            .map(|row| self.columns.iter().any(|c| c[row].is_some()))
            .collect();

        let dates = self
            .dates
            .into_iter()
            .zip(&keep)
            .filter_map(|(d, k)| k.then_some(d))
            .collect();
        let columns = self
            .columns
            .into_iter()
            .map(|c| {
                c.into_iter()
                    .zip(&keep)
                    .filter_map(|(v, k)| k.then_some(v))
                    .collect()
            })
            .collect();

        Self {
            dates,
            tickers: self.tickers,
            columns,
        }
    }

    /// Deterministic BLAKE3 hash over dates, tickers and every cell.
    pub fn content_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for date in &self.dates {
            hasher.update(date.to_string().as_bytes());
        }
        for (ticker, cells) in self.columns() {
            hasher.update(ticker.as_bytes());
            for cell in cells {
                match cell {
                    Some(v) => hasher.update(&v.to_le_bytes()),
                    None => hasher.update(b"null"),
                };
            }
        }
        hasher.finalize().to_hex().to_string()
    }
}

fn finite(cell: Option<f64>) -> Option<f64> {
    cell.filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn new_rejects_unsorted_dates() {
        let result = TimeTable::new(
            vec![d("2024-01-03"), d("2024-01-02")],
            vec!["SPY".into()],
            vec![vec![Some(1.0), Some(2.0)]],
        );
        assert!(matches!(result, Err(DataError::Validation(_))));
    }

    #[test]
    fn new_rejects_duplicate_dates() {
        let result = TimeTable::new(
            vec![d("2024-01-02"), d("2024-01-02")],
            vec!["SPY".into()],
            vec![vec![Some(1.0), Some(2.0)]],
        );
        assert!(result.is_err());
    }

    #[test]
    fn new_rejects_ragged_columns() {
        let result = TimeTable::new(
            vec![d("2024-01-02")],
            vec!["SPY".into()],
            vec![vec![Some(1.0), Some(2.0)]],
        );
        assert!(result.is_err());
    }

    #[test]
    fn new_rejects_date_as_ticker() {
        let result = TimeTable::new(vec![], vec!["date".into()], vec![vec![]]);
        assert!(result.is_err());
    }

    #[test]
    fn nan_is_stored_as_absent() {
        let t = TimeTable::new(
            vec![d("2024-01-02")],
            vec!["SPY".into()],
            vec![vec![Some(f64::NAN)]],
        )
        .unwrap();
        assert_eq!(t.get(d("2024-01-02"), "SPY"), None);
    }

    #[test]
    fn from_series_outer_joins_dates() {
        let t = TimeTable::from_series(vec![
            (
                "SPY".into(),
                vec![(d("2024-01-02"), Some(100.0)), (d("2024-01-03"), Some(101.0))],
            ),
            ("QQQ".into(), vec![(d("2024-01-03"), Some(200.0))]),
        ])
        .unwrap();

        assert_eq!(t.dates(), &[d("2024-01-02"), d("2024-01-03")]);
        assert_eq!(t.tickers(), &["SPY".to_string(), "QQQ".to_string()]);
        assert_eq!(t.get(d("2024-01-02"), "QQQ"), None);
        assert_eq!(t.get(d("2024-01-03"), "QQQ"), Some(200.0));
    }

    #[test]
    fn drop_empty_rows_keeps_partial_rows() {
        let t = TimeTable::new(
            vec![d("2024-01-02"), d("2024-01-03"), d("2024-01-04")],
            vec!["SPY".into(), "QQQ".into()],
            vec![
                vec![None, None, Some(1.0)],
                vec![None, Some(2.0), None],
            ],
        )
        .unwrap()
        .drop_empty_rows();

        assert_eq!(t.dates(), &[d("2024-01-03"), d("2024-01-04")]);
        assert_eq!(t.column("QQQ").unwrap(), &[Some(2.0), None]);
    }

    #[test]
    fn empty_tickers_lists_all_absent_columns() {
        let t = TimeTable::new(
            vec![d("2024-01-02")],
            vec!["SPY".into(), "DEAD".into()],
            vec![vec![Some(1.0)], vec![None]],
        )
        .unwrap();
        assert_eq!(t.empty_tickers(), vec!["DEAD"]);
    }

    #[test]
    fn content_hash_tracks_values() {
        let a = TimeTable::from_series(vec![("SPY".into(), vec![(d("2024-01-02"), Some(1.0))])])
            .unwrap();
        let b = TimeTable::from_series(vec![("SPY".into(), vec![(d("2024-01-02"), Some(1.5))])])
            .unwrap();
        assert_eq!(a.content_hash(), a.clone().content_hash());
        assert_ne!(a.content_hash(), b.content_hash());
    }
}
