//! Parquet snapshot store.
//!
//! Layout under the data directory:
//! - `prices.parquet`, `daily_returns.parquet`, `weekly_returns.parquet`
//! - `{snapshot}.meta.json` sidecar next to each (tickers, date range, hash, source)
//!
//! Each snapshot holds a `date` column followed by one nullable `f64` column per
//! ticker. Writes are atomic: write to `.tmp`, then rename into place.

use super::provider::DataError;
use crate::table::{TimeTable, DATE_COLUMN};
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The snapshots the pipeline persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Snapshot {
    Prices,
    DailyReturns,
    WeeklyReturns,
}

impl Snapshot {
    pub const ALL: [Snapshot; 3] = [
        Snapshot::Prices,
        Snapshot::DailyReturns,
        Snapshot::WeeklyReturns,
    ];

    /// File stem shared by the Parquet file and its sidecar.
    pub fn stem(self) -> &'static str {
        match self {
            Snapshot::Prices => "prices",
            Snapshot::DailyReturns => "daily_returns",
            Snapshot::WeeklyReturns => "weekly_returns",
        }
    }
}

/// Metadata sidecar for a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SnapshotMeta {
    pub snapshot: String,
    pub tickers: Vec<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub row_count: usize,
    pub data_hash: String,
    pub source: String,
    pub written_at: NaiveDateTime,
}

/// Snapshot store rooted at a data directory.
pub struct ParquetStore {
    data_dir: PathBuf,
}

impl ParquetStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Root directory of the store.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Create the data directory if it does not exist.
    pub fn ensure_dir(&self) -> Result<(), DataError> {
        fs::create_dir_all(&self.data_dir).map_err(|e| {
            DataError::Storage(format!("create {}: {e}", self.data_dir.display()))
        })
    }

    /// Path to a snapshot's Parquet file.
    pub fn path(&self, snapshot: Snapshot) -> PathBuf {
        self.data_dir.join(format!("{}.parquet", snapshot.stem()))
    }

    fn meta_path(&self, snapshot: Snapshot) -> PathBuf {
        self.data_dir.join(format!("{}.meta.json", snapshot.stem()))
    }

    pub fn exists(&self, snapshot: Snapshot) -> bool {
        self.path(snapshot).is_file()
    }

    /// Overwrite a snapshot and its sidecar.
    pub fn write(
        &self,
        snapshot: Snapshot,
        table: &TimeTable,
        source: &str,
    ) -> Result<(), DataError> {
        let mut df = table_to_dataframe(table)?;
        let path = self.path(snapshot);
        let tmp_path = path.with_extension("parquet.tmp");
        let meta_path = self.meta_path(snapshot);
        let meta_tmp_path = meta_path.with_extension("json.tmp");

        let meta = SnapshotMeta {
            snapshot: snapshot.stem().to_string(),
            tickers: table.tickers().to_vec(),
            start_date: table.first_date(),
            end_date: table.latest_date(),
            row_count: table.len(),
            data_hash: table.content_hash(),
            source: source.to_string(),
            written_at: chrono::Local::now().naive_local(),
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::Storage(format!("meta serialization: {e}")))?;

        write_parquet(&mut df, &tmp_path)?;
        if let Err(e) = fs::write(&meta_tmp_path, meta_json) {
            let _ = fs::remove_file(&tmp_path);
            return Err(DataError::Storage(format!("meta write: {e}")));
        }

        // The old sidecar goes first, so a crash never pairs it with the new table.
        match fs::remove_file(&meta_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                let _ = fs::remove_file(&tmp_path);
                let _ = fs::remove_file(&meta_tmp_path);
                return Err(DataError::Storage(format!("remove old meta: {e}")));
            }
        }
        atomic_rename(&tmp_path, &path)?;
        atomic_rename(&meta_tmp_path, &meta_path)?;

        debug!(path = %path.display(), rows = table.len(), "wrote snapshot");
        Ok(())
    }

    /// Load a snapshot, validating its schema and date index.
    pub fn read(&self, snapshot: Snapshot) -> Result<TimeTable, DataError> {
        let path = self.path(snapshot);
        if !path.is_file() {
            return Err(DataError::NoCachedData {
                path: path.display().to_string(),
            });
        }

        let file =
            fs::File::open(&path).map_err(|e| DataError::Parquet(format!("open: {e}")))?;
        let df = ParquetReader::new(file)
            .finish()
            .map_err(|e| DataError::Parquet(format!("read {}: {e}", path.display())))?;

        dataframe_to_table(&df)
    }

    /// Sidecar metadata, if present and readable.
    pub fn read_meta(&self, snapshot: Snapshot) -> Option<SnapshotMeta> {
        let content = fs::read_to_string(self.meta_path(snapshot)).ok()?;
        serde_json::from_str(&content).ok()
    }
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn atomic_rename(from: &Path, to: &Path) -> Result<(), DataError> {
    fs::rename(from, to).map_err(|e| {
        let _ = fs::remove_file(from);
        DataError::Storage(format!("atomic rename to {} failed: {e}", to.display()))
    })
}

fn epoch() -> NaiveDate {
    chrono::DateTime::<chrono::Utc>::UNIX_EPOCH.date_naive()
}

/// Convert a table to a Polars DataFrame: `date` first, then one column per ticker.
fn table_to_dataframe(table: &TimeTable) -> Result<DataFrame, DataError> {
    let epoch = epoch();
    let days: Vec<i32> = table
        .dates()
        .iter()
        .map(|d| (*d - epoch).num_days() as i32)
        .collect();

    let mut columns = Vec::with_capacity(table.tickers().len() + 1);
    columns.push(
        Column::new(DATE_COLUMN.into(), days)
            .cast(&DataType::Date)
            .map_err(|e| DataError::Parquet(format!("date cast: {e}")))?,
    );
    for (ticker, cells) in table.columns() {
        columns.push(Column::new(ticker.into(), cells.to_vec()));
    }

    DataFrame::new(columns).map_err(|e| DataError::Parquet(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<(), DataError> {
    let file =
        fs::File::create(path).map_err(|e| DataError::Parquet(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(df)
        .map_err(|e| DataError::Parquet(format!("write parquet: {e}")))?;
    Ok(())
}

/// Convert a DataFrame back to a table. Non-date columns are cast to `f64`.
fn dataframe_to_table(df: &DataFrame) -> Result<TimeTable, DataError> {
    let date_col = df
        .column(DATE_COLUMN)
        .map_err(|_| DataError::Validation(format!("missing column '{DATE_COLUMN}'")))?;
    let date_ca = date_col
        .date()
        .map_err(|e| DataError::Parquet(format!("date column type: {e}")))?;

    let epoch = epoch();
    let mut dates = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let days = date_ca
            .get(i)
            .ok_or_else(|| DataError::Validation(format!("null date at row {i}")))?;
        dates.push(epoch + chrono::Duration::days(days as i64));
    }

    let mut tickers = Vec::new();
    let mut columns = Vec::new();
    for column in df.get_columns() {
        let name = column.name().as_str();
        if name == DATE_COLUMN {
            continue;
        }
        let values = column
            .cast(&DataType::Float64)
            .map_err(|e| DataError::Parquet(format!("column '{name}' type: {e}")))?;
        let ca = values
            .f64()
            .map_err(|e| DataError::Parquet(format!("column '{name}' type: {e}")))?;
        tickers.push(name.to_string());
        columns.push(ca.into_iter().collect());
    }

    TimeTable::new(dates, tickers, columns)
}
