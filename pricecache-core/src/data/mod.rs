//! Remote price source and on-disk snapshots

pub mod provider;
pub mod store;
pub mod yahoo;

pub use provider::{DataError, FetchResult, PricePoint, PriceProvider};
pub use store::{ParquetStore, Snapshot, SnapshotMeta};
pub use yahoo::YahooProvider;
