//! Property tests for the incremental merge.
//!
//! Uses proptest to verify:
//! 1. No duplicate dates and strictly ascending order after any merge
//! 2. Every date from either input survives the merge
//! 3. Newer rows win on overlapping dates
//! 4. Re-merging a contained range keeps the row count and non-overlapping values

use chrono::{Duration, NaiveDate};
use pricecache_core::updater::merge_prices;
use pricecache_core::PriceTable;
use proptest::prelude::*;
use std::collections::BTreeMap;

const TICKERS: [&str; 2] = ["SPY", "QQQ"];

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_cell() -> impl Strategy<Value = Option<f64>> {
    prop_oneof![
        1 => Just(None),
        4 => (1.0..500.0_f64).prop_map(|p| Some((p * 100.0).round() / 100.0)),
    ]
}

/// A price table over day offsets from 2024-01-01, in arbitrary insertion order.
fn arb_table() -> impl Strategy<Value = PriceTable> {
    prop::collection::vec((0..120i64, arb_cell(), arb_cell()), 0..40).prop_map(|rows| {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let rows: BTreeMap<NaiveDate, Vec<Option<f64>>> = rows
            .into_iter()
            .map(|(offset, a, b)| (base + Duration::days(offset), vec![a, b]))
            .collect();
        PriceTable::from_rows(TICKERS.iter().map(|t| t.to_string()).collect(), rows).unwrap()
    })
}

fn row(table: &PriceTable, date: NaiveDate) -> Vec<Option<f64>> {
    TICKERS.iter().map(|t| table.get(date, t)).collect()
}

proptest! {
    #[test]
    fn merged_dates_are_unique_and_ascending(existing in arb_table(), incremental in arb_table()) {
        let merged = merge_prices(&existing, &incremental).unwrap();
        prop_assert!(merged.dates().windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn merge_keeps_every_date(existing in arb_table(), incremental in arb_table()) {
        let merged = merge_prices(&existing, &incremental).unwrap();
        for date in existing.dates().iter().chain(incremental.dates()) {
            prop_assert!(merged.dates().binary_search(date).is_ok());
        }
    }

    #[test]
    fn incremental_rows_win(existing in arb_table(), incremental in arb_table()) {
        let merged = merge_prices(&existing, &incremental).unwrap();
        for date in merged.dates() {
            let expected = if incremental.dates().contains(date) {
                row(&incremental, *date)
            } else {
                row(&existing, *date)
            };
            prop_assert_eq!(row(&merged, *date), expected);
        }
    }

    #[test]
    fn contained_range_is_idempotent(existing in arb_table(), keep in prop::collection::vec(any::<bool>(), 40)) {
        // Incremental = a subset of existing's own rows.
        let subset: BTreeMap<NaiveDate, Vec<Option<f64>>> = existing
            .dates()
            .iter()
            .zip(keep.iter().cycle())
            .filter(|(_, k)| **k)
            .map(|(date, _)| (*date, row(&existing, *date)))
            .collect();
        let incremental =
            PriceTable::from_rows(TICKERS.iter().map(|t| t.to_string()).collect(), subset).unwrap();

        let merged = merge_prices(&existing, &incremental).unwrap();
        prop_assert_eq!(merged.len(), existing.len());
        prop_assert_eq!(merged, existing);
    }
}
