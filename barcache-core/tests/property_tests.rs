//! Property tests for the canonical schema and the CSV cache.

use barcache_core::bar::{Bar, Series};
use barcache_core::cache::CsvCache;
use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use std::collections::BTreeMap;

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(2010, 1, 4).unwrap()
}

fn bars_from_offsets(offsets: &BTreeMap<u32, (f64, f64, f64, f64, u64)>) -> Vec<Bar> {
    offsets
        .iter()
        .map(|(&off, &(open, high, low, close, volume))| Bar {
            date: epoch() + Duration::days(off as i64),
            open,
            high,
            low,
            close,
            volume,
        })
        .collect()
}

fn ohlcv() -> impl Strategy<Value = (f64, f64, f64, f64, u64)> {
    (
        0.01f64..100_000.0,
        0.01f64..100_000.0,
        0.01f64..100_000.0,
        0.01f64..100_000.0,
        0u64..10_000_000_000,
    )
}

proptest! {
    /// Slicing returns exactly the bars whose dates fall inside the
    /// window, in order — nothing dropped, nothing leaked.
    #[test]
    fn slice_returns_exactly_the_in_window_dates(
        rows in prop::collection::btree_map(0u32..3650, ohlcv(), 1..60),
        a in 0u32..3650,
        b in 0u32..3650,
    ) {
        let series = Series::new(bars_from_offsets(&rows)).unwrap();
        let start = epoch() + Duration::days(a.min(b) as i64);
        let end = epoch() + Duration::days(a.max(b) as i64);

        let sliced = series.slice(start, end);
        let sliced_dates: Vec<NaiveDate> = sliced.bars().iter().map(|bar| bar.date).collect();
        let expected: Vec<NaiveDate> = series
            .bars()
            .iter()
            .map(|bar| bar.date)
            .filter(|d| *d >= start && *d <= end)
            .collect();

        prop_assert_eq!(sliced_dates, expected);
    }

    /// Writing a series and reading it back preserves every field of
    /// every bar. CSV float formatting is shortest-round-trip, so the
    /// comparison is exact.
    #[test]
    fn cache_roundtrip_preserves_every_field(
        rows in prop::collection::btree_map(0u32..3650, ohlcv(), 1..40),
    ) {
        let series = Series::new(bars_from_offsets(&rows)).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let cache = CsvCache::new(dir.path());

        let entry = cache.write("PROP", &series).unwrap();
        let loaded = cache.read(&entry).unwrap();

        prop_assert_eq!(loaded, series);
    }

    /// The entry written for a series always declares coverage equal to
    /// the series' own date span.
    #[test]
    fn written_coverage_matches_data_span(
        rows in prop::collection::btree_map(0u32..3650, ohlcv(), 1..40),
    ) {
        let series = Series::new(bars_from_offsets(&rows)).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let cache = CsvCache::new(dir.path());

        let entry = cache.write("PROP", &series).unwrap();
        prop_assert_eq!(Some((entry.start, entry.end)), series.coverage());
    }
}
