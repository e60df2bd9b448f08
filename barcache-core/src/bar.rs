//! Canonical daily-bar schema.
//!
//! Every provider adapter and the cache store emit the same shape: one
//! [`Bar`] per trading day, collected into a [`Series`] whose dates are
//! strictly increasing. Downstream consumers (charting, reporting) read
//! this and nothing else.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single daily OHLCV bar. All five value fields are mandatory — there
/// are no partial rows in the canonical schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Violation of the series ordering invariant.
#[derive(Debug, Error)]
#[error("duplicate bar date {0}")]
pub struct DuplicateDate(pub NaiveDate);

/// An ordered sequence of daily bars.
///
/// Invariant: dates are strictly increasing. [`Series::new`] sorts its
/// input and rejects duplicates, so holding a `Series` is proof the
/// invariant holds. The empty series is a first-class value — it is the
/// uniform "no data in this window" signal throughout the crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    bars: Vec<Bar>,
}

impl Series {
    /// The empty series.
    pub fn empty() -> Self {
        Self { bars: Vec::new() }
    }

    /// Build a series from bars in any order. Sorts ascending by date and
    /// fails on the first duplicate date.
    pub fn new(mut bars: Vec<Bar>) -> Result<Self, DuplicateDate> {
        bars.sort_by_key(|b| b.date);
        for pair in bars.windows(2) {
            if pair[0].date == pair[1].date {
                return Err(DuplicateDate(pair[0].date));
            }
        }
        Ok(Self { bars })
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    /// The `[min(date), max(date)]` window this series actually spans.
    pub fn coverage(&self) -> Option<(NaiveDate, NaiveDate)> {
        Some((self.first_date()?, self.last_date()?))
    }

    /// Inclusive slice of the series to `[start, end]`.
    ///
    /// Dates are strictly increasing, so both boundaries are found by
    /// binary search rather than a scan.
    pub fn slice(&self, start: NaiveDate, end: NaiveDate) -> Series {
        let lo = self.bars.partition_point(|b| b.date < start);
        let hi = self.bars.partition_point(|b| b.date <= end);
        Series {
            bars: self.bars[lo..hi].to_vec(),
        }
    }
}

impl<'a> IntoIterator for &'a Series {
    type Item = &'a Bar;
    type IntoIter = std::slice::Iter<'a, Bar>;

    fn into_iter(self) -> Self::IntoIter {
        self.bars.iter()
    }
}
