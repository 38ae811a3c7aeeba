//! Daily price bars and the validated historical series.
//!
//! A `HistoricalSeries` is the unit the pipeline fetches, validates, and
//! persists: one ticker's daily OHLCV bars with dates strictly increasing
//! and no duplicates. The constructor enforces the invariant so everything
//! downstream (storage, manifest coverage) can rely on it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One trading day of OHLCV data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub adj_close: f64,
}

/// Inclusive calendar window for a collection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// A range is usable when it does not run backwards.
    pub fn is_valid(&self) -> bool {
        self.start <= self.end
    }

    /// Whether this range fully contains `other`.
    pub fn contains(&self, other: &DateRange) -> bool {
        self.start <= other.start && self.end >= other.end
    }

    /// The window ending today and reaching back the given number of years.
    pub fn trailing_years(years: u32) -> Self {
        let end = chrono::Local::now().date_naive();
        let start = end - chrono::Duration::days(365 * i64::from(years));
        Self { start, end }
    }

    /// Number of calendar days in the range, inclusive.
    pub fn calendar_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// Violations of the series invariant.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SeriesError {
    #[error("duplicate date {date} in series for {ticker}")]
    DuplicateDate { ticker: String, date: NaiveDate },
}

/// A ticker's daily bars, sorted ascending with unique dates.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalSeries {
    ticker: String,
    bars: Vec<DailyBar>,
}

impl HistoricalSeries {
    /// Build a series from bars in any order. Bars are sorted by date;
    /// a duplicate date is rejected rather than silently dropped.
    pub fn from_bars(
        ticker: impl Into<String>,
        mut bars: Vec<DailyBar>,
    ) -> Result<Self, SeriesError> {
        let ticker = ticker.into();
        bars.sort_by_key(|b| b.date);
        for pair in bars.windows(2) {
            if pair[0].date == pair[1].date {
                return Err(SeriesError::DuplicateDate {
                    ticker,
                    date: pair[0].date,
                });
            }
        }
        Ok(Self { ticker, bars })
    }

    /// A series with no bars. Providers return this for well-formed
    /// responses that carry no data in the requested window.
    pub fn empty(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            bars: Vec::new(),
        }
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn bars(&self) -> &[DailyBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    /// The date window this series actually spans.
    pub fn coverage(&self) -> Option<DateRange> {
        match (self.first_date(), self.last_date()) {
            (Some(start), Some(end)) => Some(DateRange { start, end }),
            _ => None,
        }
    }

    /// Largest calendar-day step between consecutive bars.
    ///
    /// A dense weekday series reports 3 (Friday to Monday). Values beyond
    /// the configured tolerance mean a hole worth flagging, not rejecting:
    /// halts and delistings are real data.
    pub fn largest_gap_days(&self) -> i64 {
        self.bars
            .windows(2)
            .map(|pair| (pair[1].date - pair[0].date).num_days())
            .max()
            .unwrap_or(0)
    }
}
