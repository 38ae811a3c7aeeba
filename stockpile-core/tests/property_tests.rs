//! Property tests for core data invariants.
//!
//! Uses proptest to verify:
//! 1. Series construction — bars always come out strictly ascending, none lost
//! 2. Duplicate dates are rejected no matter where they appear
//! 3. Gap math — largest gap equals the max consecutive date delta
//! 4. Date-range algebra — contains is reflexive, antisymmetric, transitive
//! 5. Universe normalization is idempotent

use chrono::NaiveDate;
use proptest::prelude::*;
use stockpile_core::series::{DailyBar, DateRange, HistoricalSeries};
use stockpile_core::universe::Universe;

// ── Strategies (proptest) ────────────────────────────────────────────

fn day(offset: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2015, 1, 2).unwrap() + chrono::Duration::days(offset)
}

fn bar_at(offset: i64) -> DailyBar {
    let close = 100.0 + offset as f64 * 0.1;
    DailyBar {
        date: day(offset),
        open: close - 0.5,
        high: close + 1.0,
        low: close - 1.0,
        close,
        volume: 1_000,
        adj_close: close,
    }
}

fn arb_unique_offsets() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::hash_set(0..2520i64, 1..60)
        .prop_map(|set| set.into_iter().collect::<Vec<_>>())
        .prop_shuffle()
}

fn arb_range() -> impl Strategy<Value = DateRange> {
    (0..2520i64, 0..2520i64).prop_map(|(a, b)| {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        DateRange::new(day(lo), day(hi))
    })
}

// ── 1. Series construction ───────────────────────────────────────────

proptest! {
    /// Whatever order bars arrive in, the series is strictly ascending
    /// and no bar is dropped.
    #[test]
    fn from_bars_sorts_and_preserves_count(offsets in arb_unique_offsets()) {
        let bars: Vec<DailyBar> = offsets.iter().map(|&o| bar_at(o)).collect();
        let series = HistoricalSeries::from_bars("TEST", bars).unwrap();

        prop_assert_eq!(series.len(), offsets.len());
        for pair in series.bars().windows(2) {
            prop_assert!(pair[0].date < pair[1].date);
        }
    }

    /// Coverage spans every bar in the series.
    #[test]
    fn coverage_spans_every_bar(offsets in arb_unique_offsets()) {
        let bars: Vec<DailyBar> = offsets.iter().map(|&o| bar_at(o)).collect();
        let series = HistoricalSeries::from_bars("TEST", bars).unwrap();

        let cov = series.coverage().unwrap();
        prop_assert!(cov.is_valid());
        for bar in series.bars() {
            prop_assert!(cov.start <= bar.date && bar.date <= cov.end);
        }
    }
}

// ── 2. Duplicate rejection ───────────────────────────────────────────

proptest! {
    /// Re-inserting any existing date makes construction fail.
    #[test]
    fn duplicate_date_always_rejected(
        offsets in arb_unique_offsets(),
        pick in any::<prop::sample::Index>(),
    ) {
        let mut bars: Vec<DailyBar> = offsets.iter().map(|&o| bar_at(o)).collect();
        let dup = bars[pick.index(bars.len())];
        bars.push(DailyBar {
            close: dup.close + 1.0,
            ..dup
        });

        prop_assert!(HistoricalSeries::from_bars("TEST", bars).is_err());
    }
}

// ── 3. Gap math ──────────────────────────────────────────────────────

proptest! {
    /// The largest gap is exactly the maximum delta between consecutive
    /// sorted dates, and zero for a single bar.
    #[test]
    fn largest_gap_matches_max_consecutive_delta(offsets in arb_unique_offsets()) {
        let bars: Vec<DailyBar> = offsets.iter().map(|&o| bar_at(o)).collect();
        let series = HistoricalSeries::from_bars("TEST", bars).unwrap();

        let mut sorted = offsets.clone();
        sorted.sort_unstable();
        let expected = sorted.windows(2).map(|w| w[1] - w[0]).max().unwrap_or(0);

        prop_assert_eq!(series.largest_gap_days(), expected);
    }
}

// ── 4. Date-range algebra ────────────────────────────────────────────

proptest! {
    #[test]
    fn contains_is_reflexive_and_antisymmetric(a in arb_range(), b in arb_range()) {
        prop_assert!(a.contains(&a));
        if a.contains(&b) && b.contains(&a) {
            prop_assert_eq!(a, b);
        }
    }

    #[test]
    fn contains_is_transitive(a in arb_range(), b in arb_range(), c in arb_range()) {
        if a.contains(&b) && b.contains(&c) {
            prop_assert!(a.contains(&c));
        }
    }

    #[test]
    fn valid_range_has_positive_calendar_days(r in arb_range()) {
        prop_assert!(r.is_valid());
        prop_assert!(r.calendar_days() >= 1);
    }
}

// ── 5. Universe normalization ────────────────────────────────────────

proptest! {
    /// Running the output of normalization back through produces the
    /// same universe, and every ticker is clean.
    #[test]
    fn universe_normalization_is_idempotent(
        raw in prop::collection::vec("[a-zA-Z$. ]{0,6}", 0..20),
    ) {
        let once = Universe::from_symbols(raw.iter());
        let twice = Universe::from_symbols(once.tickers().iter());

        prop_assert_eq!(once.tickers(), twice.tickers());
        for ticker in once.tickers() {
            prop_assert!(!ticker.is_empty());
            prop_assert!(!ticker.contains(' '));
            prop_assert!(!ticker.contains('$'));
            prop_assert!(ticker.chars().all(|c| !c.is_lowercase()));
        }
    }
}
