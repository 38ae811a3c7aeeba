//! Integration tests for the store: full artifact layout, recovery after
//! corruption, and manifest coverage built from real writes.

use chrono::NaiveDate;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use stockpile_core::fundamentals::FundamentalsSnapshot;
use stockpile_core::manifest::{CollectionManifest, ManifestEntry, RunSummary, TaskStatus};
use stockpile_core::series::{DailyBar, DateRange, HistoricalSeries};
use stockpile_core::store::{DataStore, StoreError};

static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

fn temp_store_dir() -> PathBuf {
    let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    let dir =
        std::env::temp_dir().join(format!("stockpile_integ_{}_{id}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

fn make_series(ticker: &str, days: usize) -> HistoricalSeries {
    let base = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    let bars = (0..days)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.1).sin() * 10.0;
            DailyBar {
                date: base + chrono::Duration::days(i as i64),
                open: close - 0.3,
                high: close + 1.5,
                low: close - 1.5,
                close,
                volume: 1_000_000 + (i as u64 % 50_000),
                adj_close: close,
            }
        })
        .collect();
    HistoricalSeries::from_bars(ticker, bars).unwrap()
}

#[test]
fn full_ticker_artifact_layout() {
    let dir = temp_store_dir();
    let store = DataStore::open(&dir).unwrap();

    store
        .write_history(&make_series("AAPL", 30), "yahoo_finance")
        .unwrap();
    store
        .write_fundamentals(&FundamentalsSnapshot {
            ticker: "AAPL".into(),
            market_cap: Some(3.0e12),
            ..Default::default()
        })
        .unwrap();

    let mut manifest = CollectionManifest::new();
    manifest.upsert(
        "AAPL",
        ManifestEntry {
            status: TaskStatus::Success,
            attempts: 1,
            bar_count: 30,
            fundamentals: true,
            ..Default::default()
        },
    );
    store.write_manifest(&manifest).unwrap();

    let now = chrono::Local::now().naive_local();
    store
        .write_summary(&RunSummary {
            started_at: now,
            finished_at: now,
            duration_secs: 0.0,
            requested: 1,
            succeeded: 1,
            partial_fundamentals: 0,
            failed: 0,
            skipped: 0,
            gap_flagged: 0,
            failed_tickers: vec![],
        })
        .unwrap();

    assert!(dir.join("historical/AAPL.parquet").exists());
    assert!(dir.join("historical/AAPL.meta.json").exists());
    assert!(dir.join("fundamentals/AAPL.json").exists());
    assert!(dir.join("metadata/collection_manifest.json").exists());
    assert!(dir.join("metadata/collection_summary.json").exists());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn data_hash_tracks_bar_content() {
    let dir_a = temp_store_dir();
    let dir_b = temp_store_dir();
    let store_a = DataStore::open(&dir_a).unwrap();
    let store_b = DataStore::open(&dir_b).unwrap();

    let same_a = store_a
        .write_history(&make_series("SPY", 50), "yahoo_finance")
        .unwrap();
    let same_b = store_b
        .write_history(&make_series("SPY", 50), "yahoo_finance")
        .unwrap();
    let different = store_b
        .write_history(&make_series("QQQ", 51), "yahoo_finance")
        .unwrap();

    assert_eq!(same_a.data_hash, same_b.data_hash);
    assert_ne!(same_a.data_hash, different.data_hash);

    let _ = std::fs::remove_dir_all(&dir_a);
    let _ = std::fs::remove_dir_all(&dir_b);
}

#[test]
fn quarantine_then_rewrite_recovers() {
    let dir = temp_store_dir();
    let store = DataStore::open(&dir).unwrap();

    let parquet = dir.join("historical/MSFT.parquet");
    std::fs::write(&parquet, b"garbage bytes, not parquet").unwrap();

    match store.load_history("MSFT") {
        Err(StoreError::Corrupt { path }) => assert_eq!(path, parquet),
        other => panic!("expected Corrupt error, got: {other:?}"),
    }
    assert!(dir.join("historical/MSFT.parquet.quarantined").exists());

    // A fresh write replaces the slot and loads cleanly
    store
        .write_history(&make_series("MSFT", 20), "yahoo_finance")
        .unwrap();
    let loaded = store.load_history("MSFT").unwrap();

    assert_eq!(loaded.len(), 20);
    assert!(dir.join("historical/MSFT.parquet.quarantined").exists());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn persisted_manifest_answers_coverage_queries() {
    let dir = temp_store_dir();
    let store = DataStore::open(&dir).unwrap();

    let meta = store
        .write_history(&make_series("NVDA", 40), "yahoo_finance")
        .unwrap();

    // A run records the window it was asked for, which can open a few
    // days before the first bar the provider actually delivered.
    let window = DateRange::new(meta.start_date - chrono::Duration::days(3), meta.end_date);
    let mut manifest = CollectionManifest::new();
    manifest.upsert(
        "NVDA",
        ManifestEntry {
            status: TaskStatus::Success,
            attempts: 1,
            bar_count: meta.bar_count,
            start_date: Some(window.start),
            end_date: Some(window.end),
            fundamentals: false,
            ..Default::default()
        },
    );
    store.write_manifest(&manifest).unwrap();

    let reloaded = store.load_manifest().unwrap().unwrap();
    let bar_span = DateRange::new(meta.start_date, meta.end_date);
    let wider = DateRange::new(window.start - chrono::Duration::days(30), window.end);

    assert!(reloaded.covers("NVDA", window));
    assert!(reloaded.covers("NVDA", bar_span));
    assert!(!reloaded.covers("NVDA", wider));
    assert!(!reloaded.covers("AMD", bar_span));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn reopened_store_sees_previous_run() {
    let dir = temp_store_dir();

    {
        let store = DataStore::open(&dir).unwrap();
        store
            .write_history(&make_series("JPM", 10), "yahoo_finance")
            .unwrap();
        let mut manifest = CollectionManifest::new();
        manifest.upsert(
            "JPM",
            ManifestEntry {
                status: TaskStatus::Success,
                attempts: 2,
                bar_count: 10,
                ..Default::default()
            },
        );
        store.write_manifest(&manifest).unwrap();
    }

    let store = DataStore::open(&dir).unwrap();
    let loaded = store.load_history("JPM").unwrap();
    let manifest = store.load_manifest().unwrap().unwrap();

    assert_eq!(loaded.len(), 10);
    assert_eq!(manifest.get("JPM").unwrap().attempts, 2);
    assert_eq!(store.stored_series().len(), 1);

    let _ = std::fs::remove_dir_all(&dir);
}
