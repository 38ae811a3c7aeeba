//! Stockpile Core — market data entities, providers, and the on-disk store.
//!
//! This crate holds everything the collection pipeline shares:
//! - Validated daily series and date-range types
//! - Fundamentals snapshots
//! - Ticker universe loading (explicit lists, sector files, exchange listings)
//! - The `MarketDataProvider` trait, Yahoo Finance client, and request budget
//! - Parquet/JSON data store with atomic writes and quarantine
//! - Collection manifest and run summaries

pub mod fundamentals;
pub mod manifest;
pub mod provider;
pub mod series;
pub mod store;
pub mod universe;

pub use fundamentals::FundamentalsSnapshot;
pub use manifest::{CollectionManifest, ManifestEntry, RunSummary, TaskStatus};
pub use provider::{FetchError, MarketDataProvider, RequestBudget, YahooClient};
pub use series::{DailyBar, DateRange, HistoricalSeries, SeriesError};
pub use store::{DataStore, SeriesMeta, StoreError};
pub use universe::{Universe, UniverseError};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn series_types_are_send_sync() {
        assert_send::<DailyBar>();
        assert_sync::<DailyBar>();
        assert_send::<HistoricalSeries>();
        assert_sync::<HistoricalSeries>();
        assert_send::<DateRange>();
        assert_sync::<DateRange>();
    }

    #[test]
    fn fundamentals_snapshot_is_send_sync() {
        assert_send::<FundamentalsSnapshot>();
        assert_sync::<FundamentalsSnapshot>();
    }

    #[test]
    fn universe_is_send_sync() {
        assert_send::<Universe>();
        assert_sync::<Universe>();
    }

    #[test]
    fn fetch_error_is_send_sync() {
        assert_send::<FetchError>();
        assert_sync::<FetchError>();
    }

    #[test]
    fn yahoo_client_is_send_sync() {
        // Worker threads share one client behind &dyn MarketDataProvider
        assert_send::<YahooClient>();
        assert_sync::<YahooClient>();
    }

    #[test]
    fn request_budget_is_send_sync() {
        assert_send::<RequestBudget>();
        assert_sync::<RequestBudget>();
    }

    #[test]
    fn store_types_are_send_sync() {
        assert_send::<DataStore>();
        assert_sync::<DataStore>();
        assert_send::<SeriesMeta>();
        assert_sync::<SeriesMeta>();
    }

    #[test]
    fn manifest_types_are_send_sync() {
        assert_send::<CollectionManifest>();
        assert_sync::<CollectionManifest>();
        assert_send::<ManifestEntry>();
        assert_sync::<ManifestEntry>();
        assert_send::<TaskStatus>();
        assert_sync::<TaskStatus>();
        assert_send::<RunSummary>();
        assert_sync::<RunSummary>();
    }
}
