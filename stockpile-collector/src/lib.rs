//! Stockpile Collector — batch market-data collection on top of `stockpile-core`.
//!
//! This crate provides:
//! - Per-ticker collection (price history plus optional fundamentals)
//! - A bounded worker pool with backoff-aware retry scheduling
//! - Resume support driven by the on-disk collection manifest
//! - Progress reporting hooks for CLI front ends

pub mod batch;
pub mod collect;
pub mod config;
pub mod progress;
pub mod task;

pub use batch::{run_batch, BatchError, BatchReport};
pub use collect::{collect, CollectionResult, HistoryFailure};
pub use config::{CollectorConfig, ConfigError};
pub use progress::{BatchProgress, SilentProgress, StdoutProgress};
pub use task::{backoff_delay, CollectionTask};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn collector_config_is_send_sync() {
        assert_send::<CollectorConfig>();
        assert_sync::<CollectorConfig>();
    }

    #[test]
    fn collection_task_is_send_sync() {
        assert_send::<CollectionTask>();
        assert_sync::<CollectionTask>();
    }

    #[test]
    fn batch_report_is_send_sync() {
        assert_send::<BatchReport>();
        assert_sync::<BatchReport>();
    }

    #[test]
    fn progress_reporters_are_send_sync() {
        assert_send::<StdoutProgress>();
        assert_sync::<StdoutProgress>();
        assert_send::<SilentProgress>();
        assert_sync::<SilentProgress>();
    }
}
