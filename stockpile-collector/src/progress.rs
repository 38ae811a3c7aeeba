//! Progress callbacks for batch collection.
//!
//! Workers report through a shared `&dyn BatchProgress`, so implementations
//! must tolerate interleaved calls from several threads.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use stockpile_core::manifest::{ManifestEntry, RunSummary, TaskStatus};

/// Observer for a batch run. All methods default to no-ops so an
/// implementation only overrides the events it cares about.
pub trait BatchProgress: Send + Sync {
    /// Called once before dispatch, after resume filtering.
    fn on_batch_start(&self, total: usize, to_fetch: usize, skipped: usize) {
        let _ = (total, to_fetch, skipped);
    }

    /// Called when a worker picks up a ticker. The first attempt is 1.
    fn on_task_start(&self, ticker: &str, attempt: u32) {
        let _ = (ticker, attempt);
    }

    /// Called when an attempt failed but the task will be retried.
    fn on_task_retry(&self, ticker: &str, attempt: u32, delay: Duration, error: &str) {
        let _ = (ticker, attempt, delay, error);
    }

    /// Called when a task reaches a terminal state.
    fn on_task_finish(&self, ticker: &str, entry: &ManifestEntry) {
        let _ = (ticker, entry);
    }

    /// Called once after the worker pool drains.
    fn on_batch_complete(&self, summary: &RunSummary) {
        let _ = summary;
    }
}

/// Progress reporter that prints one line per event to stdout.
#[derive(Default)]
pub struct StdoutProgress {
    started: AtomicUsize,
    to_fetch: AtomicUsize,
}

impl StdoutProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BatchProgress for StdoutProgress {
    fn on_batch_start(&self, total: usize, to_fetch: usize, skipped: usize) {
        self.to_fetch.store(to_fetch, Ordering::Relaxed);
        if skipped > 0 {
            println!("Collecting {to_fetch} of {total} tickers ({skipped} already covered)");
        } else {
            println!("Collecting {to_fetch} tickers");
        }
    }

    fn on_task_start(&self, ticker: &str, attempt: u32) {
        // Retries already announced themselves via on_task_retry
        if attempt == 1 {
            let index = self.started.fetch_add(1, Ordering::Relaxed);
            let total = self.to_fetch.load(Ordering::Relaxed);
            println!("[{}/{}] Fetching {ticker}...", index + 1, total);
        }
    }

    fn on_task_retry(&self, ticker: &str, attempt: u32, delay: Duration, error: &str) {
        println!(
            "  RETRY: {ticker} attempt {attempt} failed, next try in {:.1}s: {error}",
            delay.as_secs_f64()
        );
    }

    fn on_task_finish(&self, ticker: &str, entry: &ManifestEntry) {
        match entry.status {
            TaskStatus::Success => {
                let mut notes = String::new();
                if entry.gap_flagged {
                    notes.push_str(", gap flagged");
                }
                if entry.error.is_some() {
                    notes.push_str(", fundamentals missing");
                }
                println!("  OK: {ticker} ({} bars{notes})", entry.bar_count);
            }
            _ => {
                println!(
                    "  FAIL: {ticker}: {}",
                    entry.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
    }

    fn on_batch_complete(&self, summary: &RunSummary) {
        println!(
            "\nCollection complete: {}/{} succeeded, {} failed, {} skipped in {:.1}s",
            summary.succeeded,
            summary.requested,
            summary.failed,
            summary.skipped,
            summary.duration_secs
        );
        if summary.partial_fundamentals > 0 {
            println!("  {} with missing fundamentals", summary.partial_fundamentals);
        }
        if summary.gap_flagged > 0 {
            println!("  {} series with coverage gaps", summary.gap_flagged);
        }
        if !summary.failed_tickers.is_empty() {
            println!("  failed: {}", summary.failed_tickers.join(", "));
        }
    }
}

/// Progress sink for tests and embedding.
pub struct SilentProgress;

impl BatchProgress for SilentProgress {}
