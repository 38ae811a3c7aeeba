//! Batch orchestration: a bounded worker pool drains a per-ticker task
//! queue, retrying transient failures with exponential backoff and
//! persisting the manifest as each task settles.
//!
//! Ordering guarantees:
//! - Tasks are dispatched in universe order, never ahead of their
//!   backoff eligibility time.
//! - A failure only ever affects its own ticker; the run keeps going.
//! - The stop flag halts new dispatch; in-flight tasks finish and are
//!   recorded normally.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

use stockpile_core::manifest::{CollectionManifest, ManifestEntry, RunSummary, TaskStatus};
use stockpile_core::provider::{FetchError, MarketDataProvider};
use stockpile_core::series::DateRange;
use stockpile_core::store::DataStore;
use stockpile_core::universe::Universe;

use crate::collect::{collect, CollectionResult, HistoryFailure};
use crate::config::CollectorConfig;
use crate::progress::BatchProgress;
use crate::task::{backoff_delay, CollectionTask};

/// The only error that aborts a batch before dispatch. Per-ticker
/// failures are recorded in the manifest instead.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Result of a completed batch run.
#[derive(Debug)]
pub struct BatchReport {
    pub manifest: CollectionManifest,
    pub summary: RunSummary,
}

// ── Scheduling ───────────────────────────────────────────────────────

struct Dispatch {
    queue: VecDeque<CollectionTask>,
    in_flight: usize,
}

/// Shared task queue with backoff-aware handout.
struct Scheduler {
    dispatch: Mutex<Dispatch>,
    work_ready: Condvar,
}

impl Scheduler {
    fn new(queue: VecDeque<CollectionTask>) -> Self {
        Self {
            dispatch: Mutex::new(Dispatch {
                queue,
                in_flight: 0,
            }),
            work_ready: Condvar::new(),
        }
    }

    /// Next eligible task, or None when the pool should shut down.
    ///
    /// Blocks while the queue is empty but siblings are still in flight
    /// (their retries may land back in the queue), and while every queued
    /// task is waiting out a backoff window.
    fn next_task(&self, stop: Option<&AtomicBool>) -> Option<CollectionTask> {
        let mut dispatch = self.dispatch.lock().unwrap();
        loop {
            if stop.is_some_and(|f| f.load(Ordering::Relaxed)) {
                return None;
            }

            if dispatch.queue.is_empty() {
                if dispatch.in_flight == 0 {
                    return None;
                }
                dispatch = self.work_ready.wait(dispatch).unwrap();
                continue;
            }

            let now = Instant::now();
            if let Some(pos) = dispatch.queue.iter().position(|t| t.is_eligible(now)) {
                let mut task = dispatch.queue.remove(pos).unwrap();
                task.begin_attempt();
                dispatch.in_flight += 1;
                return Some(task);
            }

            // Everything queued is backing off; sleep until the earliest slot
            let earliest = dispatch
                .queue
                .iter()
                .map(|t| t.next_eligible_at)
                .min()
                .unwrap();
            let wait = earliest.saturating_duration_since(now);
            let (guard, _) = self.work_ready.wait_timeout(dispatch, wait).unwrap();
            dispatch = guard;
        }
    }

    /// A task reached a terminal state.
    fn finish_task(&self) {
        let mut dispatch = self.dispatch.lock().unwrap();
        dispatch.in_flight -= 1;
        drop(dispatch);
        self.work_ready.notify_all();
    }

    /// A task goes back in line for another attempt.
    fn requeue(&self, task: CollectionTask) {
        let mut dispatch = self.dispatch.lock().unwrap();
        dispatch.queue.push_back(task);
        dispatch.in_flight -= 1;
        drop(dispatch);
        self.work_ready.notify_all();
    }
}

/// Shared run state: the manifest plus counters, persisted on every
/// terminal outcome so an interrupted run loses at most the in-flight
/// tickers.
struct Ledger<'a> {
    store: &'a DataStore,
    state: Mutex<LedgerState>,
}

struct LedgerState {
    manifest: CollectionManifest,
    succeeded: usize,
    partial_fundamentals: usize,
    gap_flagged: usize,
    failed_tickers: Vec<String>,
}

impl Ledger<'_> {
    fn record(&self, ticker: &str, entry: ManifestEntry) {
        let mut state = self.state.lock().unwrap();
        match entry.status {
            TaskStatus::Success => {
                state.succeeded += 1;
                if entry.error.is_some() {
                    state.partial_fundamentals += 1;
                }
                if entry.gap_flagged {
                    state.gap_flagged += 1;
                }
            }
            TaskStatus::Failed => state.failed_tickers.push(ticker.to_string()),
            _ => {}
        }
        state.manifest.upsert(ticker, entry);
        if let Err(e) = self.store.write_manifest(&state.manifest) {
            eprintln!("WARNING: failed to persist manifest: {e}");
        }
    }
}

// ── Task settlement ──────────────────────────────────────────────────

enum Settled {
    Terminal(ManifestEntry),
    Retry(HistoryFailure),
}

/// Turn a collection result into a terminal manifest entry or a retry.
///
/// Storage failures are terminal: retrying the fetch will not fix a disk
/// that will not take the write.
fn settle(
    store: &DataStore,
    config: &CollectorConfig,
    source: &str,
    task: &CollectionTask,
    result: CollectionResult,
) -> Settled {
    let (series, fundamentals, fundamentals_error) = match result {
        CollectionResult::Success {
            series,
            fundamentals,
        } => (series, fundamentals, None),
        CollectionResult::PartialSuccess {
            series,
            fundamentals_error,
        } => (series, None, Some(fundamentals_error)),
        CollectionResult::Failure(failure) => {
            if failure.is_retryable() && task.attempts < config.max_attempts {
                return Settled::Retry(failure);
            }
            return Settled::Terminal(failed_entry(task, failure.to_string()));
        }
    };

    if let Err(e) = store.write_history(&series, source) {
        return Settled::Terminal(failed_entry(task, format!("storage: {e}")));
    }

    let mut wrote_fundamentals = false;
    let mut fundamentals_note = fundamentals_error.map(|e| format!("fundamentals: {e}"));
    if let Some(snapshot) = fundamentals {
        match store.write_fundamentals(&snapshot) {
            Ok(()) => wrote_fundamentals = true,
            Err(e) => fundamentals_note = Some(format!("fundamentals storage: {e}")),
        }
    }

    // Record the window we asked for; the meta sidecar keeps the actual
    // bar dates. Resume compares requested windows.
    Settled::Terminal(ManifestEntry {
        status: TaskStatus::Success,
        attempts: task.attempts,
        bar_count: series.len(),
        start_date: Some(task.range.start),
        end_date: Some(task.range.end),
        fundamentals: wrote_fundamentals,
        gap_flagged: series.largest_gap_days() > config.gap_tolerance_days,
        error: fundamentals_note,
        completed_at: chrono::Local::now().naive_local(),
    })
}

fn failed_entry(task: &CollectionTask, error: String) -> ManifestEntry {
    ManifestEntry {
        status: TaskStatus::Failed,
        attempts: task.attempts,
        bar_count: 0,
        start_date: None,
        end_date: None,
        fundamentals: false,
        gap_flagged: false,
        error: Some(error),
        completed_at: chrono::Local::now().naive_local(),
    }
}

// ── Orchestration ────────────────────────────────────────────────────

fn run_worker(
    scheduler: &Scheduler,
    ledger: &Ledger,
    provider: &dyn MarketDataProvider,
    store: &DataStore,
    config: &CollectorConfig,
    progress: &dyn BatchProgress,
    stop: Option<&AtomicBool>,
) {
    while let Some(mut task) = scheduler.next_task(stop) {
        progress.on_task_start(&task.ticker, task.attempts);

        let result = collect(provider, &task.ticker, task.range, config.fundamentals);
        match settle(store, config, provider.name(), &task, result) {
            Settled::Terminal(entry) => {
                progress.on_task_finish(&task.ticker, &entry);
                ledger.record(&task.ticker, entry);
                scheduler.finish_task();
            }
            Settled::Retry(failure) => {
                let backoff = backoff_delay(config.backoff_base_secs, task.attempts);
                let delay = match &failure {
                    // A rate-limit response names its own earliest retry time
                    HistoryFailure::Fetch(FetchError::RateLimited { retry_after_secs }) => {
                        backoff.max(Duration::from_secs(*retry_after_secs))
                    }
                    _ => backoff,
                };
                progress.on_task_retry(&task.ticker, task.attempts, delay, &failure.to_string());
                task.schedule_retry(delay);
                scheduler.requeue(task);
            }
        }
    }
}

/// Run a batch collection over the universe.
///
/// Completing the batch is success, whatever the per-ticker outcomes;
/// the summary and manifest carry the tallies. The only hard error is a
/// configuration problem detected before any task is dispatched.
pub fn run_batch(
    provider: &dyn MarketDataProvider,
    store: &DataStore,
    universe: &Universe,
    range: DateRange,
    config: &CollectorConfig,
    progress: &dyn BatchProgress,
    stop: Option<&AtomicBool>,
) -> Result<BatchReport, BatchError> {
    config
        .validate()
        .map_err(|e| BatchError::Configuration(e.to_string()))?;
    if universe.is_empty() {
        return Err(BatchError::Configuration("universe is empty".into()));
    }
    if !range.is_valid() {
        return Err(BatchError::Configuration(format!(
            "date range runs backwards: {range}"
        )));
    }

    let started_at = chrono::Local::now().naive_local();
    let clock = Instant::now();

    let manifest = if config.resume {
        match store.load_manifest() {
            Ok(Some(manifest)) => manifest,
            Ok(None) => CollectionManifest::new(),
            Err(e) => {
                eprintln!("WARNING: ignoring unreadable manifest: {e}");
                CollectionManifest::new()
            }
        }
    } else {
        CollectionManifest::new()
    };

    let mut queue = VecDeque::new();
    let mut skipped = 0usize;
    for ticker in universe.iter() {
        if config.resume && manifest.covers(ticker, range) {
            skipped += 1;
        } else {
            queue.push_back(CollectionTask::new(ticker, range));
        }
    }

    let requested = universe.len();
    let to_fetch = queue.len();
    progress.on_batch_start(requested, to_fetch, skipped);

    let scheduler = Scheduler::new(queue);
    let ledger = Ledger {
        store,
        state: Mutex::new(LedgerState {
            manifest,
            succeeded: 0,
            partial_fundamentals: 0,
            gap_flagged: 0,
            failed_tickers: Vec::new(),
        }),
    };

    let workers = config.concurrency.min(to_fetch);
    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| {
                run_worker(&scheduler, &ledger, provider, store, config, progress, stop)
            });
        }
    });

    let state = ledger.state.into_inner().unwrap();
    let manifest = state.manifest;
    let mut failed_tickers = state.failed_tickers;
    failed_tickers.sort();

    let finished_at = chrono::Local::now().naive_local();
    let summary = RunSummary {
        started_at,
        finished_at,
        duration_secs: clock.elapsed().as_secs_f64(),
        requested,
        succeeded: state.succeeded,
        partial_fundamentals: state.partial_fundamentals,
        failed: failed_tickers.len(),
        skipped,
        gap_flagged: state.gap_flagged,
        failed_tickers,
    };

    if let Err(e) = store.write_manifest(&manifest) {
        eprintln!("WARNING: failed to persist manifest: {e}");
    }
    if let Err(e) = store.write_summary(&summary) {
        eprintln!("WARNING: failed to persist run summary: {e}");
    }

    progress.on_batch_complete(&summary);
    Ok(BatchReport { manifest, summary })
}
