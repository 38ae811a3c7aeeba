//! Collection manifest: the per-ticker record a batch run reads to decide
//! what still needs fetching, and writes as tasks reach a terminal state.
//!
//! The manifest only ever holds terminal outcomes. Transient states
//! (pending, in progress) live in the orchestrator; a run that dies
//! mid-task leaves no entry behind, so the next run simply fetches again.

use crate::series::DateRange;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifecycle of one ticker's collection task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Success,
    Failed,
    Skipped,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Success => "success",
            TaskStatus::Failed => "failed",
            TaskStatus::Skipped => "skipped",
        }
    }
}

/// Terminal outcome for one ticker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub status: TaskStatus,
    pub attempts: u32,
    pub bar_count: usize,
    /// Window the collection was asked for. Not the first/last bar dates:
    /// those start on trading days and would defeat resume whenever the
    /// requested window opens on a weekend or holiday.
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub fundamentals: bool,
    pub gap_flagged: bool,
    pub error: Option<String>,
    pub completed_at: NaiveDateTime,
}

/// Per-ticker outcomes for a collection, keyed by ticker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionManifest {
    entries: BTreeMap<String, ManifestEntry>,
}

impl CollectionManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an outcome, replacing any previous entry for the ticker.
    pub fn upsert(&mut self, ticker: impl Into<String>, entry: ManifestEntry) {
        self.entries.insert(ticker.into(), entry);
    }

    pub fn get(&self, ticker: &str) -> Option<&ManifestEntry> {
        self.entries.get(ticker)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in ticker order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &ManifestEntry)> {
        self.entries.iter().map(|(t, e)| (t.as_str(), e))
    }

    /// Whether a prior successful collection already spans `range`.
    ///
    /// Compares requested windows: a success recorded for a wider window
    /// covers any narrower one. A failed entry never shields a ticker
    /// from being fetched again.
    pub fn covers(&self, ticker: &str, range: DateRange) -> bool {
        match self.entries.get(ticker) {
            Some(entry) if entry.status == TaskStatus::Success => {
                match (entry.start_date, entry.end_date) {
                    (Some(start), Some(end)) => DateRange::new(start, end).contains(&range),
                    _ => false,
                }
            }
            _ => false,
        }
    }

    /// Number of entries with the given status.
    pub fn count(&self, status: TaskStatus) -> usize {
        self.entries.values().filter(|e| e.status == status).count()
    }

    /// Tickers whose last outcome was a failure, in ticker order.
    pub fn failed_tickers(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, e)| e.status == TaskStatus::Failed)
            .map(|(t, _)| t.clone())
            .collect()
    }
}

/// Aggregate report for one batch run, persisted next to the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: NaiveDateTime,
    pub finished_at: NaiveDateTime,
    pub duration_secs: f64,
    pub requested: usize,
    pub succeeded: usize,
    pub partial_fundamentals: usize,
    pub failed: usize,
    pub skipped: usize,
    pub gap_flagged: usize,
    pub failed_tickers: Vec<String>,
}
