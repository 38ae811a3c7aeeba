//! Per-ticker collection tasks and retry arithmetic.
//!
//! A task moves pending -> in_progress -> {success, failed}; a retryable
//! failure puts it back to pending with a future eligibility time. The
//! scheduler in `batch` owns the transitions; this module just keeps the
//! state honest.

use std::time::{Duration, Instant};
use stockpile_core::manifest::TaskStatus;
use stockpile_core::series::DateRange;

/// One ticker's unit of work as it moves through the scheduler.
#[derive(Debug, Clone)]
pub struct CollectionTask {
    pub ticker: String,
    pub range: DateRange,
    pub attempts: u32,
    pub status: TaskStatus,
    pub next_eligible_at: Instant,
}

impl CollectionTask {
    pub fn new(ticker: impl Into<String>, range: DateRange) -> Self {
        Self {
            ticker: ticker.into(),
            range,
            attempts: 0,
            status: TaskStatus::Pending,
            next_eligible_at: Instant::now(),
        }
    }

    /// Mark the task in progress and return the attempt number (1-based).
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.status = TaskStatus::InProgress;
        self.attempts
    }

    /// Put the task back in line, eligible again after `delay`.
    pub fn schedule_retry(&mut self, delay: Duration) {
        self.status = TaskStatus::Pending;
        self.next_eligible_at = Instant::now() + delay;
    }

    pub fn is_eligible(&self, now: Instant) -> bool {
        self.next_eligible_at <= now
    }
}

/// Exponential backoff: base for the first retry, doubling per attempt.
pub fn backoff_delay(base_secs: f64, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1)) as f64;
    Duration::from_secs_f64(base_secs * factor)
}
