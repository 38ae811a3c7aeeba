//! Request budget: requests-per-minute pacing for provider calls.
//!
//! The budget converts a per-minute allowance into a minimum interval
//! between requests and makes callers wait their turn. One Mutex guards
//! the next-free instant, so budget checks are serialized across worker
//! threads; the sleep itself happens outside the lock.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Blocking rate limiter shared by all fetches in a run.
pub struct RequestBudget {
    interval: Duration,
    next_slot: Mutex<Instant>,
}

impl RequestBudget {
    /// Budget allowing `requests_per_minute` calls, evenly paced.
    /// A zero value is treated as 1 to keep the arithmetic sane; the
    /// orchestrator rejects zero in config validation before this runs.
    pub fn per_minute(requests_per_minute: u32) -> Self {
        let rpm = requests_per_minute.max(1);
        Self {
            interval: Duration::from_secs_f64(60.0 / f64::from(rpm)),
            next_slot: Mutex::new(Instant::now()),
        }
    }

    /// No pacing at all. For tests and offline fixtures.
    pub fn unlimited() -> Self {
        Self {
            interval: Duration::ZERO,
            next_slot: Mutex::new(Instant::now()),
        }
    }

    /// The minimum spacing between consecutive requests.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Block until the caller may issue a request.
    ///
    /// Reserves the next slot under the lock, then sleeps outside it, so a
    /// long wait never holds up other threads' reservations.
    pub fn acquire(&self) {
        if self.interval.is_zero() {
            return;
        }
        let wait = {
            let mut next = self.next_slot.lock().unwrap();
            let now = Instant::now();
            if *next <= now {
                *next = now + self.interval;
                Duration::ZERO
            } else {
                let wait = *next - now;
                *next += self.interval;
                wait
            }
        };
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }
    }
}
