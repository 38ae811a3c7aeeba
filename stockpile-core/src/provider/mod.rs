//! Provider boundary: the market-data trait and its error taxonomy.
//!
//! Everything provider-specific (URLs, auth quirks, response schemas) stays
//! behind `MarketDataProvider`. The rest of the pipeline sees typed series
//! and snapshots or a classified `FetchError`, never raw payloads.

pub mod budget;
pub mod yahoo;

pub use budget::RequestBudget;
pub use yahoo::YahooClient;

use crate::fundamentals::FundamentalsSnapshot;
use crate::series::{DateRange, HistoricalSeries};
use thiserror::Error;

/// Classified fetch failures.
///
/// Retryability drives the orchestrator's task state machine: transient
/// errors requeue with backoff, permanent ones terminate the task on the
/// first attempt.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The provider rejected the request (5xx, unexpected status).
    #[error("provider rejected request ({status}): {message}")]
    Provider { status: u16, message: String },

    /// Transport failure: DNS, connect, timeout.
    #[error("network unreachable: {0}")]
    Network(String),

    /// HTTP 429 after budget-compliant pacing.
    #[error("rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// The ticker does not exist at the provider.
    #[error("ticker not found: {ticker}")]
    NotFound { ticker: String },

    /// Response arrived but did not match the expected schema.
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl FetchError {
    /// Whether a later attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::Provider { .. } | FetchError::Network(_) | FetchError::RateLimited { .. }
        )
    }
}

/// A source of historical bars and fundamentals.
///
/// Implementations are constructed per run and shared across worker
/// threads; both calls block until the provider answers (or the request
/// budget frees up).
pub trait MarketDataProvider: Send + Sync {
    /// Short provider label recorded in storage sidecars.
    fn name(&self) -> &str;

    /// Daily bars for the window. An empty series is a valid answer: the
    /// ticker exists but has no data in range.
    fn fetch_history(
        &self,
        ticker: &str,
        range: DateRange,
    ) -> Result<HistoricalSeries, FetchError>;

    /// Point-in-time fundamentals for the ticker.
    fn fetch_fundamentals(&self, ticker: &str) -> Result<FundamentalsSnapshot, FetchError>;
}
