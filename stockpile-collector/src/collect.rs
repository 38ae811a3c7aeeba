//! Per-ticker collection: price history first, then fundamentals.
//!
//! History is the primary artifact. A fundamentals failure degrades the
//! outcome to partial; it never turns a good history fetch into a failure.

use stockpile_core::fundamentals::FundamentalsSnapshot;
use stockpile_core::provider::{FetchError, MarketDataProvider};
use stockpile_core::series::{DateRange, HistoricalSeries};
use thiserror::Error;

/// Why a ticker produced no usable history.
#[derive(Debug, Error)]
pub enum HistoryFailure {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The provider answered cleanly but had no bars in the window.
    /// Asking again will not change the answer.
    #[error("no bars in the requested window")]
    NoBars,
}

impl HistoryFailure {
    pub fn is_retryable(&self) -> bool {
        match self {
            HistoryFailure::Fetch(e) => e.is_retryable(),
            HistoryFailure::NoBars => false,
        }
    }
}

/// Outcome of collecting one ticker.
#[derive(Debug)]
pub enum CollectionResult {
    /// History fetched; fundamentals too, when requested.
    Success {
        series: HistoricalSeries,
        fundamentals: Option<FundamentalsSnapshot>,
    },

    /// History fetched but the fundamentals call failed.
    PartialSuccess {
        series: HistoricalSeries,
        fundamentals_error: FetchError,
    },

    /// No usable history. Nothing gets written for this ticker.
    Failure(HistoryFailure),
}

/// Collect one ticker from the provider.
///
/// Exactly one history request, then at most one fundamentals request;
/// fundamentals are never fetched when history fails.
pub fn collect(
    provider: &dyn MarketDataProvider,
    ticker: &str,
    range: DateRange,
    want_fundamentals: bool,
) -> CollectionResult {
    let series = match provider.fetch_history(ticker, range) {
        Ok(series) if series.is_empty() => {
            return CollectionResult::Failure(HistoryFailure::NoBars)
        }
        Ok(series) => series,
        Err(e) => return CollectionResult::Failure(HistoryFailure::Fetch(e)),
    };

    if !want_fundamentals {
        return CollectionResult::Success {
            series,
            fundamentals: None,
        };
    }

    match provider.fetch_fundamentals(ticker) {
        Ok(snapshot) => CollectionResult::Success {
            series,
            fundamentals: Some(snapshot),
        },
        Err(e) => CollectionResult::PartialSuccess {
            series,
            fundamentals_error: e,
        },
    }
}
