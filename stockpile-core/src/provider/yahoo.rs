//! Yahoo Finance client: v8 chart API for bars, v10 quoteSummary for
//! fundamentals.
//!
//! Yahoo has no official API and changes formats without notice, so every
//! response is validated here and coerced into the typed entities; schema
//! surprises surface as `FetchError::Malformed` instead of leaking
//! downstream. The client makes exactly one HTTP attempt per call and
//! paces itself through the shared `RequestBudget`; retry scheduling is
//! the orchestrator's job.

use super::budget::RequestBudget;
use super::{FetchError, MarketDataProvider};
use crate::fundamentals::FundamentalsSnapshot;
use crate::series::{DailyBar, DateRange, HistoricalSeries};
use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;

const CHART_BASE_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";
const QUOTE_SUMMARY_BASE_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";
const QUOTE_SUMMARY_MODULES: &str = "summaryDetail,defaultKeyStatistics,financialData,assetProfile";

// ── Chart API response ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

// ── quoteSummary response ────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct QuoteSummaryResponse {
    #[serde(rename = "quoteSummary")]
    quote_summary: QuoteSummaryEnvelope,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryEnvelope {
    result: Option<Vec<QuoteSummaryResult>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryResult {
    summary_detail: Option<SummaryDetail>,
    default_key_statistics: Option<KeyStatistics>,
    financial_data: Option<FinancialData>,
    asset_profile: Option<AssetProfile>,
}

/// Yahoo wraps numbers as `{"raw": 1.23, "fmt": "1.23"}`; only raw matters.
#[derive(Debug, Default, Deserialize)]
struct RawNum {
    raw: Option<f64>,
}

impl RawNum {
    fn value(field: Option<RawNum>) -> Option<f64> {
        field.and_then(|v| v.raw)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryDetail {
    market_cap: Option<RawNum>,
    #[serde(rename = "trailingPE")]
    trailing_pe: Option<RawNum>,
    #[serde(rename = "forwardPE")]
    forward_pe: Option<RawNum>,
    price_to_sales_trailing12_months: Option<RawNum>,
    dividend_yield: Option<RawNum>,
    payout_ratio: Option<RawNum>,
    beta: Option<RawNum>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyStatistics {
    enterprise_value: Option<RawNum>,
    peg_ratio: Option<RawNum>,
    price_to_book: Option<RawNum>,
    enterprise_to_revenue: Option<RawNum>,
    enterprise_to_ebitda: Option<RawNum>,
    profit_margins: Option<RawNum>,
    shares_outstanding: Option<RawNum>,
    float_shares: Option<RawNum>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinancialData {
    profit_margins: Option<RawNum>,
    operating_margins: Option<RawNum>,
    return_on_assets: Option<RawNum>,
    return_on_equity: Option<RawNum>,
    revenue_growth: Option<RawNum>,
    earnings_growth: Option<RawNum>,
    current_ratio: Option<RawNum>,
    quick_ratio: Option<RawNum>,
    debt_to_equity: Option<RawNum>,
    free_cashflow: Option<RawNum>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetProfile {
    sector: Option<String>,
    industry: Option<String>,
    country: Option<String>,
}

// ── Client ───────────────────────────────────────────────────────────

/// Yahoo Finance provider, shared across worker threads.
pub struct YahooClient {
    http: reqwest::blocking::Client,
    budget: RequestBudget,
}

impl YahooClient {
    pub fn new(budget: RequestBudget) -> Self {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .expect("failed to build HTTP client");

        Self { http, budget }
    }

    /// Chart API URL for a ticker and date window.
    fn chart_url(ticker: &str, range: DateRange) -> String {
        let start_ts = range.start.and_hms_opt(0, 0, 0).unwrap().and_utc().timestamp();
        let end_ts = range.end.and_hms_opt(23, 59, 59).unwrap().and_utc().timestamp();
        format!(
            "{CHART_BASE_URL}/{ticker}\
             ?period1={start_ts}&period2={end_ts}&interval=1d\
             &includeAdjustedClose=true"
        )
    }

    /// quoteSummary URL with the module set the snapshot draws from.
    fn quote_summary_url(ticker: &str) -> String {
        format!("{QUOTE_SUMMARY_BASE_URL}/{ticker}?modules={QUOTE_SUMMARY_MODULES}")
    }

    /// Map a non-success HTTP status to a FetchError.
    fn status_error(resp: &reqwest::blocking::Response, ticker: &str) -> Option<FetchError> {
        let status = resp.status();
        if status.is_success() {
            return None;
        }
        Some(match status {
            reqwest::StatusCode::NOT_FOUND => FetchError::NotFound {
                ticker: ticker.to_string(),
            },
            reqwest::StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                FetchError::RateLimited {
                    retry_after_secs: retry_after,
                }
            }
            _ => FetchError::Provider {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string(),
            },
        })
    }

    /// Parse the chart response into a validated series.
    ///
    /// Rows where every OHLCV field is null (holidays, halts) are skipped.
    /// A well-formed response with no rows in the window parses to an
    /// empty series; only the collector decides what that means.
    fn parse_chart(
        ticker: &str,
        range: DateRange,
        resp: ChartResponse,
    ) -> Result<HistoricalSeries, FetchError> {
        let result = match resp.chart.result {
            Some(result) => result,
            None => {
                return Err(match resp.chart.error {
                    Some(err) if err.code == "Not Found" => FetchError::NotFound {
                        ticker: ticker.to_string(),
                    },
                    Some(err) => {
                        FetchError::Malformed(format!("{}: {}", err.code, err.description))
                    }
                    None => FetchError::Malformed("empty result with no error".into()),
                })
            }
        };

        let data = match result.into_iter().next() {
            Some(data) => data,
            None => return Err(FetchError::Malformed("result array is empty".into())),
        };

        let Some(timestamps) = data.timestamp else {
            return Ok(HistoricalSeries::empty(ticker));
        };

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::Malformed("no quote data".into()))?;

        let adj_closes = data
            .indicators
            .adjclose
            .and_then(|v| v.into_iter().next())
            .map(|a| a.adjclose);

        let mut bars = Vec::with_capacity(timestamps.len());

        for (i, &ts) in timestamps.iter().enumerate() {
            let date = chrono::DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.naive_utc().date())
                .ok_or_else(|| FetchError::Malformed(format!("invalid timestamp: {ts}")))?;

            // Yahoo pads the window edges with the odd out-of-range row
            if date < range.start || date > range.end {
                continue;
            }

            let open = quote.open.get(i).copied().flatten();
            let high = quote.high.get(i).copied().flatten();
            let low = quote.low.get(i).copied().flatten();
            let close = quote.close.get(i).copied().flatten();
            let volume = quote.volume.get(i).copied().flatten();
            let adj_close = adj_closes.as_ref().and_then(|v| v.get(i).copied().flatten());

            if open.is_none()
                && high.is_none()
                && low.is_none()
                && close.is_none()
                && volume.is_none()
            {
                continue;
            }

            bars.push(DailyBar {
                date,
                open: open.unwrap_or(f64::NAN),
                high: high.unwrap_or(f64::NAN),
                low: low.unwrap_or(f64::NAN),
                close: close.unwrap_or(f64::NAN),
                volume: volume.unwrap_or(0),
                adj_close: adj_close.or(close).unwrap_or(f64::NAN),
            });
        }

        HistoricalSeries::from_bars(ticker, bars).map_err(|e| FetchError::Malformed(e.to_string()))
    }

    /// Merge the quoteSummary modules into one snapshot. Margins appear in
    /// two modules; financialData wins, defaultKeyStatistics fills in.
    fn parse_quote_summary(
        ticker: &str,
        resp: QuoteSummaryResponse,
    ) -> Result<FundamentalsSnapshot, FetchError> {
        let result = match resp.quote_summary.result {
            Some(result) => result,
            None => {
                return Err(match resp.quote_summary.error {
                    Some(err) if err.code == "Not Found" => FetchError::NotFound {
                        ticker: ticker.to_string(),
                    },
                    Some(err) => {
                        FetchError::Malformed(format!("{}: {}", err.code, err.description))
                    }
                    None => FetchError::Malformed("empty result with no error".into()),
                })
            }
        };

        let modules = match result.into_iter().next() {
            Some(modules) => modules,
            None => return Err(FetchError::Malformed("result array is empty".into())),
        };

        let summary = modules.summary_detail.unwrap_or_default();
        let stats = modules.default_key_statistics.unwrap_or_default();
        let financial = modules.financial_data.unwrap_or_default();
        let profile = modules.asset_profile.unwrap_or_default();

        Ok(FundamentalsSnapshot {
            ticker: ticker.to_string(),
            fetched_at: chrono::Local::now().naive_local(),

            market_cap: RawNum::value(summary.market_cap),
            enterprise_value: RawNum::value(stats.enterprise_value),
            trailing_pe: RawNum::value(summary.trailing_pe),
            forward_pe: RawNum::value(summary.forward_pe),
            peg_ratio: RawNum::value(stats.peg_ratio),
            price_to_book: RawNum::value(stats.price_to_book),
            price_to_sales: RawNum::value(summary.price_to_sales_trailing12_months),
            enterprise_to_revenue: RawNum::value(stats.enterprise_to_revenue),
            enterprise_to_ebitda: RawNum::value(stats.enterprise_to_ebitda),

            profit_margins: RawNum::value(financial.profit_margins)
                .or(RawNum::value(stats.profit_margins)),
            operating_margins: RawNum::value(financial.operating_margins),
            return_on_assets: RawNum::value(financial.return_on_assets),
            return_on_equity: RawNum::value(financial.return_on_equity),

            revenue_growth: RawNum::value(financial.revenue_growth),
            earnings_growth: RawNum::value(financial.earnings_growth),

            current_ratio: RawNum::value(financial.current_ratio),
            quick_ratio: RawNum::value(financial.quick_ratio),
            debt_to_equity: RawNum::value(financial.debt_to_equity),
            free_cashflow: RawNum::value(financial.free_cashflow),

            dividend_yield: RawNum::value(summary.dividend_yield),
            payout_ratio: RawNum::value(summary.payout_ratio),

            beta: RawNum::value(summary.beta),
            shares_outstanding: RawNum::value(stats.shares_outstanding),
            float_shares: RawNum::value(stats.float_shares),

            sector: profile.sector,
            industry: profile.industry,
            country: profile.country,
        })
    }
}

impl MarketDataProvider for YahooClient {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch_history(
        &self,
        ticker: &str,
        range: DateRange,
    ) -> Result<HistoricalSeries, FetchError> {
        self.budget.acquire();

        let url = Self::chart_url(ticker, range);
        let resp = self
            .http
            .get(&url)
            .send()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        if let Some(err) = Self::status_error(&resp, ticker) {
            return Err(err);
        }

        let chart: ChartResponse = resp.json().map_err(|e| {
            FetchError::Malformed(format!("failed to parse chart response for {ticker}: {e}"))
        })?;

        Self::parse_chart(ticker, range, chart)
    }

    fn fetch_fundamentals(&self, ticker: &str) -> Result<FundamentalsSnapshot, FetchError> {
        self.budget.acquire();

        let url = Self::quote_summary_url(ticker);
        let resp = self
            .http
            .get(&url)
            .send()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        if let Some(err) = Self::status_error(&resp, ticker) {
            return Err(err);
        }

        let summary: QuoteSummaryResponse = resp.json().map_err(|e| {
            FetchError::Malformed(format!(
                "failed to parse quoteSummary response for {ticker}: {e}"
            ))
        })?;

        Self::parse_quote_summary(ticker, summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jan_2024() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )
    }

    #[test]
    fn chart_url_includes_period_and_interval() {
        let url = YahooClient::chart_url("AAPL", jan_2024());
        assert!(url.starts_with("https://query2.finance.yahoo.com/v8/finance/chart/AAPL?"));
        assert!(url.contains("period1=1704067200"));
        assert!(url.contains("interval=1d"));
        assert!(url.contains("includeAdjustedClose=true"));
    }

    #[test]
    fn quote_summary_url_lists_modules() {
        let url = YahooClient::quote_summary_url("MSFT");
        assert_eq!(
            url,
            "https://query2.finance.yahoo.com/v10/finance/quoteSummary/MSFT\
             ?modules=summaryDetail,defaultKeyStatistics,financialData,assetProfile"
        );
    }

    #[test]
    fn parse_chart_builds_bars_and_skips_null_rows() {
        // Jan 2 and Jan 3 2024, with a null middle row (halt day)
        let json = r#"{
            "chart": {
                "result": [{
                    "timestamp": [1704187800, 1704227400, 1704274200],
                    "indicators": {
                        "quote": [{
                            "open":   [187.15, null, 184.22],
                            "high":   [188.44, null, 185.88],
                            "low":    [183.89, null, 183.43],
                            "close":  [185.64, null, 184.25],
                            "volume": [82488700, null, 58414500]
                        }],
                        "adjclose": [{"adjclose": [184.9, null, 183.5]}]
                    }
                }],
                "error": null
            }
        }"#;
        let resp: ChartResponse = serde_json::from_str(json).unwrap();
        let series = YahooClient::parse_chart("AAPL", jan_2024(), resp).unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(
            series.first_date(),
            Some(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap())
        );
        assert_eq!(series.bars()[0].close, 185.64);
        assert_eq!(series.bars()[0].adj_close, 184.9);
        assert_eq!(series.bars()[1].volume, 58414500);
    }

    #[test]
    fn parse_chart_not_found_maps_to_not_found() {
        let json = r#"{
            "chart": {
                "result": null,
                "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}
            }
        }"#;
        let resp: ChartResponse = serde_json::from_str(json).unwrap();
        let err = YahooClient::parse_chart("ZZZINVALID", jan_2024(), resp).unwrap_err();

        assert!(matches!(err, FetchError::NotFound { ticker } if ticker == "ZZZINVALID"));
    }

    #[test]
    fn parse_chart_without_timestamps_is_empty_series() {
        // Yahoo omits "timestamp" entirely for windows with no trading data
        let json = r#"{
            "chart": {
                "result": [{
                    "indicators": {
                        "quote": [{"open":[],"high":[],"low":[],"close":[],"volume":[]}],
                        "adjclose": null
                    }
                }],
                "error": null
            }
        }"#;
        let resp: ChartResponse = serde_json::from_str(json).unwrap();
        let series = YahooClient::parse_chart("AAPL", jan_2024(), resp).unwrap();

        assert!(series.is_empty());
    }

    #[test]
    fn parse_chart_missing_quote_is_malformed() {
        let json = r#"{
            "chart": {
                "result": [{"timestamp": [1704187800], "indicators": {"quote": []}}],
                "error": null
            }
        }"#;
        let resp: ChartResponse = serde_json::from_str(json).unwrap();
        let err = YahooClient::parse_chart("AAPL", jan_2024(), resp).unwrap_err();

        assert!(matches!(err, FetchError::Malformed(_)));
    }

    #[test]
    fn parse_quote_summary_merges_modules() {
        let json = r#"{
            "quoteSummary": {
                "result": [{
                    "summaryDetail": {
                        "marketCap": {"raw": 2994999196000, "fmt": "2.99T"},
                        "trailingPE": {"raw": 28.93, "fmt": "28.93"},
                        "dividendYield": {"raw": 0.0055, "fmt": "0.55%"},
                        "beta": {"raw": 1.29, "fmt": "1.29"}
                    },
                    "defaultKeyStatistics": {
                        "enterpriseValue": {"raw": 3037896900000, "fmt": "3.04T"},
                        "priceToBook": {"raw": 48.1, "fmt": "48.10"},
                        "sharesOutstanding": {"raw": 15441900000, "fmt": "15.44B"}
                    },
                    "financialData": {
                        "profitMargins": {"raw": 0.2616, "fmt": "26.16%"},
                        "returnOnEquity": {"raw": 1.5427, "fmt": "154.27%"},
                        "currentRatio": {"raw": 0.988, "fmt": "0.99"},
                        "freeCashflow": {"raw": 86563127296, "fmt": "86.56B"}
                    },
                    "assetProfile": {
                        "sector": "Technology",
                        "industry": "Consumer Electronics",
                        "country": "United States"
                    }
                }],
                "error": null
            }
        }"#;
        let resp: QuoteSummaryResponse = serde_json::from_str(json).unwrap();
        let snap = YahooClient::parse_quote_summary("AAPL", resp).unwrap();

        assert_eq!(snap.ticker, "AAPL");
        assert_eq!(snap.market_cap, Some(2994999196000.0));
        assert_eq!(snap.trailing_pe, Some(28.93));
        assert_eq!(snap.price_to_book, Some(48.1));
        assert_eq!(snap.profit_margins, Some(0.2616));
        assert_eq!(snap.return_on_equity, Some(1.5427));
        assert_eq!(snap.sector.as_deref(), Some("Technology"));
        assert_eq!(snap.forward_pe, None);
    }

    #[test]
    fn parse_quote_summary_with_missing_modules() {
        // ETFs carry summaryDetail only; everything else stays None
        let json = r#"{
            "quoteSummary": {
                "result": [{
                    "summaryDetail": {"dividendYield": {"raw": 0.0129, "fmt": "1.29%"}}
                }],
                "error": null
            }
        }"#;
        let resp: QuoteSummaryResponse = serde_json::from_str(json).unwrap();
        let snap = YahooClient::parse_quote_summary("SPY", resp).unwrap();

        assert_eq!(snap.dividend_yield, Some(0.0129));
        assert_eq!(snap.market_cap, None);
        assert_eq!(snap.sector, None);
        assert_eq!(snap.available_metrics(), 1);
    }

    #[test]
    fn parse_quote_summary_not_found() {
        let json = r#"{
            "quoteSummary": {
                "result": null,
                "error": {"code": "Not Found", "description": "Quote not found for ticker symbol: ZZZINVALID"}
            }
        }"#;
        let resp: QuoteSummaryResponse = serde_json::from_str(json).unwrap();
        let err = YahooClient::parse_quote_summary("ZZZINVALID", resp).unwrap_err();

        assert!(matches!(err, FetchError::NotFound { ticker } if ticker == "ZZZINVALID"));
    }

    #[test]
    fn parse_chart_rejects_duplicate_dates() {
        // Same trading day twice: constructor catches it, client reports Malformed
        let json = r#"{
            "chart": {
                "result": [{
                    "timestamp": [1704187800, 1704188800],
                    "indicators": {
                        "quote": [{
                            "open": [1.0, 1.0], "high": [2.0, 2.0], "low": [0.5, 0.5],
                            "close": [1.5, 1.6], "volume": [10, 20]
                        }],
                        "adjclose": [{"adjclose": [1.5, 1.6]}]
                    }
                }],
                "error": null
            }
        }"#;
        let resp: ChartResponse = serde_json::from_str(json).unwrap();
        let err = YahooClient::parse_chart("AAPL", jan_2024(), resp).unwrap_err();

        assert!(matches!(err, FetchError::Malformed(_)));
    }
}
