//! Point-in-time fundamentals for one ticker.
//!
//! Every metric is optional: the provider omits whole modules for funds,
//! foreign listings, and recent IPOs, and a snapshot with holes is still
//! worth keeping. The snapshot is persisted as one JSON file per ticker.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Fundamental metrics captured at fetch time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundamentalsSnapshot {
    pub ticker: String,
    pub fetched_at: NaiveDateTime,

    // Valuation
    pub market_cap: Option<f64>,
    pub enterprise_value: Option<f64>,
    pub trailing_pe: Option<f64>,
    pub forward_pe: Option<f64>,
    pub peg_ratio: Option<f64>,
    pub price_to_book: Option<f64>,
    pub price_to_sales: Option<f64>,
    pub enterprise_to_revenue: Option<f64>,
    pub enterprise_to_ebitda: Option<f64>,

    // Profitability
    pub profit_margins: Option<f64>,
    pub operating_margins: Option<f64>,
    pub return_on_assets: Option<f64>,
    pub return_on_equity: Option<f64>,

    // Growth
    pub revenue_growth: Option<f64>,
    pub earnings_growth: Option<f64>,

    // Balance sheet
    pub current_ratio: Option<f64>,
    pub quick_ratio: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub free_cashflow: Option<f64>,

    // Distributions
    pub dividend_yield: Option<f64>,
    pub payout_ratio: Option<f64>,

    // Share structure
    pub beta: Option<f64>,
    pub shares_outstanding: Option<f64>,
    pub float_shares: Option<f64>,

    // Classification
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub country: Option<String>,
}

impl FundamentalsSnapshot {
    /// Number of metrics the provider actually supplied.
    pub fn available_metrics(&self) -> usize {
        let numeric = [
            self.market_cap,
            self.enterprise_value,
            self.trailing_pe,
            self.forward_pe,
            self.peg_ratio,
            self.price_to_book,
            self.price_to_sales,
            self.enterprise_to_revenue,
            self.enterprise_to_ebitda,
            self.profit_margins,
            self.operating_margins,
            self.return_on_assets,
            self.return_on_equity,
            self.revenue_growth,
            self.earnings_growth,
            self.current_ratio,
            self.quick_ratio,
            self.debt_to_equity,
            self.free_cashflow,
            self.dividend_yield,
            self.payout_ratio,
            self.beta,
            self.shares_outstanding,
            self.float_shares,
        ];
        let text = [&self.sector, &self.industry, &self.country];

        numeric.iter().filter(|m| m.is_some()).count()
            + text.iter().filter(|m| m.is_some()).count()
    }
}
