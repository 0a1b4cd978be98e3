use crate::ingest::types::QuoteSummary;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CURRENCY: &str = "USD";
pub const DEFAULT_RATING: &str = "N/A";
pub const DEFAULT_SECTOR: &str = "Unknown";

/// One row of the persisted snapshot. Field order is the column order of the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockQuote {
    #[serde(rename = "Ticker")]
    pub ticker: String,
    #[serde(rename = "Price")]
    pub price: f64,
    #[serde(rename = "Currency")]
    pub currency: String,
    #[serde(rename = "Target_Price")]
    pub target_price: f64,
    #[serde(rename = "Upside_Potential")]
    pub upside_potential: f64,
    #[serde(rename = "Num_Analysts")]
    pub num_analysts: u32,
    #[serde(rename = "Strong_Buy")]
    pub strong_buy: u32,
    #[serde(rename = "Buy")]
    pub buy: u32,
    #[serde(rename = "Hold")]
    pub hold: u32,
    #[serde(rename = "Sell")]
    pub sell: u32,
    #[serde(rename = "Strong_Sell")]
    pub strong_sell: u32,
    #[serde(rename = "Rating")]
    pub rating: String,
    #[serde(rename = "Sector")]
    pub sector: String,
    #[serde(rename = "Trailing_PE")]
    pub trailing_pe: Option<f64>,
    #[serde(rename = "Forward_PE")]
    pub forward_pe: Option<f64>,
    /// Percent, not a fraction.
    #[serde(rename = "Dividend_Yield")]
    pub dividend_yield: f64,
}

pub const COLUMNS: [&str; 16] = [
    "Ticker",
    "Price",
    "Currency",
    "Target_Price",
    "Upside_Potential",
    "Num_Analysts",
    "Strong_Buy",
    "Buy",
    "Hold",
    "Sell",
    "Strong_Sell",
    "Rating",
    "Sector",
    "Trailing_PE",
    "Forward_PE",
    "Dividend_Yield",
];

impl StockQuote {
    /// Builds a row from a provider response. Returns `None` when the ticker has no usable
    /// price or analyst target.
    pub fn from_summary(symbol: &str, summary: &QuoteSummary) -> Option<Self> {
        let price = summary.current_price?;
        let target = summary.target_mean_price?;
        let upside = upside_percent(price, target)?;

        let trend = summary.recommendation_trend.unwrap_or_default();

        Some(Self {
            ticker: symbol.trim().to_string(),
            price,
            currency: non_empty_or(summary.currency.as_deref(), DEFAULT_CURRENCY),
            target_price: target,
            upside_potential: round_to(upside, 2),
            num_analysts: summary.number_of_analyst_opinions.unwrap_or(0),
            strong_buy: trend.strong_buy,
            buy: trend.buy,
            hold: trend.hold,
            sell: trend.sell,
            strong_sell: trend.strong_sell,
            rating: non_empty_or(summary.recommendation_key.as_deref(), DEFAULT_RATING),
            sector: non_empty_or(summary.sector.as_deref(), DEFAULT_SECTOR),
            trailing_pe: summary.trailing_pe.filter(|v| v.is_finite()),
            forward_pe: summary.forward_pe.filter(|v| v.is_finite()),
            dividend_yield: summary
                .dividend_yield
                .filter(|v| v.is_finite())
                .map(|v| round_to(v * 100.0, 4))
                .unwrap_or(0.0),
        })
    }
}

/// Percentage difference between the analyst mean target and the current price.
pub fn upside_percent(price: f64, target: f64) -> Option<f64> {
    if !(price.is_finite() && target.is_finite()) || price <= 0.0 || target <= 0.0 {
        return None;
    }
    Some((target - price) / price * 100.0)
}

pub(crate) fn round_to(v: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (v * factor).round() / factor
}

fn non_empty_or(v: Option<&str>, default: &str) -> String {
    v.map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(default)
        .to_string()
}
