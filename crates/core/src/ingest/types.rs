use serde::{Deserialize, Serialize};

/// Provider-agnostic view of a single quote lookup. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteSummary {
    pub current_price: Option<f64>,
    pub target_mean_price: Option<f64>,
    pub currency: Option<String>,
    pub number_of_analyst_opinions: Option<u32>,
    pub recommendation_key: Option<String>,
    pub sector: Option<String>,
    pub trailing_pe: Option<f64>,
    pub forward_pe: Option<f64>,
    /// Fraction as reported by the provider (0.0045 == 0.45 %).
    pub dividend_yield: Option<f64>,
    pub recommendation_trend: Option<RecommendationTrend>,
}

/// Analyst counts per recommendation bucket for the latest period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationTrend {
    pub strong_buy: u32,
    pub buy: u32,
    pub hold: u32,
    pub sell: u32,
    pub strong_sell: u32,
}
