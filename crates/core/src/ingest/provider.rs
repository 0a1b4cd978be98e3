use crate::config::{Settings, BROWSER_USER_AGENT};
use crate::ingest::types::{QuoteSummary, RecommendationTrend};
use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://query2.finance.yahoo.com";
const DEFAULT_COOKIE_URL: &str = "https://fc.yahoo.com";
const QUOTE_SUMMARY_MODULES: &str = "financialData,summaryDetail,assetProfile,recommendationTrend";

#[async_trait::async_trait]
pub trait QuoteProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn fetch_summary(&self, symbol: &str) -> Result<QuoteSummary>;
}

/// Yahoo Finance `quoteSummary` client.
///
/// Yahoo requires a session cookie plus a matching crumb on every lookup. Both are obtained
/// lazily on first use and kept for the lifetime of the process.
#[derive(Debug)]
pub struct YahooQuoteClient {
    http: reqwest::Client,
    base_url: String,
    cookie_url: String,

    crumb_cache: tokio::sync::Mutex<Option<String>>,
}

impl YahooQuoteClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings
            .yahoo_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let cookie_url = settings
            .yahoo_cookie_url
            .clone()
            .unwrap_or_else(|| DEFAULT_COOKIE_URL.to_string());
        Self::new(base_url, cookie_url, settings.http_timeout())
    }

    pub fn new(base_url: String, cookie_url: String, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(BROWSER_USER_AGENT)
            .cookie_store(true)
            .build()
            .context("failed to build Yahoo http client")?;

        Ok(Self {
            http,
            base_url,
            cookie_url,
            crumb_cache: tokio::sync::Mutex::new(None),
        })
    }

    async fn get_crumb_cached(&self) -> Result<String> {
        let mut guard = self.crumb_cache.lock().await;
        if let Some(crumb) = guard.as_ref() {
            return Ok(crumb.clone());
        }

        let crumb = self.fetch_crumb().await?;
        *guard = Some(crumb.clone());
        Ok(crumb)
    }

    async fn invalidate_crumb(&self) {
        *self.crumb_cache.lock().await = None;
    }

    async fn fetch_crumb(&self) -> Result<String> {
        // The cookie endpoint answers 404 but still sets the session cookie.
        if let Err(err) = self.http.get(&self.cookie_url).send().await {
            tracing::warn!(error = %err, "Yahoo cookie request failed; continuing without cookie");
        }

        let url = format!("{}/v1/test/getcrumb", self.base_url.trim_end_matches('/'));
        let res = self
            .http
            .get(url)
            .send()
            .await
            .context("Yahoo crumb request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read Yahoo crumb response")?;
        if !status.is_success() {
            anyhow::bail!("Yahoo crumb HTTP {status}: {text}");
        }

        let crumb = text.trim().to_string();
        anyhow::ensure!(!crumb.is_empty(), "Yahoo returned an empty crumb");
        Ok(crumb)
    }
}

#[async_trait::async_trait]
impl QuoteProvider for YahooQuoteClient {
    fn provider_name(&self) -> &'static str {
        "yahoo_finance"
    }

    async fn fetch_summary(&self, symbol: &str) -> Result<QuoteSummary> {
        let crumb = self.get_crumb_cached().await?;
        let url = format!(
            "{}/v10/finance/quoteSummary/{}",
            self.base_url.trim_end_matches('/'),
            symbol
        );

        let res = self
            .http
            .get(url)
            .query(&[("modules", QUOTE_SUMMARY_MODULES), ("crumb", crumb.as_str())])
            .send()
            .await
            .with_context(|| format!("Yahoo quoteSummary request failed for {symbol}"))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read Yahoo quoteSummary response")?;

        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            self.invalidate_crumb().await;
            anyhow::bail!("Yahoo quoteSummary HTTP {status} for {symbol}; crumb invalidated");
        }
        if !status.is_success() {
            anyhow::bail!("Yahoo quoteSummary HTTP {status} for {symbol}: {text}");
        }

        parse_quote_summary(&text).with_context(|| format!("bad quoteSummary for {symbol}"))
    }
}

pub(crate) fn parse_quote_summary(text: &str) -> Result<QuoteSummary> {
    let envelope = serde_json::from_str::<Envelope>(text)
        .context("Yahoo quoteSummary response is not valid JSON")?;

    if let Some(err) = envelope.quote_summary.error {
        anyhow::bail!(
            "Yahoo quoteSummary error: {} ({})",
            err.description.unwrap_or_default(),
            err.code.unwrap_or_default()
        );
    }

    let result = envelope
        .quote_summary
        .result
        .and_then(|r| r.into_iter().next())
        .context("Yahoo quoteSummary has no result")?;

    let financial = result.financial_data.unwrap_or_default();
    let detail = result.summary_detail.unwrap_or_default();
    let profile = result.asset_profile.unwrap_or_default();

    // First trend entry is the current month ("0m").
    let trend = result
        .recommendation_trend
        .and_then(|t| t.trend.into_iter().next())
        .map(|t| RecommendationTrend {
            strong_buy: t.strong_buy,
            buy: t.buy,
            hold: t.hold,
            sell: t.sell,
            strong_sell: t.strong_sell,
        });

    Ok(QuoteSummary {
        current_price: financial.current_price.raw(),
        target_mean_price: financial.target_mean_price.raw(),
        currency: detail.currency,
        number_of_analyst_opinions: financial
            .number_of_analyst_opinions
            .raw()
            .filter(|v| *v >= 0.0)
            .map(|v| v as u32),
        recommendation_key: financial.recommendation_key.filter(|k| k != "none"),
        sector: profile.sector,
        trailing_pe: detail.trailing_pe.raw(),
        forward_pe: detail.forward_pe.raw(),
        dividend_yield: detail.dividend_yield.raw(),
        recommendation_trend: trend,
    })
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "quoteSummary")]
    quote_summary: QuoteSummaryBody,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryBody {
    #[serde(default)]
    result: Option<Vec<QuoteSummaryResult>>,
    #[serde(default)]
    error: Option<YahooError>,
}

#[derive(Debug, Deserialize)]
struct YahooError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryResult {
    #[serde(default)]
    financial_data: Option<FinancialData>,
    #[serde(default)]
    summary_detail: Option<SummaryDetail>,
    #[serde(default)]
    asset_profile: Option<AssetProfile>,
    #[serde(default)]
    recommendation_trend: Option<TrendModule>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinancialData {
    #[serde(default)]
    current_price: RawValue,
    #[serde(default)]
    target_mean_price: RawValue,
    #[serde(default)]
    number_of_analyst_opinions: RawValue,
    #[serde(default)]
    recommendation_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryDetail {
    #[serde(default)]
    currency: Option<String>,
    #[serde(default, rename = "trailingPE")]
    trailing_pe: RawValue,
    #[serde(default, rename = "forwardPE")]
    forward_pe: RawValue,
    #[serde(default)]
    dividend_yield: RawValue,
}

#[derive(Debug, Default, Deserialize)]
struct AssetProfile {
    #[serde(default)]
    sector: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TrendModule {
    #[serde(default)]
    trend: Vec<TrendEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrendEntry {
    #[serde(default)]
    strong_buy: u32,
    #[serde(default)]
    buy: u32,
    #[serde(default)]
    hold: u32,
    #[serde(default)]
    sell: u32,
    #[serde(default)]
    strong_sell: u32,
}

/// Yahoo wraps numbers as `{"raw": 1.5, "fmt": "1.50"}`, or `{}` when absent.
#[derive(Debug, Default, Deserialize)]
struct RawValue {
    #[serde(default)]
    raw: Option<f64>,
}

impl RawValue {
    fn raw(&self) -> Option<f64> {
        self.raw.filter(|v| v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const AAPL_BODY: &str = r#"{
        "quoteSummary": {
            "result": [{
                "financialData": {
                    "currentPrice": {"raw": 200.0, "fmt": "200.00"},
                    "targetMeanPrice": {"raw": 230.5, "fmt": "230.50"},
                    "numberOfAnalystOpinions": {"raw": 41, "fmt": "41"},
                    "recommendationKey": "buy"
                },
                "summaryDetail": {
                    "currency": "USD",
                    "trailingPE": {"raw": 31.2, "fmt": "31.20"},
                    "forwardPE": {},
                    "dividendYield": {"raw": 0.0045, "fmt": "0.45%"}
                },
                "assetProfile": {"sector": "Technology"},
                "recommendationTrend": {
                    "trend": [
                        {"period": "0m", "strongBuy": 7, "buy": 21, "hold": 12, "sell": 1, "strongSell": 0},
                        {"period": "-1m", "strongBuy": 6, "buy": 20, "hold": 13, "sell": 2, "strongSell": 0}
                    ]
                }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn parses_modules_and_latest_trend() {
        let s = parse_quote_summary(AAPL_BODY).unwrap();
        assert_eq!(s.current_price, Some(200.0));
        assert_eq!(s.target_mean_price, Some(230.5));
        assert_eq!(s.number_of_analyst_opinions, Some(41));
        assert_eq!(s.recommendation_key.as_deref(), Some("buy"));
        assert_eq!(s.sector.as_deref(), Some("Technology"));
        assert_eq!(s.trailing_pe, Some(31.2));
        assert_eq!(s.forward_pe, None);
        assert_eq!(s.dividend_yield, Some(0.0045));
        let trend = s.recommendation_trend.unwrap();
        assert_eq!((trend.strong_buy, trend.buy, trend.hold), (7, 21, 12));
    }

    #[test]
    fn tolerates_missing_modules() {
        let body = r#"{"quoteSummary": {"result": [{"financialData": {"currentPrice": {"raw": 5.0}}}], "error": null}}"#;
        let s = parse_quote_summary(body).unwrap();
        assert_eq!(s.current_price, Some(5.0));
        assert_eq!(s.target_mean_price, None);
        assert_eq!(s.recommendation_trend, None);
        assert_eq!(s.sector, None);
    }

    #[test]
    fn reports_provider_error() {
        let body = r#"{"quoteSummary": {"result": null, "error": {"code": "Not Found", "description": "Quote not found for symbol: ZZZZ"}}}"#;
        let err = parse_quote_summary(body).unwrap_err();
        assert!(err.to_string().contains("Quote not found"));
    }

    #[tokio::test]
    async fn fetches_with_crumb_and_invalidates_on_unauthorized() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/cookie"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/test/getcrumb"))
            .respond_with(ResponseTemplate::new(200).set_body_string("abc123"))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v10/finance/quoteSummary/AAPL"))
            .and(query_param("crumb", "abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_string(AAPL_BODY))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v10/finance/quoteSummary/LOCKED"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = YahooQuoteClient::new(
            server.uri(),
            format!("{}/cookie", server.uri()),
            Duration::from_secs(5),
        )
        .unwrap();

        let s = client.fetch_summary("AAPL").await.unwrap();
        assert_eq!(s.current_price, Some(200.0));

        assert!(client.fetch_summary("LOCKED").await.is_err());

        // Crumb was dropped after the 401, so this lookup fetches a fresh one.
        let s = client.fetch_summary("AAPL").await.unwrap();
        assert_eq!(s.sector.as_deref(), Some("Technology"));
    }
}
