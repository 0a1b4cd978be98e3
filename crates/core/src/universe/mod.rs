//! Ticker universe: index-membership pages plus a hand-curated list, merged into one set.

pub mod html;

use crate::config::{Settings, BROWSER_USER_AGENT};
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::time::Duration;

const DEFAULT_WIKIPEDIA_BASE_URL: &str = "https://en.wikipedia.org/wiki/";

/// Symbols that are not index members but are worth tracking anyway.
pub const CUSTOM_TICKERS: &[&str] = &[
    "GME", "AMC", "PLTR", "HOOD", "COIN", "RIVN", "SOFI", "ARKK", "SPY", "QQQ", "IWM", "APLD",
    "MARA", "CIFR", "IREN", "AEVA", "INOD", "NBIS",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IndexSource {
    Sp500,
    Nasdaq100,
    Russell1000,
    TsxComposite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TablePick {
    At(usize),
    FirstWithColumn,
}

impl IndexSource {
    pub const ALL: [IndexSource; 4] = [
        IndexSource::Sp500,
        IndexSource::Nasdaq100,
        IndexSource::Russell1000,
        IndexSource::TsxComposite,
    ];

    pub fn name(self) -> &'static str {
        match self {
            IndexSource::Sp500 => "sp500",
            IndexSource::Nasdaq100 => "nasdaq100",
            IndexSource::Russell1000 => "russell1000",
            IndexSource::TsxComposite => "tsx",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|src| src.name().eq_ignore_ascii_case(s.trim()))
    }

    fn page(self) -> &'static str {
        match self {
            IndexSource::Sp500 => "List_of_S%26P_500_companies",
            IndexSource::Nasdaq100 => "Nasdaq-100",
            IndexSource::Russell1000 => "Russell_1000_Index",
            IndexSource::TsxComposite => "S%26P/TSX_Composite_Index",
        }
    }

    fn table(self) -> TablePick {
        match self {
            IndexSource::Sp500 => TablePick::At(0),
            IndexSource::Nasdaq100 | IndexSource::Russell1000 => TablePick::FirstWithColumn,
            // Constituents table follows three summary/infobox tables on this page.
            IndexSource::TsxComposite => TablePick::At(3),
        }
    }

    /// Candidate ticker columns, most preferred first.
    fn columns(self) -> &'static [&'static str] {
        match self {
            IndexSource::Sp500 => &["Symbol"],
            IndexSource::Nasdaq100 => &["Ticker", "Symbol"],
            IndexSource::Russell1000 => &["Symbol", "Ticker"],
            IndexSource::TsxComposite => &["Ticker", "Symbol", "Ticker symbol"],
        }
    }

    fn suffix(self) -> Option<&'static str> {
        match self {
            IndexSource::TsxComposite => Some(".TO"),
            _ => None,
        }
    }
}

/// HTTP client for index-membership pages.
#[derive(Debug, Clone)]
pub struct UniverseClient {
    http: reqwest::Client,
    base_url: String,
}

impl UniverseClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings
            .wikipedia_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_WIKIPEDIA_BASE_URL.to_string());
        Self::new(base_url, settings.http_timeout())
    }

    pub fn new(base_url: String, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .context("failed to build universe http client")?;
        Ok(Self { http, base_url })
    }

    fn url(&self, source: IndexSource) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), source.page())
    }

    /// Index members for `source`. Any failure is logged and yields an empty list.
    pub async fn fetch_index_tickers(&self, source: IndexSource) -> Vec<String> {
        match self.try_fetch_index_tickers(source).await {
            Ok(tickers) => tickers,
            Err(err) => {
                tracing::warn!(
                    source = source.name(),
                    error = %format!("{err:#}"),
                    "could not read index members; using empty list"
                );
                Vec::new()
            }
        }
    }

    async fn try_fetch_index_tickers(&self, source: IndexSource) -> Result<Vec<String>> {
        let res = self
            .http
            .get(self.url(source))
            .send()
            .await
            .context("index page request failed")?;

        let status = res.status();
        let body = res.text().await.context("failed to read index page")?;
        if !status.is_success() {
            anyhow::bail!("index page HTTP {status}");
        }

        extract_tickers(&body, source)
    }
}

/// Pulls the ticker column out of an index page and normalizes it.
pub fn extract_tickers(page_html: &str, source: IndexSource) -> Result<Vec<String>> {
    let tables = html::parse_tables(page_html);
    let wanted = source.columns();
    let has_column = |t: &html::HtmlTable| wanted.iter().any(|c| t.column_index(c).is_some());

    let table = match source.table() {
        TablePick::At(idx) => tables.get(idx).with_context(|| {
            format!("expected table #{idx}, page has {} tables", tables.len())
        })?,
        TablePick::FirstWithColumn => tables
            .iter()
            .find(|t| has_column(*t))
            .with_context(|| format!("no table with any of the columns {wanted:?}"))?,
    };

    let col = wanted
        .iter()
        .find_map(|c| table.column_index(c))
        .with_context(|| {
            format!(
                "ticker column not found; available columns: {:?}",
                table.columns
            )
        })?;

    Ok(table
        .column_values(col)
        .filter_map(|raw| normalize_symbol(raw, source.suffix()))
        .collect())
}

/// Converts a listed symbol to the form the quote provider expects.
///
/// Share classes use dashes (`BRK.B` -> `BRK-B`); with a suffix the exchange marker is
/// (re)appended after conversion (`TECK.B` -> `TECK-B.TO`).
pub fn normalize_symbol(raw: &str, suffix: Option<&str>) -> Option<String> {
    let t = raw.trim();
    if t.is_empty() || t.eq_ignore_ascii_case("nan") {
        return None;
    }

    match suffix {
        Some(suffix) => {
            let base = t.strip_suffix(suffix).unwrap_or(t);
            if base.is_empty() {
                return None;
            }
            Some(format!("{}{suffix}", base.replace('.', "-")))
        }
        None => Some(t.replace('.', "-")),
    }
}

pub fn custom_tickers() -> Vec<String> {
    CUSTOM_TICKERS.iter().map(|s| s.to_string()).collect()
}

/// Union of all lists, deduplicated and sorted.
pub fn merge_universe<I>(lists: I) -> Vec<String>
where
    I: IntoIterator<Item = Vec<String>>,
{
    lists
        .into_iter()
        .flatten()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
