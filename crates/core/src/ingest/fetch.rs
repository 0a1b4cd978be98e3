use crate::domain::quote::StockQuote;
use crate::ingest::provider::QuoteProvider;
use rand::Rng;
use std::time::Duration;

const PRIMARY_SUFFIX: &str = ".TO";
const ALTERNATE_SUFFIX: &str = ".NE";

const DEFAULT_DELAY_MIN_MS: u64 = 200;
const DEFAULT_DELAY_MAX_MS: u64 = 500;
const DEFAULT_PROGRESS_EVERY: usize = 100;

#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Lower bound of the random pause between tickers.
    pub delay_min: Duration,
    pub delay_max: Duration,
    /// Emit a progress summary every N tickers (0 disables it).
    pub progress_every: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            delay_min: Duration::from_millis(DEFAULT_DELAY_MIN_MS),
            delay_max: Duration::from_millis(DEFAULT_DELAY_MAX_MS),
            progress_every: DEFAULT_PROGRESS_EVERY,
        }
    }
}

impl FetchOptions {
    pub fn from_env() -> Self {
        let mut out = Self::default();

        if let Some(ms) = env_parse::<u64>("FETCH_DELAY_MIN_MS") {
            out.delay_min = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>("FETCH_DELAY_MAX_MS") {
            out.delay_max = Duration::from_millis(ms);
        }
        if out.delay_max < out.delay_min {
            out.delay_max = out.delay_min;
        }
        if let Some(n) = env_parse::<usize>("FETCH_PROGRESS_EVERY") {
            out.progress_every = n;
        }

        out
    }

    pub fn no_delay() -> Self {
        Self {
            delay_min: Duration::ZERO,
            delay_max: Duration::ZERO,
            ..Self::default()
        }
    }

    fn next_delay(&self) -> Duration {
        if self.delay_max <= self.delay_min {
            return self.delay_min;
        }
        rand::thread_rng().gen_range(self.delay_min..=self.delay_max)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    pub quotes: Vec<StockQuote>,
    /// Original tickers for which no attempt produced a row.
    pub failed: Vec<String>,
    pub attempted: usize,
}

/// Symbols to try for one ticker, in order. Toronto listings fall back to the NEO exchange.
pub fn symbol_attempts(ticker: &str) -> Vec<String> {
    let mut attempts = vec![ticker.to_string()];
    if let Some(base) = ticker.strip_suffix(PRIMARY_SUFFIX) {
        attempts.push(format!("{base}{ALTERNATE_SUFFIX}"));
    }
    attempts
}

/// Fetches one row per ticker, sequentially. Per-ticker failures are logged and skipped.
pub async fn fetch_analyst_data(
    provider: &dyn QuoteProvider,
    tickers: &[String],
    opts: &FetchOptions,
) -> FetchReport {
    let total = tickers.len();
    let mut report = FetchReport {
        quotes: Vec::with_capacity(total),
        failed: Vec::new(),
        attempted: total,
    };

    tracing::info!(
        total,
        provider = provider.provider_name(),
        "starting analyst data scan"
    );

    for (idx, ticker) in tickers.iter().enumerate() {
        if idx != 0 {
            let delay = opts.next_delay();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        let n = idx + 1;
        match fetch_one(provider, ticker).await {
            Some(quote) => {
                tracing::info!(
                    n,
                    total,
                    ticker = %quote.ticker,
                    upside = quote.upside_potential,
                    "quote fetched"
                );
                report.quotes.push(quote);
            }
            None => {
                tracing::info!(n, total, %ticker, "no usable quote; skipping ticker");
                report.failed.push(ticker.clone());
            }
        }

        if opts.progress_every != 0 && (n % opts.progress_every == 0 || n == total) {
            tracing::info!(
                processed = n,
                total,
                quotes = report.quotes.len(),
                failures = report.failed.len(),
                "scan progress"
            );
        }
    }

    report
}

async fn fetch_one(provider: &dyn QuoteProvider, ticker: &str) -> Option<StockQuote> {
    for symbol in symbol_attempts(ticker) {
        match provider.fetch_summary(&symbol).await {
            Ok(summary) => match StockQuote::from_summary(&symbol, &summary) {
                Some(quote) => return Some(quote),
                None => {
                    tracing::debug!(%symbol, "quote lacks price or analyst target");
                }
            },
            Err(err) => {
                tracing::debug!(%symbol, error = %format!("{err:#}"), "quote lookup failed");
            }
        }
    }
    None
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse::<T>().ok())
}
