pub mod domain;
pub mod ingest;
pub mod screen;
pub mod storage;
pub mod universe;

pub mod config {
    use std::path::PathBuf;

    const DEFAULT_STOCK_DATA_PATH: &str = "stock_data.csv";
    const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

    // Wikipedia rejects requests without a browser-like agent.
    pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
        AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub stock_data_path: PathBuf,
        pub sentry_dsn: Option<String>,
        pub wikipedia_base_url: Option<String>,
        pub yahoo_base_url: Option<String>,
        pub yahoo_cookie_url: Option<String>,
        pub http_timeout_secs: u64,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let http_timeout_secs = match std::env::var("HTTP_TIMEOUT_SECS") {
                Ok(s) => s
                    .parse::<u64>()
                    .map_err(|e| anyhow::anyhow!("invalid HTTP_TIMEOUT_SECS={s:?}: {e}"))?,
                Err(_) => DEFAULT_HTTP_TIMEOUT_SECS,
            };

            Ok(Self {
                stock_data_path: std::env::var("STOCK_DATA_PATH")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_STOCK_DATA_PATH)),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                wikipedia_base_url: std::env::var("WIKIPEDIA_BASE_URL").ok(),
                yahoo_base_url: std::env::var("YAHOO_BASE_URL").ok(),
                yahoo_cookie_url: std::env::var("YAHOO_COOKIE_URL").ok(),
                http_timeout_secs,
            })
        }

        pub fn http_timeout(&self) -> std::time::Duration {
            std::time::Duration::from_secs(self.http_timeout_secs)
        }
    }
}
