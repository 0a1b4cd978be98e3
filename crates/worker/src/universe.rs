use upside_core::universe::{self, IndexSource, UniverseClient};

const EXCHANGE_SUFFIXES: [&str; 2] = [".TO", ".NE"];

#[derive(Debug, Clone)]
pub struct UniverseOptions {
    /// Index pages to scrape.
    pub sources: Vec<IndexSource>,

    /// Include the hand-curated ticker list.
    pub include_custom: bool,

    /// Additional symbols; exchange suffixes such as `.TO` are preserved.
    pub extra_tickers: Vec<String>,
}

impl Default for UniverseOptions {
    fn default() -> Self {
        Self {
            sources: IndexSource::ALL.to_vec(),
            include_custom: true,
            extra_tickers: Vec::new(),
        }
    }
}

impl UniverseOptions {
    pub fn from_env() -> Self {
        let mut out = Self::default();

        if let Ok(s) = std::env::var("UNIVERSE_SOURCES") {
            let (sources, include_custom) = parse_sources(&s);
            out.sources = sources;
            out.include_custom = include_custom;
        }

        if let Ok(s) = std::env::var("UNIVERSE_EXTRA_TICKERS") {
            out.extra_tickers = parse_ticker_list(&s);
        }

        out
    }
}

fn parse_sources(s: &str) -> (Vec<IndexSource>, bool) {
    let mut sources = Vec::new();
    let mut include_custom = false;
    for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if part.eq_ignore_ascii_case("custom") {
            include_custom = true;
            continue;
        }
        match IndexSource::parse(part) {
            Some(src) if !sources.contains(&src) => sources.push(src),
            Some(_) => {}
            None => tracing::warn!(source = part, "unknown universe source; ignoring"),
        }
    }
    (sources, include_custom)
}

pub fn parse_ticker_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|t| t.trim().to_ascii_uppercase())
        .filter_map(|t| {
            let suffix = EXCHANGE_SUFFIXES.iter().copied().find(|sfx| t.ends_with(sfx));
            universe::normalize_symbol(&t, suffix)
        })
        .collect()
}

/// Gathers every configured source and merges them into one deduplicated list.
pub async fn build_universe(client: &UniverseClient, opts: &UniverseOptions) -> Vec<String> {
    let mut lists = Vec::with_capacity(opts.sources.len() + 2);

    for source in &opts.sources {
        let tickers = client.fetch_index_tickers(*source).await;
        tracing::info!(source = source.name(), count = tickers.len(), "index members found");
        lists.push(tickers);
    }

    if opts.include_custom {
        lists.push(universe::custom_tickers());
    }
    if !opts.extra_tickers.is_empty() {
        lists.push(opts.extra_tickers.clone());
    }

    let merged = universe::merge_universe(lists);
    tracing::info!(unique = merged.len(), "ticker universe deduplicated");
    merged
}
