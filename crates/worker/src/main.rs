use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing::Instrument;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use upside_core::ingest::fetch::FetchOptions;
use upside_core::ingest::provider::{QuoteProvider, YahooQuoteClient};
use upside_core::universe::UniverseClient;

mod ingest;
mod universe;

#[derive(Debug, Parser)]
#[command(name = "upside_worker")]
struct Args {
    /// Snapshot file to (over)write. Defaults to STOCK_DATA_PATH or ./stock_data.csv.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Scan only these tickers instead of scraping the index pages. Repeatable.
    #[arg(long = "ticker", value_name = "SYMBOL")]
    tickers: Vec<String>,

    /// Cap the number of tickers scanned (after deduplication).
    #[arg(long)]
    max_tickers: Option<usize>,

    /// Build and log the ticker universe, then exit without fetching or writing.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = upside_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let run_id = uuid::Uuid::new_v4();
    let started_at = chrono::Utc::now();
    let result = run(&settings, args)
        .instrument(tracing::info_span!("scan", %run_id))
        .await;
    match &result {
        Ok(()) => {
            let elapsed = chrono::Utc::now() - started_at;
            tracing::info!(%started_at, elapsed_secs = elapsed.num_seconds(), "scan finished");
        }
        Err(err) => {
            sentry_anyhow::capture_anyhow(err);
            tracing::error!(error = %format!("{err:#}"), "scan failed");
        }
    }
    result
}

async fn run(settings: &upside_core::config::Settings, args: Args) -> anyhow::Result<()> {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| settings.stock_data_path.clone());

    let mut tickers = if args.tickers.is_empty() {
        let client = UniverseClient::from_settings(settings)?;
        universe::build_universe(&client, &universe::UniverseOptions::from_env()).await
    } else {
        let joined = args.tickers.join(",");
        upside_core::universe::merge_universe([universe::parse_ticker_list(&joined)])
    };

    if let Some(max) = args.max_tickers {
        tickers.truncate(max);
    }
    anyhow::ensure!(!tickers.is_empty(), "ticker universe is empty; nothing to scan");

    if args.dry_run {
        tracing::info!(
            dry_run = true,
            tickers_len = tickers.len(),
            output = %output.display(),
            "universe built (dry-run); skipping fetch"
        );
        return Ok(());
    }

    let provider = YahooQuoteClient::from_settings(settings)?;
    tracing::info!(
        provider = provider.provider_name(),
        tickers_len = tickers.len(),
        "scanning analyst data"
    );

    ingest::run_scan(&provider, &tickers, &FetchOptions::from_env(), &output)
        .await
        .with_context(|| format!("scan could not save {}", output.display()))?;

    Ok(())
}

fn init_sentry(settings: &upside_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
