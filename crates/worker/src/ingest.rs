use anyhow::Context;
use std::path::{Path, PathBuf};
use upside_core::ingest::fetch::{fetch_analyst_data, FetchOptions, FetchReport};
use upside_core::ingest::provider::QuoteProvider;
use upside_core::storage::snapshot::write_snapshot;

/// Scans every ticker and replaces the snapshot file with the rows that succeeded.
pub async fn run_scan(
    provider: &dyn QuoteProvider,
    tickers: &[String],
    opts: &FetchOptions,
    output: &Path,
) -> anyhow::Result<FetchReport> {
    let t0 = std::time::Instant::now();
    let report = fetch_analyst_data(provider, tickers, opts).await;

    let path: PathBuf = output.to_path_buf();
    let rows = report.quotes.clone();
    tokio::task::spawn_blocking(move || write_snapshot(&path, &rows))
        .await
        .context("join snapshot write task failed")??;

    tracing::info!(
        attempted = report.attempted,
        saved = report.quotes.len(),
        failures = report.failed.len(),
        elapsed_secs = t0.elapsed().as_secs(),
        path = %output.display(),
        "snapshot saved"
    );

    Ok(report)
}
