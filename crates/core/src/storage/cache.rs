use crate::domain::quote::StockQuote;
use crate::storage::snapshot::read_snapshot;
use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use std::path::PathBuf;
use std::sync::Arc;

pub const DEFAULT_TTL_SECS: i64 = 2 * 60 * 60;

/// Parses a TTL in whole seconds. Negative or unrepresentable values are rejected.
pub fn ttl_from_secs(raw: &str) -> anyhow::Result<Duration> {
    let secs: i64 = raw
        .trim()
        .parse()
        .with_context(|| format!("invalid TTL seconds {raw:?}"))?;
    anyhow::ensure!(secs >= 0, "TTL seconds must be >= 0, got {secs}");
    Duration::try_seconds(secs).with_context(|| format!("TTL seconds out of range: {secs}"))
}

#[derive(Debug, Clone)]
struct CachedSnapshot {
    rows: Arc<Vec<StockQuote>>,
    loaded_at: DateTime<Utc>,
}

/// Process-local copy of the snapshot file with a fixed time-to-live.
#[derive(Debug)]
pub struct SnapshotCache {
    path: PathBuf,
    ttl: Duration,
    entry: tokio::sync::RwLock<Option<CachedSnapshot>>,
}

impl SnapshotCache {
    pub fn new(path: PathBuf, ttl: Duration) -> Self {
        Self {
            path,
            ttl,
            entry: tokio::sync::RwLock::new(None),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Cached rows, reloading from disk once the TTL has passed.
    ///
    /// `Ok(None)` when the snapshot file does not exist; that outcome is not cached.
    pub async fn get(&self) -> anyhow::Result<Option<Arc<Vec<StockQuote>>>> {
        {
            let guard = self.entry.read().await;
            if let Some(cached) = guard.as_ref() {
                if !self.is_expired(cached, Utc::now()) {
                    return Ok(Some(cached.rows.clone()));
                }
            }
        }

        let mut guard = self.entry.write().await;
        // Another request may have reloaded while we waited for the write lock.
        if let Some(cached) = guard.as_ref() {
            if !self.is_expired(cached, Utc::now()) {
                return Ok(Some(cached.rows.clone()));
            }
        }

        let path = self.path.clone();
        let loaded = tokio::task::spawn_blocking(move || read_snapshot(&path))
            .await
            .context("join snapshot load task failed")??;

        let Some(rows) = loaded else {
            *guard = None;
            return Ok(None);
        };

        let rows = Arc::new(rows);
        tracing::info!(
            path = %self.path.display(),
            rows = rows.len(),
            "snapshot loaded"
        );
        *guard = Some(CachedSnapshot {
            rows: rows.clone(),
            loaded_at: Utc::now(),
        });
        Ok(Some(rows))
    }

    /// Drops the cached rows so the next `get` reads the file again.
    pub async fn clear(&self) {
        *self.entry.write().await = None;
        tracing::info!(path = %self.path.display(), "snapshot cache cleared");
    }

    pub async fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.entry.read().await.as_ref().map(|c| c.loaded_at)
    }

    /// A TTL reaching past the representable range never expires.
    fn is_expired(&self, cached: &CachedSnapshot, now: DateTime<Utc>) -> bool {
        cached
            .loaded_at
            .checked_add_signed(self.ttl)
            .map_or(false, |expires_at| now >= expires_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::snapshot::tests::quote;
    use crate::storage::snapshot::write_snapshot;

    #[tokio::test]
    async fn missing_file_is_none_and_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stock_data.csv");
        let cache = SnapshotCache::new(path.clone(), Duration::hours(2));

        assert!(cache.get().await.unwrap().is_none());
        assert!(cache.loaded_at().await.is_none());

        write_snapshot(&path, &[quote("AAPL", 5.0)]).unwrap();
        let rows = cache.get().await.unwrap().unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn serves_cached_rows_until_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stock_data.csv");
        write_snapshot(&path, &[quote("AAPL", 5.0)]).unwrap();

        let cache = SnapshotCache::new(path.clone(), Duration::hours(2));
        assert_eq!(cache.get().await.unwrap().unwrap()[0].ticker, "AAPL");

        write_snapshot(&path, &[quote("MSFT", 7.0), quote("GME", 1.0)]).unwrap();
        assert_eq!(cache.get().await.unwrap().unwrap()[0].ticker, "AAPL");

        cache.clear().await;
        let rows = cache.get().await.unwrap().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].ticker, "MSFT");
    }

    #[tokio::test]
    async fn huge_ttl_keeps_serving_cached_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stock_data.csv");
        write_snapshot(&path, &[quote("AAPL", 5.0)]).unwrap();

        let cache = SnapshotCache::new(path.clone(), ttl_from_secs("9000000000000").unwrap());
        cache.get().await.unwrap();

        write_snapshot(&path, &[quote("MSFT", 7.0)]).unwrap();
        assert_eq!(cache.get().await.unwrap().unwrap()[0].ticker, "AAPL");
    }

    #[test]
    fn ttl_parsing_rejects_bad_values() {
        assert_eq!(ttl_from_secs("7200").unwrap(), Duration::hours(2));
        assert_eq!(ttl_from_secs(" 0 ").unwrap(), Duration::zero());
        assert!(ttl_from_secs("-1").is_err());
        assert!(ttl_from_secs("two hours").is_err());
        assert!(ttl_from_secs("9300000000000000").is_err());
    }

    #[tokio::test]
    async fn expired_entry_is_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stock_data.csv");
        write_snapshot(&path, &[quote("AAPL", 5.0)]).unwrap();

        let cache = SnapshotCache::new(path.clone(), Duration::zero());
        cache.get().await.unwrap();

        write_snapshot(&path, &[quote("NBIS", 9.0)]).unwrap();
        assert_eq!(cache.get().await.unwrap().unwrap()[0].ticker, "NBIS");
    }
}
