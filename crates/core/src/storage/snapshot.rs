use crate::domain::quote::{StockQuote, COLUMNS};
use anyhow::Context;
use std::io::ErrorKind;
use std::path::Path;

/// Replaces the snapshot file with `rows`. The header is written even when `rows` is empty.
///
/// Rows go to a sibling temp file first, which is then renamed over the target, so readers
/// never observe a half-written snapshot.
pub fn write_snapshot(path: &Path, rows: &[StockQuote]) -> anyhow::Result<()> {
    let dir = match path.parent().filter(|d| !d.as_os_str().is_empty()) {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
            dir
        }
        None => Path::new("."),
    };

    // Dropped (and removed from disk) on any early return below.
    let mut tmp = tempfile::Builder::new()
        .prefix(".snapshot-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
    {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(&mut tmp);

        writer
            .write_record(COLUMNS)
            .context("failed to write snapshot header")?;
        for row in rows {
            writer
                .serialize(row)
                .with_context(|| format!("failed to write snapshot row {}", row.ticker))?;
        }
        writer.flush().context("failed to flush snapshot")?;
    }

    tmp.persist(path)
        .with_context(|| format!("failed to move snapshot into {}", path.display()))?;

    tracing::debug!(path = %path.display(), rows = rows.len(), "snapshot written");
    Ok(())
}

/// Loads the snapshot. `Ok(None)` means the file does not exist yet.
pub fn read_snapshot(path: &Path) -> anyhow::Result<Option<Vec<StockQuote>>> {
    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to open {}", path.display()));
        }
    };

    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(file);

    let mut out = Vec::new();
    for (idx, record) in reader.deserialize::<StockQuote>().enumerate() {
        // idx + 2: one for the header, one for 1-based line numbers.
        let row = record.with_context(|| {
            format!("malformed snapshot row at line {} of {}", idx + 2, path.display())
        })?;
        out.push(row);
    }
    Ok(Some(out))
}
