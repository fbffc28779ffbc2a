//! CSV snapshot store.
//!
//! Every entity is a write-once file: pool snapshots land as
//! `liquidity_data_<unixTimestamp>.csv`, CEX samples append to one
//! `timestamp,price` CSV, and event scans write
//! `liquidity_events_<from>_<to>.csv`. Liquidity columns round-trip as decimal
//! strings so no precision is lost on high-decimals pools.

use eyre::{eyre, Context, Result};
use serde::Serialize;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::events::LiquidityEvent;
use crate::types::{LiquidityRow, PriceObservation};

/// Prefix of pool snapshot file names.
const SNAPSHOT_PREFIX: &str = "liquidity_data_";

/// Lists pool snapshot files in `dir`, ascending by embedded timestamp.
///
/// Files that do not match `liquidity_data_<ts>.csv` are ignored.
///
/// # Errors
/// Returns error if the directory cannot be read. This is the one fatal
/// discovery-step condition; per-file problems surface later, when a file is
/// actually opened.
pub fn snapshot_files(dir: &Path) -> Result<Vec<(u64, PathBuf)>> {
    let entries = std::fs::read_dir(dir)
        .wrap_err_with(|| format!("failed to list snapshot directory {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.wrap_err("failed to read directory entry")?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(ts) = name
            .strip_prefix(SNAPSHOT_PREFIX)
            .and_then(|rest| rest.strip_suffix(".csv"))
            .and_then(|ts| ts.parse::<u64>().ok())
        else {
            continue;
        };
        files.push((ts, entry.path()));
    }

    files.sort();
    debug!(dir = %dir.display(), count = files.len(), "snapshot files listed");
    Ok(files)
}

/// Writes one snapshot's rows to `dir/liquidity_data_<timestamp>.csv`.
///
/// # Errors
/// Returns error if the directory cannot be created or the write fails.
pub fn write_liquidity_csv(dir: &Path, timestamp: u64, rows: &[LiquidityRow]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .wrap_err_with(|| format!("failed to create output directory {}", dir.display()))?;

    let path = dir.join(format!("{SNAPSHOT_PREFIX}{timestamp}.csv"));
    let mut writer = csv::Writer::from_path(&path)
        .wrap_err_with(|| format!("failed to create {}", path.display()))?;
    for row in rows {
        writer.serialize(row).wrap_err("failed to write CSV row")?;
    }
    writer.flush().wrap_err("failed to flush CSV writer")?;

    info!(path = %path.display(), rows = rows.len(), "snapshot written");
    Ok(path)
}

/// Reads a snapshot CSV back into rows.
///
/// # Errors
/// Returns error if the file is missing, has no data rows, or a row fails to
/// deserialize (missing column or type conversion).
pub fn read_liquidity_csv(path: &Path) -> Result<Vec<LiquidityRow>> {
    let mut reader = csv::Reader::from_path(path)
        .wrap_err_with(|| format!("failed to open {}", path.display()))?;

    let mut rows = Vec::new();
    for row in reader.deserialize() {
        let row: LiquidityRow =
            row.wrap_err_with(|| format!("malformed row in {}", path.display()))?;
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(eyre!("{} contains no data rows", path.display()));
    }
    Ok(rows)
}

/// Reads a `timestamp,price` CEX CSV, sorted ascending by timestamp.
///
/// # Errors
/// Returns error if the file is missing or a row fails to deserialize. An
/// empty file yields an empty vector: a missing CEX series only means charts
/// render without an overlay.
pub fn read_cex_csv(path: &Path) -> Result<Vec<PriceObservation>> {
    let mut reader = csv::Reader::from_path(path)
        .wrap_err_with(|| format!("failed to open {}", path.display()))?;

    let mut observations = Vec::new();
    for row in reader.deserialize() {
        let obs: PriceObservation =
            row.wrap_err_with(|| format!("malformed row in {}", path.display()))?;
        observations.push(obs);
    }

    observations.sort_by_key(|o| o.timestamp);
    Ok(observations)
}

/// Appends one observation to the CEX CSV, writing the header on first use.
///
/// # Errors
/// Returns error if the file cannot be opened or written.
pub fn append_cex_observation(path: &Path, observation: &PriceObservation) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .wrap_err_with(|| format!("failed to create {}", parent.display()))?;
        }
    }

    let exists = path.exists();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .wrap_err_with(|| format!("failed to open {}", path.display()))?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(!exists)
        .from_writer(file);
    writer
        .serialize(observation)
        .wrap_err("failed to append CEX observation")?;
    writer.flush().wrap_err("failed to flush CSV writer")?;
    Ok(())
}

#[derive(Serialize)]
struct EventRow<'a> {
    block_number: u64,
    kind: &'a str,
    tick_lower: i32,
    tick_upper: i32,
    amount: String,
    tx_hash: &'a str,
}

/// Writes a block-range event scan to `dir/liquidity_events_<from>_<to>.csv`.
///
/// # Errors
/// Returns error if the directory cannot be created or the write fails.
pub fn write_events_csv(
    dir: &Path,
    from_block: u64,
    to_block: u64,
    events: &[LiquidityEvent],
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .wrap_err_with(|| format!("failed to create output directory {}", dir.display()))?;

    let path = dir.join(format!("liquidity_events_{from_block}_{to_block}.csv"));
    let mut writer = csv::Writer::from_path(&path)
        .wrap_err_with(|| format!("failed to create {}", path.display()))?;
    for event in events {
        writer
            .serialize(EventRow {
                block_number: event.block_number,
                kind: event.kind.as_str(),
                tick_lower: event.tick_lower,
                tick_upper: event.tick_upper,
                amount: event.amount.to_string(),
                tx_hash: &event.tx_hash,
            })
            .wrap_err("failed to write event row")?;
    }
    writer.flush().wrap_err("failed to flush CSV writer")?;

    info!(path = %path.display(), events = events.len(), "event scan written");
    Ok(path)
}
