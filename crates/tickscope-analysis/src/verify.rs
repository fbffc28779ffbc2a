//! Negative-liquidity snapshot verification.
//!
//! A stored `cumulative_liquidity` below zero means the file was produced by
//! an unclamped reconstruction over incomplete tick data. This scan finds
//! those files so they can be re-adjusted; it reads the stored column rather
//! than recomputing, because the point is to audit what is on disk.

use alloy::primitives::I256;
use eyre::Result;
use std::path::{Path, PathBuf};
use tickscope_data::snapshots::{read_liquidity_csv, snapshot_files};
use tracing::warn;

/// One offending snapshot file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Finding {
    pub path: PathBuf,
    /// Rows whose stored cumulative liquidity is negative.
    pub negative_rows: usize,
    /// Smallest `liquidityNet` in the file, for diagnosing the gap.
    pub min_net: I256,
    /// Largest `liquidityNet` in the file.
    pub max_net: I256,
}

/// Outcome of scanning one directory.
#[derive(Clone, Debug, Default)]
pub struct VerifyReport {
    pub files_checked: usize,
    pub findings: Vec<Finding>,
    /// Files that could not be read or parsed, with the reason.
    pub skipped: Vec<(PathBuf, String)>,
}

impl VerifyReport {
    /// True when every readable file held only non-negative values.
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

fn check_file(path: &Path) -> Result<Option<Finding>> {
    let rows = read_liquidity_csv(path)?;

    let mut negative_rows = 0usize;
    let mut min_net: Option<I256> = None;
    let mut max_net: Option<I256> = None;

    for row in &rows {
        let cumulative = I256::from_dec_str(row.cumulative_liquidity.trim())
            .map_err(|e| eyre::eyre!("bad cumulative_liquidity at tick {}: {e}", row.tick_idx))?;
        if cumulative.is_negative() {
            negative_rows += 1;
        }
        if let Ok(net) = I256::from_dec_str(row.liquidity_net.trim()) {
            min_net = Some(min_net.map_or(net, |m| m.min(net)));
            max_net = Some(max_net.map_or(net, |m| m.max(net)));
        }
    }

    if negative_rows == 0 {
        return Ok(None);
    }

    Ok(Some(Finding {
        path: path.to_path_buf(),
        negative_rows,
        min_net: min_net.unwrap_or(I256::ZERO),
        max_net: max_net.unwrap_or(I256::ZERO),
    }))
}

/// Scans every snapshot in `dir` for negative stored cumulative liquidity.
///
/// Unreadable files are skipped with a warning and recorded in the report;
/// only a missing directory is fatal.
///
/// # Errors
/// Returns error if the directory listing itself fails.
pub fn verify_directory(dir: &Path) -> Result<VerifyReport> {
    let files = snapshot_files(dir)?;
    let mut report = VerifyReport::default();

    for (_, path) in files {
        match check_file(&path) {
            Ok(Some(finding)) => {
                warn!(
                    path = %finding.path.display(),
                    negative_rows = finding.negative_rows,
                    "negative cumulative liquidity found"
                );
                report.files_checked += 1;
                report.findings.push(finding);
            }
            Ok(None) => report.files_checked += 1,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable snapshot");
                report.skipped.push((path, e.to_string()));
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tickscope_data::snapshots::write_liquidity_csv;
    use tickscope_data::types::LiquidityRow;

    fn row(tick_idx: i32, net: &str, cumulative: &str) -> LiquidityRow {
        LiquidityRow {
            tick_idx,
            liquidity_net: net.to_string(),
            cumulative_liquidity: cumulative.to_string(),
            timestamp: 1_700_000_000,
            current_tick: 0,
            pool_id: "0xpool".to_string(),
        }
    }

    #[test]
    fn clean_directory_reports_no_findings() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_liquidity_csv(dir.path(), 1, &[row(0, "100", "100"), row(5, "-100", "0")])
            .expect("write");

        let report = verify_directory(dir.path()).expect("verify");
        assert!(report.is_clean());
        assert_eq!(report.files_checked, 1);
    }

    #[test]
    fn negative_cumulative_is_reported_with_net_stats() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_liquidity_csv(
            dir.path(),
            1,
            &[row(0, "100", "100"), row(5, "-150", "-50"), row(9, "25", "-25")],
        )
        .expect("write");

        let report = verify_directory(dir.path()).expect("verify");
        assert_eq!(report.findings.len(), 1);
        let finding = &report.findings[0];
        assert_eq!(finding.negative_rows, 2);
        assert_eq!(finding.min_net, I256::from_dec_str("-150").unwrap());
        assert_eq!(finding.max_net, I256::from_dec_str("100").unwrap());
    }

    #[test]
    fn unreadable_file_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_liquidity_csv(dir.path(), 1, &[row(0, "100", "100")]).expect("write");
        std::fs::write(dir.path().join("liquidity_data_2.csv"), "tickIdx\n1\n").expect("write");

        let report = verify_directory(dir.path()).expect("verify");
        assert_eq!(report.files_checked, 1);
        assert_eq!(report.skipped.len(), 1);
        assert!(report.is_clean());
    }

    #[test]
    fn missing_directory_is_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(verify_directory(&dir.path().join("missing")).is_err());
    }
}
