//! Integration tests for cumulative-liquidity reconstruction and the
//! adjust/verify cycle over on-disk snapshots.

mod common;

use common::{record, write_raw_snapshot};
use tickscope_analysis::liquidity::{adjust_snapshot_file, reconstruct};
use tickscope_analysis::verify::verify_directory;
use tickscope_data::snapshots::{read_liquidity_csv, snapshot_files};

/// The canonical clamp example: deltas [100, -150, 200, -80] over ticks
/// [-10, -5, 0, 5] give raw [100, -50, 150, 70] and clamped [100, 0, 200, 70]
/// (the +200 step builds from the zero floor, not from -50).
#[test]
fn clamp_example_end_to_end() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_raw_snapshot(
        dir.path(),
        1_700_000_000,
        &[(-10, 100), (-5, -150), (0, 200), (5, -80)],
    );

    // The raw file holds the unclamped prefix sum, so verify flags it.
    let before = verify_directory(dir.path()).expect("verify");
    assert_eq!(before.findings.len(), 1);
    assert_eq!(before.findings[0].negative_rows, 1);

    // Adjusting rewrites the cumulative column under the clamp policy.
    let dest = tempfile::tempdir().expect("tempdir");
    let clamp_events = adjust_snapshot_file(&path, dest.path()).expect("adjust");
    assert_eq!(clamp_events, 1);

    let adjusted_files = snapshot_files(dest.path()).expect("list");
    assert_eq!(adjusted_files.len(), 1);
    let rows = read_liquidity_csv(&adjusted_files[0].1).expect("read");
    let cumulative: Vec<&str> = rows.iter().map(|r| r.cumulative_liquidity.as_str()).collect();
    assert_eq!(cumulative, vec!["100", "0", "200", "70"]);

    // And the adjusted directory now verifies clean.
    let after = verify_directory(dest.path()).expect("verify");
    assert!(after.is_clean());
}

/// Clamped output equals the plain prefix sum whenever that sum never dips
/// below zero, and never returns a negative value either way.
#[test]
fn clamp_is_identity_on_well_formed_tables() {
    let well_formed = [(-100, 500i64), (-50, 250), (0, -300), (50, -450)];
    let curve = reconstruct(
        &well_formed
            .iter()
            .map(|&(t, n)| record(t, n))
            .collect::<Vec<_>>(),
    );

    assert_eq!(curve.clamp_events, 0);
    for point in &curve.points {
        assert_eq!(point.running.to_string(), point.raw.to_string());
    }
}

/// Snapshot ordering by embedded timestamp survives arbitrary write order.
#[test]
fn snapshot_discovery_orders_by_timestamp() {
    let dir = tempfile::tempdir().expect("tempdir");
    for ts in [1_700_000_600u64, 1_700_000_000, 1_700_000_300] {
        write_raw_snapshot(dir.path(), ts, &[(0, 100)]);
    }

    let files = snapshot_files(dir.path()).expect("list");
    let timestamps: Vec<u64> = files.iter().map(|(ts, _)| *ts).collect();
    assert_eq!(
        timestamps,
        vec![1_700_000_000, 1_700_000_300, 1_700_000_600]
    );
}

/// A malformed file in the directory is skipped by verify, not fatal.
#[test]
fn verify_isolates_per_file_failures() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_raw_snapshot(dir.path(), 10, &[(0, 100)]);
    std::fs::write(dir.path().join("liquidity_data_20.csv"), "tickIdx,oops\n1,2\n")
        .expect("write");

    let report = verify_directory(dir.path()).expect("verify");
    assert_eq!(report.files_checked, 1);
    assert_eq!(report.skipped.len(), 1);
    assert!(report.is_clean());
}
