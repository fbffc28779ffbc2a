//! Cumulative liquidity reconstruction.
//!
//! Active liquidity at a tick is the prefix sum of `liquidityNet` from the
//! lowest tick upward. A correctly ordered, complete tick table never sums
//! below zero; a negative running value means ticks are missing or misordered
//! in the source data. The canonical curve therefore clamps: whenever the
//! running sum dips below zero it resets to zero and subsequent deltas build
//! from that floor. The unclamped prefix sum is kept alongside so the
//! discrepancy stays visible instead of being silently absorbed.
//!
//! All arithmetic is `I256`/`U256`; nothing here touches floating point.

use alloy::primitives::{I256, U256};
use eyre::{Context, Result};
use std::path::Path;
use tickscope_data::snapshots::{read_liquidity_csv, write_liquidity_csv};
use tickscope_data::types::{LiquidityRow, TickRecord};
use tracing::{debug, warn};

/// One tick of a reconstructed liquidity curve.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CurvePoint {
    /// Tick index.
    pub tick_idx: i32,
    /// Net liquidity delta at this tick (duplicates merged).
    pub liquidity_net: I256,
    /// Clamped running liquidity, the canonical value; never negative.
    pub running: U256,
    /// Plain prefix sum, kept for diagnostics; may be negative.
    pub raw: I256,
}

/// A full reconstructed curve plus its data-quality signal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LiquidityCurve {
    /// Points ascending by tick index.
    pub points: Vec<CurvePoint>,
    /// Number of steps at which the running sum had to be clamped to zero.
    /// Non-zero means the snapshot is missing or misordering tick data.
    pub clamp_events: usize,
}

impl LiquidityCurve {
    /// Largest clamped running value on the curve, `U256::ZERO` when empty.
    pub fn max_running(&self) -> U256 {
        self.points
            .iter()
            .map(|p| p.running)
            .max()
            .unwrap_or(U256::ZERO)
    }
}

/// Reconstructs the cumulative liquidity curve from tick records.
///
/// Records are sorted by tick index first; entries sharing a tick index have
/// their deltas summed before the scan (paginated sources can split one tick
/// across pages).
pub fn reconstruct(records: &[TickRecord]) -> LiquidityCurve {
    let mut sorted: Vec<(i32, I256)> = records
        .iter()
        .map(|r| (r.tick_idx, r.liquidity_net))
        .collect();
    sorted.sort_by_key(|(tick, _)| *tick);

    let mut merged: Vec<(i32, I256)> = Vec::with_capacity(sorted.len());
    for (tick, net) in sorted {
        match merged.last_mut() {
            Some((last_tick, last_net)) if *last_tick == tick => *last_net += net,
            _ => merged.push((tick, net)),
        }
    }

    let mut points = Vec::with_capacity(merged.len());
    let mut running = I256::ZERO;
    let mut raw = I256::ZERO;
    let mut clamp_events = 0usize;

    for (tick_idx, liquidity_net) in merged {
        raw += liquidity_net;
        running += liquidity_net;
        if running.is_negative() {
            clamp_events += 1;
            running = I256::ZERO;
        }
        points.push(CurvePoint {
            tick_idx,
            liquidity_net,
            running: running.unsigned_abs(),
            raw,
        });
    }

    if clamp_events > 0 {
        warn!(
            clamp_events,
            ticks = points.len(),
            "running liquidity went negative; clamped (incomplete tick data?)"
        );
    }

    LiquidityCurve {
        points,
        clamp_events,
    }
}

/// Recomputes the clamped cumulative column of one snapshot file into
/// `dest_dir`, preserving every other column as-is.
///
/// Returns the number of clamp events encountered, so callers can aggregate
/// the data-quality signal across a batch.
///
/// # Errors
/// Returns error if the file cannot be read, a liquidity value fails to
/// parse, or the adjusted file cannot be written.
pub fn adjust_snapshot_file(path: &Path, dest_dir: &Path) -> Result<usize> {
    let rows = read_liquidity_csv(path)?;

    let records = rows
        .iter()
        .map(TickRecord::from_row)
        .collect::<Result<Vec<_>>>()
        .wrap_err_with(|| format!("bad liquidity data in {}", path.display()))?;

    let curve = reconstruct(&records);

    // reconstruct() sorts and merges, so map adjusted values back by tick.
    let mut adjusted: Vec<LiquidityRow> = Vec::with_capacity(curve.points.len());
    let template = &rows[0];
    for point in &curve.points {
        adjusted.push(LiquidityRow {
            tick_idx: point.tick_idx,
            liquidity_net: point.liquidity_net.to_string(),
            cumulative_liquidity: point.running.to_string(),
            timestamp: template.timestamp,
            current_tick: template.current_tick,
            pool_id: template.pool_id.clone(),
        });
    }

    write_liquidity_csv(dest_dir, template.timestamp, &adjusted)?;
    debug!(
        src = %path.display(),
        dest = %dest_dir.display(),
        clamp_events = curve.clamp_events,
        "snapshot adjusted"
    );
    Ok(curve.clamp_events)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(tick_idx: i32, net: i64) -> TickRecord {
        TickRecord {
            tick_idx,
            liquidity_net: I256::from_dec_str(&net.to_string()).unwrap(),
            liquidity_gross: None,
        }
    }

    fn runnings(curve: &LiquidityCurve) -> Vec<u64> {
        curve.points.iter().map(|p| p.running.to::<u64>()).collect()
    }

    fn raws(curve: &LiquidityCurve) -> Vec<i64> {
        curve
            .points
            .iter()
            .map(|p| p.raw.to_string().parse::<i64>().unwrap())
            .collect()
    }

    #[test]
    fn clamp_resets_running_sum_to_zero() {
        // The clamp resets at -5, and the +200 step builds from 0, not -50.
        let records = vec![
            record(-10, 100),
            record(-5, -150),
            record(0, 200),
            record(5, -80),
        ];
        let curve = reconstruct(&records);
        assert_eq!(runnings(&curve), vec![100, 0, 200, 70]);
        assert_eq!(raws(&curve), vec![100, -50, 150, 70]);
        assert_eq!(curve.clamp_events, 1);
    }

    #[test]
    fn clamped_equals_raw_when_never_negative() {
        let records = vec![record(0, 50), record(10, 25), record(20, -75)];
        let curve = reconstruct(&records);
        assert_eq!(runnings(&curve), vec![50, 75, 0]);
        assert_eq!(raws(&curve), vec![50, 75, 0]);
        assert_eq!(curve.clamp_events, 0);
    }

    #[test]
    fn unsorted_input_is_sorted_before_the_scan() {
        let records = vec![record(5, -80), record(-10, 100), record(0, 200), record(-5, -150)];
        let curve = reconstruct(&records);
        let ticks: Vec<i32> = curve.points.iter().map(|p| p.tick_idx).collect();
        assert_eq!(ticks, vec![-10, -5, 0, 5]);
        assert_eq!(runnings(&curve), vec![100, 0, 200, 70]);
    }

    #[test]
    fn duplicate_ticks_merge_their_deltas() {
        let records = vec![record(0, 100), record(0, 50), record(10, -150)];
        let curve = reconstruct(&records);
        assert_eq!(curve.points.len(), 2);
        assert_eq!(runnings(&curve), vec![150, 0]);
    }

    #[test]
    fn empty_input_yields_empty_curve() {
        let curve = reconstruct(&[]);
        assert!(curve.points.is_empty());
        assert_eq!(curve.max_running(), U256::ZERO);
    }

    #[test]
    fn running_never_negative_for_random_walk() {
        let deltas = [37i64, -90, 12, -4, 88, -120, 3, 77, -1, -2];
        let records: Vec<TickRecord> = deltas
            .iter()
            .enumerate()
            .map(|(i, &d)| record(i as i32 * 10, d))
            .collect();
        let curve = reconstruct(&records);
        for point in &curve.points {
            assert!(point.running <= U256::from(u64::MAX));
        }
        // raw and clamped agree up to the first clamp event only
        assert!(curve.clamp_events > 0);
    }

    #[test]
    fn huge_values_survive_exactly() {
        // liquidityNet beyond u64 range must not lose precision
        let big = "170141183460469231731687303715884105727"; // 2^127 - 1
        let records = vec![TickRecord {
            tick_idx: 0,
            liquidity_net: I256::from_dec_str(big).unwrap(),
            liquidity_gross: None,
        }];
        let curve = reconstruct(&records);
        assert_eq!(curve.points[0].running.to_string(), big);
    }
}
