//! Timestamp alignment of pool snapshots and CEX price samples.
//!
//! A three-way merge over streams pre-sorted by timestamp ascending: two pool
//! snapshot series plus one CEX sample series. Every pool snapshot produces
//! exactly one output record (full outer join over the pool streams); two pool
//! snapshots within tolerance of each other merge into a single record, and
//! the pending CEX sample attaches to a record when it falls inside the
//! tolerance window. CEX samples never emit a record on their own; ones too
//! old to match anything are discarded as the merge advances.

use tracing::debug;

/// One aligned output record.
///
/// `timestamp` is the anchor: the earliest pool timestamp consumed into the
/// record. Each matched component keeps its own original timestamp alongside
/// its payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Aligned<A, B, C> {
    pub timestamp: u64,
    pub pool_a: Option<(u64, A)>,
    pub pool_b: Option<(u64, B)>,
    pub cex: Option<(u64, C)>,
}

/// Merges the three streams under a fixed tolerance window (seconds).
///
/// Inputs must be sorted ascending by timestamp; output order follows the
/// anchor timestamps, and the merge is deterministic (idempotent under the
/// pre-sorted invariant).
pub fn align_streams<A: Clone, B: Clone, C: Clone>(
    pool_a: &[(u64, A)],
    pool_b: &[(u64, B)],
    cex: &[(u64, C)],
    tolerance_s: u64,
) -> Vec<Aligned<A, B, C>> {
    let mut out = Vec::with_capacity(pool_a.len() + pool_b.len());
    let (mut ia, mut ib, mut ic) = (0usize, 0usize, 0usize);

    while ia < pool_a.len() || ib < pool_b.len() {
        let ta = pool_a.get(ia).map(|(ts, _)| *ts).unwrap_or(u64::MAX);
        let tb = pool_b.get(ib).map(|(ts, _)| *ts).unwrap_or(u64::MAX);
        let anchor = ta.min(tb);

        // CEX samples that can no longer match this record or any later one.
        while ic < cex.len() && cex[ic].0.saturating_add(tolerance_s) < anchor {
            ic += 1;
        }

        let mut record = Aligned {
            timestamp: anchor,
            pool_a: None,
            pool_b: None,
            cex: None,
        };

        let both = ta != u64::MAX && tb != u64::MAX && ta.abs_diff(tb) <= tolerance_s;
        if both {
            record.pool_a = Some(pool_a[ia].clone());
            record.pool_b = Some(pool_b[ib].clone());
            ia += 1;
            ib += 1;
        } else if ta <= tb {
            record.pool_a = Some(pool_a[ia].clone());
            ia += 1;
        } else {
            record.pool_b = Some(pool_b[ib].clone());
            ib += 1;
        }

        if let Some((tc, payload)) = cex.get(ic) {
            if tc.abs_diff(anchor) <= tolerance_s {
                record.cex = Some((*tc, payload.clone()));
                ic += 1;
            }
        }

        out.push(record);
    }

    debug!(
        records = out.len(),
        pool_a = pool_a.len(),
        pool_b = pool_b.len(),
        cex = cex.len(),
        tolerance_s,
        "streams aligned"
    );
    out
}

/// Convenience wrapper for the common single-pool + CEX case.
pub fn align_with_cex<A: Clone, C: Clone>(
    pool: &[(u64, A)],
    cex: &[(u64, C)],
    tolerance_s: u64,
) -> Vec<Aligned<A, (), C>> {
    align_streams(pool, &[], cex, tolerance_s)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(timestamps: &[u64]) -> Vec<(u64, u64)> {
        timestamps.iter().map(|&ts| (ts, ts)).collect()
    }

    #[test]
    fn one_record_per_pool_snapshot() {
        let a = series(&[100, 200, 300]);
        let b = series(&[105, 290]);
        let cex = series(&[100, 205]);

        let aligned = align_streams(&a, &b, &cex, 15);
        // 100/105 merge, 290/300 merge, 200 stands alone
        assert_eq!(aligned.len(), 3);
        let matched_pairs = aligned
            .iter()
            .filter(|r| r.pool_a.is_some() && r.pool_b.is_some())
            .count();
        assert_eq!(matched_pairs, 2);
        assert_eq!(aligned.len(), a.len() + b.len() - matched_pairs);
    }

    #[test]
    fn tolerance_boundary_620s_gap() {
        let pool = series(&[10_000]);
        let cex = series(&[10_620]);

        let strict = align_with_cex(&pool, &cex, 600);
        assert!(strict[0].cex.is_none(), "620s gap must not match at 600s");

        let relaxed = align_with_cex(&pool, &cex, 900);
        assert_eq!(relaxed[0].cex, Some((10_620, 10_620)));
    }

    #[test]
    fn cex_sample_is_consumed_once() {
        let pool = series(&[100, 110]);
        let cex = series(&[105]);

        let aligned = align_with_cex(&pool, &cex, 15);
        assert_eq!(aligned.len(), 2);
        assert!(aligned[0].cex.is_some());
        assert!(aligned[1].cex.is_none());
    }

    #[test]
    fn stale_cex_samples_are_discarded() {
        let pool = series(&[10_000]);
        let cex = series(&[1_000, 2_000, 9_990]);

        let aligned = align_with_cex(&pool, &cex, 600);
        assert_eq!(aligned[0].cex, Some((9_990, 9_990)));
    }

    #[test]
    fn cex_alone_emits_nothing() {
        let aligned: Vec<Aligned<u64, u64, u64>> = align_streams(&[], &[], &series(&[1, 2, 3]), 600);
        assert!(aligned.is_empty());
    }

    #[test]
    fn unmatched_pools_interleave_in_time_order() {
        let a = series(&[100, 500]);
        let b = series(&[300]);

        let aligned = align_streams(&a, &b, &[] as &[(u64, u64)], 15);
        assert_eq!(aligned.len(), 3);
        let anchors: Vec<u64> = aligned.iter().map(|r| r.timestamp).collect();
        assert_eq!(anchors, vec![100, 300, 500]);
        assert!(aligned[0].pool_a.is_some() && aligned[0].pool_b.is_none());
        assert!(aligned[1].pool_b.is_some() && aligned[1].pool_a.is_none());
    }

    #[test]
    fn merge_is_deterministic() {
        let a = series(&[100, 200, 300, 400]);
        let b = series(&[150, 250, 350]);
        let cex = series(&[90, 210, 340, 500]);

        let first = align_streams(&a, &b, &cex, 60);
        let second = align_streams(&a, &b, &cex, 60);
        assert_eq!(first, second);
    }
}
