//! Shared fixture factories for the integration tests.
//!
//! Builds tick records, snapshot CSVs and fake fetch sources with sensible
//! defaults so individual tests only spell out what they care about.

#![allow(dead_code)]

use alloy::primitives::I256;
use std::path::{Path, PathBuf};
use tickscope_data::snapshots::write_liquidity_csv;
use tickscope_data::types::{LiquidityRow, PoolConfig, PoolSnapshot, TickRecord, TickSource};

/// Pool address used across fixtures.
pub const FIXTURE_POOL: &str = "0x8ad599c3a0ff1de082011efddc58f1908eb6e6d8";

/// Builds a tick record from small integers.
pub fn record(tick_idx: i32, net: i64) -> TickRecord {
    TickRecord {
        tick_idx,
        liquidity_net: I256::from_dec_str(&net.to_string()).expect("valid decimal"),
        liquidity_gross: None,
    }
}

/// Builds a snapshot row with the given liquidity columns.
pub fn row(tick_idx: i32, net: &str, cumulative: &str, timestamp: u64) -> LiquidityRow {
    LiquidityRow {
        tick_idx,
        liquidity_net: net.to_string(),
        cumulative_liquidity: cumulative.to_string(),
        timestamp,
        current_tick: 0,
        pool_id: FIXTURE_POOL.to_string(),
    }
}

/// Writes a snapshot CSV whose cumulative column is the *unclamped* prefix
/// sum of `deltas`, the shape older unclamped pipelines left on disk.
pub fn write_raw_snapshot(dir: &Path, timestamp: u64, deltas: &[(i32, i64)]) -> PathBuf {
    let mut cumulative = 0i64;
    let rows: Vec<LiquidityRow> = deltas
        .iter()
        .map(|&(tick, net)| {
            cumulative += net;
            row(tick, &net.to_string(), &cumulative.to_string(), timestamp)
        })
        .collect();
    write_liquidity_csv(dir, timestamp, &rows).expect("fixture snapshot should write")
}

/// A [`TickSource`] that serves a canned snapshot without any network.
pub struct FakeTickSource {
    pub timestamp: u64,
    pub current_tick: i32,
    pub deltas: Vec<(i32, i64)>,
}

impl TickSource for FakeTickSource {
    async fn fetch_snapshot(&self, pool: &PoolConfig) -> eyre::Result<PoolSnapshot> {
        Ok(PoolSnapshot {
            pool_id: pool.pool_id.clone(),
            timestamp: self.timestamp,
            current_tick: self.current_tick,
            records: self
                .deltas
                .iter()
                .map(|&(tick, net)| record(tick, net))
                .collect(),
        })
    }
}
