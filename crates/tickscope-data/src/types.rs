//! Type definitions for pool tick data and CEX price observations.

use alloy::primitives::{I256, U256};
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

/// One initialized tick boundary in a pool snapshot.
///
/// `liquidity_net` is the signed delta in active liquidity when the price
/// crosses this tick moving upward. Magnitudes are `int128` on-chain but are
/// carried as `I256` so decimal-string round trips never lose precision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TickRecord {
    /// Tick index (int24 on-chain, stored as i32). Unique within a snapshot.
    pub tick_idx: i32,
    /// Signed liquidity delta at this tick boundary.
    pub liquidity_net: I256,
    /// Total liquidity referencing this tick, when the source provides it.
    pub liquidity_gross: Option<U256>,
}

/// A single fetch of a pool's full tick table, immutable once written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolSnapshot {
    /// Pool contract address (lowercase hex with 0x prefix).
    pub pool_id: String,
    /// Fetch wall-clock time in unix seconds.
    pub timestamp: u64,
    /// Pool tick at fetch time.
    pub current_tick: i32,
    /// Tick records ascending by `tick_idx`.
    pub records: Vec<TickRecord>,
}

/// One CEX spot price sample.
///
/// The price is kept as the decimal string the API returned; numeric
/// conversion happens in the analysis layer so no precision is lost here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceObservation {
    /// Sample time in unix seconds.
    pub timestamp: u64,
    /// Spot price as a decimal string, e.g. `"3587.42"`.
    pub price: String,
}

/// One row of a `liquidity_data_<ts>.csv` snapshot file.
///
/// Column names and order match the on-disk schema exactly. Liquidity values
/// travel as decimal strings; they can exceed `f64` precision for
/// high-decimals tokens.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityRow {
    #[serde(rename = "tickIdx")]
    pub tick_idx: i32,
    #[serde(rename = "liquidityNet")]
    pub liquidity_net: String,
    pub cumulative_liquidity: String,
    pub timestamp: u64,
    pub current_tick: i32,
    pub pool_id: String,
}

impl TickRecord {
    /// Parses the liquidity columns of a CSV row back into exact integers.
    ///
    /// # Errors
    /// Returns error if `liquidityNet` is not a (signed) decimal integer.
    pub fn from_row(row: &LiquidityRow) -> Result<Self> {
        let liquidity_net = I256::from_dec_str(row.liquidity_net.trim())
            .wrap_err_with(|| format!("invalid liquidityNet at tick {}", row.tick_idx))?;
        Ok(Self {
            tick_idx: row.tick_idx,
            liquidity_net,
            liquidity_gross: None,
        })
    }
}

/// Identity and decimal configuration of one tracked pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    /// Short label used for directories and logging, e.g. `"usdc-eth-005"`.
    pub name: String,
    /// Pool contract address (lowercase hex with 0x prefix).
    pub pool_id: String,
    /// Combined decimal-adjustment exponent `D` for the pool's token pair
    /// (12 for USDC/ETH: 18 - 6).
    pub decimal_exponent: u32,
}

/// A source of pool tick snapshots.
///
/// Both the subgraph client and the direct RPC scanner implement this, and
/// tests inject a fake so pipelines run without network access.
#[allow(async_fn_in_trait)]
pub trait TickSource {
    /// Fetches the pool's current tick table as an immutable snapshot.
    async fn fetch_snapshot(&self, pool: &PoolConfig) -> Result<PoolSnapshot>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_record_from_row_parses_signed_net() {
        let row = LiquidityRow {
            tick_idx: -5,
            liquidity_net: "-340282366920938463463374607431768211455".to_string(),
            cumulative_liquidity: "0".to_string(),
            timestamp: 1,
            current_tick: 0,
            pool_id: "0xpool".to_string(),
        };
        let record = TickRecord::from_row(&row).expect("should parse");
        assert_eq!(record.tick_idx, -5);
        assert!(record.liquidity_net.is_negative());
    }

    #[test]
    fn tick_record_from_row_rejects_garbage() {
        let row = LiquidityRow {
            tick_idx: 0,
            liquidity_net: "not-a-number".to_string(),
            cumulative_liquidity: "0".to_string(),
            timestamp: 1,
            current_tick: 0,
            pool_id: "0xpool".to_string(),
        };
        assert!(TickRecord::from_row(&row).is_err());
    }
}
