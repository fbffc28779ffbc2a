//! Direct JSON-RPC tick scanner for Uniswap V3 pools.
//!
//! Reads the pool's `slot0()`, `fee()` and `tickSpacing()` via ABI-encoded
//! `eth_call`s, then probes `ticks(int24)` across a window of tick-spacing
//! multiples around the current tick. No subgraph indexing lag, at the cost of
//! one RPC call per probed tick.
//!
//! Probes run with bounded concurrency (semaphore, 10 in flight). A failed
//! probe is logged and skipped so one flaky call cannot abort the scan.

use alloy::primitives::{hex, I256, U256};
use chrono::Utc;
use eyre::{eyre, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::types::{PoolConfig, PoolSnapshot, TickRecord, TickSource};

/// ABI selector for `slot0()`.
const SLOT0_SELECTOR: &str = "0x3850c7bd";
/// ABI selector for `fee()`.
const FEE_SELECTOR: &str = "0xddca3f43";
/// ABI selector for `tickSpacing()`.
const TICK_SPACING_SELECTOR: &str = "0xd0c93a7c";
/// ABI selector for `ticks(int24)`.
const TICKS_SELECTOR: &str = "0xf30dba93";

/// Concurrent in-flight tick probes.
const MAX_IN_FLIGHT: usize = 10;

/// Current price state and immutable parameters of a pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolState {
    /// Current √P in Q64.96 fixed point (uint160 on-chain).
    pub sqrt_price_x96: U256,
    /// Current tick index.
    pub tick: i32,
    /// Fee in hundredths of a bip (500 = 0.05%).
    pub fee: u32,
    /// Spacing between initializable ticks.
    pub tick_spacing: i32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcError {
    pub(crate) code: i64,
    pub(crate) message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcResponse<T> {
    pub(crate) result: Option<T>,
    pub(crate) error: Option<RpcError>,
}

/// Makes a JSON-RPC request and extracts the hex result string.
async fn rpc_hex_result(
    client: &Client,
    rpc_url: &str,
    method: &str,
    params: serde_json::Value,
) -> Result<String> {
    let payload = serde_json::json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": method,
        "params": params,
    });

    let response = client
        .post(rpc_url)
        .json(&payload)
        .send()
        .await
        .map_err(|e| eyre!("{} request failed: {}", method, e))?;

    let status = response.status();
    let rpc: RpcResponse<String> = response
        .json()
        .await
        .map_err(|e| eyre!("failed to decode {} response: {}", method, e))?;

    if !status.is_success() {
        return Err(eyre!("{} HTTP status: {}", method, status));
    }

    if let Some(error) = rpc.error {
        return Err(eyre!("{} RPC error {}: {}", method, error.code, error.message));
    }

    rpc.result.ok_or_else(|| eyre!("{} missing result", method))
}

async fn eth_call(client: &Client, rpc_url: &str, to: &str, data: String) -> Result<String> {
    let params = serde_json::json!([{ "to": to, "data": data }, "latest"]);
    rpc_hex_result(client, rpc_url, "eth_call", params).await
}

/// Interprets an ABI word carrying a sign-extended small int (int24) as i32.
///
/// ABI encoding sign-extends to 256 bits, so the low 32 bits already hold the
/// correct two's-complement i32.
pub(crate) fn abi_word_to_i32(word: U256) -> i32 {
    (word & U256::from(u32::MAX)).to::<u32>() as i32
}

fn parse_word(raw: &str, index: usize) -> Result<U256> {
    let start = index * 64;
    let end = start + 64;
    let slice = raw
        .get(start..end)
        .ok_or_else(|| eyre!("ABI response too short for word {index}"))?;
    U256::from_str_radix(slice, 16).map_err(|e| eyre!("failed to parse ABI word {index}: {e}"))
}

/// Encodes an int24 argument as a 32-byte ABI word (two's complement).
fn encode_int24(tick: i32) -> String {
    let word = if tick >= 0 {
        U256::from(tick as u32)
    } else {
        // two's complement over 256 bits
        U256::MAX - U256::from(tick.unsigned_abs()) + U256::from(1u8)
    };
    hex::encode(word.to_be_bytes::<32>())
}

/// Probes one `ticks(int24)` slot; returns `None` for an uninitialized tick.
async fn probe_tick(
    client: Client,
    rpc_url: String,
    pool: String,
    tick: i32,
) -> Result<Option<TickRecord>> {
    let data = format!("{TICKS_SELECTOR}{}", encode_int24(tick));
    let result = eth_call(&client, &rpc_url, &pool, data).await?;
    let raw = result.trim_start_matches("0x");

    // ticks() returns 8 words; only liquidityGross and liquidityNet matter here.
    let gross = parse_word(raw, 0)?;
    let net = I256::from_raw(parse_word(raw, 1)?);

    if gross.is_zero() && net.is_zero() {
        return Ok(None);
    }

    Ok(Some(TickRecord {
        tick_idx: tick,
        liquidity_net: net,
        liquidity_gross: Some(gross),
    }))
}

/// Tick scanner reading pool state and tick table straight from a node.
pub struct RpcPoolScanner {
    rpc_url: String,
    client: Client,
    /// Number of tick-spacing steps probed on each side of the current tick.
    tick_radius: i32,
}

impl RpcPoolScanner {
    /// Builds a scanner for the given RPC endpoint.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be constructed.
    pub fn new(rpc_url: &str, tick_radius: i32) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .wrap_err("failed to build HTTP client")?;
        Ok(Self {
            rpc_url: rpc_url.to_string(),
            client,
            tick_radius,
        })
    }

    /// Reads `slot0()`, `fee()` and `tickSpacing()` in one pass.
    ///
    /// # Errors
    /// Returns error if any RPC call fails or a response cannot be decoded.
    #[tracing::instrument(skip(self), fields(pool))]
    pub async fn pool_state(&self, pool: &str) -> Result<PoolState> {
        let slot0 = eth_call(&self.client, &self.rpc_url, pool, SLOT0_SELECTOR.to_string())
            .await
            .wrap_err("slot0() call failed")?;
        let raw = slot0.trim_start_matches("0x");
        let sqrt_price_x96 = parse_word(raw, 0).wrap_err("failed to parse sqrtPriceX96")?;
        let tick = abi_word_to_i32(parse_word(raw, 1).wrap_err("failed to parse tick")?);

        let fee_raw = eth_call(&self.client, &self.rpc_url, pool, FEE_SELECTOR.to_string())
            .await
            .wrap_err("fee() call failed")?;
        let fee = (parse_word(fee_raw.trim_start_matches("0x"), 0)? & U256::from(u32::MAX))
            .to::<u32>();

        let spacing_raw = eth_call(
            &self.client,
            &self.rpc_url,
            pool,
            TICK_SPACING_SELECTOR.to_string(),
        )
        .await
        .wrap_err("tickSpacing() call failed")?;
        let tick_spacing = abi_word_to_i32(parse_word(spacing_raw.trim_start_matches("0x"), 0)?);

        if tick_spacing <= 0 {
            return Err(eyre!("pool {pool} reported non-positive tick spacing"));
        }

        debug!(tick, fee, tick_spacing, "pool state read");
        Ok(PoolState {
            sqrt_price_x96,
            tick,
            fee,
            tick_spacing,
        })
    }
}

impl TickSource for RpcPoolScanner {
    /// Scans `ticks(int24)` over `current_tick ± radius * tick_spacing`.
    ///
    /// Keeps entries with non-zero gross or net liquidity, sorted ascending by
    /// tick index. Individual probe failures are logged and skipped.
    ///
    /// # Errors
    /// Returns error if the pool state reads fail or no initialized tick is
    /// found in the window.
    async fn fetch_snapshot(&self, pool: &PoolConfig) -> Result<PoolSnapshot> {
        let timestamp = Utc::now().timestamp() as u64;
        let state = self.pool_state(&pool.pool_id).await?;

        // Align the window to tick-spacing multiples; only those can hold
        // initialized ticks.
        let anchor = state.tick - state.tick.rem_euclid(state.tick_spacing);
        let min_tick = anchor - self.tick_radius * state.tick_spacing;
        let max_tick = anchor + self.tick_radius * state.tick_spacing;

        let mut probes = Vec::new();
        let mut t = min_tick;
        while t <= max_tick {
            probes.push(t);
            t += state.tick_spacing;
        }

        let pb = ProgressBar::new(probes.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ticks")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        let semaphore = Arc::new(Semaphore::new(MAX_IN_FLIGHT));
        let mut handles = Vec::with_capacity(probes.len());
        for tick in probes {
            let sem = semaphore.clone();
            let client = self.client.clone();
            let rpc_url = self.rpc_url.clone();
            let pool_id = pool.pool_id.clone();
            handles.push(tokio::spawn(async move {
                let _permit = sem.acquire().await.ok();
                (tick, probe_tick(client, rpc_url, pool_id, tick).await)
            }));
        }

        let mut records = Vec::new();
        let mut failed = 0usize;
        for joined in futures::future::join_all(handles).await {
            match joined {
                Ok((_, Ok(Some(record)))) => records.push(record),
                Ok((_, Ok(None))) => {}
                Ok((tick, Err(e))) => {
                    failed += 1;
                    warn!(tick, error = %e, "tick probe failed, skipping");
                }
                Err(e) => {
                    failed += 1;
                    warn!(error = %e, "tick probe task join error");
                }
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        if records.is_empty() {
            return Err(eyre!(
                "no initialized ticks in window {min_tick}..={max_tick} for pool {}",
                pool.pool_id
            ));
        }

        records.sort_by_key(|r| r.tick_idx);

        info!(
            pool = pool.name.as_str(),
            ticks = records.len(),
            failed,
            current_tick = state.tick,
            "rpc snapshot complete"
        );

        Ok(PoolSnapshot {
            pool_id: pool.pool_id.clone(),
            timestamp,
            current_tick: state.tick,
            records,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abi_word_positive_tick() {
        assert_eq!(abi_word_to_i32(U256::from(201_234u32)), 201_234);
    }

    #[test]
    fn abi_word_negative_tick() {
        // -887272 sign-extended to 256 bits
        let word = U256::MAX - U256::from(887_272u32) + U256::from(1u8);
        assert_eq!(abi_word_to_i32(word), -887_272);
    }

    #[test]
    fn encode_int24_roundtrip() {
        for tick in [-887_272, -60, 0, 60, 887_272] {
            let encoded = encode_int24(tick);
            assert_eq!(encoded.len(), 64);
            let word = U256::from_str_radix(&encoded, 16).expect("valid hex");
            assert_eq!(abi_word_to_i32(word), tick);
        }
    }

    #[test]
    fn parse_word_rejects_short_response() {
        assert!(parse_word("deadbeef", 1).is_err());
    }
}
