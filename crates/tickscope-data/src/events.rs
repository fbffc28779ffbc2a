//! Mint/Burn liquidity event fetcher.
//!
//! Queries `eth_getLogs` for a pool's position events over a block range and
//! folds them into per-tick net liquidity deltas: a Mint adds `+amount` at the
//! lower tick and `-amount` at the upper tick, a Burn reverses both. Summing
//! the deltas reproduces the `liquidityNet` column a tick-table scan would
//! report for the covered range.

use alloy::primitives::{I256, U256};
use eyre::{eyre, Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::info;

use crate::rpc::{abi_word_to_i32, RpcResponse};

/// `Mint(address,address,int24,int24,uint128,uint256,uint256)` topic0.
const MINT_TOPIC: &str = "0x7a53080ba414158be7ec69b987b5fb7d07dee101fe85488f0853ae16239d0bde";
/// `Burn(address,int24,int24,uint128,uint256,uint256)` topic0.
const BURN_TOPIC: &str = "0x0c396cd989a39f4459b5fa1aed6a9a8dcdbc45908acfd67e028cd568da98982c";

/// Position event kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LiquidityEventKind {
    Mint,
    Burn,
}

impl LiquidityEventKind {
    /// Label used in CSV output and tables.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mint => "mint",
            Self::Burn => "burn",
        }
    }
}

/// One decoded Mint or Burn event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LiquidityEvent {
    pub kind: LiquidityEventKind,
    pub block_number: u64,
    /// Transaction hash (hex with 0x prefix).
    pub tx_hash: String,
    pub tick_lower: i32,
    pub tick_upper: i32,
    /// Liquidity amount added or removed (uint128 on-chain).
    pub amount: U256,
}

#[derive(Debug, Deserialize)]
struct RpcLog {
    topics: Vec<String>,
    data: String,
    #[serde(rename = "blockNumber")]
    block_number: String,
    #[serde(rename = "transactionHash")]
    transaction_hash: String,
}

async fn get_logs(
    client: &Client,
    rpc_url: &str,
    pool: &str,
    topic0: &str,
    from_block: u64,
    to_block: u64,
) -> Result<Vec<RpcLog>> {
    let payload = serde_json::json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "eth_getLogs",
        "params": [{
            "fromBlock": format!("0x{from_block:x}"),
            "toBlock": format!("0x{to_block:x}"),
            "address": pool,
            "topics": [topic0],
        }],
    });

    let response = client
        .post(rpc_url)
        .json(&payload)
        .send()
        .await
        .wrap_err("eth_getLogs request failed")?;

    let status = response.status();
    let rpc: RpcResponse<Vec<RpcLog>> = response
        .json()
        .await
        .wrap_err("failed to decode eth_getLogs response")?;

    if !status.is_success() {
        return Err(eyre!("eth_getLogs HTTP status: {status}"));
    }
    if let Some(error) = rpc.error {
        return Err(eyre!("eth_getLogs RPC error {}: {}", error.code, error.message));
    }

    Ok(rpc.result.unwrap_or_default())
}

fn topic_word(log: &RpcLog, index: usize) -> Result<U256> {
    let topic = log
        .topics
        .get(index)
        .ok_or_else(|| eyre!("log missing topic {index}"))?;
    U256::from_str_radix(topic.trim_start_matches("0x"), 16)
        .map_err(|e| eyre!("failed to parse topic {index}: {e}"))
}

fn data_word(log: &RpcLog, index: usize) -> Result<U256> {
    let raw = log.data.trim_start_matches("0x");
    let start = index * 64;
    let end = start + 64;
    let slice = raw
        .get(start..end)
        .ok_or_else(|| eyre!("log data too short for word {index}"))?;
    U256::from_str_radix(slice, 16).map_err(|e| eyre!("failed to parse data word {index}: {e}"))
}

fn decode_event(log: &RpcLog, kind: LiquidityEventKind) -> Result<LiquidityEvent> {
    // Both events index owner/tickLower/tickUpper; Mint carries an extra
    // unindexed `sender` word ahead of `amount`.
    let tick_lower = abi_word_to_i32(topic_word(log, 2)?);
    let tick_upper = abi_word_to_i32(topic_word(log, 3)?);
    let amount = match kind {
        LiquidityEventKind::Mint => data_word(log, 1)?,
        LiquidityEventKind::Burn => data_word(log, 0)?,
    };
    let block_number = u64::from_str_radix(log.block_number.trim_start_matches("0x"), 16)
        .wrap_err("failed to parse log blockNumber")?;

    Ok(LiquidityEvent {
        kind,
        block_number,
        tx_hash: log.transaction_hash.clone(),
        tick_lower,
        tick_upper,
        amount,
    })
}

/// Fetches all Mint and Burn events of `pool` in `[from_block, to_block]`,
/// ordered by block number.
///
/// # Errors
/// Returns error on network failure or an undecodable log entry.
#[tracing::instrument(skip(rpc_url), fields(pool, from_block, to_block))]
pub async fn fetch_liquidity_events(
    rpc_url: &str,
    pool: &str,
    from_block: u64,
    to_block: u64,
) -> Result<Vec<LiquidityEvent>> {
    if to_block < from_block {
        return Err(eyre!(
            "to_block ({to_block}) must be >= from_block ({from_block})"
        ));
    }

    let client = Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .wrap_err("failed to build HTTP client")?;

    let mut events = Vec::new();
    for (topic, kind) in [
        (MINT_TOPIC, LiquidityEventKind::Mint),
        (BURN_TOPIC, LiquidityEventKind::Burn),
    ] {
        let logs = get_logs(&client, rpc_url, pool, topic, from_block, to_block)
            .await
            .wrap_err_with(|| format!("{} log query failed", kind.as_str()))?;
        for log in &logs {
            events.push(decode_event(log, kind)?);
        }
    }

    events.sort_by_key(|e| e.block_number);

    info!(
        pool,
        events = events.len(),
        from_block,
        to_block,
        "liquidity event fetch complete"
    );

    Ok(events)
}

/// Folds position events into net liquidity deltas per tick boundary,
/// ascending by tick index.
pub fn net_deltas(events: &[LiquidityEvent]) -> Vec<(i32, I256)> {
    let mut deltas: BTreeMap<i32, I256> = BTreeMap::new();
    for event in events {
        let amount = I256::from_raw(event.amount);
        let (lower_delta, upper_delta) = match event.kind {
            LiquidityEventKind::Mint => (amount, -amount),
            LiquidityEventKind::Burn => (-amount, amount),
        };
        *deltas.entry(event.tick_lower).or_insert(I256::ZERO) += lower_delta;
        *deltas.entry(event.tick_upper).or_insert(I256::ZERO) += upper_delta;
    }
    deltas.into_iter().filter(|(_, d)| !d.is_zero()).collect()
}
