//! # Subgraph Tick Fetcher
//!
//! Fetches a pool's full tick table from the Uniswap V3 subgraph on The Graph
//! gateway, paginating the `ticks` field in ascending `tickIdx` order until an
//! empty page comes back.
//!
//! The gateway needs an API key; the key is embedded in the endpoint URL the
//! same way the hosted gateway documents it.

use chrono::Utc;
use eyre::{eyre, Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

use crate::types::{PoolConfig, PoolSnapshot, TickRecord, TickSource};

/// The Graph gateway base URL.
const GATEWAY_BASE_URL: &str = "https://gateway.thegraph.com/api";

/// Uniswap V3 mainnet subgraph deployment id.
pub const UNISWAP_V3_SUBGRAPH_ID: &str = "5zvR82QoaXYFyDEKLZ9t6v9adgnptxYpKpSbxtgVENFV";

/// Ticks returned per GraphQL page.
const PAGE_SIZE: usize = 1000;

#[derive(Debug, Deserialize)]
struct GraphResponse {
    data: Option<GraphData>,
    errors: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct GraphData {
    pool: Option<GraphPool>,
}

#[derive(Debug, Deserialize)]
struct GraphPool {
    id: String,
    tick: Option<String>,
    ticks: Vec<GraphTick>,
}

#[derive(Debug, Deserialize)]
struct GraphTick {
    #[serde(rename = "tickIdx")]
    tick_idx: String,
    #[serde(rename = "liquidityNet")]
    liquidity_net: String,
}

/// GraphQL client for the Uniswap V3 subgraph.
pub struct SubgraphClient {
    endpoint: String,
    client: reqwest::Client,
}

impl SubgraphClient {
    /// Builds a client against the Graph gateway for the given subgraph.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be constructed.
    pub fn new(api_key: &str, subgraph_id: &str) -> Result<Self> {
        let endpoint = format!("{GATEWAY_BASE_URL}/{api_key}/subgraphs/id/{subgraph_id}");
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .wrap_err("failed to build HTTP client")?;
        Ok(Self { endpoint, client })
    }

    async fn fetch_page(&self, pool_id: &str, skip: usize) -> Result<Option<GraphPool>> {
        let query = format!(
            r#"{{
    pool(id: "{pool_id}") {{
        id
        tick
        ticks(first: {PAGE_SIZE}, skip: {skip}, orderBy: tickIdx, orderDirection: asc) {{
            tickIdx
            liquidityNet
        }}
    }}
}}"#
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "query": query }))
            .send()
            .await
            .wrap_err("subgraph HTTP request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(eyre!(
                "subgraph returned HTTP {}: {}",
                status.as_u16(),
                body
            ));
        }

        let body: GraphResponse = response
            .json()
            .await
            .wrap_err("failed to decode subgraph response")?;

        if let Some(errors) = body.errors {
            return Err(eyre!("subgraph query errors: {errors}"));
        }

        Ok(body.data.and_then(|d| d.pool))
    }
}

impl TickSource for SubgraphClient {
    /// Fetches all initialized ticks of `pool` via paginated GraphQL queries.
    ///
    /// # Errors
    /// Returns error on network failure, a malformed response, an unknown
    /// pool id, or an empty tick table.
    async fn fetch_snapshot(&self, pool: &PoolConfig) -> Result<PoolSnapshot> {
        let timestamp = Utc::now().timestamp() as u64;
        let mut records: Vec<TickRecord> = Vec::new();
        let mut pool_id = String::new();
        let mut current_tick: Option<i32> = None;
        let mut skip = 0usize;

        loop {
            let page = self
                .fetch_page(&pool.pool_id, skip)
                .await
                .wrap_err_with(|| format!("tick page at skip {skip} failed"))?
                .ok_or_else(|| eyre!("pool {} not found in subgraph", pool.pool_id))?;

            if pool_id.is_empty() {
                pool_id = page.id.clone();
                let tick_str = page
                    .tick
                    .as_deref()
                    .ok_or_else(|| eyre!("pool {} has no current tick", pool.pool_id))?;
                current_tick = Some(
                    tick_str
                        .parse::<i32>()
                        .wrap_err("failed to parse current tick")?,
                );
            }

            if page.ticks.is_empty() {
                debug!(skip, "empty tick page, pagination complete");
                break;
            }

            let page_len = page.ticks.len();
            for tick in page.ticks {
                let tick_idx = tick
                    .tick_idx
                    .parse::<i32>()
                    .wrap_err("failed to parse tickIdx")?;
                let liquidity_net = alloy::primitives::I256::from_dec_str(&tick.liquidity_net)
                    .wrap_err_with(|| format!("failed to parse liquidityNet at tick {tick_idx}"))?;
                records.push(TickRecord {
                    tick_idx,
                    liquidity_net,
                    liquidity_gross: None,
                });
            }

            debug!(skip, page_len, "tick page fetched");
            skip += PAGE_SIZE;
        }

        if records.is_empty() {
            return Err(eyre!("pool {} returned no initialized ticks", pool.pool_id));
        }

        // The subgraph orders pages by tickIdx, but the prefix-sum downstream
        // depends on ascending order, so enforce it here.
        records.sort_by_key(|r| r.tick_idx);

        let current_tick =
            current_tick.ok_or_else(|| eyre!("pool {} has no current tick", pool.pool_id))?;

        info!(
            pool = pool.name.as_str(),
            ticks = records.len(),
            current_tick,
            "subgraph snapshot complete"
        );

        Ok(PoolSnapshot {
            pool_id,
            timestamp,
            current_tick,
            records,
        })
    }
}
