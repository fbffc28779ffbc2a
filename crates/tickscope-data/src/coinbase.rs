//! # Coinbase Price Fetcher
//!
//! Fetches CEX reference prices from two public Coinbase endpoints, neither of
//! which needs an API key:
//!
//! - spot: `GET /v2/prices/<product>/spot` for the current price;
//! - candles: `GET /api/v3/brokerage/market/products/<product>/candles` for a
//!   one-minute candle matching a historical snapshot timestamp.
//!
//! Prices stay decimal strings end to end; parsing happens in the analysis
//! layer.

use chrono::Utc;
use eyre::{eyre, Context, Result};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::types::PriceObservation;

/// Coinbase public API base URL.
const COINBASE_BASE_URL: &str = "https://api.coinbase.com";

/// Delay between candle requests during a backfill.
const BACKFILL_PAUSE_MS: u64 = 100;

#[derive(Debug, Deserialize)]
struct SpotResponse {
    data: SpotData,
}

#[derive(Debug, Deserialize)]
struct SpotData {
    amount: String,
}

#[derive(Debug, Deserialize)]
struct CandlesResponse {
    candles: Vec<Candle>,
}

#[derive(Debug, Deserialize)]
struct Candle {
    open: String,
}

/// Client for the public Coinbase price endpoints.
pub struct CoinbaseClient {
    client: Client,
}

impl CoinbaseClient {
    /// Builds a client with a request timeout.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be constructed.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .wrap_err("failed to build HTTP client")?;
        Ok(Self { client })
    }

    /// Waits out a 429/418 response if one occurred; returns `true` when the
    /// caller should retry the request.
    async fn rate_limit_wait(&self, response: &reqwest::Response) -> bool {
        let status = response.status();
        if status != reqwest::StatusCode::TOO_MANY_REQUESTS
            && status != reqwest::StatusCode::IM_A_TEAPOT
        {
            return false;
        }
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(10);
        warn!(
            status = status.as_u16(),
            retry_after_s = retry_after,
            "Coinbase rate limit hit, waiting"
        );
        tokio::time::sleep(std::time::Duration::from_secs(retry_after)).await;
        true
    }

    /// Fetches the current spot price for a product (e.g. `"ETH-USD"`),
    /// stamped with the wall-clock time.
    ///
    /// # Errors
    /// Returns error on network failure or a malformed response.
    #[tracing::instrument(skip(self), fields(product))]
    pub async fn fetch_spot(&self, product: &str) -> Result<PriceObservation> {
        let url = format!("{COINBASE_BASE_URL}/v2/prices/{product}/spot");

        loop {
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .wrap_err("Coinbase spot request failed")?;

            if self.rate_limit_wait(&response).await {
                continue;
            }

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(eyre!(
                    "Coinbase spot returned HTTP {}: {}",
                    status.as_u16(),
                    body
                ));
            }

            let body: SpotResponse = response
                .json()
                .await
                .wrap_err("failed to decode Coinbase spot response")?;

            let observation = PriceObservation {
                timestamp: Utc::now().timestamp() as u64,
                price: body.data.amount,
            };
            info!(product, price = observation.price.as_str(), "spot price fetched");
            return Ok(observation);
        }
    }

    /// Fetches the open of the one-minute candle covering `timestamp`.
    ///
    /// Returns `Ok(None)` when Coinbase has no candle for that minute.
    ///
    /// # Errors
    /// Returns error on network failure or a malformed response.
    pub async fn fetch_candle_open(&self, product: &str, timestamp: u64) -> Result<Option<String>> {
        let url = format!(
            "{COINBASE_BASE_URL}/api/v3/brokerage/market/products/{product}/candles\
             ?start={timestamp}&end={}&granularity=ONE_MINUTE",
            timestamp + 60
        );

        loop {
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .wrap_err("Coinbase candles request failed")?;

            if self.rate_limit_wait(&response).await {
                continue;
            }

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(eyre!(
                    "Coinbase candles returned HTTP {}: {}",
                    status.as_u16(),
                    body
                ));
            }

            let body: CandlesResponse = response
                .json()
                .await
                .wrap_err("failed to decode Coinbase candles response")?;

            return Ok(body.candles.into_iter().next().map(|c| c.open));
        }
    }

    /// Fetches one candle open per timestamp, pausing briefly between
    /// requests. Timestamps without a candle are skipped with a warning; the
    /// returned observations keep the input order.
    ///
    /// # Errors
    /// Returns error only on network/decode failures, not on missing candles.
    #[tracing::instrument(skip_all, fields(product, count = timestamps.len()))]
    pub async fn backfill(
        &self,
        product: &str,
        timestamps: &[u64],
    ) -> Result<Vec<PriceObservation>> {
        let mut observations = Vec::with_capacity(timestamps.len());

        for &ts in timestamps {
            match self.fetch_candle_open(product, ts).await? {
                Some(price) => {
                    debug!(ts, price = price.as_str(), "candle matched");
                    observations.push(PriceObservation {
                        timestamp: ts,
                        price,
                    });
                }
                None => warn!(ts, "no candle for timestamp, skipping"),
            }
            tokio::time::sleep(std::time::Duration::from_millis(BACKFILL_PAUSE_MS)).await;
        }

        info!(
            product,
            matched = observations.len(),
            requested = timestamps.len(),
            "candle backfill complete"
        );

        Ok(observations)
    }
}
