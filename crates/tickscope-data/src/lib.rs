//! tickscope-data crate
//!
//! Fetchers for Uniswap V3 tick liquidity (subgraph GraphQL, direct JSON-RPC,
//! Mint/Burn event logs) and CEX spot/candle prices, plus the CSV snapshot store
//! that every downstream stage reads from.

pub mod coinbase;
pub mod events;
pub mod rpc;
pub mod snapshots;
pub mod subgraph;
pub mod types;

pub use types::{LiquidityRow, PoolConfig, PoolSnapshot, PriceObservation, TickRecord, TickSource};
