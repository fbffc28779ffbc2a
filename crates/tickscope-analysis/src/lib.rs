//! tickscope-analysis: the numeric core.
//!
//! Cumulative-liquidity reconstruction over signed tick deltas, exact
//! price ↔ tick conversion, timestamp alignment of pool and CEX series, and
//! the data-quality checks built on top of them. All liquidity and price-tick
//! math runs on `U256`/`I256` fixed point; `f64` appears only in values headed
//! straight for presentation.

pub mod align;
pub mod distance;
pub mod liquidity;
pub mod tick_price;
pub mod verify;

pub use align::{align_streams, Aligned};
pub use liquidity::{reconstruct, CurvePoint, LiquidityCurve};
pub use tick_price::{price_from_tick, tick_from_price, Tick64};
