//! tickscope-chart: static chart rendering.
//!
//! Pure presentation over already-computed series: windowed bar charts and
//! full-range line charts of cumulative liquidity, side-by-side pool
//! comparisons, and GIF assembly from rendered bar-chart frames. This crate
//! is where exact integer series become `f64`; nothing here feeds back into
//! computation.

pub mod animate;
pub mod render;

pub use animate::{assemble_gif, collect_bar_frames};
pub use render::{
    bar_width, max_point, render_bar_chart, render_compare_chart, render_line_chart, window,
    LiquiditySeries, TICK_WINDOW_RADIUS,
};
