//! Bar, line and comparison chart rendering with plotters.
//!
//! Layout mirrors the snapshot pipeline's conventions: bar charts show a
//! ±15 000-tick window around the pool's current tick, line charts show the
//! full curve, and both carry a red marker at the current tick plus a green
//! marker at the CEX-equivalent tick when one was aligned.

use chrono::DateTime;
use eyre::{eyre, Result};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::path::{Path, PathBuf};
use tracing::info;

/// Tick radius of the bar-chart window around the current tick.
pub const TICK_WINDOW_RADIUS: i32 = 15_000;

/// Bar fill color (sky blue).
const BAR_COLOR: RGBColor = RGBColor(135, 206, 235);

/// One pool's curve prepared for drawing.
#[derive(Clone, Debug, PartialEq)]
pub struct LiquiditySeries {
    /// Pool contract address, shown in titles.
    pub pool_id: String,
    /// Short label for captions and legends, e.g. `"0.05 Pool"`.
    pub label: String,
    /// Snapshot timestamp (unix seconds), used in titles and file names.
    pub timestamp: u64,
    /// Pool tick at snapshot time.
    pub current_tick: i32,
    /// `(tick_idx, cumulative_liquidity)` ascending by tick.
    pub points: Vec<(i32, f64)>,
}

fn chart_err(e: impl std::fmt::Display) -> eyre::Report {
    eyre!("chart rendering failed: {e}")
}

fn format_time(timestamp: u64) -> String {
    DateTime::from_timestamp(timestamp as i64, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "unknown time".to_string())
}

/// Restricts a curve to `center ± radius` ticks.
pub fn window(points: &[(i32, f64)], center: i32, radius: i32) -> Vec<(i32, f64)> {
    let low = center.saturating_sub(radius);
    let high = center.saturating_add(radius);
    points
        .iter()
        .filter(|(tick, _)| (low..=high).contains(tick))
        .copied()
        .collect()
}

/// Bar width in tick units: 90% of the even per-bar share of the window.
pub fn bar_width(span: i32, bars: usize) -> f64 {
    if bars == 0 {
        return 1.0;
    }
    (span as f64 / bars as f64) * 0.9
}

/// Largest y value of a curve, at least 1.0 so axis ranges stay valid.
pub fn max_point(points: &[(i32, f64)]) -> f64 {
    points.iter().map(|(_, y)| *y).fold(1.0f64, f64::max)
}

/// Draws one pool panel (bars + markers) into an existing drawing area.
fn draw_pool_panel(
    area: &DrawingArea<BitMapBackend, Shift>,
    series: &LiquiditySeries,
    overlay_tick: Option<f64>,
    y_max: f64,
) -> Result<()> {
    let focus = window(&series.points, series.current_tick, TICK_WINDOW_RADIUS);
    if focus.is_empty() {
        return Err(eyre!(
            "no data in window around tick {} for {}",
            series.current_tick,
            series.label
        ));
    }

    let x_min = (series.current_tick - TICK_WINDOW_RADIUS) as f64;
    let x_max = (series.current_tick + TICK_WINDOW_RADIUS) as f64;
    let half = bar_width(2 * TICK_WINDOW_RADIUS, focus.len()) / 2.0;
    let y_top = y_max.max(1.0);

    let mut chart = ChartBuilder::on(area)
        .caption(&series.label, ("sans-serif", 18))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_min..x_max, 0f64..y_top)
        .map_err(chart_err)?;

    chart
        .configure_mesh()
        .x_desc("Tick Index")
        .y_desc("Cumulative Liquidity")
        .draw()
        .map_err(chart_err)?;

    chart
        .draw_series(focus.iter().map(|&(tick, liquidity)| {
            Rectangle::new(
                [(tick as f64 - half, 0.0), (tick as f64 + half, liquidity)],
                BAR_COLOR.filled(),
            )
        }))
        .map_err(chart_err)?;

    let current = series.current_tick as f64;
    chart
        .draw_series(std::iter::once(PathElement::new(
            vec![(current, 0.0), (current, y_top)],
            RED.stroke_width(2),
        )))
        .map_err(chart_err)?
        .label("Current Tick")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED.stroke_width(2)));

    if let Some(cex_tick) = overlay_tick {
        chart
            .draw_series(std::iter::once(PathElement::new(
                vec![(cex_tick, 0.0), (cex_tick, y_top)],
                GREEN.stroke_width(2),
            )))
            .map_err(chart_err)?
            .label("CEX Tick")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], GREEN.stroke_width(2)));
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .map_err(chart_err)?;

    Ok(())
}

/// Renders the windowed bar chart to
/// `out_dir/liquidity_bar_chart_<ts>.png`.
///
/// `y_max` is the shared y ceiling, usually the maximum cumulative liquidity
/// across the whole batch so frames animate on a stable axis.
///
/// # Errors
/// Returns error if the window holds no data or drawing fails.
pub fn render_bar_chart(
    series: &LiquiditySeries,
    overlay_tick: Option<f64>,
    y_max: f64,
    out_dir: &Path,
) -> Result<PathBuf> {
    std::fs::create_dir_all(out_dir)
        .map_err(|e| eyre!("failed to create {}: {e}", out_dir.display()))?;
    let path = out_dir.join(format!("liquidity_bar_chart_{}.png", series.timestamp));

    {
        let root = BitMapBackend::new(&path, (1400, 700)).into_drawing_area();
        root.fill(&WHITE).map_err(chart_err)?;

        let title = format!(
            "Liquidity Distribution (Bar) | {} | Pool {}",
            format_time(series.timestamp),
            series.pool_id
        );
        let (header, body) = root.split_vertically(28);
        header
            .draw(&Text::new(title, (10, 5), ("sans-serif", 17)))
            .map_err(chart_err)?;

        draw_pool_panel(&body, series, overlay_tick, y_max)?;
        root.present().map_err(chart_err)?;
    }

    info!(path = %path.display(), "bar chart saved");
    Ok(path)
}

/// Renders the full-range line chart to
/// `out_dir/liquidity_line_chart_<ts>.png`.
///
/// # Errors
/// Returns error if the series is empty or drawing fails.
pub fn render_line_chart(
    series: &LiquiditySeries,
    overlay_tick: Option<f64>,
    y_max: f64,
    out_dir: &Path,
) -> Result<PathBuf> {
    if series.points.is_empty() {
        return Err(eyre!("empty series for {}", series.label));
    }
    std::fs::create_dir_all(out_dir)
        .map_err(|e| eyre!("failed to create {}: {e}", out_dir.display()))?;
    let path = out_dir.join(format!("liquidity_line_chart_{}.png", series.timestamp));

    {
        let root = BitMapBackend::new(&path, (1400, 700)).into_drawing_area();
        root.fill(&WHITE).map_err(chart_err)?;

        let title = format!(
            "Liquidity Distribution (Line) | {} | Pool {}",
            format_time(series.timestamp),
            series.pool_id
        );
        let x_min = series.points.first().map(|(t, _)| *t).unwrap_or(0) as f64;
        let x_max = series.points.last().map(|(t, _)| *t).unwrap_or(1) as f64;
        let y_top = y_max.max(1.0);

        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 17))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(x_min..x_max, 0f64..y_top)
            .map_err(chart_err)?;

        chart
            .configure_mesh()
            .x_desc("Tick Index")
            .y_desc("Cumulative Liquidity")
            .draw()
            .map_err(chart_err)?;

        chart
            .draw_series(LineSeries::new(
                series.points.iter().map(|&(t, y)| (t as f64, y)),
                &BLUE,
            ))
            .map_err(chart_err)?
            .label("Cumulative Liquidity")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));

        let current = series.current_tick as f64;
        chart
            .draw_series(std::iter::once(PathElement::new(
                vec![(current, 0.0), (current, y_top)],
                RED.stroke_width(2),
            )))
            .map_err(chart_err)?
            .label("Current Tick")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED.stroke_width(2)));

        if let Some(cex_tick) = overlay_tick {
            chart
                .draw_series(std::iter::once(PathElement::new(
                    vec![(cex_tick, 0.0), (cex_tick, y_top)],
                    GREEN.stroke_width(2),
                )))
                .map_err(chart_err)?
                .label("CEX Tick")
                .legend(|(x, y)| {
                    PathElement::new(vec![(x, y), (x + 20, y)], GREEN.stroke_width(2))
                });
        }

        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .map_err(chart_err)?;

        root.present().map_err(chart_err)?;
    }

    info!(path = %path.display(), "line chart saved");
    Ok(path)
}

/// Renders a side-by-side comparison of up to two pools to
/// `out_dir/liquidity_combined_<ts>.png`, with an optional annotation line
/// (e.g. Wasserstein distances) along the bottom.
///
/// # Errors
/// Returns error if both series are absent or drawing fails.
pub fn render_compare_chart(
    left: Option<&LiquiditySeries>,
    right: Option<&LiquiditySeries>,
    overlay_tick: Option<f64>,
    annotation: Option<&str>,
    out_dir: &Path,
) -> Result<PathBuf> {
    let anchor = left
        .or(right)
        .ok_or_else(|| eyre!("comparison chart needs at least one pool series"))?;
    std::fs::create_dir_all(out_dir)
        .map_err(|e| eyre!("failed to create {}: {e}", out_dir.display()))?;
    let path = out_dir.join(format!("liquidity_combined_{}.png", anchor.timestamp));

    let y_max = left
        .map(|s| max_point(&s.points))
        .unwrap_or(1.0)
        .max(right.map(|s| max_point(&s.points)).unwrap_or(1.0));

    {
        let root = BitMapBackend::new(&path, (1600, 700)).into_drawing_area();
        root.fill(&WHITE).map_err(chart_err)?;

        let (body, footer) = root.split_vertically(670);

        match (left, right) {
            (Some(a), Some(b)) => {
                let panels = body.split_evenly((1, 2));
                draw_pool_panel(&panels[0], a, overlay_tick, y_max)?;
                draw_pool_panel(&panels[1], b, overlay_tick, y_max)?;
            }
            (Some(single), None) | (None, Some(single)) => {
                draw_pool_panel(&body, single, overlay_tick, y_max)?;
            }
            (None, None) => unreachable!("guarded above"),
        }

        if let Some(text) = annotation {
            footer
                .draw(&Text::new(text.to_string(), (20, 5), ("sans-serif", 16)))
                .map_err(chart_err)?;
        }

        root.present().map_err(chart_err)?;
    }

    info!(path = %path.display(), "comparison chart saved");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points() -> Vec<(i32, f64)> {
        vec![
            (-20_000, 10.0),
            (-10_000, 40.0),
            (0, 100.0),
            (10_000, 70.0),
            (20_000, 5.0),
        ]
    }

    #[test]
    fn window_keeps_only_ticks_in_radius() {
        let focus = window(&points(), 0, 15_000);
        let ticks: Vec<i32> = focus.iter().map(|(t, _)| *t).collect();
        assert_eq!(ticks, vec![-10_000, 0, 10_000]);
    }

    #[test]
    fn window_handles_offset_center() {
        let focus = window(&points(), 15_000, 15_000);
        let ticks: Vec<i32> = focus.iter().map(|(t, _)| *t).collect();
        assert_eq!(ticks, vec![0, 10_000, 20_000]);
    }

    #[test]
    fn bar_width_scales_with_density() {
        assert!((bar_width(30_000, 300) - 90.0).abs() < 1e-9);
        // no bars: fall back to unit width rather than dividing by zero
        assert!((bar_width(30_000, 0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn max_point_has_floor_of_one() {
        assert!((max_point(&[]) - 1.0).abs() < 1e-12);
        assert!((max_point(&[(0, 0.5)]) - 1.0).abs() < 1e-12);
        assert!((max_point(&points()) - 100.0).abs() < 1e-12);
    }

    #[test]
    fn format_time_renders_utc() {
        assert_eq!(format_time(0), "1970-01-01 00:00:00");
    }
}
