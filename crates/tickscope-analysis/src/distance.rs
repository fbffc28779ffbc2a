//! Distribution distance between two liquidity curves.
//!
//! The 1-D Wasserstein (earth-mover) distance between two weighted discrete
//! distributions: positions are tick indices or converted prices, weights are
//! clamped cumulative liquidity. Equals the integral of |CDF₁ − CDF₂| over
//! the merged support. Presentation-layer math, so `f64` is fine here.

/// Weighted 1-D Wasserstein distance.
///
/// Returns `None` when either side has no positive total weight. Positions do
/// not need to be sorted; weights must be non-negative and are normalized
/// internally.
pub fn wasserstein_distance(
    u_positions: &[f64],
    u_weights: &[f64],
    v_positions: &[f64],
    v_weights: &[f64],
) -> Option<f64> {
    if u_positions.len() != u_weights.len() || v_positions.len() != v_weights.len() {
        return None;
    }

    let u_total: f64 = u_weights.iter().sum();
    let v_total: f64 = v_weights.iter().sum();
    if u_total <= 0.0 || v_total <= 0.0 {
        return None;
    }

    let mut u: Vec<(f64, f64)> = u_positions
        .iter()
        .zip(u_weights)
        .map(|(&p, &w)| (p, w / u_total))
        .collect();
    let mut v: Vec<(f64, f64)> = v_positions
        .iter()
        .zip(v_weights)
        .map(|(&p, &w)| (p, w / v_total))
        .collect();
    u.sort_by(|a, b| a.0.total_cmp(&b.0));
    v.sort_by(|a, b| a.0.total_cmp(&b.0));

    // Sweep the merged support accumulating |CDF_u - CDF_v| * gap.
    let (mut iu, mut iv) = (0usize, 0usize);
    let (mut cdf_u, mut cdf_v) = (0.0f64, 0.0f64);
    let mut prev: Option<f64> = None;
    let mut distance = 0.0f64;

    while iu < u.len() || iv < v.len() {
        let pu = u.get(iu).map(|(p, _)| *p).unwrap_or(f64::INFINITY);
        let pv = v.get(iv).map(|(p, _)| *p).unwrap_or(f64::INFINITY);
        let position = pu.min(pv);

        if let Some(prev) = prev {
            distance += (cdf_u - cdf_v).abs() * (position - prev);
        }

        while iu < u.len() && u[iu].0 == position {
            cdf_u += u[iu].1;
            iu += 1;
        }
        while iv < v.len() && v[iv].0 == position {
            cdf_v += v[iv].1;
            iv += 1;
        }
        prev = Some(position);
    }

    Some(distance)
}
