//! Integration tests for the exact price ↔ tick conversion.

mod common;

use tickscope_analysis::tick_price::{price_from_tick, tick_from_price};

/// High-precision reference: tick(3000, D=12) = 196256.3476460265…
/// (computed with 100-digit decimal arithmetic).
#[test]
fn eth_price_reference_value() {
    let tick = tick_from_price("3000", 12).expect("convert");
    assert!((tick.to_f64() - 196_256.347_646_026_5).abs() < 1e-6);
}

/// price(tick(p)) ≈ p over a realistic ETH/stable range.
#[test]
fn price_roundtrip_realistic_range() {
    for price in [100.0f64, 350.5, 1_971.27, 3_000.0, 42_000.0, 100_000.0] {
        let rendered = format!("{price:.8}");
        let tick = tick_from_price(&rendered, 12).expect("tick");
        // integer ticks are 1 bp apart, so compare against the exact tick
        // by undoing the conversion at the floored coordinate
        let back = price_from_tick(tick.floor(), 12).expect("price");
        let relative = (back - price).abs() / price;
        assert!(relative < 2e-4, "price {price}: round trip gave {back}");
    }
}

/// tick(price(t)) ≈ t across the full ±900 000 domain.
#[test]
fn tick_roundtrip_extreme_range() {
    for tick in [-900_000i64, -450_000, -12_345, 0, 12_345, 450_000, 900_000] {
        let price = price_from_tick(tick, 12).expect("price");
        assert!(price.is_finite() && price > 0.0);
        let rendered = format!("{price:.60}");
        let back = tick_from_price(&rendered, 12).expect("tick");
        assert!(
            (back.to_f64() - tick as f64).abs() < 1e-6,
            "tick {tick}: round trip gave {}",
            back.to_f64()
        );
    }
}

/// The conversion is strictly monotone: higher CEX price, lower tick.
#[test]
fn conversion_is_monotone_decreasing() {
    let prices = ["500", "1500", "2500", "3500", "4500"];
    let ticks: Vec<f64> = prices
        .iter()
        .map(|p| tick_from_price(p, 12).expect("tick").to_f64())
        .collect();
    for pair in ticks.windows(2) {
        assert!(pair[1] < pair[0]);
    }
}

/// The decimal exponent shifts the curve: one unit of D is a factor of 10 in
/// price, i.e. ln(10)/ln(1.0001) ≈ 23027 ticks.
#[test]
fn decimal_exponent_shifts_by_ln10() {
    let d12 = tick_from_price("3000", 12).expect("tick").to_f64();
    let d13 = tick_from_price("3000", 13).expect("tick").to_f64();
    assert!((d13 - d12 - 23_027.002_203_3).abs() < 1e-4);
}

/// Sub-unit prices (meme-token scale) convert without precision collapse.
#[test]
fn tiny_prices_convert() {
    let tick = tick_from_price("0.00000082", 12).expect("tick");
    // 10^12 / 8.2e-7 ≈ 1.2195e18 → tick = 416470.64827…
    assert!((tick.to_f64() - 416_470.648_270_4).abs() < 1e-4);
}
