//! Benchmarks for the tickscope-analysis hot paths.
//!
//! Uses synthetic tick tables (no disk, no RPC) for reproducible numbers.
//! Run with: `cargo bench --package tickscope-analysis`

use alloy::primitives::I256;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tickscope_analysis::align::align_streams;
use tickscope_analysis::liquidity::reconstruct;
use tickscope_analysis::tick_price::tick_from_price;
use tickscope_data::types::TickRecord;

/// Builds a tick table shaped like a real pool: deltas alternating sign with
/// growing magnitude, spaced 10 ticks apart.
fn synthetic_records(count: usize) -> Vec<TickRecord> {
    (0..count)
        .map(|i| {
            let magnitude = 1_000_000u64 + (i as u64 * 37) % 500_000;
            let signed = if i % 3 == 2 {
                format!("-{magnitude}")
            } else {
                magnitude.to_string()
            };
            TickRecord {
                tick_idx: (i as i32 - count as i32 / 2) * 10,
                liquidity_net: I256::from_dec_str(&signed).expect("valid decimal"),
                liquidity_gross: None,
            }
        })
        .collect()
}

/// Benchmark: reconstruct a 10k-tick curve (typical full pool table).
fn bench_reconstruct_10k_ticks(c: &mut Criterion) {
    let records = synthetic_records(10_000);
    c.bench_function("reconstruct_10k_ticks", |b| {
        b.iter(|| reconstruct(black_box(&records)))
    });
}

/// Benchmark: align a day of 5-minute snapshots against 1-minute CEX samples.
fn bench_align_day_of_snapshots(c: &mut Criterion) {
    let pool_a: Vec<(u64, usize)> = (0..288).map(|i| (i * 300, i as usize)).collect();
    let pool_b: Vec<(u64, usize)> = (0..288).map(|i| (i * 300 + 7, i as usize)).collect();
    let cex: Vec<(u64, usize)> = (0..1440).map(|i| (i * 60, i as usize)).collect();

    c.bench_function("align_day_of_snapshots", |b| {
        b.iter(|| {
            align_streams(
                black_box(&pool_a),
                black_box(&pool_b),
                black_box(&cex),
                600,
            )
        })
    });
}

/// Benchmark: price-to-tick conversion, the per-sample cost of a CEX overlay.
fn bench_tick_from_price(c: &mut Criterion) {
    c.bench_function("tick_from_price", |b| {
        b.iter(|| tick_from_price(black_box("3587.42"), 12))
    });
}

criterion_group!(
    benches,
    bench_reconstruct_10k_ticks,
    bench_align_day_of_snapshots,
    bench_tick_from_price
);
criterion_main!(benches);
