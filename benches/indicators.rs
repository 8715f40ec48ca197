//! Benchmarks for indicator updates

use candle_sweep::signal::{Signal, SignalKind};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn prices() -> Vec<Decimal> {
    (0..4096)
        .map(|i| dec!(0.05) + Decimal::from((i * 37) % 101) / dec!(10000))
        .collect()
}

fn bench_kind(c: &mut Criterion, name: &str, kind: SignalKind, fast: usize, slow: usize) {
    let prices = prices();
    c.bench_function(name, |b| {
        b.iter(|| {
            let mut signal = Signal::new(kind, fast, slow, dec!(1.2)).unwrap();
            for price in &prices {
                signal.add_sample(black_box(*price));
                black_box(signal.value());
            }
        })
    });
}

fn benchmark_sma(c: &mut Criterion) {
    bench_kind(c, "sma_160", SignalKind::Sma, 160, 0);
}

fn benchmark_ema(c: &mut Criterion) {
    bench_kind(c, "ema_160", SignalKind::Ema, 160, 0);
}

fn benchmark_rsi_ratio(c: &mut Criterion) {
    bench_kind(c, "rsi_ratio_40_640", SignalKind::RsiRatio, 40, 640);
}

fn benchmark_sma_ratio(c: &mut Criterion) {
    bench_kind(c, "sma_ratio_40_640", SignalKind::SmaRatio, 40, 640);
}

criterion_group!(
    benches,
    benchmark_sma,
    benchmark_ema,
    benchmark_rsi_ratio,
    benchmark_sma_ratio
);
criterion_main!(benches);
