//! Benchmark for scaling-cost math.
//!
//! Run with: cargo bench --package idle_economy --bench cost_benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use idle_economy::{cost_of, max_affordable, Amount};

fn benchmark_cost_of(c: &mut Criterion) {
    let base = Amount::from(100);
    let growth = Amount::from_f64(1.07);
    let owned = Amount::from(250);

    c.bench_function("cost_of_one_million_units", |b| {
        b.iter(|| {
            black_box(cost_of(
                black_box(base),
                black_box(growth),
                black_box(owned),
                black_box(Amount::from(1_000_000)),
            ))
        });
    });
}

fn benchmark_max_affordable(c: &mut Criterion) {
    let base = Amount::from(100);
    let growth = Amount::from_f64(1.07);
    let funds = Amount::parse("1.5e250").unwrap_or_default();

    c.bench_function("max_affordable_huge_funds", |b| {
        let mut owned = 0u32;
        b.iter(|| {
            owned = (owned + 1) % 500;
            black_box(max_affordable(base, growth, Amount::from(owned), black_box(funds)))
        });
    });
}

fn benchmark_amount_parse_format(c: &mut Criterion) {
    let values: Vec<String> = (0..100)
        .map(|i| format!("{}.{}e{}", i % 9 + 1, i, i * 7))
        .collect();

    c.bench_function("amount_parse_and_format", |b| {
        let mut i = 0usize;
        b.iter(|| {
            i = (i + 1) % values.len();
            let amount = Amount::parse_or_zero(&values[i]);
            black_box(amount.format())
        });
    });
}

criterion_group!(
    benches,
    benchmark_cost_of,
    benchmark_max_affordable,
    benchmark_amount_parse_format
);
criterion_main!(benches);
