//! Benchmark for effect aggregation and the full tick.
//!
//! Run with: cargo bench --package idle_economy --bench effects_benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use idle_economy::{
    Amount, ConstantEffect, EffectKind, EffectRegistry, EconomyConfig, Simulation, TargetId,
    TargetKey, TargetSystem,
};

fn create_registry() -> (EffectRegistry, TargetKey) {
    let mut registry = EffectRegistry::new();
    let target = TargetKey::new(TargetSystem::resource_production(), TargetId::specific("studies"));

    // 50 skills, 20 market upgrades, 30 achievements on one target
    for (owner, count) in [("skills", 50), ("market", 20), ("achievements", 30)] {
        for i in 0..count {
            let value = ConstantEffect(Amount::from_f64(1.0 + f64::from(i) / 100.0));
            registry
                .register(owner, &format!("{owner}_{i}"), target.clone(), EffectKind::Multiplier, value)
                .unwrap();
        }
    }
    (registry, target)
}

fn benchmark_aggregate(c: &mut Criterion) {
    let (registry, target) = create_registry();

    c.bench_function("aggregate_100_sources", |b| {
        b.iter(|| black_box(registry.aggregate(black_box(&target), EffectKind::Multiplier)));
    });
}

fn create_simulation() -> Simulation {
    let mut text = String::from("[[resources]]\nid = \"studies\"\ninitial_amount = \"1e12\"\n");
    for i in 0..40 {
        text.push_str(&format!(
            "[[purchasables]]\nid = \"producer{i}\"\ncost_resource = \"studies\"\n\
             base_cost = \"{}\"\ngrowth = \"1.1\"\neffect_system = \"studies_producers\"\n\
             [[purchasables.production]]\nresource = \"studies\"\nrate = \"{}\"\n",
            10 * (i + 1),
            i + 1
        ));
    }
    let config = EconomyConfig::from_toml_str(&text).unwrap();
    let mut sim = Simulation::from_config(&config).unwrap();
    for i in 0..40 {
        sim.buy_max(&format!("producer{i}")).ok();
    }
    sim
}

fn benchmark_tick(c: &mut Criterion) {
    let mut sim = create_simulation();

    c.bench_function("tick_40_producers", |b| {
        b.iter(|| black_box(sim.tick(black_box(0.05))).ok());
    });
}

criterion_group!(benches, benchmark_aggregate, benchmark_tick);
criterion_main!(benches);
