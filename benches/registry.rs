// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Benchmarks for target registry matching.
//!
//! - Misses (the overwhelmingly common case for loaded units)
//! - Pattern matches
//! - Exact claims
//! - Configuration with the built-in families
//!
//! Run with: `cargo bench --bench registry`

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use std::hint::black_box;

use agent_runtime::registry::{BuiltInSelection, InstrumentationTarget, TargetRegistry, UnitKind};

fn configured_registry(exact_targets: usize) -> TargetRegistry {
    let registry = TargetRegistry::new();
    let mut rules: Vec<InstrumentationTarget> = (0..exact_targets)
        .map(|i| InstrumentationTarget::exact(format!("com/acme/generated/Unit{}", i), UnitKind::Other))
        .collect();
    if let Ok(pattern) = InstrumentationTarget::pattern("com/acme/service/.*Service", UnitKind::Other) {
        rules.push(pattern);
    }
    registry.configure(rules, Vec::<String>::new(), BuiltInSelection::all());
    registry
}

/// Benchmark match outcomes.
fn bench_match(c: &mut Criterion) {
    let mut group = c.benchmark_group("match_unit");

    for size in [10, 1_000] {
        let registry = configured_registry(size);

        group.bench_with_input(BenchmarkId::new("miss", size), &registry, |b, registry| {
            b.iter(|| registry.match_unit(black_box("com/other/Thing")));
        });

        group.bench_with_input(BenchmarkId::new("pattern", size), &registry, |b, registry| {
            b.iter(|| registry.match_unit(black_box("com/acme/service/OrderService")));
        });
    }

    group.bench_function("exact_claim", |b| {
        b.iter_batched(
            || configured_registry(10),
            |registry| black_box(registry.match_unit("com/acme/generated/Unit5")),
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

/// Benchmark exclusion checks and configuration.
fn bench_configure(c: &mut Criterion) {
    let mut group = c.benchmark_group("configure");

    let registry = TargetRegistry::new();
    group.bench_function("is_excluded", |b| {
        b.iter(|| registry.is_excluded(black_box("com/acme/service/OrderService")));
    });

    group.bench_function("built_ins", |b| {
        b.iter(|| {
            let registry = TargetRegistry::new();
            registry.configure(Vec::new(), Vec::<String>::new(), true);
            black_box(registry.pending_count())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_match, bench_configure);
criterion_main!(benches);
