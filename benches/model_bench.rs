//! Criterion benchmarks for constrained model construction and
//! serialization.
//!
//! Uses synthetic knapsack-shaped models (binary objective, one-hot
//! groups, a quadratic capacity constraint) to measure bookkeeping and
//! codec overhead independent of any domain.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use cqmodel::{ConstrainedModel, QuadraticExpression, Sense};

// ===========================================================================
// Synthetic model: n one-hot groups of 4 plus a dense quadratic constraint
// ===========================================================================

fn build_model(n: usize) -> ConstrainedModel {
    let mut model = ConstrainedModel::new();

    let mut objective = QuadraticExpression::binary();
    for g in 0..n {
        for k in 0..4 {
            let v = format!("x_{g}_{k}");
            objective.add_variable(v.as_str().into(), None, None).unwrap();
            objective.add_linear(&v.as_str().into(), (k as f64) - 1.5).unwrap();
        }
    }
    model.set_objective(objective).unwrap();

    for g in 0..n {
        let vars = (0..4).map(|k| format!("x_{g}_{k}").into());
        model.add_discrete(vars, None).unwrap();
    }

    let mut quad = QuadraticExpression::binary();
    for g in 0..n {
        quad.add_variable(format!("x_{g}_0").as_str().into(), None, None)
            .unwrap();
    }
    for g in 1..n {
        quad.add_quadratic(
            &format!("x_{}_0", g - 1).as_str().into(),
            &format!("x_{g}_0").as_str().into(),
            0.5,
        )
        .unwrap();
    }
    model
        .add_constraint_from_expression(quad, Sense::Le, n as f64, None)
        .unwrap();

    model
}

// ===========================================================================
// Benchmarks
// ===========================================================================

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    for &n in &[10, 100, 500] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| black_box(build_model(black_box(n))))
        });
    }
    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    for &n in &[10, 100, 500] {
        let model = build_model(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &model, |b, m| {
            b.iter(|| black_box(m.to_bytes()))
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    for &n in &[10, 100, 500] {
        let bytes = build_model(n).to_bytes();
        group.bench_with_input(BenchmarkId::from_parameter(n), &bytes, |b, bytes| {
            b.iter(|| black_box(ConstrainedModel::from_bytes(black_box(bytes)).unwrap()))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_build, bench_encode, bench_decode);
criterion_main!(benches);
