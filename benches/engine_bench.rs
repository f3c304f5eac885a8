use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};

use bpe::graph::BlueprintGraph;
use bpe::port::{Direction, PortId};
use bpe::types::ValueType;

// Engine scenarios: connect-time propagation is the hot path of the
// editor (every accepted edge triggers a merge walk), so the benchmarks
// scale chain length and stream nesting independently.

fn number_stream() -> ValueType {
    ValueType::stream(ValueType::Number)
}

/// A generator feeding a linear chain of `n` pass-through operators.
fn build_chain(n: usize) -> (BlueprintGraph, Vec<(PortId, PortId)>) {
    let mut g = BlueprintGraph::new("bench");
    let gen = g.add_operator("gen", true);
    let gen_out = g.create_port(gen, "out", &number_stream(), Direction::Out);
    g.initialize_owner(gen).unwrap();

    let mut edges = Vec::new();
    let mut upstream = gen_out;
    for i in 0..n {
        let op = g.add_operator(format!("op_{}", i), false);
        let input = g.create_port(op, "in", &number_stream(), Direction::In);
        let output = g.create_port(op, "out", &number_stream(), Direction::Out);
        g.initialize_owner(op).unwrap();
        edges.push((upstream, input));
        upstream = output;
    }
    (g, edges)
}

fn nested_stream(levels: u32) -> ValueType {
    let mut ty = ValueType::Number;
    for _ in 0..levels {
        ty = ValueType::stream(ty);
    }
    ty
}

fn bench_chain_connect(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_connect");
    for n in [4usize, 16, 64] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter_batched(
                || build_chain(n),
                |(mut g, edges)| {
                    for (src, dst) in edges {
                        g.connect(src, dst).unwrap();
                    }
                    black_box(g.drain_events().len())
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_deep_nesting_init(c: &mut Criterion) {
    let mut group = c.benchmark_group("deep_nesting_init");
    for levels in [4u32, 16, 32] {
        group.bench_with_input(BenchmarkId::from_parameter(levels), &levels, |b, &levels| {
            b.iter(|| {
                let mut g = BlueprintGraph::new("bench");
                let op = g.add_operator("op", false);
                let root = g.create_port(op, "in", &nested_stream(levels), Direction::In);
                g.initialize_owner(op).unwrap();
                black_box(g.stream_depth_of(root))
            });
        });
    }
    group.finish();
}

fn bench_disconnect_reset(c: &mut Criterion) {
    let mut group = c.benchmark_group("disconnect_reset");
    for n in [4usize, 16] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter_batched(
                || {
                    let (mut g, edges) = build_chain(n);
                    let first = edges[0];
                    for (src, dst) in edges {
                        g.connect(src, dst).unwrap();
                    }
                    (g, first)
                },
                |(mut g, (src, dst))| {
                    g.disconnect(src, dst).unwrap();
                    black_box(g.drain_events().len())
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_chain_connect,
    bench_deep_nesting_init,
    bench_disconnect_reset
);
criterion_main!(benches);
