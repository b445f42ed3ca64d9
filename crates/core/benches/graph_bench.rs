//! 관계 그래프 벤치마크
//!
//! 증분 병합, 중복 병합, 노드 도출 성능을 측정합니다.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use reconpost_core::graph::{self, RelationshipGraph};
use reconpost_core::types::{Relationship, relation};

fn create_edges(count: usize) -> Vec<Relationship> {
    (0..count)
        .map(|i| match i % 3 {
            0 => Relationship::new(
                "example.com",
                format!("10.0.{}.{}", i / 256, i % 256),
                relation::RESOLVES_TO,
            ),
            1 => Relationship::new(
                "example.com",
                format!("mx{i}.example.com"),
                relation::HAS_MX,
            )
            .with_label("10"),
            _ => Relationship::new(
                format!("sub{i}.example.com"),
                "example.com",
                relation::CNAME_TO,
            ),
        })
        .collect()
}

fn bench_incremental_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_merge");

    for size in [10usize, 100, 1000] {
        let edges = create_edges(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("fresh", size), &edges, |b, edges| {
            b.iter(|| {
                let mut graph = RelationshipGraph::new();
                graph.merge(black_box(edges))
            })
        });
    }

    group.finish();
}

fn bench_duplicate_merge(c: &mut Criterion) {
    let edges = create_edges(500);
    let mut seeded = RelationshipGraph::new();
    seeded.merge(&edges);

    let mut group = c.benchmark_group("graph_duplicates");
    group.throughput(Throughput::Elements(edges.len() as u64));

    group.bench_function("all_duplicates", |b| {
        b.iter(|| {
            let mut graph = seeded.clone();
            graph.merge(black_box(&edges))
        })
    });

    group.bench_function("list_merge", |b| {
        b.iter(|| graph::merge(black_box(&edges), black_box(&edges)))
    });

    group.finish();
}

fn bench_nodes(c: &mut Criterion) {
    let edges = create_edges(1000);
    c.bench_function("graph_nodes_1000", |b| {
        b.iter(|| graph::nodes(black_box(&edges)))
    });
}

criterion_group!(
    benches,
    bench_incremental_merge,
    bench_duplicate_merge,
    bench_nodes
);
criterion_main!(benches);
