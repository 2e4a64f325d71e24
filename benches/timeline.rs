//! Performance benchmarks for timeline reconstruction.
//!
//! Run with: `cargo bench --bench timeline`
//!
//! Timelines are rebuilt from the store on every query, so the walk cost
//! at realistic lineage depths is the number that matters.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;

use sprite_lineage::store::InMemoryNodeStore;
use sprite_lineage::{LineageEngine, NodeId, StaticGenerator, TimelineBuilder};

type Engine = LineageEngine<InMemoryNodeStore, StaticGenerator>;

/// Build a committed chain of `depth` versions with `siblings` candidates
/// per edit. Returns the engine and the leaf id.
async fn build_chain(depth: usize, siblings: u32) -> (Engine, NodeId) {
    let engine = LineageEngine::new(
        Arc::new(InMemoryNodeStore::new()),
        Arc::new(StaticGenerator::new()),
    );

    let root = engine.create_root("bench sprite").await.unwrap();
    let mut tip = root.id;
    for _ in 1..depth {
        let edit = engine.request_edit(tip, "edit", siblings).await.unwrap();
        tip = edit.candidates[0].id;
        engine.commit(edit.group, tip).await.unwrap();
    }
    (engine, tip)
}

/// Benchmark full timeline reconstruction at increasing depths.
fn bench_timeline_build(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();

    let mut group = c.benchmark_group("timeline_build");

    for depth in [2usize, 10, 50, 200] {
        let (engine, leaf) = runtime.block_on(build_chain(depth, 1));
        let builder = engine.timeline_builder();

        group.throughput(Throughput::Elements(depth as u64));
        group.bench_with_input(BenchmarkId::new("depth", depth), &leaf, |b, leaf| {
            b.iter(|| {
                let timeline = runtime.block_on(builder.build(black_box(*leaf))).unwrap();
                assert_eq!(timeline.len(), depth);
                timeline
            })
        });
    }

    group.finish();
}

/// Benchmark reconstruction when every generation carries rejected
/// siblings the walk must filter past.
fn bench_timeline_build_with_siblings(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();

    let mut group = c.benchmark_group("timeline_build_siblings");

    for siblings in [1u32, 4, 8] {
        let (engine, leaf) = runtime.block_on(build_chain(50, siblings));
        let builder = engine.timeline_builder();

        group.bench_with_input(
            BenchmarkId::new("siblings", siblings),
            &leaf,
            |b, leaf| {
                b.iter(|| {
                    let timeline = runtime.block_on(builder.build(black_box(*leaf))).unwrap();
                    assert_eq!(timeline.len(), 50);
                    timeline
                })
            },
        );
    }

    group.finish();
}

/// Benchmark the orphan-branch path: anchoring at an uncommitted
/// candidate deep in the lineage.
fn bench_orphan_anchor(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();

    let (engine, leaf) = runtime.block_on(build_chain(50, 2));
    let orphan = runtime.block_on(async {
        let edit = engine.request_edit(leaf, "rejected edit", 2).await.unwrap();
        edit.candidates[1].id
    });
    let builder: TimelineBuilder<InMemoryNodeStore> = engine.timeline_builder();

    c.bench_function("orphan_anchor_depth_50", |b| {
        b.iter(|| {
            let timeline = runtime.block_on(builder.build(black_box(orphan))).unwrap();
            assert!(timeline.is_orphan_branch());
            timeline
        })
    });
}

criterion_group!(
    benches,
    bench_timeline_build,
    bench_timeline_build_with_siblings,
    bench_orphan_anchor,
);
criterion_main!(benches);
