//! # Entity Runtime Benchmark
//!
//! Measures the hot paths of scene construction: building entities from
//! declarative data, await-all dispatch, and kind queries.
//!
//! Run with: `cargo bench --package keystone_core`

// Benchmarks don't need docs
#![allow(missing_docs)]

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use keystone_core::{
    AssetStore, Component, ComponentKind, ComponentRegistry, EntityId, EntityManager, EventBus,
};
use serde::Deserialize;
use serde_json::json;

#[derive(Default, Deserialize)]
#[serde(default)]
struct Transform {
    x: f32,
    y: f32,
}

impl Component for Transform {}

#[derive(Default, Deserialize)]
#[serde(default)]
struct Sprite {
    frame: u32,
}

impl Component for Sprite {}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("failed to build benchmark runtime")
}

fn manager() -> EntityManager {
    let registry = Arc::new(ComponentRegistry::default());
    registry.register_deserialize::<Transform>("transform");
    registry.register_deserialize::<Sprite>("sprite");

    let assets = AssetStore::new();
    assets.insert(
        "hero",
        json!({ "transform": { "x": 1.0, "y": 2.0 }, "sprite": { "frame": 3 } }),
    );
    assets.insert("marker", json!({ "transform": {} }));

    EntityManager::new(registry, Arc::new(EventBus::new()), Arc::new(assets))
}

/// Benchmark: build N entities from asset data.
fn bench_create_entities(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("create_entities");

    for count in [100, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let manager = manager();
                rt.block_on(async {
                    for i in 0..count {
                        black_box(manager.create_entity("hero", format!("hero_{i}")).await);
                    }
                });
                manager.len()
            });
        });
    }

    group.finish();
}

/// Benchmark: await-all dispatch across many synchronous subscribers.
fn bench_emit_async(c: &mut Criterion) {
    let rt = runtime();
    let bus: EventBus<EntityId> = EventBus::new();
    for _ in 0..64 {
        bus.on_sync("sprite", |id: EntityId| {
            black_box(id);
        });
    }
    let payload = EntityId::from("hero_1");

    c.bench_function("emit_async_64_subscribers", |b| {
        b.iter(|| rt.block_on(bus.emit_async("sprite", payload.clone())));
    });
}

/// Benchmark: kind query over a mixed live table.
fn bench_query(c: &mut Criterion) {
    let rt = runtime();
    let manager = manager();
    rt.block_on(async {
        for i in 0..5_000 {
            manager.create_entity("hero", format!("hero_{i}")).await;
            manager.create_entity("marker", format!("marker_{i}")).await;
        }
    });
    let kinds = [ComponentKind::from("transform"), ComponentKind::from("sprite")];

    c.bench_function("query_transform_sprite_10k", |b| {
        b.iter(|| black_box(manager.query_entities(kinds.iter()).len()));
    });
}

criterion_group!(benches, bench_create_entities, bench_emit_async, bench_query);
criterion_main!(benches);
