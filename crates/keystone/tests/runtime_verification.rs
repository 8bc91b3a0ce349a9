//! # Runtime Verification Tests
//!
//! End-to-end checks of the runtime guarantees:
//!
//! 1. **Creation**: idempotent create, build isolation, register-before-notify
//! 2. **Dispatch**: await-all completeness with failing and slow subscribers
//! 3. **Sequencing**: label/jump replay through a runtime sequencer
//! 4. **Teardown & queries**: capability-based teardown, kind queries
//!
//! Run with: cargo test --test runtime_verification -- --nocapture

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use keystone::core::{ComponentKind, RegistryDiagnostic};
use keystone::{
    AssetStore, BoxError, Component, CreateOutcome, EntityId, EventBus, Runtime, RuntimeConfig,
    Teardown,
};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Transform {
    x: f32,
}

impl Component for Transform {}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Sprite {
    frame: u32,
}

impl Component for Sprite {}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Container {
    visible: bool,
}

impl Component for Container {}

struct Releasable {
    released: Arc<AtomicUsize>,
    fail: bool,
}

impl Component for Releasable {
    fn teardown_capability(&mut self) -> Option<&mut dyn Teardown> {
        Some(self)
    }
}

impl Teardown for Releasable {
    fn teardown(&mut self) -> Result<(), BoxError> {
        self.released.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err("handle already released".into())
        } else {
            Ok(())
        }
    }
}

/// Stand-in for a rendering surface: one node per mounted container.
#[derive(Default)]
struct Stage {
    nodes: Mutex<HashMap<EntityId, &'static str>>,
}

fn runtime(assets: AssetStore) -> Runtime {
    let rt = Runtime::init(RuntimeConfig::default(), Arc::new(assets));
    let registry = rt.registry();
    registry.register_deserialize::<Transform>("transform");
    registry.register_deserialize::<Sprite>("sprite");
    registry.register_deserialize::<Container>("container");
    rt
}

// ============================================================================
// CREATION
// ============================================================================

#[tokio::test]
async fn verify_idempotent_create() {
    let assets = AssetStore::new();
    assets.insert("card", json!({ "transform": { "x": 4.0 }, "sprite": {} }));
    let rt = runtime(assets);

    let notified = Arc::new(AtomicUsize::new(0));
    for kind in ["transform", "sprite"] {
        let notified = Arc::clone(&notified);
        rt.events().on_sync(kind, move |_| {
            notified.fetch_add(1, Ordering::SeqCst);
        });
    }

    let first = rt.entities().create_entity("card", "card_1").await;
    let second = rt.entities().create_entity("card", "card_1").await;

    assert!(first.is_created());
    assert!(!second.is_created());
    assert!(Arc::ptr_eq(first.entity(), second.entity()));
    assert_eq!(notified.load(Ordering::SeqCst), 2, "one notification per kind, once");
}

#[tokio::test]
async fn verify_build_isolation() {
    let assets = AssetStore::new();
    assets.insert(
        "card",
        json!({ "transform": {}, "shader": { "src": "x" }, "sprite": { "frame": 1 }, "ghost": {} }),
    );
    let rt = runtime(assets);
    rt.registry()
        .register("shader", |_: &Value| Err::<Transform, _>("compile error"));

    let outcome = rt.entities().create_entity("card", "card_1").await;
    let entity = outcome.entity().read();

    assert_eq!(
        entity.kinds(),
        vec![ComponentKind::from("sprite"), ComponentKind::from("transform")]
    );
    assert_eq!(entity.get_component::<Sprite>("sprite").map(|s| s.frame), Some(1));

    let diagnostics = rt.registry().take_diagnostics();
    assert!(diagnostics.iter().any(|d| matches!(
        d,
        RegistryDiagnostic::ConstructionFailed { kind, .. } if *kind == ComponentKind::from("shader")
    )));
    assert!(diagnostics
        .iter()
        .any(|d| *d == RegistryDiagnostic::UnknownKind { kind: "ghost".into() }));
}

#[tokio::test]
async fn verify_registration_happens_before_notification() {
    let assets = AssetStore::new();
    assets.insert("panel", json!({ "container": { "visible": true }, "sprite": {} }));
    let rt = runtime(assets);
    rt.context().register("stage", Stage::default());

    // Container subsystem: mounts a node for the entity, synchronously.
    let (context, entities) = (Arc::clone(rt.context()), Arc::clone(rt.entities()));
    rt.events().on_sync("container", move |id: EntityId| {
        let live = entities.require_entity(&id)?;
        assert!(live.read().has_component("container"));
        let stage = context.get::<Stage>("stage").ok_or("no stage")?;
        stage.nodes.lock().insert(id, "container");
        Ok::<_, BoxError>(())
    });

    // Sprite subsystem: expects its parent node to exist already.
    let seen = Arc::new(Mutex::new(None));
    let (context, sink) = (Arc::clone(rt.context()), Arc::clone(&seen));
    rt.events().on_sync("sprite", move |id: EntityId| {
        if let Some(stage) = context.get::<Stage>("stage") {
            let node = stage.nodes.lock().get(&id).copied();
            *sink.lock() = node;
        }
    });

    match rt.entities().create_entity("panel", "panel_1").await {
        CreateOutcome::Created { notifications, .. } => {
            assert_eq!(notifications.len(), 2);
            assert!(notifications.iter().all(|report| report.is_ok()));
        }
        CreateOutcome::Existing(_) => panic!("expected a fresh entity"),
    }
    assert_eq!(*seen.lock(), Some("container"));
}

// ============================================================================
// DISPATCH
// ============================================================================

#[tokio::test(start_paused = true)]
async fn verify_await_all_completeness() {
    let bus: EventBus<u32> = EventBus::new();
    let ran = Arc::new(Mutex::new(Vec::new()));

    let log = Arc::clone(&ran);
    bus.on_sync("x", move |n| log.lock().push(format!("sync ok {n}")));
    bus.on_sync("x", |_| Err::<(), _>("sync failure"));
    let log = Arc::clone(&ran);
    bus.on("x", move |n| {
        let log = Arc::clone(&log);
        async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            log.lock().push(format!("async ok {n}"));
        }
    });

    let start = tokio::time::Instant::now();
    let report = bus.emit_async("x", 7).await;

    assert!(start.elapsed() >= Duration::from_millis(50));
    assert_eq!(report.delivered, 3);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(*ran.lock(), ["sync ok 7", "async ok 7"]);
    assert!(bus.emit_async("nobody", 1).await.is_ok());
}

// ============================================================================
// SEQUENCING
// ============================================================================

#[tokio::test]
async fn verify_sequencer_replay() {
    const ITERATIONS: usize = 3;
    let rt = runtime(AssetStore::new());
    let trace = Arc::new(Mutex::new(Vec::new()));
    let g_calls = Arc::new(AtomicUsize::new(0));

    let mut seq = rt.sequencer();
    let (f_trace, g_trace) = (Arc::clone(&trace), Arc::clone(&trace));
    let (counter, guard) = (Arc::clone(&g_calls), Arc::clone(&g_calls));
    seq.add_sync(move || f_trace.lock().push('f'))
        .label("L")
        .add(move || {
            let (trace, counter) = (Arc::clone(&g_trace), Arc::clone(&counter));
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                trace.lock().push('g');
            }
        })
        .goto_if("L", move || guard.load(Ordering::SeqCst) < ITERATIONS)
        .expect("label declared");

    seq.run().await.expect("sequence runs");

    assert_eq!(trace.lock().iter().collect::<String>(), "fggg");
    assert!(seq.is_empty(), "auto-clear is on by default");
}

// ============================================================================
// TEARDOWN & QUERIES
// ============================================================================

#[tokio::test]
async fn verify_destroy_teardown() {
    let rt = runtime(AssetStore::new());
    let released = Arc::new(AtomicUsize::new(0));

    for (kind, fail) in [("texture", true), ("timer", false)] {
        let released = Arc::clone(&released);
        rt.registry().register(kind, move |_: &Value| {
            Ok::<_, BoxError>(Releasable {
                released: Arc::clone(&released),
                fail,
            })
        });
    }

    let mut data = keystone::core::ComponentMap::new();
    for kind in ["texture", "timer", "transform"] {
        data.insert(kind.to_string(), json!({}));
    }
    rt.entities().create_entity_from("pool", data).await;
    assert_eq!(rt.entities().query_entities(["transform"]).len(), 1);

    let report = rt.entities().destroy_entity("pool").expect("entity was live");
    assert_eq!(released.load(Ordering::SeqCst), 2);
    assert_eq!(report.failures.len(), 1);
    assert!(report.into_result().is_err());
    assert!(rt.entities().query_entities(["transform"]).is_empty());
    assert!(!rt.entities().contains("pool"));
}

#[tokio::test]
async fn verify_query_filter() {
    let assets = AssetStore::new();
    assets.insert("ab", json!({ "transform": {}, "sprite": {} }));
    assets.insert("a", json!({ "transform": {} }));
    let rt = runtime(assets);

    for id in ["ab_1", "ab_2", "ab_3"] {
        rt.entities().create_entity("ab", id).await;
    }
    for id in ["a_1", "a_2"] {
        rt.entities().create_entity("a", id).await;
    }

    let both = rt.entities().query_entities(["transform", "sprite"]);
    let mut names: Vec<String> = both.iter().map(|e| e.read().name().to_string()).collect();
    names.sort();
    assert_eq!(names, ["ab_1", "ab_2", "ab_3"]);
    assert_eq!(rt.entities().query_entities(Vec::<ComponentKind>::new()).len(), 5);
}

#[tokio::test]
async fn verify_scene_round_trip_through_runtime() {
    let assets = AssetStore::new();
    assets.insert("hud", json!({ "container": {}, "group": { "id": "hud" } }));
    assets.insert(
        "level",
        json!({ "entities": [
            { "assetId": "hud", "entityId": "hud_1" },
            { "assetId": "hud", "entityId": "hud_2" }
        ] }),
    );
    let rt = runtime(assets);

    rt.scenes().build("level").await.expect("scene decodes");
    assert_eq!(keystone::flow::query_group(rt.entities(), "hud", ["container"]).len(), 2);
    assert_eq!(rt.scenes().current_scene().as_deref().map(String::as_str), Some("level"));

    rt.scenes().unload("level").await;
    assert!(rt.entities().is_empty());
    assert!(rt.shutdown().is_empty());
}
