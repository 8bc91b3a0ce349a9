//! # Bootstrap
//!
//! Headless walk through the runtime lifecycle:
//!
//! 1. Register component constructors and subsystem subscriptions
//! 2. Build the `title` scene from embedded asset data
//! 3. Run a short sequence that reveals the HUD group
//! 4. Unload the scene and shut down
//!
//! Run with: `cargo run --bin bootstrap`
//! Set `RUST_LOG=debug` to trace every step.

use std::sync::Arc;
use std::time::Duration;

use keystone::flow::{query_group, SCENE_BUILT};
use keystone::{
    init_logging, AssetStore, BoxError, Component, EntityId, Error, Runtime, RuntimeConfig,
    SceneEvent, Teardown,
};
use serde::Deserialize;

const ASSETS: &str = r#"{
    "background": {
        "transform": { "x": 0.0, "y": 0.0 },
        "sprite": { "texture": "bg.png" }
    },
    "hud_panel": {
        "container": { "visible": false },
        "group": { "id": "hud" },
        "transform": { "x": 16.0, "y": 16.0 }
    },
    "hud_score": {
        "container": { "visible": false },
        "group": { "id": "hud" },
        "sprite": { "texture": "digits.png" }
    },
    "title": {
        "entities": [
            { "assetId": "background", "entityId": "bg" },
            { "assetId": "hud_panel", "entityId": "panel" },
            { "assetId": "hud_score", "entityId": "score" }
        ]
    }
}"#;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Transform {
    x: f32,
    y: f32,
}

impl Component for Transform {}

#[derive(Debug, Deserialize)]
struct Sprite {
    texture: String,
}

impl Component for Sprite {
    fn teardown_capability(&mut self) -> Option<&mut dyn Teardown> {
        Some(self)
    }
}

impl Teardown for Sprite {
    fn teardown(&mut self) -> Result<(), BoxError> {
        tracing::info!(texture = %self.texture, "released texture");
        self.texture.clear();
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Container {
    visible: bool,
}

impl Component for Container {}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Error> {
    let config = RuntimeConfig::from_toml_str("[logging]\nfilter = \"info\"\n")?;
    init_logging(&config.logging);

    let assets = AssetStore::new();
    assets.insert_json_documents(ASSETS)?;
    let runtime = Runtime::init(config, Arc::new(assets));

    let registry = runtime.registry();
    registry.register_deserialize::<Transform>("transform");
    registry.register_deserialize::<Sprite>("sprite");
    registry.register_deserialize::<Container>("container");

    // Subsystems subscribe once during their own initialisation.
    let entities = Arc::clone(runtime.entities());
    runtime.events().on_sync("sprite", move |id: EntityId| {
        if let Some(entity) = entities.get_entity(&id) {
            if let Some(sprite) = entity.read().get_component::<Sprite>("sprite") {
                tracing::info!(entity = %id, texture = %sprite.texture, "sprite attached");
            }
        }
    });
    runtime.events().on("container", |id: EntityId| async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        tracing::info!(entity = %id, "container mounted");
    });
    runtime
        .scene_events()
        .on_sync(SCENE_BUILT, |event: SceneEvent| {
            tracing::info!(?event, "scene ready");
        });

    let scenes = runtime.scenes().clone();
    let entities = Arc::clone(runtime.entities());
    let mut intro = runtime.sequencer();
    intro
        .add(move || {
            let scenes = scenes.clone();
            async move { scenes.build("title").await.map(|_| ()) }
        })
        .delay(Duration::from_millis(200))
        .add_sync(move || {
            for handle in query_group(&entities, "hud", ["container"]) {
                let mut entity = handle.write();
                if let Some(container) = entity.get_component_mut::<Container>("container") {
                    container.visible = true;
                }
                tracing::info!(entity = %entity.name(), "revealed");
            }
        });
    intro.run().await?;

    let visible = runtime.entities().query_where(|entity| {
        entity
            .get_component::<Container>("container")
            .is_some_and(|container| container.visible)
    });
    tracing::info!(
        live = runtime.entities().len(),
        visible = visible.len(),
        "title scene shown"
    );

    runtime.scenes().unload("title").await;
    runtime.shutdown();
    Ok(())
}
