//! # Scene Builder
//!
//! Scenes are asset documents listing the entities to build:
//!
//! ```json
//! {
//!   "entities": [
//!     { "assetId": "background", "entityId": "bg" },
//!     { "assetId": "button", "entityId": "play_button" }
//!   ]
//! }
//! ```
//!
//! Building a scene creates every listed entity concurrently and waits for
//! all of them, including their creation notifications. Unloading destroys
//! every live entity. Both announce themselves on a scene event bus.

use std::sync::Arc;

use futures::future;
use keystone_core::{
    AssetSource, Context, CreateOutcome, DestroyReport, DispatchReport, EntityManager, EventBus,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Channel on which [`SceneEvent::Built`] is published.
pub const SCENE_BUILT: &str = "sceneBuilt";

/// Channel on which [`SceneEvent::Unloaded`] is published.
pub const SCENE_UNLOADED: &str = "sceneUnloaded";

/// Context key holding the id of the current scene as a `String`.
pub const CURRENT_SCENE_KEY: &str = "currentScene";

/// Errors raised while loading a scene.
#[derive(Error, Debug)]
pub enum SceneError {
    /// The scene document does not match [`SceneDef`].
    #[error("invalid scene {scene}: {source}")]
    InvalidScene {
        /// Asset id of the scene.
        scene: String,
        /// The decoding error.
        #[source]
        source: serde_json::Error,
    },
}

/// One entity listed in a scene.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityDef {
    /// Asset holding the entity's component map.
    pub asset_id: String,
    /// Unique id of the entity to create.
    pub entity_id: String,
}

/// Scene document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneDef {
    /// Entities to build, in document order.
    pub entities: Vec<EntityDef>,
}

/// Payload of the scene channels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SceneEvent {
    /// A scene finished building.
    Built {
        /// Asset id of the scene.
        scene: String,
    },
    /// A scene was unloaded.
    Unloaded {
        /// Asset id of the scene.
        scene: String,
    },
}

/// Builds and unloads scenes.
#[derive(Clone)]
pub struct SceneBuilder {
    manager: Arc<EntityManager>,
    assets: Arc<dyn AssetSource>,
    context: Arc<Context>,
    events: Arc<EventBus<SceneEvent>>,
}

impl SceneBuilder {
    /// Creates a builder over the given services.
    #[must_use]
    pub fn new(
        manager: Arc<EntityManager>,
        assets: Arc<dyn AssetSource>,
        context: Arc<Context>,
        events: Arc<EventBus<SceneEvent>>,
    ) -> Self {
        Self {
            manager,
            assets,
            context,
            events,
        }
    }

    /// The scene event bus.
    #[must_use]
    pub fn events(&self) -> &Arc<EventBus<SceneEvent>> {
        &self.events
    }

    /// Reads the scene document stored under `scene_id`.
    ///
    /// A missing document is an empty scene.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::InvalidScene`] if the document does not decode.
    pub fn load(&self, scene_id: &str) -> Result<SceneDef, SceneError> {
        let Some(document) = self.assets.get(scene_id) else {
            tracing::debug!(scene = scene_id, "scene not found, treating as empty");
            return Ok(SceneDef::default());
        };

        serde_json::from_value(document).map_err(|source| SceneError::InvalidScene {
            scene: scene_id.to_string(),
            source,
        })
    }

    /// Creates every entity listed in `scene_id` and waits for all of them.
    ///
    /// Entities already live are returned as [`CreateOutcome::Existing`].
    /// Sets the current scene and publishes [`SceneEvent::Built`] once every
    /// entity has settled.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::InvalidScene`] if the document does not decode;
    /// no entity is created in that case.
    pub async fn build(&self, scene_id: &str) -> Result<Vec<CreateOutcome>, SceneError> {
        let scene = self.load(scene_id)?;
        tracing::debug!(scene = scene_id, entities = scene.entities.len(), "building scene");

        let creating = scene.entities.iter().map(|def| {
            self.manager
                .create_entity(&def.asset_id, def.entity_id.as_str())
        });
        let outcomes = future::join_all(creating).await;

        self.context.set(CURRENT_SCENE_KEY, scene_id.to_string());
        self.announce(
            SCENE_BUILT,
            SceneEvent::Built {
                scene: scene_id.to_string(),
            },
        )
        .await;

        Ok(outcomes)
    }

    /// Destroys every live entity and clears the current scene.
    ///
    /// Publishes [`SceneEvent::Unloaded`] after the entities are gone.
    pub async fn unload(&self, scene_id: &str) -> Vec<DestroyReport> {
        let reports = self.manager.destroy_all();
        self.context.delete(CURRENT_SCENE_KEY);
        tracing::debug!(scene = scene_id, destroyed = reports.len(), "scene unloaded");

        self.announce(
            SCENE_UNLOADED,
            SceneEvent::Unloaded {
                scene: scene_id.to_string(),
            },
        )
        .await;

        reports
    }

    /// Id of the current scene, if one is built.
    #[must_use]
    pub fn current_scene(&self) -> Option<Arc<String>> {
        self.context.get::<String>(CURRENT_SCENE_KEY)
    }

    async fn announce(&self, channel: &str, event: SceneEvent) -> DispatchReport {
        let report = self.events.emit_async(channel, event).await;
        if let Some(failure) = report.first_failure() {
            tracing::warn!(
                channel,
                failures = report.failures.len(),
                first = %failure.error,
                "scene listener failed"
            );
        }
        report
    }
}

impl std::fmt::Debug for SceneBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneBuilder")
            .field("manager", &self.manager)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystone_core::{AssetStore, Component, ComponentRegistry, EntityId};
    use parking_lot::Mutex;
    use serde_json::json;

    #[derive(Default, Deserialize)]
    struct Sprite {}

    impl Component for Sprite {}

    fn fixture(assets: AssetStore) -> (SceneBuilder, Arc<EntityManager>) {
        let registry = Arc::new(ComponentRegistry::default());
        registry.register_deserialize::<Sprite>("sprite");
        let assets: Arc<dyn AssetSource> = Arc::new(assets);
        let manager = Arc::new(EntityManager::new(
            registry,
            Arc::new(EventBus::new()),
            Arc::clone(&assets),
        ));
        let builder = SceneBuilder::new(
            Arc::clone(&manager),
            assets,
            Arc::new(Context::new()),
            Arc::new(EventBus::new()),
        );
        (builder, manager)
    }

    fn menu_assets() -> AssetStore {
        let assets = AssetStore::new();
        assets.insert("logo", json!({ "sprite": {} }));
        assets.insert(
            "menu",
            json!({
                "entities": [
                    { "assetId": "logo", "entityId": "logo_1" },
                    { "assetId": "logo", "entityId": "logo_2" }
                ]
            }),
        );
        assets
    }

    #[tokio::test]
    async fn test_build_creates_listed_entities() {
        let (builder, manager) = fixture(menu_assets());
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        builder.events().on_sync(SCENE_BUILT, move |event: SceneEvent| {
            sink.lock().push(event);
        });

        let outcomes = builder.build("menu").await.unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(CreateOutcome::is_created));
        assert_eq!(
            manager.entity_ids(),
            vec![EntityId::from("logo_1"), EntityId::from("logo_2")]
        );
        assert_eq!(builder.current_scene().as_deref().map(String::as_str), Some("menu"));
        assert_eq!(
            *events.lock(),
            vec![SceneEvent::Built {
                scene: "menu".into()
            }]
        );
    }

    #[tokio::test]
    async fn test_unload_destroys_and_announces() {
        let (builder, manager) = fixture(menu_assets());
        builder.build("menu").await.unwrap();

        let unloaded = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&unloaded);
        let observed = Arc::clone(&manager);
        builder.events().on_sync(SCENE_UNLOADED, move |event: SceneEvent| {
            *sink.lock() = Some((event, observed.len()));
        });

        let reports = builder.unload("menu").await;
        assert_eq!(reports.len(), 2);
        assert!(manager.is_empty());
        assert!(builder.current_scene().is_none());
        assert_eq!(
            *unloaded.lock(),
            Some((
                SceneEvent::Unloaded {
                    scene: "menu".into()
                },
                0
            ))
        );
    }

    #[tokio::test]
    async fn test_missing_and_invalid_scenes() {
        let assets = AssetStore::new();
        assets.insert("broken", json!({ "entities": [{ "assetId": 3 }] }));
        let (builder, manager) = fixture(assets);

        assert!(builder.build("nowhere").await.unwrap().is_empty());
        assert!(matches!(
            builder.build("broken").await,
            Err(SceneError::InvalidScene { ref scene, .. }) if scene == "broken"
        ));
        assert!(manager.is_empty());
    }
}
