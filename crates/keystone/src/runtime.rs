//! # Runtime
//!
//! Owns one instance of every service and hands out shared handles.
//!
//! ## Lifecycle
//!
//! ```text
//! init ──> register components / subscribe subsystems ──> build scenes
//!                                                               │
//!                                               shutdown <──────┘
//! ```
//!
//! Nothing is global: two runtimes in one process are fully independent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use keystone_core::{
    AssetSource, ComponentRegistry, Context, DestroyReport, EntityId, EntityManager, EventBus,
    RuntimeConfig,
};
use keystone_flow::{Group, SceneBuilder, SceneEvent, Sequencer, SequencerOptions};

/// The set of services making up one running application.
pub struct Runtime {
    config: RuntimeConfig,
    registry: Arc<ComponentRegistry>,
    entity_events: Arc<EventBus<EntityId>>,
    scene_events: Arc<EventBus<SceneEvent>>,
    manager: Arc<EntityManager>,
    context: Arc<Context>,
    scenes: SceneBuilder,
    shut_down: AtomicBool,
}

impl Runtime {
    /// Constructs every service.
    ///
    /// The registry starts with the [`Group`] component registered.
    #[must_use]
    pub fn init(config: RuntimeConfig, assets: Arc<dyn AssetSource>) -> Self {
        let registry = Arc::new(ComponentRegistry::new(config.registry.clone()));
        Group::register(&registry);

        let entity_events = Arc::new(EventBus::new());
        let scene_events = Arc::new(EventBus::new());
        let context = Arc::new(Context::new());
        let manager = Arc::new(EntityManager::new(
            Arc::clone(&registry),
            Arc::clone(&entity_events),
            Arc::clone(&assets),
        ));
        let scenes = SceneBuilder::new(
            Arc::clone(&manager),
            assets,
            Arc::clone(&context),
            Arc::clone(&scene_events),
        );

        tracing::debug!(?config, "runtime initialised");

        Self {
            config,
            registry,
            entity_events,
            scene_events,
            manager,
            context,
            scenes,
            shut_down: AtomicBool::new(false),
        }
    }

    /// The configuration the runtime was built with.
    #[must_use]
    pub const fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// The component registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    /// The bus carrying entity creation notifications, one channel per kind.
    #[must_use]
    pub fn events(&self) -> &Arc<EventBus<EntityId>> {
        &self.entity_events
    }

    /// The bus carrying scene lifecycle events.
    #[must_use]
    pub fn scene_events(&self) -> &Arc<EventBus<SceneEvent>> {
        &self.scene_events
    }

    /// The live entity table.
    #[must_use]
    pub fn entities(&self) -> &Arc<EntityManager> {
        &self.manager
    }

    /// The service locator.
    #[must_use]
    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    /// The scene builder.
    #[must_use]
    pub const fn scenes(&self) -> &SceneBuilder {
        &self.scenes
    }

    /// A new, empty sequencer using the configured options.
    #[must_use]
    pub fn sequencer(&self) -> Sequencer {
        Sequencer::new(SequencerOptions::from(&self.config.sequencer))
    }

    /// Returns `true` once [`Runtime::shutdown`] has run.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Destroys every entity, drops every subscription and empties the
    /// context.
    ///
    /// Only the first call does any work; later calls return no reports.
    pub fn shutdown(&self) -> Vec<DestroyReport> {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return Vec::new();
        }

        let reports = self.manager.destroy_all();
        let failed = reports.iter().filter(|report| !report.is_clean()).count();
        if failed > 0 {
            tracing::warn!(failed, "entities had failing teardowns during shutdown");
        }

        self.entity_events.clear();
        self.scene_events.clear();
        self.context.clear();

        tracing::debug!(destroyed = reports.len(), "runtime shut down");
        reports
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.config)
            .field("entities", &self.manager)
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystone_core::{AssetStore, Component};
    use keystone_flow::GROUP_KIND;
    use serde_json::json;

    #[derive(serde::Deserialize)]
    struct Marker {}

    impl Component for Marker {}

    fn runtime(config: RuntimeConfig) -> Runtime {
        let assets = AssetStore::new();
        assets.insert("flag", json!({ "marker": {}, "group": { "id": "flags" } }));
        Runtime::init(config, Arc::new(assets))
    }

    #[test]
    fn test_init_registers_group() {
        let rt = runtime(RuntimeConfig::default());
        assert!(rt.registry().has(GROUP_KIND));
        assert!(rt.entities().is_empty());
        assert!(!rt.is_shut_down());
    }

    #[test]
    fn test_sequencer_uses_configured_options() {
        let config =
            RuntimeConfig::from_toml_str("[sequencer]\nauto_clear = false\ndebug = true\n").unwrap();
        let rt = runtime(config);
        let options = rt.sequencer().options();
        assert!(!options.auto_clear);
        assert!(options.debug);
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let rt = runtime(RuntimeConfig::default());
        rt.registry().register_deserialize::<Marker>("marker");
        rt.events().on_sync("marker", |_| ());
        rt.context().set("width", 640u32);

        rt.entities().create_entity("flag", "flag_1").await;
        assert_eq!(rt.entities().len(), 1);

        let reports = rt.shutdown();
        assert_eq!(reports.len(), 1);
        assert!(rt.entities().is_empty());
        assert_eq!(rt.events().subscriber_count("marker"), 0);
        assert!(rt.context().is_empty());
        assert!(rt.is_shut_down());

        assert!(rt.shutdown().is_empty());
    }
}
