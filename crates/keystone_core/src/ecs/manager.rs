//! # Entity Manager
//!
//! The live entity table. Builds entities from declarative data, announces
//! every listed component kind on the event bus, and tears entities down.
//!
//! ## Lifecycle
//!
//! ```text
//! absent ──create──> building ──register──> live ──destroy──> destroyed
//!                        │                    │
//!                  registry builds      creation notified
//!                  each component       per kind (await-all)
//! ```
//!
//! Building and registering happen under the table's write lock, so two
//! callers racing on the same id can never both construct it. Component
//! constructors and teardowns therefore must not call back into the manager.
//!
//! An entity stays marked as building until its last kind has been
//! announced. Destroying it in that window is refused with
//! [`EntityError::Building`].

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::entity::{Entity, EntityHandle, TeardownFailure};
use super::registry::ComponentRegistry;
use crate::assets::{AssetSource, ComponentMap};
use crate::error::EntityError;
use crate::events::{DispatchReport, EventBus};
use crate::ident::{ComponentKind, EntityId};

/// Result of [`EntityManager::create_entity`].
#[derive(Debug)]
pub enum CreateOutcome {
    /// The entity was built, registered and announced.
    Created {
        /// The new entity.
        entity: EntityHandle,
        /// One await-all report per announced kind, in declaration order.
        notifications: Vec<DispatchReport>,
    },
    /// The id was already live; nothing was built or announced.
    Existing(EntityHandle),
}

impl CreateOutcome {
    /// Returns the entity handle.
    #[must_use]
    pub fn entity(&self) -> &EntityHandle {
        match self {
            Self::Created { entity, .. } | Self::Existing(entity) => entity,
        }
    }

    /// Consumes the outcome, returning the entity handle.
    #[must_use]
    pub fn into_entity(self) -> EntityHandle {
        match self {
            Self::Created { entity, .. } | Self::Existing(entity) => entity,
        }
    }

    /// Returns `true` if this call built the entity.
    #[must_use]
    pub const fn is_created(&self) -> bool {
        matches!(self, Self::Created { .. })
    }
}

/// Result of destroying a live entity.
#[derive(Debug)]
pub struct DestroyReport {
    /// The destroyed entity.
    pub entity: EntityId,
    /// Components whose teardown failed. The entity was removed regardless.
    pub failures: Vec<TeardownFailure>,
}

impl DestroyReport {
    /// Returns `true` if every teardown succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Converts into the first teardown failure, if any.
    ///
    /// # Errors
    ///
    /// Returns [`EntityError::TeardownFailed`] for the first failing
    /// component.
    pub fn into_result(self) -> Result<(), EntityError> {
        match self.failures.into_iter().next() {
            None => Ok(()),
            Some(failure) => Err(EntityError::TeardownFailed {
                entity: self.entity,
                kind: failure.kind,
                source: failure.error,
            }),
        }
    }
}

/// Clears an entity's building mark when its announcements end, including
/// when the creating future is dropped part way.
struct BuildingMark<'a> {
    building: &'a Mutex<HashSet<EntityId>>,
    entity: EntityId,
}

impl Drop for BuildingMark<'_> {
    fn drop(&mut self) {
        self.building.lock().remove(&self.entity);
    }
}

/// Process-wide table of live entities.
pub struct EntityManager {
    live: RwLock<BTreeMap<EntityId, EntityHandle>>,
    /// Live entities whose creation notifications have not finished.
    /// Always locked after `live` when both are needed.
    building: Mutex<HashSet<EntityId>>,
    registry: Arc<ComponentRegistry>,
    events: Arc<EventBus<EntityId>>,
    assets: Arc<dyn AssetSource>,
}

impl EntityManager {
    /// Creates a manager with an empty live table.
    #[must_use]
    pub fn new(
        registry: Arc<ComponentRegistry>,
        events: Arc<EventBus<EntityId>>,
        assets: Arc<dyn AssetSource>,
    ) -> Self {
        Self {
            live: RwLock::new(BTreeMap::new()),
            building: Mutex::new(HashSet::new()),
            registry,
            events,
            assets,
        }
    }

    /// The registry used to build components.
    #[must_use]
    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    /// The bus creation notifications are published on.
    #[must_use]
    pub fn events(&self) -> &Arc<EventBus<EntityId>> {
        &self.events
    }

    /// Builds `entity_id` from the component map stored under `asset_id`.
    ///
    /// If `entity_id` is already live, the existing entity is returned and
    /// nothing is rebuilt or announced. A missing asset builds an entity with
    /// no components.
    pub async fn create_entity(
        &self,
        asset_id: &str,
        entity_id: impl Into<EntityId>,
    ) -> CreateOutcome {
        let entity_id = entity_id.into();
        if let Some(existing) = self.get_entity(&entity_id) {
            tracing::debug!(entity = %entity_id, "entity already live");
            return CreateOutcome::Existing(existing);
        }

        let data = self.assets.component_map(asset_id);
        self.create_entity_from(entity_id, data).await
    }

    /// Builds `entity_id` from an already resolved component map.
    ///
    /// Every kind in `data` is announced on its channel with the entity id
    /// as payload, in declaration order, whether or not its component could
    /// be built. Each announcement is awaited before the next starts, and
    /// the entity cannot be destroyed until the last one has finished.
    pub async fn create_entity_from(
        &self,
        entity_id: impl Into<EntityId>,
        data: ComponentMap,
    ) -> CreateOutcome {
        let entity_id = entity_id.into();

        let (entity, kinds) = {
            let mut live = self.live.write();
            if let Some(existing) = live.get(&entity_id) {
                tracing::debug!(entity = %entity_id, "entity already live");
                return CreateOutcome::Existing(Arc::clone(existing));
            }

            let mut entity = Entity::new(entity_id.clone());
            let mut kinds = Vec::with_capacity(data.len());
            for (name, config) in &data {
                let kind = ComponentKind::from(name.as_str());
                if let Some(component) = self.registry.create(kind.clone(), config) {
                    entity.add_boxed(kind.clone(), component);
                }
                kinds.push(kind);
            }

            tracing::debug!(
                entity = %entity_id,
                declared = kinds.len(),
                built = entity.len(),
                "entity built"
            );

            let handle = entity.into_handle();
            live.insert(entity_id.clone(), Arc::clone(&handle));
            self.building.lock().insert(entity_id.clone());
            (handle, kinds)
        };
        let _mark = BuildingMark {
            building: &self.building,
            entity: entity_id.clone(),
        };

        let mut notifications = Vec::with_capacity(kinds.len());
        for kind in kinds {
            let report = self.events.emit_async(kind, entity_id.clone()).await;
            if !report.is_ok() {
                tracing::warn!(
                    entity = %entity_id,
                    channel = %report.channel,
                    failures = report.failures.len(),
                    "creation notification had failing subscribers"
                );
            }
            notifications.push(report);
        }

        CreateOutcome::Created {
            entity,
            notifications,
        }
    }

    /// Tears down and removes `entity_id`.
    ///
    /// Teardown runs on every component exposing the capability; failures
    /// are isolated and never keep the entity in the table.
    ///
    /// # Errors
    ///
    /// Returns [`EntityError::NotLive`] if the entity is not in the table and
    /// [`EntityError::Building`] while its creation is still being announced.
    /// Nothing is torn down in either case.
    pub fn destroy_entity(&self, entity_id: &str) -> Result<DestroyReport, EntityError> {
        let failures = {
            let mut live = self.live.write();
            let handle = live
                .get(entity_id)
                .cloned()
                .ok_or_else(|| EntityError::NotLive(EntityId::from(entity_id)))?;
            if self.building.lock().contains(entity_id) {
                tracing::warn!(entity = entity_id, "destroy refused, entity still building");
                return Err(EntityError::Building(EntityId::from(entity_id)));
            }
            let failures = handle.write().teardown_all();
            live.remove(entity_id);
            failures
        };

        for failure in &failures {
            tracing::warn!(
                entity = entity_id,
                kind = %failure.kind,
                error = %failure.error,
                "component teardown failed"
            );
        }
        tracing::debug!(entity = entity_id, "entity destroyed");

        Ok(DestroyReport {
            entity: EntityId::from(entity_id),
            failures,
        })
    }

    /// Destroys every live entity that is not still building.
    pub fn destroy_all(&self) -> Vec<DestroyReport> {
        self.entity_ids()
            .iter()
            .filter_map(|id| self.destroy_entity(id).ok())
            .collect()
    }

    /// Returns `true` while `entity_id` is live but still announcing its
    /// creation.
    #[must_use]
    pub fn is_building(&self, entity_id: &str) -> bool {
        self.building.lock().contains(entity_id)
    }

    /// Returns the live entity `entity_id`.
    #[must_use]
    pub fn get_entity(&self, entity_id: &str) -> Option<EntityHandle> {
        self.live.read().get(entity_id).cloned()
    }

    /// Returns the live entity `entity_id` or an error naming it.
    ///
    /// # Errors
    ///
    /// Returns [`EntityError::NotLive`] if the entity is not in the table.
    pub fn require_entity(&self, entity_id: &str) -> Result<EntityHandle, EntityError> {
        self.get_entity(entity_id)
            .ok_or_else(|| EntityError::NotLive(EntityId::from(entity_id)))
    }

    /// Checks whether `entity_id` is live.
    #[must_use]
    pub fn contains(&self, entity_id: &str) -> bool {
        self.live.read().contains_key(entity_id)
    }

    /// Ids of every live entity, sorted.
    #[must_use]
    pub fn entity_ids(&self) -> Vec<EntityId> {
        self.live.read().keys().cloned().collect()
    }

    /// Snapshot of every live entity, sorted by id.
    #[must_use]
    pub fn all_entities(&self) -> Vec<EntityHandle> {
        self.live.read().values().cloned().collect()
    }

    /// Number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live.read().len()
    }

    /// Returns `true` if no entity is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live.read().is_empty()
    }

    /// Every live entity whose components include all of `kinds`.
    ///
    /// An empty `kinds` returns every live entity.
    pub fn query_entities<K>(&self, kinds: impl IntoIterator<Item = K>) -> Vec<EntityHandle>
    where
        K: Into<ComponentKind>,
    {
        let kinds: Vec<ComponentKind> = kinds.into_iter().map(Into::into).collect();
        self.query_where(|entity| entity.has_all(&kinds))
    }

    /// Every live entity matching `predicate`.
    pub fn query_where(&self, mut predicate: impl FnMut(&Entity) -> bool) -> Vec<EntityHandle> {
        self.live
            .read()
            .values()
            .filter(|handle| predicate(&handle.read()))
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for EntityManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityManager")
            .field("live", &self.entity_ids())
            .finish_non_exhaustive()
    }
}
