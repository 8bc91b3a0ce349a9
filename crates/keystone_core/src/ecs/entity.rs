//! # Entity
//!
//! A named bag of at most one component per kind. Entities are shared by
//! handle between the manager and every subsystem that reacts to them.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::component::Component;
use crate::error::BoxError;
use crate::ident::{ComponentKind, EntityId};

/// Shared, lockable handle to a live entity.
pub type EntityHandle = Arc<RwLock<Entity>>;

/// A failed component teardown.
#[derive(Debug)]
pub struct TeardownFailure {
    /// Kind of the component whose teardown failed.
    pub kind: ComponentKind,
    /// The teardown error.
    pub error: BoxError,
}

/// Named holder of component instances.
///
/// Adding a kind that is already present replaces the prior instance without
/// tearing it down; destruction stays the caller's decision.
pub struct Entity {
    name: EntityId,
    components: HashMap<ComponentKind, Box<dyn Component>>,
}

impl Entity {
    /// Creates an entity with no components.
    #[must_use]
    pub fn new(name: impl Into<EntityId>) -> Self {
        Self {
            name: name.into(),
            components: HashMap::new(),
        }
    }

    /// Returns the entity's unique name.
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &EntityId {
        &self.name
    }

    /// Attaches a component under `kind`, returning the instance it replaced.
    pub fn add_component(
        &mut self,
        kind: impl Into<ComponentKind>,
        component: impl Component,
    ) -> Option<Box<dyn Component>> {
        self.add_boxed(kind, Box::new(component))
    }

    /// Attaches an already boxed component under `kind`.
    pub fn add_boxed(
        &mut self,
        kind: impl Into<ComponentKind>,
        component: Box<dyn Component>,
    ) -> Option<Box<dyn Component>> {
        self.components.insert(kind.into(), component)
    }

    /// Returns the component under `kind` if present and of type `T`.
    ///
    /// Never constructs on demand.
    #[must_use]
    pub fn get_component<T: Component>(&self, kind: impl Into<ComponentKind>) -> Option<&T> {
        self.components.get(&kind.into())?.downcast_ref::<T>()
    }

    /// Returns the component under `kind` mutably if present and of type `T`.
    pub fn get_component_mut<T: Component>(
        &mut self,
        kind: impl Into<ComponentKind>,
    ) -> Option<&mut T> {
        self.components.get_mut(&kind.into())?.downcast_mut::<T>()
    }

    /// Returns the component under `kind` without downcasting.
    #[must_use]
    pub fn get_component_dyn(&self, kind: impl Into<ComponentKind>) -> Option<&dyn Component> {
        self.components.get(&kind.into()).map(|component| &**component)
    }

    /// Checks whether a component of `kind` is attached.
    #[must_use]
    pub fn has_component(&self, kind: impl Into<ComponentKind>) -> bool {
        self.components.contains_key(&kind.into())
    }

    /// Checks whether every kind in `kinds` is attached.
    #[must_use]
    pub fn has_all<'a>(&self, kinds: impl IntoIterator<Item = &'a ComponentKind>) -> bool {
        kinds.into_iter().all(|kind| self.components.contains_key(kind))
    }

    /// Detaches the component under `kind` without tearing it down.
    pub fn remove_component(&mut self, kind: impl Into<ComponentKind>) -> Option<Box<dyn Component>> {
        self.components.remove(&kind.into())
    }

    /// Snapshot of every attached component.
    ///
    /// Order is unspecified.
    #[must_use]
    pub fn components(&self) -> Vec<&dyn Component> {
        self.components.values().map(|component| &**component).collect()
    }

    /// Snapshot of every attached kind, sorted.
    #[must_use]
    pub fn kinds(&self) -> Vec<ComponentKind> {
        let mut kinds: Vec<_> = self.components.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// Detaches every component without tearing any down.
    pub fn remove_all_components(&mut self) {
        self.components.clear();
    }

    /// Number of attached components.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns `true` if no components are attached.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Tears down every component that exposes the capability.
    ///
    /// A failing component does not stop its siblings. Components stay
    /// attached; the caller decides what happens to the entity afterwards.
    pub fn teardown_all(&mut self) -> Vec<TeardownFailure> {
        let mut failures = Vec::new();

        for (kind, component) in &mut self.components {
            let Some(teardown) = component.teardown_capability() else {
                continue;
            };
            if let Err(error) = teardown.teardown() {
                failures.push(TeardownFailure {
                    kind: kind.clone(),
                    error,
                });
            }
        }

        failures
    }

    /// Wraps the entity in a shared handle.
    #[must_use]
    pub fn into_handle(self) -> EntityHandle {
        Arc::new(RwLock::new(self))
    }
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entity")
            .field("name", &self.name)
            .field("kinds", &self.kinds())
            .finish()
    }
}
