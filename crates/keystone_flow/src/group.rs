//! # Groups
//!
//! Entities opt into a group by carrying a [`Group`] component under
//! [`GROUP_KIND`]. Group queries are plain predicate queries over the live
//! table; the entity manager itself knows nothing about groups.

use keystone_core::{
    BoxError, Component, ComponentKind, ComponentRegistry, EntityHandle, EntityManager, Ident,
    Teardown,
};
use serde::{Deserialize, Serialize};

/// Component kind under which [`Group`] is registered.
pub const GROUP_KIND: &str = "group";

/// Group membership.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Group {
    /// The group this entity belongs to, if any.
    pub id: Option<Ident>,
}

impl Group {
    /// Creates a membership in `id`.
    #[must_use]
    pub fn new(id: impl Into<Ident>) -> Self {
        Self {
            id: Some(id.into()),
        }
    }

    /// Registers the group constructor under [`GROUP_KIND`].
    pub fn register(registry: &ComponentRegistry) {
        registry.register_deserialize::<Self>(GROUP_KIND);
    }
}

impl Component for Group {
    fn teardown_capability(&mut self) -> Option<&mut dyn Teardown> {
        Some(self)
    }
}

impl Teardown for Group {
    fn teardown(&mut self) -> Result<(), BoxError> {
        self.id = None;
        Ok(())
    }
}

/// Every live entity in `group_id` that also carries all of `kinds`.
pub fn query_group<K>(
    manager: &EntityManager,
    group_id: impl Into<Ident>,
    kinds: impl IntoIterator<Item = K>,
) -> Vec<EntityHandle>
where
    K: Into<ComponentKind>,
{
    let group_id = group_id.into();
    let kinds: Vec<ComponentKind> = kinds.into_iter().map(Into::into).collect();

    manager.query_where(|entity| {
        entity
            .get_component::<Group>(GROUP_KIND)
            .and_then(|group| group.id.as_ref())
            .is_some_and(|id| *id == group_id)
            && entity.has_all(&kinds)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystone_core::{AssetStore, EventBus};
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::Arc;

    #[derive(Default, Deserialize)]
    struct Container {}

    impl Component for Container {}

    fn manager() -> EntityManager {
        let registry = Arc::new(ComponentRegistry::default());
        Group::register(&registry);
        registry.register_deserialize::<Container>("container");

        let assets = AssetStore::new();
        assets.insert("hud_panel", json!({ "group": { "id": "hud" }, "container": {} }));
        assets.insert("hud_label", json!({ "group": { "id": "hud" } }));
        assets.insert("slot", json!({ "group": { "id": 2 }, "container": {} }));
        assets.insert("loose", json!({ "container": {} }));

        EntityManager::new(registry, Arc::new(EventBus::new()), Arc::new(assets))
    }

    #[tokio::test]
    async fn test_query_group_filters_by_id_and_kinds() {
        let manager = manager();
        for asset in ["hud_panel", "hud_label", "slot", "loose"] {
            manager.create_entity(asset, asset).await;
        }

        assert_eq!(query_group(&manager, "hud", Vec::<ComponentKind>::new()).len(), 2);

        let panels = query_group(&manager, "hud", ["container"]);
        assert_eq!(panels.len(), 1);
        assert_eq!(panels[0].read().name(), "hud_panel");

        // Numeric and named group ids are distinct.
        assert_eq!(query_group(&manager, 2u32, ["container"]).len(), 1);
        assert!(query_group(&manager, "2", Vec::<ComponentKind>::new()).is_empty());
    }

    #[test]
    fn test_group_deserializes_and_clears_on_teardown() {
        let mut group: Group = serde_json::from_value(json!({ "id": "hud" })).unwrap();
        assert_eq!(group, Group::new("hud"));

        let empty: Group = serde_json::from_value(json!({})).unwrap();
        assert_eq!(empty.id, None);

        group.teardown().unwrap();
        assert_eq!(group.id, None);
    }
}
