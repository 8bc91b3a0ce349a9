//! # Service Locator
//!
//! Keyed registry of singleton services (the active rendering surface, a
//! numeric constant, the current scene). Lifecycle is register-then-read-many
//! with an explicit [`Context::clear`] on shutdown.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::ident::ServiceKey;

type Service = Arc<dyn Any + Send + Sync>;

/// Process-wide service registry, owned by the runtime and shared by handle.
#[derive(Default)]
pub struct Context {
    services: RwLock<HashMap<ServiceKey, Service>>,
}

impl Context {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a service under `key`, replacing any previous value.
    pub fn register<T: Any + Send + Sync>(&self, key: impl Into<ServiceKey>, service: T) {
        self.register_shared(key, Arc::new(service));
    }

    /// Stores an already shared service under `key`.
    pub fn register_shared<T: Any + Send + Sync>(&self, key: impl Into<ServiceKey>, service: Arc<T>) {
        self.services.write().insert(key.into(), service);
    }

    /// Updates or inserts the value for `key`.
    pub fn set<T: Any + Send + Sync>(&self, key: impl Into<ServiceKey>, value: T) {
        self.register(key, value);
    }

    /// Returns the service under `key` if it exists and has type `T`.
    #[must_use]
    pub fn get<T: Any + Send + Sync>(&self, key: impl Into<ServiceKey>) -> Option<Arc<T>> {
        let service = self.services.read().get(&key.into()).cloned()?;
        service.downcast::<T>().ok()
    }

    /// Returns `true` if any service is stored under `key`.
    #[must_use]
    pub fn contains(&self, key: impl Into<ServiceKey>) -> bool {
        self.services.read().contains_key(&key.into())
    }

    /// Removes the entry for `key`. Returns `true` if one existed.
    pub fn delete(&self, key: impl Into<ServiceKey>) -> bool {
        self.services.write().remove(&key.into()).is_some()
    }

    /// Removes every service.
    pub fn clear(&self) {
        self.services.write().clear();
    }

    /// Returns the number of registered services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.read().len()
    }

    /// Returns `true` if no services are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.read().is_empty()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<_> = self.services.read().keys().cloned().collect();
        keys.sort();
        f.debug_struct("Context").field("keys", &keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Surface {
        width: u32,
    }

    #[test]
    fn test_register_and_get() {
        let context = Context::new();
        context.register("surface", Surface { width: 1280 });
        context.register(7u32, 0.5f64);

        assert_eq!(context.get::<Surface>("surface").unwrap().width, 1280);
        assert_eq!(*context.get::<f64>(7u32).unwrap(), 0.5);
        assert_eq!(context.len(), 2);
    }

    #[test]
    fn test_wrong_type_is_none() {
        let context = Context::new();
        context.set("scale", 2.0f32);
        assert!(context.get::<f64>("scale").is_none());
        assert!(context.contains("scale"));
    }

    #[test]
    fn test_delete_and_clear() {
        let context = Context::new();
        context.set("a", 1u8);
        context.set("b", 2u8);

        assert!(context.delete("a"));
        assert!(!context.delete("a"));
        context.clear();
        assert!(context.is_empty());
    }
}
