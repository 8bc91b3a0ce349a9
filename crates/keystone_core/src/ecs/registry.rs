//! # Component Registry
//!
//! Maps a component kind to a constructor that turns raw JSON configuration
//! into a component instance. Producers register constructors, the entity
//! manager asks for instances; neither knows the other's types.
//!
//! Re-registering a kind replaces the old constructor. That is useful for
//! test doubles and overrides, but it also hides mistakes, so every
//! overwrite is logged and recorded as a [`RegistryDiagnostic`].

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::component::Component;
use crate::config::RegistryConfig;
use crate::error::{BoxError, RegistryError, RegistryResult};
use crate::ident::ComponentKind;

type Constructor = Arc<dyn Fn(&Value) -> Result<Box<dyn Component>, BoxError> + Send + Sync>;

/// Observable registry condition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistryDiagnostic {
    /// A registration replaced the constructor for an existing kind.
    Overwritten {
        /// The replaced kind.
        kind: ComponentKind,
    },
    /// A component of an unregistered kind was requested.
    UnknownKind {
        /// The requested kind.
        kind: ComponentKind,
    },
    /// A constructor failed.
    ConstructionFailed {
        /// The kind whose constructor failed.
        kind: ComponentKind,
        /// Rendered constructor error.
        message: String,
    },
}

/// Kind -> constructor table.
pub struct ComponentRegistry {
    constructors: RwLock<HashMap<ComponentKind, Constructor>>,
    diagnostics: Mutex<Vec<RegistryDiagnostic>>,
    config: RegistryConfig,
}

impl ComponentRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            constructors: RwLock::new(HashMap::new()),
            diagnostics: Mutex::new(Vec::new()),
            config,
        }
    }

    /// Registers or replaces the constructor for `kind`.
    ///
    /// Returns `true` if an existing constructor was replaced.
    pub fn register<C, E, F>(&self, kind: impl Into<ComponentKind>, ctor: F) -> bool
    where
        C: Component,
        E: Into<BoxError>,
        F: Fn(&Value) -> Result<C, E> + Send + Sync + 'static,
    {
        let ctor: Constructor = Arc::new(move |data: &Value| match ctor(data) {
            Ok(component) => Ok(Box::new(component) as Box<dyn Component>),
            Err(err) => Err(err.into()),
        });
        self.insert(kind.into(), ctor)
    }

    /// Registers a constructor that deserializes the configuration into `C`.
    ///
    /// A `null` configuration is treated as an empty object, so components
    /// whose fields all have serde defaults can be listed with no data.
    pub fn register_deserialize<C>(&self, kind: impl Into<ComponentKind>) -> bool
    where
        C: Component + DeserializeOwned,
    {
        self.register(kind, |data: &Value| {
            let data = if data.is_null() {
                Value::Object(serde_json::Map::new())
            } else {
                data.clone()
            };
            serde_json::from_value::<C>(data)
        })
    }

    fn insert(&self, kind: ComponentKind, ctor: Constructor) -> bool {
        let replaced = self.constructors.write().insert(kind.clone(), ctor).is_some();

        if replaced {
            if self.config.warn_on_overwrite {
                tracing::warn!(%kind, "overwriting component constructor");
            }
            self.diagnostics
                .lock()
                .push(RegistryDiagnostic::Overwritten { kind });
        }

        replaced
    }

    /// Removes the constructor for `kind`. Returns `true` if one existed.
    pub fn unregister(&self, kind: impl Into<ComponentKind>) -> bool {
        self.constructors.write().remove(&kind.into()).is_some()
    }

    /// Builds a component, reporting why it could not be built.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::UnknownKind`] if no constructor is registered
    /// - [`RegistryError::ConstructionFailed`] if the constructor failed
    pub fn try_create(
        &self,
        kind: impl Into<ComponentKind>,
        data: &Value,
    ) -> RegistryResult<Box<dyn Component>> {
        let kind = kind.into();
        // Release the table before running user code.
        let ctor = self.constructors.read().get(&kind).cloned();

        let Some(ctor) = ctor else {
            tracing::warn!(%kind, "unknown component kind");
            self.diagnostics
                .lock()
                .push(RegistryDiagnostic::UnknownKind { kind: kind.clone() });
            return Err(RegistryError::UnknownKind { kind });
        };

        ctor(data).map_err(|source| {
            tracing::error!(%kind, error = %source, "component construction failed");
            self.diagnostics
                .lock()
                .push(RegistryDiagnostic::ConstructionFailed {
                    kind: kind.clone(),
                    message: source.to_string(),
                });
            RegistryError::ConstructionFailed { kind, source }
        })
    }

    /// Builds a component, or `None` if it could not be built.
    ///
    /// The reason is logged and recorded as a diagnostic; callers treat
    /// `None` as "component not created".
    #[must_use]
    pub fn create(&self, kind: impl Into<ComponentKind>, data: &Value) -> Option<Box<dyn Component>> {
        self.try_create(kind, data).ok()
    }

    /// Checks whether a constructor exists for `kind`.
    #[must_use]
    pub fn has(&self, kind: impl Into<ComponentKind>) -> bool {
        self.constructors.read().contains_key(&kind.into())
    }

    /// Lists the registered kinds, sorted.
    #[must_use]
    pub fn list(&self) -> Vec<ComponentKind> {
        let mut kinds: Vec<_> = self.constructors.read().keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// Drains the recorded diagnostics.
    pub fn take_diagnostics(&self) -> Vec<RegistryDiagnostic> {
        std::mem::take(&mut *self.diagnostics.lock())
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("kinds", &self.list())
            .finish_non_exhaustive()
    }
}
