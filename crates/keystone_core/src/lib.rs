//! # KEYSTONE Core Runtime
//!
//! Generic entity/component runtime that turns declarative data into live,
//! typed component instances and announces them to decoupled subsystems.
//!
//! ## Architecture Rules
//!
//! 1. **No globals** - registry, entity table, event bus and context are
//!    constructed explicitly and shared by `Arc` handle
//! 2. **One bad component never aborts a build** - failures are isolated per
//!    component and per subscriber
//! 3. **Register before announce** - an entity is visible in the live table
//!    before any creation notification runs
//!
//! ## Example
//!
//! ```rust,ignore
//! use keystone_core::{AssetStore, ComponentRegistry, EntityManager, EventBus};
//!
//! let registry = Arc::new(ComponentRegistry::default());
//! registry.register_deserialize::<Transform>("transform");
//!
//! let bus = Arc::new(EventBus::new());
//! let manager = EntityManager::new(registry, bus, Arc::new(assets));
//! let outcome = manager.create_entity("hero", "hero_1").await;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod assets;
pub mod config;
pub mod context;
pub mod ecs;
pub mod error;
pub mod events;
pub mod ident;

pub use assets::{AssetSource, AssetStore, ComponentMap};
pub use config::{ConfigError, LoggingConfig, RegistryConfig, RuntimeConfig, SequencerConfig};
pub use context::Context;
pub use ecs::{
    Component, ComponentRegistry, CreateOutcome, DestroyReport, Entity, EntityHandle,
    EntityManager, RegistryDiagnostic, Teardown, TeardownFailure,
};
pub use error::{BoxError, EntityError, EventError, IntoOutcome, RegistryError};
pub use events::{DispatchFailure, DispatchReport, EventBus, SubscriptionId};
pub use ident::{Channel, ComponentKind, EntityId, Ident, ServiceKey};
