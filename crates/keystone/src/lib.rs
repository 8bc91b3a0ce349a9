//! # KEYSTONE
//!
//! Declarative entity runtime, wiring every service together.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                             Runtime                              │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  ┌──────────────┐   builds   ┌──────────────┐   announces        │
//! │  │  Component   │<───────────│    Entity    │────────────┐       │
//! │  │  Registry    │            │    Manager   │            v       │
//! │  └──────────────┘            └──────┬───────┘     ┌────────────┐ │
//! │                                     │ reads       │ Event Bus  │ │
//! │  ┌──────────────┐            ┌──────v───────┐     │ (per kind) │ │
//! │  │   Context    │<───────────│    Scene     │     └────────────┘ │
//! │  │  (services)  │  current   │    Builder   │                    │
//! │  └──────────────┘   scene    └──────────────┘                    │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `runtime`: service construction and the init/shutdown lifecycle
//! - `logging`: `tracing` subscriber setup

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod error;
pub mod logging;
pub mod runtime;

pub use error::Error;
pub use logging::init_logging;
pub use runtime::Runtime;

// Re-export the building blocks
pub use keystone_core as core;
pub use keystone_flow as flow;

pub use keystone_core::{
    AssetSource, AssetStore, BoxError, Component, ComponentRegistry, Context, CreateOutcome,
    EntityHandle, EntityId, EntityManager, EventBus, RuntimeConfig, Teardown,
};
pub use keystone_flow::{Group, SceneBuilder, SceneEvent, Sequencer, SequencerOptions};
