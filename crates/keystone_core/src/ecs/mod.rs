//! # Entity Component System
//!
//! Declarative entities built from component data.
//!
//! ## Design Philosophy
//!
//! - Component kinds are data; the registry maps each kind to a constructor
//! - An entity is a named bag of at most one component per kind
//! - The manager owns the live table and announces every declared kind
//! - One bad component never aborts an entity build

mod component;
mod entity;
mod manager;
mod registry;

pub use component::{AsAny, Component, Teardown};
pub use entity::{Entity, EntityHandle, TeardownFailure};
pub use manager::{CreateOutcome, DestroyReport, EntityManager};
pub use registry::{ComponentRegistry, RegistryDiagnostic};
