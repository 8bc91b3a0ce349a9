//! # Core Error Types
//!
//! Failures are local wherever possible: an unknown kind or a failing
//! constructor costs one component, a failing subscriber costs one
//! subscriber. These types carry enough structure (kind, entity, cause) for
//! a caller or test to assert on.

use thiserror::Error;

use crate::events::SubscriptionId;
use crate::ident::{Channel, ComponentKind, EntityId};

/// Boxed error produced by user code (constructors, teardown, subscribers).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Conversion of a handler's return value into a success/failure outcome.
///
/// Implemented for `()` (always succeeds) and for `Result<(), E>`, so
/// handlers and sequencer actions may be written either way.
pub trait IntoOutcome {
    /// Converts into a uniform outcome.
    ///
    /// # Errors
    ///
    /// Returns the boxed failure carried by `self`, if any.
    fn into_outcome(self) -> Result<(), BoxError>;
}

impl IntoOutcome for () {
    #[inline]
    fn into_outcome(self) -> Result<(), BoxError> {
        Ok(())
    }
}

impl<E: Into<BoxError>> IntoOutcome for Result<(), E> {
    #[inline]
    fn into_outcome(self) -> Result<(), BoxError> {
        self.map_err(Into::into)
    }
}

/// Errors raised by the component registry.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// No constructor is registered for the kind.
    #[error("unknown component kind: {kind}")]
    UnknownKind {
        /// The requested kind.
        kind: ComponentKind,
    },

    /// The constructor for the kind returned an error.
    #[error("failed to construct component {kind}: {source}")]
    ConstructionFailed {
        /// The kind whose constructor failed.
        kind: ComponentKind,
        /// The constructor's error.
        #[source]
        source: BoxError,
    },
}

impl RegistryError {
    /// Returns the kind the error is scoped to.
    #[must_use]
    pub fn kind(&self) -> &ComponentKind {
        match self {
            Self::UnknownKind { kind } | Self::ConstructionFailed { kind, .. } => kind,
        }
    }
}

/// Errors raised by entity lookup and teardown.
#[derive(Error, Debug)]
pub enum EntityError {
    /// The entity is not in the live table.
    #[error("entity not live: {0}")]
    NotLive(EntityId),

    /// The entity is live but its creation notifications are still running.
    #[error("entity {0} is still being built")]
    Building(EntityId),

    /// A component's teardown failed.
    #[error("teardown of {kind} on entity {entity} failed: {source}")]
    TeardownFailed {
        /// The entity being destroyed.
        entity: EntityId,
        /// The component kind whose teardown failed.
        kind: ComponentKind,
        /// The teardown error.
        #[source]
        source: BoxError,
    },
}

/// Errors raised by event dispatch.
#[derive(Error, Debug)]
pub enum EventError {
    /// A subscriber's pending operation failed.
    #[error("subscriber {subscription} on channel {channel} failed: {source}")]
    SubscriberFailed {
        /// The channel being dispatched.
        channel: Channel,
        /// The failing subscription.
        subscription: SubscriptionId,
        /// The subscriber's error.
        #[source]
        source: BoxError,
    },
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
