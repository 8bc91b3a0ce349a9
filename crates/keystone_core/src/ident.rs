//! # Identifiers
//!
//! Component kinds, event channels and service keys share one identifier
//! shape: either a name or a small integer. Entities are identified by a
//! unique string name.

use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// String-or-integer identifier.
///
/// Names and numbers never compare equal to each other: `Ident::Id(1)` and
/// `Ident::from("1")` are distinct keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Ident {
    /// Small integer identifier.
    Id(u32),
    /// Named identifier.
    Name(Arc<str>),
}

impl Ident {
    /// Creates a named identifier.
    #[must_use]
    pub fn name(name: &str) -> Self {
        Self::Name(Arc::from(name))
    }

    /// Returns the name, if this is a named identifier.
    #[inline]
    #[must_use]
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name),
            Self::Id(_) => None,
        }
    }

    /// Returns the integer, if this is a numeric identifier.
    #[inline]
    #[must_use]
    pub const fn as_id(&self) -> Option<u32> {
        match self {
            Self::Id(id) => Some(*id),
            Self::Name(_) => None,
        }
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "#{id}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

impl From<&str> for Ident {
    fn from(name: &str) -> Self {
        Self::name(name)
    }
}

impl From<String> for Ident {
    fn from(name: String) -> Self {
        Self::Name(Arc::from(name))
    }
}

impl From<&String> for Ident {
    fn from(name: &String) -> Self {
        Self::name(name)
    }
}

impl From<u32> for Ident {
    fn from(id: u32) -> Self {
        Self::Id(id)
    }
}

impl From<&Ident> for Ident {
    fn from(ident: &Ident) -> Self {
        ident.clone()
    }
}

/// Identifier distinguishing one category of component from another.
pub type ComponentKind = Ident;

/// Named publish/subscribe topic on the event bus.
pub type Channel = Ident;

/// Key of a singleton service in the [`Context`](crate::Context).
pub type ServiceKey = Ident;

/// Unique name of an entity.
///
/// Cloning is a reference-count bump; entity ids are passed as event
/// payloads to every subscriber.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Arc<str>);

impl EntityId {
    /// Creates an entity id from a name.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    /// Returns the name as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Deref for EntityId {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for EntityId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for EntityId {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl From<&EntityId> for EntityId {
    fn from(id: &EntityId) -> Self {
        id.clone()
    }
}

impl PartialEq<str> for EntityId {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for EntityId {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}
