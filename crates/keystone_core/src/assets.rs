//! # Asset Data Source
//!
//! Fetching is somebody else's job. The runtime only reads documents that
//! an asset loader has already put somewhere, keyed by asset id.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde_json::{Map, Value};

/// Declarative component map: component kind name -> raw configuration.
///
/// Key order follows the source document.
pub type ComponentMap = Map<String, Value>;

/// Read access to loaded asset documents.
pub trait AssetSource: Send + Sync {
    /// Returns the document stored under `id`, if any.
    fn get(&self, id: &str) -> Option<Value>;

    /// Returns the component map describing the entity asset `asset_id`.
    ///
    /// A missing document, or one that is not a JSON object, yields an empty
    /// map: the entity is built with zero components.
    fn component_map(&self, asset_id: &str) -> ComponentMap {
        match self.get(asset_id) {
            Some(Value::Object(map)) => map,
            _ => ComponentMap::new(),
        }
    }
}

/// In-memory asset store.
#[derive(Debug, Default)]
pub struct AssetStore {
    documents: RwLock<HashMap<String, Value>>,
}

impl AssetStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a document, returning the one it replaced.
    pub fn insert(&self, id: impl Into<String>, document: Value) -> Option<Value> {
        self.documents.write().insert(id.into(), document)
    }

    /// Parses and stores a JSON document.
    ///
    /// # Errors
    ///
    /// Returns the parse error if `json` is not valid JSON; the store is left
    /// unchanged.
    pub fn insert_json(&self, id: impl Into<String>, json: &str) -> Result<(), serde_json::Error> {
        let document = serde_json::from_str(json)?;
        self.insert(id, document);
        Ok(())
    }

    /// Parses a JSON object of `asset id -> document` and stores every entry.
    ///
    /// Returns the number of documents stored.
    ///
    /// # Errors
    ///
    /// Returns the parse error if `json` is not a JSON object; the store is
    /// left unchanged.
    pub fn insert_json_documents(&self, json: &str) -> Result<usize, serde_json::Error> {
        let documents: Map<String, Value> = serde_json::from_str(json)?;
        let count = documents.len();
        self.documents.write().extend(documents);
        Ok(count)
    }

    /// Removes a document.
    pub fn remove(&self, id: &str) -> Option<Value> {
        self.documents.write().remove(id)
    }

    /// Returns the number of stored documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    /// Returns `true` if no documents are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}

impl AssetSource for AssetStore {
    fn get(&self, id: &str) -> Option<Value> {
        self.documents.read().get(id).cloned()
    }
}
