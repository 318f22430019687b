//! Core types shared by every configuration storage.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The collection every storage starts in.
pub const DEFAULT_COLLECTION: &str = "";

/// The body of a configuration item.
///
/// Field order is preserved, so the order adapters produce is the order
/// callers observe.
pub type Payload = Map<String, Value>;

/// A named configuration record together with the collection it lives in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigItem {
    /// Dot-namespaced item name, e.g. `core.extension`.
    pub name: String,
    /// Collection the item belongs to. Empty means the default collection.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub collection: String,
    /// The item body.
    pub payload: Payload,
}

impl ConfigItem {
    /// Creates an item in the default collection.
    pub fn new(name: impl Into<String>, payload: Payload) -> Self {
        Self {
            name: name.into(),
            collection: DEFAULT_COLLECTION.to_string(),
            payload,
        }
    }

    /// Moves the item into the given collection.
    pub fn in_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    /// Builds an item from a JSON value, which must be an object.
    ///
    /// Returns `None` for any other JSON type.
    pub fn from_value(name: impl Into<String>, value: Value) -> Option<Self> {
        match value {
            Value::Object(payload) => Some(Self::new(name, payload)),
            _ => None,
        }
    }
}

/// Sorts and deduplicates a list of names.
pub fn sorted_unique(mut names: Vec<String>) -> Vec<String> {
    names.sort();
    names.dedup();
    names
}
