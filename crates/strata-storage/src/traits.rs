//! The configuration storage contract.
//!
//! This module defines the trait every backing store implements. The merge
//! engine only ever talks to stores through it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::StorageError;
use crate::types::Payload;

/// A shareable storage trait object.
pub type DynStorage = Arc<dyn ConfigStorage>;

/// The contract a configuration store must satisfy.
///
/// A store holds named payloads partitioned into collections. A handle is
/// bound to exactly one collection; [`ConfigStorage::create_collection`]
/// returns a new handle for another collection and never re-points the
/// receiver.
///
/// Implementations must be thread-safe (`Send + Sync`). All operations are
/// synchronous.
///
/// # Example
///
/// ```ignore
/// use strata_storage::{ConfigStorage, StorageError, Payload};
///
/// fn site_name(storage: &dyn ConfigStorage) -> Result<Option<String>, StorageError> {
///     Ok(storage
///         .read("system.site")?
///         .and_then(|site| site.get("name").and_then(|v| v.as_str()).map(String::from)))
/// }
/// ```
pub trait ConfigStorage: Send + Sync + fmt::Debug {
    // ==================== Reads ====================

    /// Returns whether `name` exists in this collection.
    fn exists(&self, name: &str) -> Result<bool, StorageError>;

    /// Reads a single item.
    ///
    /// Returns `None` if the item does not exist. An existing item with an
    /// empty payload is returned as `Some` of an empty map.
    fn read(&self, name: &str) -> Result<Option<Payload>, StorageError>;

    /// Reads several items at once.
    ///
    /// Only names that exist appear in the result.
    fn read_multiple(&self, names: &[String]) -> Result<BTreeMap<String, Payload>, StorageError>;

    // ==================== Writes ====================

    /// Writes an item, replacing any existing payload.
    fn write(&self, name: &str, data: &Payload) -> Result<bool, StorageError>;

    /// Deletes an item. Returns `false` if it did not exist.
    fn delete(&self, name: &str) -> Result<bool, StorageError>;

    /// Renames an item.
    ///
    /// # Errors
    ///
    /// Backends that cannot rename return [`StorageError::Unsupported`].
    fn rename(&self, name: &str, new_name: &str) -> Result<bool, StorageError>;

    /// Deletes every item whose name starts with `prefix`.
    fn delete_all(&self, prefix: &str) -> Result<bool, StorageError>;

    // ==================== Enumeration ====================

    /// Lists the names starting with `prefix`, sorted ascending.
    fn list_all(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    // ==================== Collections ====================

    /// Returns a handle to the same store bound to `collection`.
    fn create_collection(&self, collection: &str) -> Result<DynStorage, StorageError>;

    /// Lists every non-default collection known to the store, sorted.
    fn get_all_collection_names(&self) -> Result<Vec<String>, StorageError>;

    /// Returns the collection this handle is bound to.
    fn get_collection_name(&self) -> String;

    // ==================== Serialization ====================

    /// Encodes a payload into the store's raw format.
    fn encode(&self, data: &Payload) -> Result<String, StorageError>;

    /// Decodes raw data in the store's format.
    fn decode(&self, raw: &str) -> Result<Payload, StorageError>;
}
