//! Layered storage
//!
//! Presents an ordered stack of storages as one storage.
//!
//! Precedence (highest first):
//! 1. Layer 0 - the primary, the only layer that is ever written to
//! 2. Layer 1..n - overlays, read-only from here
//!
//! For keys claimed by a [`DataAdapter`](crate::DataAdapter) the adapter
//! decides the merged value instead.

use std::collections::BTreeMap;
use std::sync::Arc;

use strata_storage::{ConfigStorage, DynStorage, Payload, StorageError, sorted_unique};
use tracing::debug;

use crate::adapter::{AdapterRegistry, DynAdapter};
use crate::{MergeError, Result};

/// What a write did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Data was written to the primary layer.
    Written,
    /// The visible value already matched; nothing was written.
    Unchanged,
    /// The primary layer reported that it did not write.
    Refused,
}

impl WriteOutcome {
    /// `true` unless the primary layer refused the write.
    pub fn is_success(self) -> bool {
        !matches!(self, WriteOutcome::Refused)
    }

    /// `true` if something reached the primary layer.
    pub fn is_written(self) -> bool {
        matches!(self, WriteOutcome::Written)
    }
}

/// Builder for [`LayeredStorage`]
#[derive(Debug, Default)]
pub struct LayeredStorageBuilder {
    layers: Vec<DynStorage>,
    adapters: AdapterRegistry,
    collection: String,
}

impl LayeredStorageBuilder {
    /// Create a new builder for the default collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a layer below the ones already added
    pub fn layer(mut self, storage: DynStorage) -> Self {
        self.layers.push(storage);
        self
    }

    /// Append several layers, in order
    pub fn layers(mut self, storages: impl IntoIterator<Item = DynStorage>) -> Self {
        self.layers.extend(storages);
        self
    }

    /// Append a data adapter
    pub fn adapter(mut self, adapter: DynAdapter) -> Self {
        self.adapters.register(adapter);
        self
    }

    /// Replace the adapter registry
    pub fn adapters(mut self, adapters: AdapterRegistry) -> Self {
        self.adapters = adapters;
        self
    }

    /// Set the collection every layer is switched to
    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    /// Build the layered storage
    pub fn build(self) -> Result<LayeredStorage> {
        LayeredStorage::with_adapters(self.layers, self.adapters, &self.collection)
    }
}

/// A stack of storages read as one.
///
/// Instances are immutable: switching collection yields a new instance with
/// freshly switched layer handles.
#[derive(Debug, Clone)]
pub struct LayeredStorage {
    layers: Vec<DynStorage>,
    adapters: AdapterRegistry,
}

impl LayeredStorage {
    /// Create a builder
    pub fn builder() -> LayeredStorageBuilder {
        LayeredStorageBuilder::new()
    }

    /// Create a layered storage without data adapters.
    ///
    /// # Errors
    ///
    /// Fails if `layers` is empty or a layer cannot be switched to
    /// `collection`.
    pub fn new(layers: Vec<DynStorage>, collection: &str) -> Result<Self> {
        Self::with_adapters(layers, AdapterRegistry::new(), collection)
    }

    /// Create a layered storage consulting `adapters` before the layers.
    pub fn with_adapters(
        layers: Vec<DynStorage>,
        adapters: AdapterRegistry,
        collection: &str,
    ) -> Result<Self> {
        let layers = switch_collection(layers, collection)?;
        Ok(Self { layers, adapters })
    }

    /// All layers, primary first
    pub fn layers(&self) -> &[DynStorage] {
        &self.layers
    }

    /// The layer that receives writes
    pub fn primary(&self) -> &DynStorage {
        // Construction guarantees at least one layer.
        &self.layers[0]
    }

    pub fn adapters(&self) -> &AdapterRegistry {
        &self.adapters
    }

    /// Returns whether any layer has `name`.
    pub fn exists(&self, name: &str) -> Result<bool> {
        for layer in &self.layers {
            if layer.exists(name)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Reads `name` from the first layer that has it, or from the adapter
    /// claiming it.
    pub fn read(&self, name: &str) -> Result<Option<Payload>> {
        if let Some(adapter) = self.adapters.find(name) {
            debug!(name = %name, adapter = %adapter.id(), "Reading through data adapter");
            return adapter.read(name, &self.layers);
        }

        for layer in &self.layers {
            if layer.exists(name)? {
                return Ok(layer.read(name)?);
            }
        }
        Ok(None)
    }

    /// Reads several names. Adapters answer for the names they claim; the
    /// rest are looked up layer by layer, and a name found in one layer is
    /// not looked up in the layers below it.
    pub fn read_multiple(&self, names: &[String]) -> Result<BTreeMap<String, Payload>> {
        let (claimed, _) = self.adapters.partition(names);

        let mut data = BTreeMap::new();
        for (adapter, adapter_names) in claimed {
            data.extend(adapter.read_multiple(&adapter_names, &self.layers)?);
        }

        let mut remaining: Vec<String> = names
            .iter()
            .filter(|name| !data.contains_key(name.as_str()))
            .cloned()
            .collect();

        for layer in &self.layers {
            if remaining.is_empty() {
                break;
            }
            let found = layer.read_multiple(&remaining)?;
            remaining.retain(|name| !found.contains_key(name));
            data.extend(found);
        }

        Ok(data)
    }

    /// Writes `data` so that reading `name` yields it.
    ///
    /// Only the primary layer is written to, and only if the visible value
    /// would change. For adapter-claimed names the adapter computes what the
    /// primary layer has to hold.
    pub fn write(&self, name: &str, data: &Payload) -> Result<WriteOutcome> {
        if let Some(adapter) = self.adapters.find(name) {
            let Some(delta) = adapter.write(name, data, &self.layers)? else {
                debug!(name = %name, adapter = %adapter.id(), "Adapter reported no changes, skipping write");
                return Ok(WriteOutcome::Unchanged);
            };
            return self.write_primary(name, &delta);
        }

        if self.read(name)?.as_ref() == Some(data) {
            debug!(name = %name, "Data already visible, skipping write");
            return Ok(WriteOutcome::Unchanged);
        }
        self.write_primary(name, data)
    }

    fn write_primary(&self, name: &str, data: &Payload) -> Result<WriteOutcome> {
        if self.primary().write(name, data)? {
            Ok(WriteOutcome::Written)
        } else {
            Ok(WriteOutcome::Refused)
        }
    }

    /// Deletes `name` from the primary layer.
    pub fn delete(&self, name: &str) -> Result<bool> {
        Ok(self.primary().delete(name)?)
    }

    /// Always fails: with several layers there is no single right place to
    /// rename in.
    pub fn rename(&self, _name: &str, _new_name: &str) -> Result<bool> {
        Err(MergeError::unsupported("rename"))
    }

    /// Union of every layer's names starting with `prefix`, sorted.
    pub fn list_all(&self, prefix: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for layer in &self.layers {
            names.extend(layer.list_all(prefix)?);
        }
        Ok(sorted_unique(names))
    }

    /// Deletes names starting with `prefix` from the primary layer.
    pub fn delete_all(&self, prefix: &str) -> Result<bool> {
        Ok(self.primary().delete_all(prefix)?)
    }

    /// Returns a new layered storage with every layer switched to
    /// `collection`. The adapters carry over.
    pub fn with_collection(&self, collection: &str) -> Result<Self> {
        debug!(collection = %collection, layers = self.layers.len(), "Switching layered storage collection");
        Self::with_adapters(self.layers.clone(), self.adapters.clone(), collection)
    }

    /// Union of every layer's collection names, sorted.
    pub fn get_all_collection_names(&self) -> Result<Vec<String>> {
        let mut collections = Vec::new();
        for layer in &self.layers {
            collections.extend(layer.get_all_collection_names()?);
        }
        Ok(sorted_unique(collections))
    }

    /// The collection of the primary layer.
    pub fn get_collection_name(&self) -> String {
        self.primary().get_collection_name()
    }

    pub fn encode(&self, data: &Payload) -> Result<String> {
        Ok(self.primary().encode(data)?)
    }

    pub fn decode(&self, raw: &str) -> Result<Payload> {
        Ok(self.primary().decode(raw)?)
    }
}

/// Point every storage at `collection`, primary first.
///
/// Storages already bound to `collection` are kept as they are; others are
/// replaced by the handle their `create_collection` returns, which must
/// report the requested collection.
pub(crate) fn switch_collection(
    storages: Vec<DynStorage>,
    collection: &str,
) -> Result<Vec<DynStorage>> {
    if storages.is_empty() {
        return Err(MergeError::invalid_storage(
            "At least one storage is required",
        ));
    }

    storages
        .into_iter()
        .enumerate()
        .map(|(index, storage)| {
            if storage.get_collection_name() == collection {
                return Ok(storage);
            }
            let switched = storage.create_collection(collection)?;
            let actual = switched.get_collection_name();
            if actual != collection {
                return Err(MergeError::invalid_storage(format!(
                    "Storage {index} was asked for collection '{collection}' but reports '{actual}'"
                )));
            }
            Ok(switched)
        })
        .collect()
}

impl ConfigStorage for LayeredStorage {
    fn exists(&self, name: &str) -> std::result::Result<bool, StorageError> {
        Ok(LayeredStorage::exists(self, name)?)
    }

    fn read(&self, name: &str) -> std::result::Result<Option<Payload>, StorageError> {
        Ok(LayeredStorage::read(self, name)?)
    }

    fn read_multiple(
        &self,
        names: &[String],
    ) -> std::result::Result<BTreeMap<String, Payload>, StorageError> {
        Ok(LayeredStorage::read_multiple(self, names)?)
    }

    fn write(&self, name: &str, data: &Payload) -> std::result::Result<bool, StorageError> {
        Ok(LayeredStorage::write(self, name, data)?.is_success())
    }

    fn delete(&self, name: &str) -> std::result::Result<bool, StorageError> {
        Ok(LayeredStorage::delete(self, name)?)
    }

    fn rename(&self, name: &str, new_name: &str) -> std::result::Result<bool, StorageError> {
        Ok(LayeredStorage::rename(self, name, new_name)?)
    }

    fn delete_all(&self, prefix: &str) -> std::result::Result<bool, StorageError> {
        Ok(LayeredStorage::delete_all(self, prefix)?)
    }

    fn list_all(&self, prefix: &str) -> std::result::Result<Vec<String>, StorageError> {
        Ok(LayeredStorage::list_all(self, prefix)?)
    }

    fn create_collection(&self, collection: &str) -> std::result::Result<DynStorage, StorageError> {
        Ok(Arc::new(self.with_collection(collection)?))
    }

    fn get_all_collection_names(&self) -> std::result::Result<Vec<String>, StorageError> {
        Ok(LayeredStorage::get_all_collection_names(self)?)
    }

    fn get_collection_name(&self) -> String {
        LayeredStorage::get_collection_name(self)
    }

    fn encode(&self, data: &Payload) -> std::result::Result<String, StorageError> {
        Ok(LayeredStorage::encode(self, data)?)
    }

    fn decode(&self, raw: &str) -> std::result::Result<Payload, StorageError> {
        Ok(LayeredStorage::decode(self, raw)?)
    }
}
