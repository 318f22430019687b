use papaya::HashMap as PapayaHashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use strata_storage::{
    ConfigItem, ConfigStorage, DEFAULT_COLLECTION, DynStorage, Payload, StorageError,
    sorted_unique,
};
use tracing::debug;

/// Key of a stored item: `(collection, name)`.
pub type StorageKey = (String, String);

pub(crate) fn make_storage_key(collection: &str, name: &str) -> StorageKey {
    (collection.to_string(), name.to_string())
}

/// In-memory configuration storage using papaya lock-free HashMap.
///
/// Every handle created through [`ConfigStorage::create_collection`] shares
/// the same underlying map, so writing through a collection handle is
/// visible to any other handle bound to that collection.
#[derive(Debug, Clone)]
pub struct InMemoryStorage {
    /// Shared item map for all collections
    pub(crate) data: Arc<PapayaHashMap<StorageKey, Payload>>,
    /// Collection this handle is bound to
    collection: String,
}

impl InMemoryStorage {
    /// Creates an empty storage bound to the default collection.
    pub fn new() -> Self {
        Self {
            data: Arc::new(PapayaHashMap::new()),
            collection: DEFAULT_COLLECTION.to_string(),
        }
    }

    /// Creates a storage pre-populated with `items`.
    ///
    /// Each item lands in the collection it names; the returned handle is
    /// bound to the default collection.
    pub fn with_items(items: impl IntoIterator<Item = ConfigItem>) -> Self {
        let storage = Self::new();
        {
            let guard = storage.data.pin();
            for item in items {
                guard.insert(make_storage_key(&item.collection, &item.name), item.payload);
            }
        }
        storage
    }

    /// Returns a handle bound to `collection` that shares this storage's data.
    pub fn collection(&self, collection: &str) -> Self {
        Self {
            data: Arc::clone(&self.data),
            collection: collection.to_string(),
        }
    }

    /// Number of items in this handle's collection.
    pub fn len(&self) -> usize {
        let guard = self.data.pin();
        guard
            .iter()
            .filter(|((collection, _), _)| *collection == self.collection)
            .count()
    }

    /// Returns `true` if this handle's collection holds no items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn key(&self, name: &str) -> StorageKey {
        make_storage_key(&self.collection, name)
    }

    fn names_with_prefix(&self, prefix: &str) -> Vec<String> {
        let guard = self.data.pin();
        guard
            .iter()
            .filter(|((collection, name), _)| {
                *collection == self.collection && name.starts_with(prefix)
            })
            .map(|((_, name), _)| name.clone())
            .collect()
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStorage for InMemoryStorage {
    fn exists(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.data.pin().contains_key(&self.key(name)))
    }

    fn read(&self, name: &str) -> Result<Option<Payload>, StorageError> {
        Ok(self.data.pin().get(&self.key(name)).cloned())
    }

    fn read_multiple(&self, names: &[String]) -> Result<BTreeMap<String, Payload>, StorageError> {
        let guard = self.data.pin();
        Ok(names
            .iter()
            .filter_map(|name| {
                guard
                    .get(&self.key(name))
                    .map(|payload| (name.clone(), payload.clone()))
            })
            .collect())
    }

    fn write(&self, name: &str, data: &Payload) -> Result<bool, StorageError> {
        self.data.pin().insert(self.key(name), data.clone());
        Ok(true)
    }

    fn delete(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.data.pin().remove(&self.key(name)).is_some())
    }

    fn rename(&self, name: &str, new_name: &str) -> Result<bool, StorageError> {
        let guard = self.data.pin();
        let Some(payload) = guard.remove(&self.key(name)).cloned() else {
            return Ok(false);
        };
        guard.insert(self.key(new_name), payload);
        Ok(true)
    }

    fn delete_all(&self, prefix: &str) -> Result<bool, StorageError> {
        let names = self.names_with_prefix(prefix);
        let guard = self.data.pin();
        for name in &names {
            guard.remove(&self.key(name));
        }
        debug!(
            collection = %self.collection,
            prefix = %prefix,
            deleted = names.len(),
            "Deleted items by prefix"
        );
        Ok(true)
    }

    fn list_all(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(sorted_unique(self.names_with_prefix(prefix)))
    }

    fn create_collection(&self, collection: &str) -> Result<DynStorage, StorageError> {
        Ok(Arc::new(self.collection(collection)))
    }

    fn get_all_collection_names(&self) -> Result<Vec<String>, StorageError> {
        let guard = self.data.pin();
        let collections = guard
            .iter()
            .map(|((collection, _), _)| collection.clone())
            .filter(|collection| collection != DEFAULT_COLLECTION)
            .collect();
        Ok(sorted_unique(collections))
    }

    fn get_collection_name(&self) -> String {
        self.collection.clone()
    }

    fn encode(&self, data: &Payload) -> Result<String, StorageError> {
        Ok(serde_json::to_string(data)?)
    }

    fn decode(&self, raw: &str) -> Result<Payload, StorageError> {
        Ok(serde_json::from_str(raw)?)
    }
}
