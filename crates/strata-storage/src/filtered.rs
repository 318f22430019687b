//! FilteredStorage - a storage wrapper that runs every operation through a
//! chain of filters.
//!
//! The wrapped (source) storage is the only store that is ever mutated.
//! Filters observe and rewrite the values flowing in and out of it: they can
//! substitute data on read, suppress writes, veto deletes and renames, and
//! add names to listings.
//!
//! # Example
//!
//! ```ignore
//! use strata_storage::FilteredStorage;
//!
//! let storage = FilteredStorage::new(primary, vec![overlay_filter]);
//!
//! // Falls back to the overlay if the primary does not have the item.
//! let site = storage.read("system.site")?;
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::StorageError;
use crate::traits::{ConfigStorage, DynStorage};
use crate::types::{Payload, sorted_unique};

/// A shareable filter trait object.
pub type DynFilter = Arc<dyn StorageFilter>;

/// Hooks invoked by [`FilteredStorage`] around each storage operation.
///
/// Every hook receives the value produced so far (by the source storage or
/// by earlier filters) and returns the value to hand to the next filter. The
/// default implementations pass values through unchanged.
pub trait StorageFilter: Send + Sync + fmt::Debug {
    /// Identifier of this filter, used in logs.
    fn id(&self) -> &str;

    /// Filters the result of a single read.
    ///
    /// `source` is the storage being filtered, so a filter can tell whether
    /// the value came from it.
    fn filter_read(
        &self,
        _source: &dyn ConfigStorage,
        _name: &str,
        data: Option<Payload>,
    ) -> Result<Option<Payload>, StorageError> {
        Ok(data)
    }

    /// Filters the result of a bulk read.
    fn filter_read_multiple(
        &self,
        _names: &[String],
        data: BTreeMap<String, Payload>,
    ) -> Result<BTreeMap<String, Payload>, StorageError> {
        Ok(data)
    }

    /// Filters data about to be written. Returning `None` writes nothing.
    fn filter_write(&self, _name: &str, data: Payload) -> Result<Option<Payload>, StorageError> {
        Ok(Some(data))
    }

    /// Decides whether a write that ended up empty should delete the item.
    ///
    /// `None` defers to the other filters.
    fn filter_write_empty_is_delete(&self, _name: &str) -> Result<Option<bool>, StorageError> {
        Ok(None)
    }

    /// Filters an existence check.
    fn filter_exists(&self, _name: &str, exists: bool) -> Result<bool, StorageError> {
        Ok(exists)
    }

    /// Filters whether a delete should reach the source storage.
    fn filter_delete(&self, _name: &str, delete: bool) -> Result<bool, StorageError> {
        Ok(delete)
    }

    /// Filters whether a rename should reach the source storage.
    fn filter_rename(
        &self,
        _name: &str,
        _new_name: &str,
        rename: bool,
    ) -> Result<bool, StorageError> {
        Ok(rename)
    }

    /// Filters a name listing.
    fn filter_list_all(&self, _prefix: &str, names: Vec<String>) -> Result<Vec<String>, StorageError> {
        Ok(names)
    }

    /// Filters whether a bulk delete should reach the source storage.
    fn filter_delete_all(&self, _prefix: &str, delete: bool) -> Result<bool, StorageError> {
        Ok(delete)
    }

    /// Returns a filter equivalent to this one, bound to `collection`.
    fn filter_create_collection(&self, collection: &str) -> Result<DynFilter, StorageError>;

    /// Filters the list of collection names.
    fn filter_get_all_collection_names(
        &self,
        collections: Vec<String>,
    ) -> Result<Vec<String>, StorageError> {
        Ok(collections)
    }
}

/// A storage wrapper that applies a chain of [`StorageFilter`]s.
///
/// Filters run in the order given. Only the source storage is written to,
/// deleted from, or renamed in.
#[derive(Debug, Clone)]
pub struct FilteredStorage {
    /// The wrapped storage.
    source: DynStorage,
    /// Filters, applied in order.
    filters: Vec<DynFilter>,
}

impl FilteredStorage {
    /// Create a new filtered storage.
    pub fn new(source: DynStorage, filters: Vec<DynFilter>) -> Self {
        Self { source, filters }
    }

    /// Get a reference to the wrapped storage.
    pub fn source(&self) -> &DynStorage {
        &self.source
    }

    /// Get the filters in application order.
    pub fn filters(&self) -> &[DynFilter] {
        &self.filters
    }

    /// Returns a filtered storage bound to `collection`.
    ///
    /// The source and every filter are switched; `self` is left untouched.
    pub fn with_collection(&self, collection: &str) -> Result<Self, StorageError> {
        let source = self.source.create_collection(collection)?;
        let filters = self
            .filters
            .iter()
            .map(|filter| filter.filter_create_collection(collection))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(collection = %collection, filters = filters.len(), "Switched filtered storage collection");
        Ok(Self { source, filters })
    }
}

impl ConfigStorage for FilteredStorage {
    fn exists(&self, name: &str) -> Result<bool, StorageError> {
        let mut exists = self.source.exists(name)?;
        for filter in &self.filters {
            exists = filter.filter_exists(name, exists)?;
        }
        Ok(exists)
    }

    fn read(&self, name: &str) -> Result<Option<Payload>, StorageError> {
        let mut data = self.source.read(name)?;
        for filter in &self.filters {
            data = filter.filter_read(self.source.as_ref(), name, data)?;
        }
        Ok(data)
    }

    fn read_multiple(&self, names: &[String]) -> Result<BTreeMap<String, Payload>, StorageError> {
        let mut data = self.source.read_multiple(names)?;
        for filter in &self.filters {
            data = filter.filter_read_multiple(names, data)?;
        }
        Ok(data)
    }

    fn write(&self, name: &str, data: &Payload) -> Result<bool, StorageError> {
        let mut filtered = Some(data.clone());
        for filter in &self.filters {
            filtered = match filtered {
                Some(data) => filter.filter_write(name, data)?,
                None => None,
            };
        }

        // An empty payload is a value; only a filter dropping or emptying
        // the data counts as a suppressed write.
        match filtered {
            Some(filtered) if !filtered.is_empty() || data.is_empty() => {
                self.source.write(name, &filtered)
            }
            _ => {
                for filter in &self.filters {
                    if filter.filter_write_empty_is_delete(name)? == Some(true) {
                        debug!(name = %name, filter = %filter.id(), "Empty write treated as delete");
                        self.delete(name)?;
                        return Ok(true);
                    }
                }
                debug!(name = %name, "Write suppressed by filters");
                Ok(true)
            }
        }
    }

    fn delete(&self, name: &str) -> Result<bool, StorageError> {
        let mut delete = true;
        for filter in &self.filters {
            delete = filter.filter_delete(name, delete)?;
        }
        if delete {
            self.source.delete(name)
        } else {
            Ok(false)
        }
    }

    fn rename(&self, name: &str, new_name: &str) -> Result<bool, StorageError> {
        let mut rename = true;
        for filter in &self.filters {
            rename = filter.filter_rename(name, new_name, rename)?;
        }
        if rename {
            self.source.rename(name, new_name)
        } else {
            debug!(name = %name, new_name = %new_name, "Rename refused by filters");
            Ok(false)
        }
    }

    fn delete_all(&self, prefix: &str) -> Result<bool, StorageError> {
        let mut delete = true;
        for filter in &self.filters {
            delete = filter.filter_delete_all(prefix, delete)?;
        }
        if delete {
            self.source.delete_all(prefix)
        } else {
            Ok(false)
        }
    }

    fn list_all(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut names = self.source.list_all(prefix)?;
        for filter in &self.filters {
            names = filter.filter_list_all(prefix, names)?;
        }
        Ok(sorted_unique(names))
    }

    fn create_collection(&self, collection: &str) -> Result<DynStorage, StorageError> {
        Ok(Arc::new(self.with_collection(collection)?))
    }

    fn get_all_collection_names(&self) -> Result<Vec<String>, StorageError> {
        let mut collections = self.source.get_all_collection_names()?;
        for filter in &self.filters {
            collections = filter.filter_get_all_collection_names(collections)?;
        }
        Ok(sorted_unique(collections))
    }

    fn get_collection_name(&self) -> String {
        self.source.get_collection_name()
    }

    fn encode(&self, data: &Payload) -> Result<String, StorageError> {
        self.source.encode(data)
    }

    fn decode(&self, raw: &str) -> Result<Payload, StorageError> {
        self.source.decode(raw)
    }
}
