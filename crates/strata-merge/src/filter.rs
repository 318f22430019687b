//! Overlay filters
//!
//! The filter-chain way of layering: one primary storage wrapped in a
//! [`FilteredStorage`], with one [`OverlayFilter`] per overlay storage. The
//! filters express the same precedence rules as [`LayeredStorage`]:
//! - Reads fall back to the overlay when nothing earlier produced a value
//! - Writes of data the overlay already holds are dropped
//! - Deletes never reach an overlay
//! - Items that live in an overlay cannot be renamed
//!
//! [`LayeredStorage`]: crate::LayeredStorage

use std::collections::BTreeMap;
use std::sync::Arc;

use strata_storage::{
    ConfigStorage, DynFilter, DynStorage, FilteredStorage, Payload, StorageError, StorageFilter,
    sorted_unique,
};
use tracing::debug;

use crate::layered::switch_collection;
use crate::{MergeError, Result};

/// Read-only overlay around one storage.
#[derive(Debug, Clone)]
pub struct OverlayFilter {
    /// Identifier, usually the overlay source name
    id: String,
    /// The storage to read inherited data from
    storage: DynStorage,
}

impl OverlayFilter {
    /// Create a new overlay filter
    pub fn new(id: impl Into<String>, storage: DynStorage) -> Self {
        Self {
            id: id.into(),
            storage,
        }
    }

    /// The overlay storage
    pub fn storage(&self) -> &DynStorage {
        &self.storage
    }
}

impl StorageFilter for OverlayFilter {
    fn id(&self) -> &str {
        &self.id
    }

    fn filter_read(
        &self,
        source: &dyn ConfigStorage,
        name: &str,
        data: Option<Payload>,
    ) -> std::result::Result<Option<Payload>, StorageError> {
        // Earlier filters and the source take precedence.
        if data.is_some() || source.exists(name)? {
            return Ok(data);
        }
        self.storage.read(name)
    }

    fn filter_read_multiple(
        &self,
        names: &[String],
        data: BTreeMap<String, Payload>,
    ) -> std::result::Result<BTreeMap<String, Payload>, StorageError> {
        let mut merged = self.storage.read_multiple(names)?;
        merged.extend(data);
        Ok(merged)
    }

    fn filter_write(
        &self,
        name: &str,
        data: Payload,
    ) -> std::result::Result<Option<Payload>, StorageError> {
        if self.storage.read(name)?.as_ref() == Some(&data) {
            debug!(name = %name, overlay = %self.id, "Overlay already holds data, dropping write");
            return Ok(None);
        }
        Ok(Some(data))
    }

    fn filter_write_empty_is_delete(
        &self,
        name: &str,
    ) -> std::result::Result<Option<bool>, StorageError> {
        if self.storage.exists(name)? {
            return Ok(Some(true));
        }
        Ok(None)
    }

    fn filter_exists(&self, name: &str, exists: bool) -> std::result::Result<bool, StorageError> {
        if self.storage.exists(name)? {
            return Ok(true);
        }
        Ok(exists)
    }

    fn filter_delete(&self, _name: &str, delete: bool) -> std::result::Result<bool, StorageError> {
        Ok(delete)
    }

    fn filter_rename(
        &self,
        name: &str,
        _new_name: &str,
        rename: bool,
    ) -> std::result::Result<bool, StorageError> {
        if self.storage.exists(name)? {
            return Ok(false);
        }
        Ok(rename)
    }

    fn filter_list_all(
        &self,
        prefix: &str,
        mut names: Vec<String>,
    ) -> std::result::Result<Vec<String>, StorageError> {
        names.extend(self.storage.list_all(prefix)?);
        Ok(sorted_unique(names))
    }

    fn filter_delete_all(
        &self,
        _prefix: &str,
        delete: bool,
    ) -> std::result::Result<bool, StorageError> {
        Ok(delete)
    }

    fn filter_create_collection(
        &self,
        collection: &str,
    ) -> std::result::Result<DynFilter, StorageError> {
        Ok(Arc::new(Self::new(
            self.id.clone(),
            self.storage.create_collection(collection)?,
        )))
    }

    fn filter_get_all_collection_names(
        &self,
        mut collections: Vec<String>,
    ) -> std::result::Result<Vec<String>, StorageError> {
        collections.extend(self.storage.get_all_collection_names()?);
        Ok(sorted_unique(collections))
    }
}

/// Build the filter-chain equivalent of a [`LayeredStorage`] over `storages`.
///
/// The first storage becomes the filtered source; every other storage is
/// wrapped in an [`OverlayFilter`] identified by its position in the list.
///
/// # Errors
///
/// Fails if `storages` is empty or a storage cannot be switched to
/// `collection`.
///
/// [`LayeredStorage`]: crate::LayeredStorage
pub fn overlay_chain(storages: Vec<DynStorage>, collection: &str) -> Result<FilteredStorage> {
    let mut storages = switch_collection(storages, collection)?.into_iter();
    let primary = storages
        .next()
        .ok_or_else(|| MergeError::invalid_storage("At least one storage is required"))?;

    let filters = storages
        .enumerate()
        .map(|(index, storage)| {
            Arc::new(OverlayFilter::new(format!("overlay.{}", index + 1), storage)) as DynFilter
        })
        .collect();
    Ok(FilteredStorage::new(primary, filters))
}
