//! Overlay filter manager
//!
//! Turns [`MergeSettings`] into ready-to-use overlay filters and storages.
//! Overlay identifiers are opaque here; a [`StorageResolver`] supplied by
//! the embedder maps each one to a storage.

use std::collections::HashMap;
use std::sync::Arc;

use strata_storage::{DynFilter, DynStorage, FilteredStorage, StorageError};
use tracing::{debug, info};

use crate::{MergeError, Result};
use crate::adapter::AdapterRegistry;
use crate::filter::OverlayFilter;
use crate::layered::LayeredStorage;
use crate::settings::MergeSettings;

/// Maps an overlay identifier to the storage holding its data.
pub trait StorageResolver: Send + Sync {
    fn resolve(&self, id: &str) -> std::result::Result<DynStorage, StorageError>;
}

impl<F> StorageResolver for F
where
    F: Fn(&str) -> std::result::Result<DynStorage, StorageError> + Send + Sync,
{
    fn resolve(&self, id: &str) -> std::result::Result<DynStorage, StorageError> {
        self(id)
    }
}

impl StorageResolver for HashMap<String, DynStorage> {
    fn resolve(&self, id: &str) -> std::result::Result<DynStorage, StorageError> {
        self.get(id)
            .cloned()
            .ok_or_else(|| StorageError::backend(format!("Unknown overlay storage: {id}")))
    }
}

/// Builds overlay filters from settings.
pub struct OverlayFilterManager<R> {
    settings: MergeSettings,
    resolver: R,
}

impl<R: StorageResolver> OverlayFilterManager<R> {
    pub fn new(settings: MergeSettings, resolver: R) -> Self {
        Self { settings, resolver }
    }

    pub fn settings(&self) -> &MergeSettings {
        &self.settings
    }

    /// Filters for a host known by `storage_names`, in overlay order.
    ///
    /// Empty unless one of the names is a target storage. Overlays listed in
    /// `excluded` are skipped.
    pub fn filters_for_storages(
        &self,
        storage_names: &[String],
        excluded: &[String],
    ) -> Result<Vec<DynFilter>> {
        if !self.settings.applies_to(storage_names) {
            debug!(storages = ?storage_names, "No overlay target among storages");
            return Ok(Vec::new());
        }

        self.settings
            .overlays
            .iter()
            .filter(|id| !excluded.contains(id))
            .map(|id| self.build_filter(id))
            .collect()
    }

    /// The filter for a single configured overlay, or `None` if `id` is not
    /// configured.
    pub fn filter_instance(&self, id: &str) -> Result<Option<DynFilter>> {
        if !self.settings.has_overlay(id) {
            return Ok(None);
        }
        self.build_filter(id).map(Some)
    }

    /// Wraps `primary` in every overlay filter, switched to the primary's
    /// collection.
    pub fn filtered_storage(&self, primary: DynStorage) -> Result<FilteredStorage> {
        let collection = primary.get_collection_name();
        let filters = self
            .filters_for_storages(&self.settings.target_storages, &[])?
            .iter()
            .map(|filter| filter.filter_create_collection(&collection))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        info!(
            collection = %collection,
            overlays = filters.len(),
            "Built overlay filter chain"
        );
        Ok(FilteredStorage::new(primary, filters))
    }

    /// The sync storage: the filtered primary layered over every configured
    /// overlay, so the built-in data adapters merge the keys they claim.
    pub fn sync_storage(&self, primary: DynStorage) -> Result<LayeredStorage> {
        let collection = primary.get_collection_name();
        let mut layers: Vec<DynStorage> = vec![Arc::new(self.filtered_storage(primary)?)];
        layers.extend(self.overlay_storages()?);
        info!(collection = %collection, layers = layers.len(), "Built sync storage");
        LayeredStorage::with_adapters(layers, AdapterRegistry::with_defaults(), &collection)
    }

    /// A layered stack of `primary` over every configured overlay, with
    /// `adapters` merging the keys they claim.
    pub fn layered_storage(
        &self,
        primary: DynStorage,
        adapters: AdapterRegistry,
    ) -> Result<LayeredStorage> {
        let collection = primary.get_collection_name();
        let mut layers = vec![primary];
        layers.extend(self.overlay_storages()?);
        info!(collection = %collection, layers = layers.len(), "Built layered storage");
        LayeredStorage::with_adapters(layers, adapters, &collection)
    }

    fn overlay_storages(&self) -> Result<Vec<DynStorage>> {
        self.settings
            .overlays
            .iter()
            .map(|id| self.resolver.resolve(id).map_err(MergeError::from))
            .collect()
    }

    fn build_filter(&self, id: &str) -> Result<DynFilter> {
        let storage = self.resolver.resolve(id)?;
        debug!(overlay = %id, "Resolved overlay storage");
        Ok(Arc::new(OverlayFilter::new(id, storage)))
    }
}

impl<R> std::fmt::Debug for OverlayFilterManager<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayFilterManager")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use strata_memory::InMemoryStorage;
    use strata_storage::{ConfigItem, ConfigStorage};

    fn overlay(value: &str) -> DynStorage {
        let payload = json!({ "value": value }).as_object().cloned().unwrap();
        Arc::new(InMemoryStorage::with_items([
            ConfigItem::new("foo.bar", payload.clone()),
            ConfigItem::new("foo.bar", payload).in_collection("fr"),
        ]))
    }

    fn resolver() -> HashMap<String, DynStorage> {
        HashMap::from([
            ("merge1".to_string(), overlay("merge1")),
            ("merge2".to_string(), overlay("merge2")),
        ])
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_filters_for_storages() {
        let manager = OverlayFilterManager::new(MergeSettings::new(["merge1", "merge2"]), resolver());

        let filters = manager
            .filters_for_storages(&names(&["config.storage.sync"]), &[])
            .unwrap();
        let ids: Vec<&str> = filters.iter().map(|f| f.id()).collect();
        assert_eq!(ids, vec!["merge1", "merge2"]);

        let filters = manager
            .filters_for_storages(&names(&["config.storage.sync"]), &names(&["merge1"]))
            .unwrap();
        assert_eq!(filters.len(), 1);
        assert_eq!(filters[0].id(), "merge2");

        let filters = manager
            .filters_for_storages(&names(&["config.storage.active"]), &[])
            .unwrap();
        assert!(filters.is_empty());
    }

    #[test]
    fn test_filter_instance() {
        let manager = OverlayFilterManager::new(MergeSettings::new(["merge1"]), resolver());
        assert_eq!(manager.filter_instance("merge1").unwrap().unwrap().id(), "merge1");
        assert!(manager.filter_instance("merge2").unwrap().is_none());
    }

    #[test]
    fn test_unresolvable_overlay() {
        let manager = OverlayFilterManager::new(MergeSettings::new(["missing"]), resolver());
        let err = manager.filter_instance("missing").unwrap_err();
        assert_eq!(err.to_string(), "Backend error: Unknown overlay storage: missing");
    }

    #[test]
    fn test_closure_resolver() {
        let manager = OverlayFilterManager::new(
            MergeSettings::new(["anything"]),
            |id: &str| -> std::result::Result<DynStorage, StorageError> { Ok(overlay(id)) },
        );
        let filtered = manager
            .filtered_storage(Arc::new(InMemoryStorage::new()))
            .unwrap();
        assert_eq!(
            filtered.read("foo.bar").unwrap().unwrap()["value"],
            json!("anything")
        );
    }

    #[test]
    fn test_filtered_storage_follows_primary_collection() {
        let manager = OverlayFilterManager::new(MergeSettings::new(["merge1", "merge2"]), resolver());
        let primary = InMemoryStorage::new().collection("fr");
        let filtered = manager.filtered_storage(Arc::new(primary)).unwrap();

        assert_eq!(filtered.get_collection_name(), "fr");
        assert_eq!(filtered.filters().len(), 2);
        assert!(filtered.exists("foo.bar").unwrap());
    }

    #[test]
    fn test_sync_and_layered_storage() {
        let manager = OverlayFilterManager::new(MergeSettings::new(["merge2", "merge1"]), resolver());

        let sync = manager.sync_storage(Arc::new(InMemoryStorage::new())).unwrap();
        assert_eq!(sync.layers().len(), 3);
        assert_eq!(sync.adapters().len(), 1);
        assert_eq!(sync.read("foo.bar").unwrap().unwrap()["value"], json!("merge2"));

        let layered = manager
            .layered_storage(Arc::new(InMemoryStorage::new()), AdapterRegistry::new())
            .unwrap();
        assert_eq!(layered.layers().len(), 3);
        assert_eq!(layered.read("foo.bar").unwrap().unwrap()["value"], json!("merge2"));
    }
}
