//! In-memory configuration storage backend for Strata.
//!
//! This crate provides an in-memory implementation of the `ConfigStorage`
//! trait from `strata-storage`, using papaya lock-free HashMap for concurrent
//! access. All collection handles of one storage share a single map.
//!
//! # Example
//!
//! ```ignore
//! use strata_memory::InMemoryStorage;
//! use strata_storage::ConfigStorage;
//!
//! let storage = InMemoryStorage::new();
//! storage.write("system.site", &site)?;
//!
//! let fr = storage.create_collection("language.fr")?;
//! assert!(!fr.exists("system.site")?);
//! ```

pub mod storage;

// Re-export the ConfigStorage trait for convenience
pub use strata_storage::{ConfigStorage, Payload, StorageError};

pub use storage::{InMemoryStorage, StorageKey};

/// Type alias for a shareable ConfigStorage instance.
pub type DynConfigStorage = strata_storage::DynStorage;

/// Creates a new, empty in-memory ConfigStorage instance.
pub fn create_config_storage() -> DynConfigStorage {
    std::sync::Arc::new(InMemoryStorage::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_config_storage() {
        let storage = create_config_storage();
        assert_eq!(storage.get_collection_name(), "");
        assert!(storage.list_all("").unwrap().is_empty());

        let fr = storage.create_collection("fr").unwrap();
        fr.write("system.site", &Payload::new()).unwrap();
        assert_eq!(storage.get_all_collection_names().unwrap(), vec!["fr"]);
    }
}
