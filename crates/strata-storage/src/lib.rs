//! # strata-storage
//!
//! Storage contract for layered configuration.
//!
//! This crate defines the trait every configuration store must implement, the
//! payload types stores exchange, and a generic filter pipeline that wraps a
//! store in a chain of read/write hooks. It does not contain any store
//! implementations - those are provided by separate crates.
//!
//! ## Overview
//!
//! The main trait is [`ConfigStorage`], which defines the contract for:
//! - Reads (exists, read, read_multiple)
//! - Writes (write, delete, rename, delete_all)
//! - Enumeration (list_all)
//! - Collections (create_collection, get_all_collection_names, get_collection_name)
//! - Serialization (encode, decode)
//!
//! ## Filters
//!
//! [`FilteredStorage`] wraps one store and runs every operation through a list
//! of [`StorageFilter`]s:
//!
//! ```ignore
//! use strata_storage::{ConfigStorage, FilteredStorage};
//!
//! let storage = FilteredStorage::new(primary, filters);
//! let names = storage.list_all("system.")?;
//! ```

mod error;
mod filtered;
mod traits;
mod types;

pub use error::{ErrorCategory, StorageError};
pub use filtered::{DynFilter, FilteredStorage, StorageFilter};
pub use traits::{ConfigStorage, DynStorage};
pub use types::{ConfigItem, DEFAULT_COLLECTION, Payload, sorted_unique};

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use strata_storage::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{ErrorCategory, StorageError};
    pub use crate::filtered::{DynFilter, FilteredStorage, StorageFilter};
    pub use crate::traits::{ConfigStorage, DynStorage};
    pub use crate::types::{ConfigItem, DEFAULT_COLLECTION, Payload};
    pub use crate::StorageResult;
}
