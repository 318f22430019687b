//! Layered configuration storage for Strata
//!
//! This crate presents an ordered list of configuration stores as a single
//! store:
//! - Reads fall back through the layers, first match wins
//! - Writes and deletes only ever touch the primary (first) layer
//! - Writes that would not change the visible value are suppressed
//! - Data adapters take over merging for keys whose value is a structure
//!   that has to be combined field by field (see [`CoreExtensionAdapter`])
//!
//! # Architecture
//!
//! ```text
//!                      ┌────────────────────┐
//!   read/write ──────▶ │   LayeredStorage   │
//!                      │  ┌──────────────┐  │
//!                      │  │AdapterRegistry│ │── claims key? ──▶ DataAdapter
//!                      │  └──────────────┘  │
//!                      └─────────┬──────────┘
//!                                │ first match wins
//!            ┌───────────────────┼───────────────────┐
//!            ▼                   ▼                   ▼
//!       layer 0 (rw)        layer 1 (ro)        layer 2 (ro)
//! ```
//!
//! The same precedence rules are also available as [`OverlayFilter`]s for
//! a [`strata_storage::FilteredStorage`] wrapped around a single primary.

pub mod adapter;
pub mod adapters;
pub mod filter;
pub mod layered;
pub mod manager;
pub mod settings;

// Re-export main types
pub use adapter::{AdapterRegistry, DataAdapter, DynAdapter};
pub use adapters::{CORE_EXTENSION, CoreExtensionAdapter, ExtensionKind, module_sort};
pub use filter::{OverlayFilter, overlay_chain};
pub use layered::{LayeredStorage, LayeredStorageBuilder, WriteOutcome};
pub use manager::{OverlayFilterManager, StorageResolver};
pub use settings::{MergeSettings, SYNC_STORAGE};

use strata_storage::StorageError;

/// Error types for layered storage operations
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("Invalid storage: {0}")]
    InvalidStorage(String),

    #[error("Unsupported operation: {operation}")]
    Unsupported { operation: String },

    #[error("Unexpected {kind} removal: {}", .names.join(", "))]
    UnexpectedRemoval {
        kind: ExtensionKind,
        names: Vec<String>,
    },

    #[error("Settings error: {0}")]
    Settings(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl MergeError {
    pub fn invalid_storage(msg: impl Into<String>) -> Self {
        Self::InvalidStorage(msg.into())
    }

    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    pub fn settings(msg: impl Into<String>) -> Self {
        Self::Settings(msg.into())
    }

    /// Returns `true` if a write was refused because it would remove
    /// something the primary layer does not own.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::UnexpectedRemoval { .. })
    }
}

impl From<MergeError> for StorageError {
    fn from(err: MergeError) -> Self {
        match err {
            MergeError::Storage(inner) => inner,
            MergeError::Unsupported { operation } => StorageError::unsupported(operation),
            err @ MergeError::UnexpectedRemoval { .. } => StorageError::rejected(err.to_string()),
            err => StorageError::backend(err.to_string()),
        }
    }
}

/// Result type for layered storage operations
pub type Result<T> = std::result::Result<T, MergeError>;
