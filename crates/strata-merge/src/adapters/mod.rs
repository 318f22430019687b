//! Built-in data adapters
//!
//! - `core_extension`: merges the enabled module/theme lists

mod core_extension;

pub use core_extension::{CORE_EXTENSION, CoreExtensionAdapter, ExtensionKind, module_sort};
