//! Data adapters
//!
//! An adapter takes over reading and writing of the keys it claims. Instead
//! of the first layer that has the key winning outright, the adapter sees the
//! whole stack and decides what the merged value is, and what has to be
//! written to the primary layer to make a proposed value visible.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use strata_storage::{DynStorage, Payload};

use crate::adapters::CoreExtensionAdapter;
use crate::Result;

/// A shareable adapter trait object.
pub type DynAdapter = Arc<dyn DataAdapter>;

/// Per-key merge strategy across a stack of storages.
///
/// `stack[0]` is the primary layer. Adapters must not keep state of their
/// own: given the same stack contents, `read` returns the same value and
/// `write` the same delta.
pub trait DataAdapter: Send + Sync + fmt::Debug {
    /// Identifier of this adapter, used in logs.
    fn id(&self) -> &str;

    /// Returns whether this adapter handles `name`.
    fn applies(&self, name: &str) -> bool;

    /// Returns whether this adapter handles any of `names`.
    fn applies_to_any(&self, names: &[String]) -> bool {
        names.iter().any(|name| self.applies(name))
    }

    /// Computes the merged value of `name`, or `None` if no layer has it.
    fn read(&self, name: &str, stack: &[DynStorage]) -> Result<Option<Payload>>;

    /// Computes merged values for the names in `names` this adapter handles.
    fn read_multiple(
        &self,
        names: &[String],
        stack: &[DynStorage],
    ) -> Result<BTreeMap<String, Payload>>;

    /// Computes what must be written to the primary layer so that reading
    /// `name` yields `data`.
    ///
    /// `None` means nothing needs to be written.
    fn write(&self, name: &str, data: &Payload, stack: &[DynStorage]) -> Result<Option<Payload>>;
}

/// Ordered list of adapters. For any key, the first adapter that claims it
/// is used exclusively.
#[derive(Debug, Clone, Default)]
pub struct AdapterRegistry {
    adapters: Vec<DynAdapter>,
}

impl AdapterRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in adapters
    pub fn with_defaults() -> Self {
        Self::new().with(Arc::new(CoreExtensionAdapter::new()))
    }

    /// Append an adapter, consulted after the ones already registered
    pub fn with(mut self, adapter: DynAdapter) -> Self {
        self.adapters.push(adapter);
        self
    }

    /// Append an adapter in place
    pub fn register(&mut self, adapter: DynAdapter) {
        self.adapters.push(adapter);
    }

    /// First adapter claiming `name`
    pub fn find(&self, name: &str) -> Option<&DynAdapter> {
        self.adapters.iter().find(|adapter| adapter.applies(name))
    }

    /// Group `names` by the adapter that claims them.
    ///
    /// Returns the claimed groups in registry order, and the names no
    /// adapter claims.
    pub fn partition(&self, names: &[String]) -> (Vec<(DynAdapter, Vec<String>)>, Vec<String>) {
        let mut groups: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        let mut unclaimed = Vec::new();

        for name in names {
            match self.adapters.iter().position(|a| a.applies(name)) {
                Some(index) => groups.entry(index).or_default().push(name.clone()),
                None => unclaimed.push(name.clone()),
            }
        }

        let claimed = groups
            .into_iter()
            .map(|(index, group)| (Arc::clone(&self.adapters[index]), group))
            .collect();
        (claimed, unclaimed)
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DynAdapter> {
        self.adapters.iter()
    }
}
