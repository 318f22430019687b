//! Merging of the extension list (`core.extension`)
//!
//! The extension list records which modules and themes are enabled, each
//! with a weight, plus the single active install profile. Layers are merged
//! like this:
//! - The first layer holding the item is the base; its profile is the profile
//! - Every later layer adds the modules and themes the base does not have yet
//! - A later layer's own profile is dropped from its module list
//! - Modules are ordered by weight then name, themes by name

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};
use strata_storage::{DynStorage, Payload};
use tracing::{debug, warn};

use crate::adapter::DataAdapter;
use crate::{MergeError, Result};

/// Name of the extension list item.
pub const CORE_EXTENSION: &str = "core.extension";

const PROFILE_KEY: &str = "profile";

/// The two extension lists held by the extension list item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtensionKind {
    Module,
    Theme,
}

impl ExtensionKind {
    /// Payload field holding this list
    pub fn key(self) -> &'static str {
        match self {
            ExtensionKind::Module => "module",
            ExtensionKind::Theme => "theme",
        }
    }
}

impl fmt::Display for ExtensionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Data adapter for the extension list.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoreExtensionAdapter;

impl CoreExtensionAdapter {
    pub fn new() -> Self {
        Self
    }

    /// Merge `name` across the stack without sorting.
    fn merge(&self, name: &str, stack: &[DynStorage]) -> Result<Option<Payload>> {
        let mut merged: Option<Payload> = None;

        for storage in stack {
            let Some(data) = storage.read(name)? else {
                continue;
            };
            match merged.as_mut() {
                None => merged = Some(data),
                Some(base) => {
                    // There is only one install profile, and it comes from the base.
                    let mut modules = extension_list(&data, ExtensionKind::Module);
                    if let Some(profile) = data.get(PROFILE_KEY).and_then(Value::as_str) {
                        modules.remove(profile);
                    }
                    absorb(base, ExtensionKind::Module, modules);
                    absorb(
                        base,
                        ExtensionKind::Theme,
                        extension_list(&data, ExtensionKind::Theme),
                    );
                }
            }
        }

        Ok(merged)
    }
}

impl DataAdapter for CoreExtensionAdapter {
    fn id(&self) -> &str {
        CORE_EXTENSION
    }

    fn applies(&self, name: &str) -> bool {
        name == CORE_EXTENSION
    }

    fn read(&self, name: &str, stack: &[DynStorage]) -> Result<Option<Payload>> {
        Ok(self.merge(name, stack)?.map(sort_extensions))
    }

    fn read_multiple(
        &self,
        names: &[String],
        stack: &[DynStorage],
    ) -> Result<BTreeMap<String, Payload>> {
        let mut data = BTreeMap::new();
        if names.iter().any(|name| self.applies(name)) {
            if let Some(merged) = self.read(CORE_EXTENSION, stack)? {
                data.insert(CORE_EXTENSION.to_string(), merged);
            }
        }
        Ok(data)
    }

    /// Computes the primary layer's new extension list.
    ///
    /// If no layer holds the item yet, the delta is built from an empty
    /// list: only the added modules and themes are kept, and the proposed
    /// `profile` and any other fields are dropped. A later write that adds
    /// nothing is then a no-op, so those fields are never persisted through
    /// this adapter.
    fn write(&self, name: &str, data: &Payload, stack: &[DynStorage]) -> Result<Option<Payload>> {
        // Empty when no layer holds the item.
        let current = self.read(name, stack)?.unwrap_or_default();

        let proposed_modules = extension_list(data, ExtensionKind::Module);
        let proposed_themes = extension_list(data, ExtensionKind::Theme);
        let current_modules = extension_list(&current, ExtensionKind::Module);
        let current_themes = extension_list(&current, ExtensionKind::Theme);

        let added_modules = diff_keys(&proposed_modules, &current_modules);
        let added_themes = diff_keys(&proposed_themes, &current_themes);
        let removed_modules = diff_keys(&current_modules, &proposed_modules);
        let removed_themes = diff_keys(&current_themes, &proposed_themes);

        if added_modules.is_empty()
            && added_themes.is_empty()
            && removed_modules.is_empty()
            && removed_themes.is_empty()
        {
            debug!(name = %name, "Extension list unchanged");
            return Ok(None);
        }

        let primary = stack
            .first()
            .ok_or_else(|| MergeError::invalid_storage("No primary storage to write to"))?;

        let top = match primary.read(name)? {
            Some(mut top) => {
                let top_modules = extension_list(&top, ExtensionKind::Module);
                let top_themes = extension_list(&top, ExtensionKind::Theme);
                ensure_owned(ExtensionKind::Module, &removed_modules, &top_modules)?;
                ensure_owned(ExtensionKind::Theme, &removed_themes, &top_themes)?;

                top.insert(
                    ExtensionKind::Module.key().to_string(),
                    Value::Object(apply_changes(top_modules, added_modules, &removed_modules)),
                );
                top.insert(
                    ExtensionKind::Theme.key().to_string(),
                    Value::Object(apply_changes(top_themes, added_themes, &removed_themes)),
                );
                top
            }
            None => {
                // First write to the primary layer: it only records additions.
                let mut top = current;
                top.insert(
                    ExtensionKind::Module.key().to_string(),
                    Value::Object(added_modules),
                );
                top.insert(
                    ExtensionKind::Theme.key().to_string(),
                    Value::Object(added_themes),
                );
                top
            }
        };

        Ok(Some(sort_extensions(top)))
    }
}

/// Sort modules by weight, then by name.
///
/// Each module gets a sort key of `[sign][19 digit |weight|][name]`, with
/// sign `0` for negative weights and `1` otherwise, and the keys are compared
/// as plain strings. `+` and `-` are not usable as the sign since `+` sorts
/// before `-`. Examples (spaces added):
/// - `block` with weight -5: `0 0000000000000000005 block`
/// - `node` with weight 0: `1 0000000000000000000 node`
pub fn module_sort(modules: Map<String, Value>) -> Map<String, Value> {
    let mut keyed: Vec<(String, String, Value)> = modules
        .into_iter()
        .map(|(name, weight)| (module_sort_key(&name, weight_of(&weight)), name, weight))
        .collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    keyed
        .into_iter()
        .map(|(_, name, weight)| (name, weight))
        .collect()
}

fn module_sort_key(name: &str, weight: i64) -> String {
    format!("{}{:019}{}", u8::from(weight >= 0), weight.unsigned_abs(), name)
}

fn weight_of(value: &Value) -> i64 {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|w| w as i64))
        .unwrap_or(0)
}

fn theme_sort(themes: Map<String, Value>) -> Map<String, Value> {
    let mut sorted: Vec<(String, Value)> = themes.into_iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    sorted.into_iter().collect()
}

fn sort_extensions(mut data: Payload) -> Payload {
    let modules = module_sort(extension_list(&data, ExtensionKind::Module));
    let themes = theme_sort(extension_list(&data, ExtensionKind::Theme));
    data.insert(ExtensionKind::Module.key().to_string(), Value::Object(modules));
    data.insert(ExtensionKind::Theme.key().to_string(), Value::Object(themes));
    data
}

/// The module or theme list of a payload. Missing or malformed lists are
/// treated as empty.
fn extension_list(data: &Payload, kind: ExtensionKind) -> Map<String, Value> {
    data.get(kind.key())
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

/// Add entries from a lower layer; entries already present win.
fn absorb(base: &mut Payload, kind: ExtensionKind, incoming: Map<String, Value>) {
    let mut list = extension_list(base, kind);
    for (name, weight) in incoming {
        list.entry(name).or_insert(weight);
    }
    base.insert(kind.key().to_string(), Value::Object(list));
}

/// Entries of `left` whose key is not in `right`.
fn diff_keys(left: &Map<String, Value>, right: &Map<String, Value>) -> Map<String, Value> {
    left.iter()
        .filter(|(name, _)| !right.contains_key(name.as_str()))
        .map(|(name, weight)| (name.clone(), weight.clone()))
        .collect()
}

/// Removals may only touch entries the primary layer itself holds.
fn ensure_owned(
    kind: ExtensionKind,
    removed: &Map<String, Value>,
    owned: &Map<String, Value>,
) -> Result<()> {
    let foreign: Vec<String> = removed
        .keys()
        .filter(|name| !owned.contains_key(name.as_str()))
        .cloned()
        .collect();
    if foreign.is_empty() {
        return Ok(());
    }
    warn!(kind = %kind, names = ?foreign, "Refusing to remove extensions owned by another layer");
    Err(MergeError::UnexpectedRemoval {
        kind,
        names: foreign,
    })
}

fn apply_changes(
    mut list: Map<String, Value>,
    added: Map<String, Value>,
    removed: &Map<String, Value>,
) -> Map<String, Value> {
    list.extend(added);
    list.retain(|name, _| !removed.contains_key(name.as_str()));
    list
}
