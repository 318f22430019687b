//! Overlay settings
//!
//! Which overlay sources are layered under a host storage, and which host
//! storages receive them:
//!
//! ```toml
//! overlays = ["sites/default/merge1", "sites/default/merge2"]
//! target_storages = ["config.storage.sync"]
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{MergeError, Result};

/// Host storage the overlays attach to unless configured otherwise.
pub const SYNC_STORAGE: &str = "config.storage.sync";

/// Overlay configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeSettings {
    /// Overlay source identifiers, highest precedence first
    pub overlays: Vec<String>,
    /// Host storages the overlays are layered under
    pub target_storages: Vec<String>,
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            overlays: Vec::new(),
            target_storages: vec![SYNC_STORAGE.to_string()],
        }
    }
}

impl MergeSettings {
    /// Settings with the given overlays and the default target storage
    pub fn new<I, S>(overlays: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            overlays: overlays.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Parse from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let settings: Self = toml::from_str(toml_str)
            .map_err(|e| MergeError::settings(format!("TOML parse error: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Overlay identifiers must be non-empty and unique.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for id in &self.overlays {
            if id.is_empty() {
                return Err(MergeError::settings("Overlay identifiers must not be empty"));
            }
            if !seen.insert(id.as_str()) {
                return Err(MergeError::settings(format!("Duplicate overlay: {id}")));
            }
        }
        Ok(())
    }

    /// Returns `true` if any of `storage_names` is a target storage.
    pub fn applies_to(&self, storage_names: &[String]) -> bool {
        storage_names
            .iter()
            .any(|name| self.target_storages.contains(name))
    }

    /// Returns `true` if `id` is a configured overlay.
    pub fn has_overlay(&self, id: &str) -> bool {
        self.overlays.iter().any(|overlay| overlay == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = MergeSettings::default();
        assert!(settings.overlays.is_empty());
        assert_eq!(settings.target_storages, vec![SYNC_STORAGE]);
        assert!(settings.applies_to(&[SYNC_STORAGE.to_string()]));
        assert!(!settings.applies_to(&["config.storage.active".to_string()]));
    }

    #[test]
    fn test_from_toml() {
        let toml_str = r#"
overlays = ["merge1", "merge2"]
"#;

        let settings = MergeSettings::from_toml(toml_str).unwrap();
        assert_eq!(settings.overlays, vec!["merge1", "merge2"]);
        assert_eq!(settings.target_storages, vec![SYNC_STORAGE]);
        assert!(settings.has_overlay("merge2"));
        assert!(!settings.has_overlay("merge3"));
    }

    #[test]
    fn test_from_toml_custom_targets() {
        let toml_str = r#"
overlays = ["merge1"]
target_storages = ["config.storage.staging"]
"#;

        let settings = MergeSettings::from_toml(toml_str).unwrap();
        assert!(settings.applies_to(&["config.storage.staging".to_string()]));
        assert!(!settings.applies_to(&[SYNC_STORAGE.to_string()]));
    }

    #[test]
    fn test_invalid_settings() {
        let err = MergeSettings::from_toml("overlays = 5").unwrap_err();
        assert!(err.to_string().starts_with("Settings error: TOML parse error"));

        let err = MergeSettings::from_toml(r#"overlays = ["a", "a"]"#).unwrap_err();
        assert_eq!(err.to_string(), "Settings error: Duplicate overlay: a");

        let err = MergeSettings::new([""]).validate().unwrap_err();
        assert!(matches!(err, MergeError::Settings(_)));
    }
}
