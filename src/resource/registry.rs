//! Resource Registry - Load resource kind definitions from JSON
//!
//! This module loads the per-kind field schema (API paths, identifier field,
//! identity, required and creation-only fields) from an embedded JSON file
//! and provides lookup functions for the reconcilers.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Embedded resource JSON files (compiled into the binary)
const RESOURCE_FILES: &[&str] = &[include_str!("../resources/truenas.json")];

/// How a kind is addressed by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiStyle {
    /// Filterable collection with `{id}`-addressed items
    Collection,
    /// Single endpoint driven by an `action` field (jail fstab)
    FstabActions,
}

/// Resource kind definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceDef {
    pub display_name: String,
    pub style: ApiStyle,
    /// Collection path relative to `/api/v2.0/`
    pub api_path: String,
    /// Single-item path; `{id}` is replaced by the found identifier
    pub item_path: String,
    /// Field of a found record holding its identifier
    pub id_field: String,
    /// Fields used to look up an existing instance
    pub identity_fields: Vec<String>,
    #[serde(default)]
    pub required_present: Vec<String>,
    #[serde(default)]
    pub required_absent: Vec<String>,
    /// Fields accepted on create but rejected by the update schema
    #[serde(default)]
    pub create_only_fields: Vec<String>,
}

impl ResourceDef {
    /// Item path for a found identifier
    pub fn item_path_for(&self, id: &str) -> String {
        self.item_path.replace("{id}", &urlencoding::encode(id))
    }
}

/// Root structure of resources/*.json
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceConfig {
    #[serde(default)]
    pub resources: HashMap<String, ResourceDef>,
}

/// Global registry loaded from JSON
static REGISTRY: OnceLock<ResourceConfig> = OnceLock::new();

/// Get the resource registry (loads from embedded JSON on first access)
pub fn get_registry() -> &'static ResourceConfig {
    REGISTRY.get_or_init(|| {
        let mut final_config = ResourceConfig {
            resources: HashMap::new(),
        };

        for content in RESOURCE_FILES {
            let partial: ResourceConfig = serde_json::from_str(content)
                .unwrap_or_else(|e| panic!("Failed to parse embedded resource JSON: {}", e));
            final_config.resources.extend(partial.resources);
        }

        final_config
    })
}

/// Get a resource definition by key
pub fn get_resource(key: &str) -> Option<&'static ResourceDef> {
    get_registry().resources.get(key)
}

/// Get a resource definition, failing with a model error for unknown kinds
pub fn require_resource(key: &str) -> Result<&'static ResourceDef> {
    get_resource(key).ok_or_else(|| {
        Error::model(format!(
            "unknown resource kind: {} (known: {})",
            key,
            get_all_resource_keys().join(", ")
        ))
    })
}

/// Get all resource keys
pub fn get_all_resource_keys() -> Vec<&'static str> {
    let mut keys: Vec<&'static str> = get_registry()
        .resources
        .keys()
        .map(|s| s.as_str())
        .collect();
    keys.sort_unstable();
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_loads_successfully() {
        let registry = get_registry();
        assert!(
            !registry.resources.is_empty(),
            "Registry should have resources"
        );
    }

    #[test]
    fn test_user_resource_exists() {
        let resource = get_resource("user").expect("user kind should exist");
        assert_eq!(resource.display_name, "User");
        assert_eq!(resource.style, ApiStyle::Collection);
        assert_eq!(resource.id_field, "id");
        assert_eq!(resource.identity_fields, vec!["username"]);
        assert_eq!(resource.create_only_fields, vec!["group_create"]);
    }

    #[test]
    fn test_jail_fstab_required_fields() {
        let resource = get_resource("jail-fstab").expect("jail-fstab kind should exist");
        assert!(resource.required_present.contains(&"source".to_string()));
        assert!(resource.required_present.contains(&"destination".to_string()));
        assert!(!resource.required_absent.contains(&"source".to_string()));
    }

    #[test]
    fn test_get_all_resource_keys() {
        assert_eq!(get_all_resource_keys(), vec!["jail-fstab", "user"]);
    }

    #[test]
    fn test_item_path_substitutes_id() {
        let resource = get_resource("user").unwrap();
        assert_eq!(resource.item_path_for("42"), "user/id/42");
    }

    #[test]
    fn test_unknown_kind_is_model_error() {
        assert!(matches!(
            require_resource("group"),
            Err(Error::Model(_))
        ));
    }
}
