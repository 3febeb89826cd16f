//! Model table
//!
//! The built-in table is embedded from `builtin_models.toml` at build time.
//! Entries from the user configuration replace built-ins with the same display
//! name (case-insensitive) or are appended after them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::fallback::FallbackTable;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRef {
    pub display_name: String,
    pub provider_id: String,
    #[serde(default, alias = "vision")]
    pub supports_image_input: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A model table entry as written in TOML: the model itself plus its offline
/// replies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    #[serde(flatten)]
    pub model: ModelRef,
    #[serde(default)]
    pub fallback: FallbackTable,
}

#[derive(Debug, Deserialize)]
struct BuiltinModelsConfig {
    models: Vec<ModelEntry>,
}

/// Load built-in models from the embedded configuration
pub fn load_builtin_models() -> Vec<ModelEntry> {
    const CONFIG_CONTENT: &str = include_str!("../builtin_models.toml");

    match toml::from_str::<BuiltinModelsConfig>(CONFIG_CONTENT) {
        Ok(config) => config.models,
        Err(err) => {
            tracing::error!(error = %err, "embedded model table is invalid");
            Vec::new()
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelCatalog {
    entries: Vec<ModelEntry>,
}

impl ModelCatalog {
    pub fn builtin() -> Self {
        Self {
            entries: load_builtin_models(),
        }
    }

    pub fn from_entries(entries: Vec<ModelEntry>) -> Self {
        let mut catalog = Self {
            entries: Vec::new(),
        };
        catalog.merge(entries);
        catalog
    }

    /// Built-ins overlaid with user-configured entries.
    pub fn with_overrides(overrides: &[ModelEntry]) -> Self {
        let mut catalog = Self::builtin();
        catalog.merge(overrides.to_vec());
        catalog
    }

    fn merge(&mut self, entries: Vec<ModelEntry>) {
        for entry in entries {
            match self.entries.iter_mut().find(|existing| {
                existing
                    .model
                    .display_name
                    .eq_ignore_ascii_case(&entry.model.display_name)
            }) {
                Some(existing) => *existing = entry,
                None => self.entries.push(entry),
            }
        }
    }

    /// Find a model by display name or provider id (case-insensitive).
    pub fn find(&self, name: &str) -> Option<&ModelRef> {
        let name = name.trim();
        self.entries
            .iter()
            .map(|entry| &entry.model)
            .find(|model| {
                model.display_name.eq_ignore_ascii_case(name)
                    || model.provider_id.eq_ignore_ascii_case(name)
            })
    }

    pub fn models(&self) -> impl Iterator<Item = &ModelRef> {
        self.entries.iter().map(|entry| &entry.model)
    }

    pub fn first(&self) -> Option<&ModelRef> {
        self.entries.first().map(|entry| &entry.model)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Offline reply tables keyed by display name.
    pub fn fallback_tables(&self) -> HashMap<String, FallbackTable> {
        self.entries
            .iter()
            .map(|entry| (entry.model.display_name.clone(), entry.fallback.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_has_expected_models() {
        let catalog = ModelCatalog::builtin();
        let names: Vec<&str> = catalog.models().map(|m| m.display_name.as_str()).collect();
        assert_eq!(names, vec!["Molmo 2 8B", "GPT-OSS-120B", "Llama 2 70B"]);

        let molmo = catalog.find("molmo 2 8b").expect("molmo present");
        assert!(molmo.supports_image_input);
        assert_eq!(molmo.provider_id, "allenai/molmo-2-8b:free");

        let by_provider = catalog.find("deepseek/deepseek-chat").expect("lookup by id");
        assert_eq!(by_provider.display_name, "GPT-OSS-120B");
        assert!(!by_provider.supports_image_input);

        assert!(catalog.find("nonexistent").is_none());
    }

    #[test]
    fn every_builtin_model_has_offline_replies() {
        for entry in load_builtin_models() {
            assert!(
                !entry.fallback.replies.is_empty(),
                "{} has no replies",
                entry.model.display_name
            );
            assert!(entry.model.description.is_some());
        }
    }

    #[test]
    fn overrides_replace_by_display_name_and_append_new_models() {
        let overrides = vec![
            ModelEntry {
                model: ModelRef {
                    display_name: "llama 2 70b".into(),
                    provider_id: "meta-llama/llama-3-70b-instruct".into(),
                    supports_image_input: false,
                    description: None,
                },
                fallback: FallbackTable::default(),
            },
            ModelEntry {
                model: ModelRef {
                    display_name: "Local".into(),
                    provider_id: "local/tiny".into(),
                    supports_image_input: true,
                    description: None,
                },
                fallback: FallbackTable::default(),
            },
        ];

        let catalog = ModelCatalog::with_overrides(&overrides);
        assert_eq!(catalog.models().count(), 4);
        assert_eq!(
            catalog.find("Llama 2 70B").unwrap().provider_id,
            "meta-llama/llama-3-70b-instruct"
        );
        assert!(catalog.find("local").unwrap().supports_image_input);
        assert!(catalog.fallback_tables().contains_key("Local"));
    }

    #[test]
    fn model_entries_parse_from_toml() {
        let entry: ModelEntry = toml::from_str(
            r#"
display_name = "Vision"
provider_id = "acme/vision"
vision = true

[fallback]
replies = ["offline"]
"#,
        )
        .expect("entry parses");
        assert!(entry.model.supports_image_input);
        assert_eq!(entry.fallback.replies, vec!["offline".to_string()]);
        assert!(entry.fallback.rules.is_empty());
    }
}
