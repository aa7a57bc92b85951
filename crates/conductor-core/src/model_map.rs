//! Unified → provider-specific model name translation
//!
//! Clients address models by a small set of unified names (`"llama-70b"`,
//! `"llama-8b"`, …); `ModelMap` translates those into whatever name each
//! upstream provider expects. Unknown names pass through unchanged, so a
//! caller can always address a provider-native model name directly.

use std::collections::HashMap;

/// Default unified model name used when a request doesn't specify one.
pub const DEFAULT_MODEL: &str = "llama-70b";

fn seed_mappings() -> HashMap<String, HashMap<String, String>> {
    let mut seed = HashMap::new();

    let mut llama_70b = HashMap::new();
    llama_70b.insert("cerebras".to_string(), "llama-3.3-70b".to_string());
    llama_70b.insert(
        "nvidia".to_string(),
        "meta/llama-3.3-70b-instruct".to_string(),
    );
    seed.insert("llama-70b".to_string(), llama_70b.clone());
    seed.insert("llama-3.3-70b".to_string(), llama_70b);

    let mut llama_8b = HashMap::new();
    llama_8b.insert("cerebras".to_string(), "llama3.1-8b".to_string());
    llama_8b.insert(
        "nvidia".to_string(),
        "meta/llama-3.1-8b-instruct".to_string(),
    );
    seed.insert("llama-8b".to_string(), llama_8b.clone());
    seed.insert("llama-3.1-8b".to_string(), llama_8b);

    let mut llama_70b_31 = HashMap::new();
    llama_70b_31.insert("cerebras".to_string(), "llama-3.1-70b".to_string());
    llama_70b_31.insert(
        "nvidia".to_string(),
        "meta/llama-3.1-70b-instruct".to_string(),
    );
    seed.insert("llama-3.1-70b".to_string(), llama_70b_31);

    seed
}

/// Immutable (after construction) unified-name → per-provider-name mapping.
#[derive(Clone, Debug)]
pub struct ModelMap {
    mappings: HashMap<String, HashMap<String, String>>,
}

impl Default for ModelMap {
    fn default() -> Self {
        Self::new(HashMap::new())
    }
}

impl ModelMap {
    /// Build a model map, merging `custom` over the built-in seed mappings.
    /// A custom entry replaces the seed entry for that unified name wholesale
    /// (matching the source's dict `.update()` semantics, not a per-provider
    /// deep merge).
    pub fn new(custom: HashMap<String, HashMap<String, String>>) -> Self {
        let mut mappings = seed_mappings();
        for (unified_name, provider_models) in custom {
            mappings.insert(unified_name.to_lowercase(), provider_models);
        }
        Self { mappings }
    }

    /// Translate a unified model name into the name `provider` expects.
    /// Falls through to the input unchanged when there's no mapping, so
    /// already-provider-specific names keep working.
    pub fn resolve(&self, unified_name: Option<&str>, provider: &str) -> String {
        let name = match unified_name {
            Some(n) if !n.is_empty() => n,
            _ => DEFAULT_MODEL,
        };
        let normalized = name.to_lowercase();
        let normalized = normalized.trim();

        self.mappings
            .get(normalized)
            .and_then(|providers| providers.get(provider))
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    /// All unified model names this map knows about.
    pub fn available_models(&self) -> Vec<String> {
        self.mappings.keys().cloned().collect()
    }

    /// Add or replace a custom mapping at runtime.
    pub fn add_mapping(&mut self, unified_name: &str, provider_models: HashMap<String, String>) {
        self.mappings
            .insert(unified_name.to_lowercase(), provider_models);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_mapping_resolves_for_known_provider() {
        let map = ModelMap::default();
        assert_eq!(map.resolve(Some("llama-70b"), "cerebras"), "llama-3.3-70b");
        assert_eq!(
            map.resolve(Some("llama-70b"), "nvidia"),
            "meta/llama-3.3-70b-instruct"
        );
    }

    #[test]
    fn absent_name_uses_default_model() {
        let map = ModelMap::default();
        assert_eq!(
            map.resolve(None, "cerebras"),
            map.resolve(Some(DEFAULT_MODEL), "cerebras")
        );
    }

    #[test]
    fn unknown_name_passes_through_unchanged() {
        let map = ModelMap::default();
        assert_eq!(
            map.resolve(Some("some/unknown-name"), "cerebras"),
            "some/unknown-name"
        );
    }

    #[test]
    fn lookup_is_case_and_whitespace_insensitive() {
        let map = ModelMap::default();
        assert_eq!(
            map.resolve(Some("  Llama-70B  "), "cerebras"),
            "llama-3.3-70b"
        );
    }

    #[test]
    fn known_name_unknown_provider_passes_through() {
        let map = ModelMap::default();
        assert_eq!(map.resolve(Some("llama-70b"), "together"), "llama-70b");
    }

    #[test]
    fn custom_mapping_overrides_seed_entirely() {
        let mut custom = HashMap::new();
        let mut providers = HashMap::new();
        providers.insert("cerebras".to_string(), "custom-model".to_string());
        custom.insert("llama-70b".to_string(), providers);

        let map = ModelMap::new(custom);
        assert_eq!(map.resolve(Some("llama-70b"), "cerebras"), "custom-model");
        // nvidia entry was dropped by the wholesale replacement
        assert_eq!(map.resolve(Some("llama-70b"), "nvidia"), "llama-70b");
    }

    #[test]
    fn seed_entries_are_idempotent_under_second_resolution() {
        let map = ModelMap::default();
        for unified in ["llama-70b", "llama-8b", "llama-3.1-70b"] {
            for provider in ["cerebras", "nvidia"] {
                let once = map.resolve(Some(unified), provider);
                let twice = map.resolve(Some(&once), provider);
                assert_eq!(once, twice);
            }
        }
    }
}
