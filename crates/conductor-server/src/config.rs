//! YAML configuration loading
//!
//! Mirrors the shape of the original `app/config.py`: a `conductor` block for
//! scheduler tuning, a `providers` map keyed by adapter name, and an optional
//! `models` block of custom unified-model overrides. Falls back to an in-code
//! default (matching `get_default_config()`) when the file is missing.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

fn default_scheduling_strategy() -> String {
    "round_robin".to_string()
}

fn default_request_timeout() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> f64 {
    1.0
}

/// `conductor:` block — scheduler tuning knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct ConductorSettings {
    #[serde(default = "default_scheduling_strategy")]
    pub scheduling_strategy: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay: f64,
}

impl Default for ConductorSettings {
    fn default() -> Self {
        Self {
            scheduling_strategy: default_scheduling_strategy(),
            request_timeout: default_request_timeout(),
            max_retries: default_max_retries(),
            retry_delay: default_retry_delay(),
        }
    }
}

/// One API credential entry under `providers.<name>.keys`.
#[derive(Debug, Clone, Deserialize)]
pub struct KeyConfig {
    pub api_key: String,
    #[serde(default = "default_rpm")]
    pub requests_per_minute: u32,
    #[serde(default = "default_tpm")]
    pub tokens_per_minute: u32,
    #[serde(default)]
    pub name: Option<String>,
}

fn default_rpm() -> u32 {
    60
}

fn default_tpm() -> u32 {
    100_000
}

/// `providers.<name>:` block.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProviderConfig {
    #[serde(default)]
    pub enabled: bool,
    pub base_url: String,
    #[serde(default)]
    pub default_model: String,
    #[serde(default)]
    pub supported_models: Vec<String>,
    #[serde(default)]
    pub keys: Vec<KeyConfig>,
}

/// Top-level YAML shape (see the configuration section of the conductor spec).
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfig {
    #[serde(default)]
    pub conductor: ConductorSettings,
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub models: HashMap<String, HashMap<String, String>>,
}

/// Built-in fallback used when no config file is present on disk, matching
/// the original's `get_default_config()`: scheduler defaults, both adapters
/// registered but disabled (no keys), so the server starts cleanly and
/// reports `ConfigError` on submit until an operator supplies keys.
fn default_config() -> RawConfig {
    let mut providers = HashMap::new();
    providers.insert(
        "cerebras".to_string(),
        ProviderConfig {
            enabled: true,
            base_url: conductor_providers::cerebras::DEFAULT_BASE_URL.to_string(),
            default_model: "llama-3.3-70b".to_string(),
            supported_models: vec![
                "llama-3.3-70b".to_string(),
                "llama-3.1-8b".to_string(),
                "llama-3.1-70b".to_string(),
            ],
            keys: Vec::new(),
        },
    );
    providers.insert(
        "nvidia".to_string(),
        ProviderConfig {
            enabled: true,
            base_url: conductor_providers::nvidia::DEFAULT_BASE_URL.to_string(),
            default_model: "meta/llama-3.1-8b-instruct".to_string(),
            supported_models: vec![
                "meta/llama-3.1-8b-instruct".to_string(),
                "meta/llama-3.1-70b-instruct".to_string(),
                "meta/llama-3.3-70b-instruct".to_string(),
            ],
            keys: Vec::new(),
        },
    );

    RawConfig {
        conductor: ConductorSettings::default(),
        providers,
        models: HashMap::new(),
    }
}

/// Load configuration from `path`; fall back to `default_config()` (with a
/// logged warning) when the file doesn't exist.
pub fn load_config(path: &str) -> Result<RawConfig> {
    if !Path::new(path).exists() {
        tracing::warn!(config_path = path, "config file not found, using built-in defaults");
        return Ok(default_config());
    }

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {path}"))?;
    let mut config: RawConfig =
        serde_yaml::from_str(&raw).with_context(|| format!("failed to parse config file at {path}"))?;

    for provider in config.providers.values_mut() {
        for key in &mut provider.keys {
            key.api_key = interpolate_env(&key.api_key)
                .with_context(|| "failed to resolve ${VAR} reference in provider api_key")?;
        }
    }

    Ok(config)
}

/// Resolve a `${VAR}` reference against the process environment. A bare
/// string with no `${...}` is returned unchanged. An unresolved reference is
/// a hard configuration error rather than a silent empty string, so a typo'd
/// secret never gets deployed as an empty Bearer token.
fn interpolate_env(value: &str) -> Result<String> {
    interpolate_with(value, std::env::var)
}

/// `interpolate_env`, parameterized over the variable lookup so tests don't
/// need to mutate process-global environment state.
fn interpolate_with(
    value: &str,
    lookup: impl Fn(&str) -> std::result::Result<String, std::env::VarError>,
) -> Result<String> {
    let trimmed = value.trim();
    if let Some(var_name) = trimmed.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        return lookup(var_name).with_context(|| format!("environment variable {var_name} is not set"));
    }
    Ok(value.to_string())
}

/// `CONDUCTOR_*` environment overrides applied on top of whatever config
/// loading produced.
#[derive(Debug, Clone)]
pub struct EnvOverrides {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub config_path: String,
}

impl Default for EnvOverrides {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            log_level: "info".to_string(),
            config_path: "./config/config.yaml".to_string(),
        }
    }
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("CONDUCTOR_HOST").unwrap_or(defaults.host),
            port: std::env::var("CONDUCTOR_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            log_level: std::env::var("CONDUCTOR_LOG_LEVEL").unwrap_or(defaults.log_level),
            config_path: std::env::var("CONDUCTOR_CONFIG_PATH").unwrap_or(defaults.config_path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = load_config("/nonexistent/path/config.yaml").unwrap();
        assert_eq!(config.conductor.scheduling_strategy, "round_robin");
        assert!(config.providers.contains_key("cerebras"));
        assert!(config.providers.contains_key("nvidia"));
    }

    #[test]
    fn interpolate_env_resolves_var_reference() {
        let resolved = interpolate_with("${CONDUCTOR_TEST_KEY_XYZ}", |_| Ok("secret-value".to_string()));
        assert_eq!(resolved.unwrap(), "secret-value");
    }

    #[test]
    fn interpolate_env_passes_through_plain_values() {
        assert_eq!(interpolate_env("sk-plain-key").unwrap(), "sk-plain-key");
    }

    #[test]
    fn interpolate_env_errors_on_unset_var() {
        let resolved = interpolate_with("${CONDUCTOR_DOES_NOT_EXIST_ABC}", |_| {
            Err(std::env::VarError::NotPresent)
        });
        assert!(resolved.is_err());
    }

    #[test]
    fn parses_full_yaml_shape() {
        let yaml = r#"
conductor:
  scheduling_strategy: least_loaded
  request_timeout: 60
providers:
  cerebras:
    enabled: true
    base_url: https://api.cerebras.ai/v1
    default_model: llama-3.3-70b
    supported_models: [llama-3.3-70b]
    keys:
      - api_key: sk-test
        requests_per_minute: 30
        tokens_per_minute: 60000
        name: primary
models:
  llama-70b:
    cerebras: custom-model
"#;
        let config: RawConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.conductor.scheduling_strategy, "least_loaded");
        let cerebras = &config.providers["cerebras"];
        assert_eq!(cerebras.keys.len(), 1);
        assert_eq!(cerebras.keys[0].name.as_deref(), Some("primary"));
        assert_eq!(config.models["llama-70b"]["cerebras"], "custom-model");
    }
}
