//! # conductor-server
//!
//! Axum HTTP boundary for the multi-provider LLM conductor: config loading,
//! adapter/scheduler construction, and the route handlers. Kept as a library
//! (with a thin `main.rs` binary wrapper) so integration tests can drive the
//! router directly via `tower::ServiceExt::oneshot`.

pub mod config;
pub mod handlers;
pub mod state;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use indexmap::IndexMap;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use conductor_core::{ModelMap, ProviderAdapter, ProviderKey, Scheduler, SchedulingStrategy};
use conductor_providers::{CerebrasAdapter, NvidiaAdapter};

use crate::config::{ProviderConfig, RawConfig};
use crate::handlers::{batch_chat_completions, chat_completions, health_check, list_models, status};
use crate::state::AppState;

fn parse_strategy(value: &str) -> SchedulingStrategy {
    match value {
        "least_loaded" => SchedulingStrategy::LeastLoaded,
        "sequential" => SchedulingStrategy::Sequential,
        _ => SchedulingStrategy::RoundRobin,
    }
}

/// Build one adapter (if enabled and carrying at least one key) from its
/// config block, sharing `model_map` across every provider.
fn build_adapter(
    provider_name: &str,
    provider_config: &ProviderConfig,
    model_map: ModelMap,
) -> Option<Arc<dyn ProviderAdapter>> {
    if !provider_config.enabled || provider_config.keys.is_empty() {
        return None;
    }

    let keys: Vec<ProviderKey> = provider_config
        .keys
        .iter()
        .enumerate()
        .map(|(index, key_config)| {
            let key_name = key_config
                .name
                .clone()
                .unwrap_or_else(|| format!("{provider_name}-key-{}", index + 1));
            ProviderKey::new(
                provider_name,
                key_name,
                key_config.api_key.clone(),
                provider_config.base_url.clone(),
                key_config.requests_per_minute,
                key_config.tokens_per_minute,
            )
        })
        .collect();

    match provider_name {
        "cerebras" => {
            let mut adapter = CerebrasAdapter::new(provider_config.base_url.clone(), model_map);
            keys.into_iter().for_each(|key| adapter.add_key(key));
            Some(Arc::new(adapter))
        }
        "nvidia" => {
            let mut adapter = NvidiaAdapter::new(provider_config.base_url.clone(), model_map);
            keys.into_iter().for_each(|key| adapter.add_key(key));
            Some(Arc::new(adapter))
        }
        other => {
            tracing::warn!(provider = other, "unknown provider name in config, skipping");
            None
        }
    }
}

/// Build the scheduler and the model map it shares with every registered
/// provider, from a loaded `RawConfig`.
pub fn build_scheduler(config: &RawConfig) -> (Scheduler, ModelMap) {
    let model_map = ModelMap::new(config.models.clone());

    let mut providers: IndexMap<String, Arc<dyn ProviderAdapter>> = IndexMap::new();
    // Deterministic order regardless of HashMap iteration: cerebras, nvidia,
    // then anything else, matching the seed adapters' documented order.
    let mut names: Vec<&String> = config.providers.keys().collect();
    names.sort_by_key(|name| match name.as_str() {
        "cerebras" => 0,
        "nvidia" => 1,
        _ => 2,
    });

    for name in names {
        let provider_config = &config.providers[name];
        if let Some(adapter) = build_adapter(name, provider_config, model_map.clone()) {
            tracing::info!(provider = name, keys = provider_config.keys.len(), "provider registered");
            providers.insert(name.clone(), adapter);
        }
    }

    if providers.is_empty() {
        tracing::warn!("no providers configured! add API keys to the conductor config file");
    }

    let strategy = parse_strategy(&config.conductor.scheduling_strategy);
    // `conductor.request_timeout` is accepted for shape-compatibility with the
    // original config but, as in the source, isn't wired to anything here:
    // the original's Scheduler always used its own hardcoded 60s wait
    // deadline regardless of what the config declared. We keep that behavior
    // rather than inventing a new one.
    let scheduler = Scheduler::new(
        providers,
        strategy,
        conductor_core::DEFAULT_MAX_QUEUE_SIZE,
        conductor_core::DEFAULT_MAX_WAIT_TIME,
    );
    (scheduler, model_map)
}

/// Build the Axum router: health, status, model listing, chat completions,
/// and batch chat completions. CORS wide open (downstream auth is out of
/// scope), plus request tracing.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(status))
        .route("/v1/models", get(list_models))
        .route("/v1/chat/completions", post(chat_completions))
        .route("/v1/batch/chat/completions", post(batch_chat_completions))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
