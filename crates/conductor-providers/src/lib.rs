//! # conductor-providers
//!
//! Upstream LLM provider adapters for the conductor.
//!
//! ## Providers
//!
//! - **Cerebras**: OpenAI-compatible inference API
//! - **Nvidia NIM**: OpenAI-compatible inference API
//!
//! Both speak the same wire format (see [`openai_compatible`]); adding a new
//! OpenAI-compatible provider is a thin adapter over that shared routine.

pub mod cerebras;
pub mod nvidia;
pub mod openai_compatible;

pub use cerebras::CerebrasAdapter;
pub use nvidia::NvidiaAdapter;

use std::time::Duration;

/// Upstream HTTP timeout shared by every adapter in this crate.
pub const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(120);

/// Build the `reqwest::Client` every adapter constructor uses, so the
/// timeout stays consistent across providers.
pub fn build_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(UPSTREAM_TIMEOUT)
        .build()
        .expect("static reqwest client configuration is valid")
}

// Re-export core types for convenience
pub use conductor_core::{
    AdapterState, ChatCompletionRequest, ChatCompletionResponse, ConductorError, ModelMap,
    ProviderAdapter, ProviderKey, Result,
};
