//! Cerebras provider adapter

use async_trait::async_trait;
use conductor_core::{AdapterState, ChatCompletionRequest, ChatCompletionResponse, ModelMap, ProviderAdapter, ProviderKey, Result};

use crate::openai_compatible;

pub const DEFAULT_BASE_URL: &str = "https://api.cerebras.ai/v1";

/// Adapter for Cerebras's OpenAI-compatible inference API.
pub struct CerebrasAdapter {
    base_url: String,
    state: AdapterState,
    client: reqwest::Client,
}

impl CerebrasAdapter {
    pub fn new(base_url: impl Into<String>, model_map: ModelMap) -> Self {
        Self {
            base_url: base_url.into(),
            state: AdapterState::new(model_map),
            client: crate::build_http_client(),
        }
    }

    pub fn with_default_base_url(model_map: ModelMap) -> Self {
        Self::new(DEFAULT_BASE_URL, model_map)
    }

    pub fn add_key(&mut self, key: ProviderKey) {
        self.state.add_key(key);
    }
}

#[async_trait]
impl ProviderAdapter for CerebrasAdapter {
    fn name(&self) -> &str {
        "cerebras"
    }

    fn state(&self) -> &AdapterState {
        &self.state
    }

    async fn call(
        &self,
        key: &ProviderKey,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse> {
        let model = self.state.model_map().resolve(request.model.as_deref(), self.name());
        openai_compatible::send(&self.client, self.name(), &self.base_url, &model, key, request).await
    }
}
