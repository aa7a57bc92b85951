//! Provider adapter capability set
//!
//! Defines the common interface every upstream LLM provider must satisfy:
//! hold a set of keys, pick one with headroom, and execute a chat-completion
//! call through it. The scheduler works exclusively through this interface,
//! so adding a new provider never touches scheduling logic.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::bucket::{BucketStatus, RateBucket};
use crate::dto::ChatCompletionRequest;
use crate::error::Result;
use crate::model_map::ModelMap;

/// An API credential for one provider, paired with its rate-limit bucket.
///
/// Immutable after construction; the bucket inside is the only mutable part.
pub struct ProviderKey {
    provider_name: String,
    key_name: String,
    api_key: String,
    base_url: String,
    bucket: RateBucket,
}

impl ProviderKey {
    pub fn new(
        provider_name: impl Into<String>,
        key_name: impl Into<String>,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        requests_per_minute: u32,
        tokens_per_minute: u32,
    ) -> Self {
        let provider_name = provider_name.into();
        let key_name = key_name.into();
        let bucket_name = format!("{provider_name}:{key_name}");
        Self {
            provider_name,
            key_name,
            api_key: api_key.into(),
            base_url: base_url.into(),
            bucket: RateBucket::new(bucket_name, requests_per_minute, tokens_per_minute),
        }
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn bucket(&self) -> &RateBucket {
        &self.bucket
    }

    /// Bucket status tagged with this key's provider/name, for `GET /status`.
    pub fn status(&self) -> BucketStatus {
        self.bucket.status()
    }
}

impl std::fmt::Debug for ProviderKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderKey")
            .field("provider_name", &self.provider_name)
            .field("key_name", &self.key_name)
            .field("api_key", &"***redacted***")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Shared bookkeeping every adapter implementation embeds: the key list and
/// the round-robin cursor over it, plus the model map used to translate
/// unified model names into this adapter's provider-specific ones.
pub struct AdapterState {
    keys: Vec<ProviderKey>,
    cursor: AtomicUsize,
    model_map: ModelMap,
}

impl AdapterState {
    pub fn new(model_map: ModelMap) -> Self {
        Self {
            keys: Vec::new(),
            cursor: AtomicUsize::new(0),
            model_map,
        }
    }

    pub fn add_key(&mut self, key: ProviderKey) {
        self.keys.push(key);
    }

    pub fn keys(&self) -> &[ProviderKey] {
        &self.keys
    }

    pub fn model_map(&self) -> &ModelMap {
        &self.model_map
    }

    /// Round-robin over the adapter's own keys starting at the cursor;
    /// return the first with headroom for `est` tokens and advance the
    /// cursor to the slot after it. The cursor does not move on a miss.
    pub fn pick_key(&self, est: u32) -> Option<&ProviderKey> {
        if self.keys.is_empty() {
            return None;
        }
        let start = self.cursor.load(Ordering::SeqCst) % self.keys.len();
        for i in 0..self.keys.len() {
            let idx = (start + i) % self.keys.len();
            let key = &self.keys[idx];
            if key.bucket().can_acquire(est) {
                self.cursor.store((idx + 1) % self.keys.len(), Ordering::SeqCst);
                return Some(key);
            }
        }
        None
    }
}

/// Capability set every provider adapter implements.
///
/// An adapter owns an ordered list of keys and knows how to translate and
/// dispatch a single chat-completion call through one of them. Selecting
/// *which* key is a concern of `AdapterState::pick_key`, shared by every
/// implementation; only `call` (the wire format) differs per provider.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Unique name of this adapter, e.g. `"cerebras"`.
    fn name(&self) -> &str;

    /// Shared key/cursor/model-map state.
    fn state(&self) -> &AdapterState;

    /// Execute a chat-completion call through `key`. Implementations must
    /// translate `request.model` via `state().model_map()` before sending,
    /// and must debit the bucket for actual usage after a successful call
    /// (see `ConsumeTokens` semantics in the scheduling core's contract).
    async fn call(
        &self,
        key: &ProviderKey,
        request: &ChatCompletionRequest,
    ) -> Result<crate::dto::ChatCompletionResponse>;

    /// Release any held resources (HTTP client connections, etc).
    async fn close(&self) {}

    fn keys(&self) -> &[ProviderKey] {
        self.state().keys()
    }

    /// Round-robin key selection with headroom for `est` tokens.
    fn pick_key(&self, est: u32) -> Option<&ProviderKey> {
        self.state().pick_key(est)
    }

    /// Rough token-count heuristic used to reserve bucket capacity before a
    /// response arrives: `sum(len(content)) / 4`, floored at 10, plus half
    /// of the requested `max_tokens` (default 1024 when absent).
    fn estimate_tokens(&self, request: &ChatCompletionRequest) -> u32 {
        let input_chars: usize = request.messages.iter().map(|m| m.content.len()).sum();
        let input_tokens = ((input_chars / 4) as u32).max(10);
        let output_tokens = request.max_tokens.max(1) / 2;
        input_tokens + output_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::{Message, Role};

    fn key(name: &str, rpm: u32, tpm: u32) -> ProviderKey {
        ProviderKey::new("test", name, "secret", "http://example.invalid", rpm, tpm)
    }

    #[test]
    fn pick_key_empty_returns_none() {
        let state = AdapterState::new(ModelMap::default());
        assert!(state.pick_key(100).is_none());
    }

    #[test]
    fn pick_key_round_robins_on_success_only() {
        let mut state = AdapterState::new(ModelMap::default());
        state.add_key(key("a", 10, 10_000));
        state.add_key(key("b", 10, 10_000));

        let first = state.pick_key(100).unwrap();
        assert_eq!(first.key_name(), "a");

        let second = state.pick_key(100).unwrap();
        assert_eq!(second.key_name(), "b");

        let third = state.pick_key(100).unwrap();
        assert_eq!(third.key_name(), "a");
    }

    #[test]
    fn pick_key_skips_exhausted_keys_without_advancing_cursor_on_miss() {
        let mut state = AdapterState::new(ModelMap::default());
        state.add_key(key("a", 1, 10_000));
        state.add_key(key("b", 10, 10_000));

        // exhaust "a"
        state.keys()[0].bucket().acquire(100);

        let picked = state.pick_key(100).unwrap();
        assert_eq!(picked.key_name(), "b");
    }

    #[test]
    fn api_key_never_appears_in_debug_output() {
        let k = key("a", 10, 10_000);
        let rendered = format!("{k:?}");
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("***redacted***"));
    }

    struct FakeAdapter {
        state: AdapterState,
    }

    #[async_trait]
    impl ProviderAdapter for FakeAdapter {
        fn name(&self) -> &str {
            "fake"
        }
        fn state(&self) -> &AdapterState {
            &self.state
        }
        async fn call(
            &self,
            _key: &ProviderKey,
            _request: &ChatCompletionRequest,
        ) -> Result<crate::dto::ChatCompletionResponse> {
            unimplemented!()
        }
    }

    #[test]
    fn estimate_tokens_floors_at_ten_and_halves_max_tokens() {
        let adapter = FakeAdapter {
            state: AdapterState::new(ModelMap::default()),
        };
        let request = ChatCompletionRequest {
            messages: vec![Message {
                role: Role::User,
                content: "hi".into(),
            }],
            model: None,
            temperature: 0.7,
            max_tokens: 1024,
            top_p: 1.0,
            stream: false,
            stop: None,
            provider: None,
            priority: 0,
        };
        // "hi" -> 2 chars / 4 = 0, floored to 10; + 1024/2 = 512 => 522
        assert_eq!(adapter.estimate_tokens(&request), 522);
    }
}
