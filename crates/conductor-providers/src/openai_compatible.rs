//! Shared OpenAI-compatible wire format and dispatch
//!
//! Cerebras and Nvidia NIM both speak the same `/chat/completions` shape;
//! this module holds the wire types and the single `send` routine every
//! adapter in this crate calls. Only `base_url`/`name`/model translation
//! differ per provider.

use conductor_core::{
    ChatCompletionChoice, ChatCompletionRequest, ChatCompletionResponse, ConductorError, Message,
    ProviderKey, Result, Role, Usage,
};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a [String]>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
    #[serde(default = "default_finish_reason")]
    finish_reason: String,
}

fn default_finish_reason() -> String {
    "stop".to_string()
}

#[derive(Deserialize)]
struct WireResponseMessage {
    content: String,
}

#[derive(Deserialize, Default)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[derive(Deserialize)]
struct WireResponse {
    id: Option<String>,
    created: Option<i64>,
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: WireUsage,
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

/// POST `request` to `{base_url}/chat/completions` as `model`, authenticated
/// with `key`. On success, debits the key's bucket for the upstream-reported
/// total token usage (in addition to the estimate already reserved by
/// `acquire`) and returns the translated response.
pub async fn send(
    client: &reqwest::Client,
    provider_name: &str,
    base_url: &str,
    model: &str,
    key: &ProviderKey,
    request: &ChatCompletionRequest,
) -> Result<ChatCompletionResponse> {
    let wire_messages = request
        .messages
        .iter()
        .map(|m| WireMessage {
            role: role_str(m.role),
            content: &m.content,
        })
        .collect();

    let wire_request = WireRequest {
        model,
        messages: wire_messages,
        temperature: request.temperature,
        max_tokens: request.max_tokens,
        top_p: request.top_p,
        stop: request.stop.as_deref(),
    };

    let url = format!("{base_url}/chat/completions");

    tracing::info!(
        provider = provider_name,
        model,
        key_name = key.key_name(),
        messages_count = request.messages.len(),
        "sending request to upstream provider"
    );

    let response = client
        .post(&url)
        .bearer_auth(key.api_key())
        .json(&wire_request)
        .send()
        .await
        .map_err(|err| ConductorError::Provider {
            status: None,
            body: None,
            cause: format!("request to {provider_name} failed: {err}"),
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.ok();
        tracing::error!(provider = provider_name, status = status.as_u16(), "upstream returned an error");
        return Err(ConductorError::Provider {
            status: Some(status.as_u16()),
            body,
            cause: format!("{provider_name} returned {status}"),
        });
    }

    let data: WireResponse = response.json().await.map_err(|err| ConductorError::Provider {
        status: Some(status.as_u16()),
        body: None,
        cause: format!("failed to parse {provider_name} response: {err}"),
    })?;

    let choice = data
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ConductorError::Provider {
            status: Some(status.as_u16()),
            body: None,
            cause: format!("{provider_name} returned no choices"),
        })?;

    if data.usage.total_tokens > 0 {
        key.bucket().consume_tokens(data.usage.total_tokens);
    }

    Ok(ChatCompletionResponse {
        id: data.id.unwrap_or_else(|| format!("chatcmpl-{}", uuid::Uuid::new_v4())),
        object: "chat.completion".to_string(),
        created: data.created.unwrap_or(0),
        model: model.to_string(),
        choices: vec![ChatCompletionChoice {
            index: 0,
            message: Message {
                role: Role::Assistant,
                content: choice.message.content,
            },
            finish_reason: choice.finish_reason,
        }],
        usage: Usage {
            prompt_tokens: data.usage.prompt_tokens,
            completion_tokens: data.usage.completion_tokens,
            total_tokens: data.usage.total_tokens,
        },
        provider: provider_name.to_string(),
        provider_key_name: key.key_name().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_core::Message;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> ChatCompletionRequest {
        ChatCompletionRequest {
            messages: vec![Message {
                role: Role::User,
                content: "hello".into(),
            }],
            model: Some("llama-70b".into()),
            temperature: 0.7,
            max_tokens: 100,
            top_p: 1.0,
            stream: false,
            stop: None,
            provider: None,
            priority: 0,
        }
    }

    #[tokio::test]
    async fn successful_call_translates_response_and_debits_bucket() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "chatcmpl-1",
                "created": 1_700_000_000,
                "choices": [{
                    "message": {"content": "hi there"},
                    "finish_reason": "stop",
                }],
                "usage": {"prompt_tokens": 5, "completion_tokens": 7, "total_tokens": 12},
            })))
            .mount(&server)
            .await;

        let key = ProviderKey::new("cerebras", "primary", "sk-test", server.uri(), 10, 10_000);
        key.bucket().acquire(50); // simulate the scheduler's pre-call reservation

        let client = reqwest::Client::new();
        let response = send(&client, "cerebras", &server.uri(), "llama-3.3-70b", &key, &request())
            .await
            .unwrap();

        assert_eq!(response.choices[0].message.content, "hi there");
        assert_eq!(response.choices[0].finish_reason, "stop");
        assert_eq!(response.usage.total_tokens, 12);
        assert_eq!(response.provider, "cerebras");
        assert_eq!(response.provider_key_name, "primary");

        // acquire(50) reserved 50, then consume_tokens(12) debits the actual
        // usage on top — a deliberate double-count, not a refund.
        assert_eq!(key.bucket().status().tokens_remaining, 10_000 - 50 - 12);
    }

    #[tokio::test]
    async fn non_2xx_response_surfaces_as_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
            .mount(&server)
            .await;

        let key = ProviderKey::new("cerebras", "primary", "sk-test", server.uri(), 10, 10_000);
        let client = reqwest::Client::new();
        let err = send(&client, "cerebras", &server.uri(), "llama-3.3-70b", &key, &request())
            .await
            .unwrap_err();

        match err {
            ConductorError::Provider { status, .. } => assert_eq!(status, Some(500)),
            other => panic!("expected Provider error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn model_name_is_forwarded_verbatim_to_upstream_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(wiremock::matchers::body_partial_json(
                serde_json::json!({"model": "some/unknown-name"}),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "x",
                "created": 0,
                "choices": [{"message": {"content": "ok"}, "finish_reason": "stop"}],
                "usage": {"prompt_tokens": 1, "completion_tokens": 1, "total_tokens": 2},
            })))
            .mount(&server)
            .await;

        let key = ProviderKey::new("cerebras", "primary", "sk-test", server.uri(), 10, 10_000);
        let client = reqwest::Client::new();
        let response = send(
            &client,
            "cerebras",
            &server.uri(),
            "some/unknown-name",
            &key,
            &request(),
        )
        .await
        .unwrap();
        assert_eq!(response.model, "some/unknown-name");
    }
}
