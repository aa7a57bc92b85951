//! End-to-end tests against the Axum router, using `tower::ServiceExt::oneshot`
//! per the pack's Axum testing idiom (no bound TCP socket needed).

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use conductor_core::{ChatCompletionRequest, Message, ProviderKey, Role, Scheduler, SchedulingStrategy};
use conductor_providers::CerebrasAdapter;
use conductor_server::state::AppState;
use conductor_server::{build_router, build_scheduler};
use indexmap::IndexMap;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn empty_state() -> AppState {
    let raw_config: conductor_server::config::RawConfig = serde_yaml::from_str(
        r#"
providers: {}
"#,
    )
    .unwrap();
    let (scheduler, model_map) = build_scheduler(&raw_config);
    scheduler.start();
    AppState {
        scheduler: Arc::new(scheduler),
        model_map: Arc::new(model_map),
    }
}

async fn state_with_mocked_cerebras(server_uri: &str) -> AppState {
    let mut adapter = CerebrasAdapter::new(server_uri.to_string(), conductor_core::ModelMap::default());
    adapter.add_key(ProviderKey::new(
        "cerebras",
        "primary",
        "sk-test",
        server_uri,
        10,
        10_000,
    ));
    let mut providers: IndexMap<String, Arc<dyn conductor_core::ProviderAdapter>> = IndexMap::new();
    providers.insert("cerebras".to_string(), Arc::new(adapter));

    let scheduler = Scheduler::new(
        providers,
        SchedulingStrategy::RoundRobin,
        conductor_core::DEFAULT_MAX_QUEUE_SIZE,
        std::time::Duration::from_secs(5),
    );
    scheduler.start();

    AppState {
        scheduler: Arc::new(scheduler),
        model_map: Arc::new(conductor_core::ModelMap::default()),
    }
}

fn chat_request_body(model: &str) -> String {
    let request = ChatCompletionRequest {
        messages: vec![Message {
            role: Role::User,
            content: "hello".into(),
        }],
        model: Some(model.to_string()),
        temperature: 0.7,
        max_tokens: 100,
        top_p: 1.0,
        stream: false,
        stop: None,
        provider: None,
        priority: 0,
    };
    serde_json::to_string(&request).unwrap()
}

#[tokio::test]
async fn health_returns_static_ok() {
    let app = build_router(empty_state().await);
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn models_lists_seed_unified_names_and_default() {
    let app = build_router(empty_state().await);
    let response = app
        .oneshot(Request::builder().uri("/v1/models").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["default_model"], "llama-70b");
    let ids: Vec<&str> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&"llama-70b"));
    assert!(ids.contains(&"llama-8b"));
}

#[tokio::test]
async fn status_reports_zero_providers_when_none_configured() {
    let app = build_router(empty_state().await);
    let response = app
        .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["total_providers"], 0);
}

#[tokio::test]
async fn chat_completions_returns_503_config_error_with_no_providers() {
    let app = build_router(empty_state().await);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/chat/completions")
                .header("content-type", "application/json")
                .body(Body::from(chat_request_body("llama-70b")))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["code"], "CONFIG_ERROR");
}

#[tokio::test]
async fn chat_completions_rejects_streaming_with_400() {
    let mut request: serde_json::Value = serde_json::from_str(&chat_request_body("llama-70b")).unwrap();
    request["stream"] = serde_json::Value::Bool(true);

    let app = build_router(empty_state().await);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/chat/completions")
                .header("content-type", "application/json")
                .body(Body::from(request.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn chat_completions_happy_path_through_mocked_upstream() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "chatcmpl-1",
            "created": 0,
            "choices": [{"message": {"content": "hi"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 1, "completion_tokens": 1, "total_tokens": 2},
        })))
        .mount(&server)
        .await;

    let app = build_router(state_with_mocked_cerebras(&server.uri()).await);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/chat/completions")
                .header("content-type", "application/json")
                .body(Body::from(chat_request_body("llama-70b")))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["provider"], "cerebras");
    assert_eq!(json["choices"][0]["message"]["content"], "hi");
}

#[tokio::test]
async fn batch_reports_per_index_failures_with_no_providers() {
    let app = build_router(empty_state().await);
    let body = serde_json::json!({
        "requests": [
            serde_json::from_str::<serde_json::Value>(&chat_request_body("llama-70b")).unwrap(),
            serde_json::from_str::<serde_json::Value>(&chat_request_body("llama-8b")).unwrap(),
        ],
        "wait_for_all": true,
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/batch/chat/completions")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let response_body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&response_body).unwrap();
    assert_eq!(json["responses"].as_array().unwrap().len(), 0);
    assert_eq!(json["failed"].as_array().unwrap().len(), 2);
    assert_eq!(json["failed"][0]["index"], 0);
    assert_eq!(json["failed"][1]["index"], 1);
}
