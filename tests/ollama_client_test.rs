//! Ollama client against a mock HTTP server.

use mockito::{Matcher, Server};
use serde_json::json;

use triad::adapters::models::OllamaModelClient;
use triad::domain::errors::ModelError;
use triad::domain::models::{ModelConfig, RateLimitConfig, RetryConfig};
use triad::domain::ports::ModelClient;

fn client_for(url: &str, max_retries: u32) -> OllamaModelClient {
    let model = ModelConfig {
        host: url.to_string(),
        name: "qwen2.5-coder".to_string(),
        timeout_secs: 5,
        ..ModelConfig::default()
    };
    let retry = RetryConfig {
        max_retries,
        initial_backoff_ms: 10,
        max_backoff_ms: 50,
    };
    OllamaModelClient::new(&model, &retry, &RateLimitConfig::default()).expect("Failed to create client")
}

#[tokio::test]
async fn test_chat_success_with_mock() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/chat")
        .match_body(Matcher::PartialJson(json!({
            "model": "qwen2.5-coder",
            "stream": false,
            "messages": [
                {"role": "system", "content": "be brief"},
                {"role": "user", "content": "hello"}
            ]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"message": {"role": "assistant", "content": "hi there"}, "done": true}).to_string())
        .create_async()
        .await;

    let client = client_for(&server.url(), 0);
    let text = client.complete("be brief", "hello").await.expect("chat failed");

    assert_eq!(text, "hi there");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_empty_system_prompt_is_omitted() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/chat")
        .match_body(Matcher::Regex(
            r#""messages":\[\{"role":"user","content":"only user"\}\]"#.to_string(),
        ))
        .with_status(200)
        .with_body(json!({"message": {"content": "ok"}}).to_string())
        .create_async()
        .await;

    let client = client_for(&server.url(), 0);
    assert_eq!(client.complete("", "only user").await.unwrap(), "ok");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_missing_model_is_not_configured() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/chat")
        .with_status(404)
        .with_body(r#"{"error":"model 'qwen2.5-coder' not found"}"#)
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server.url(), 3);
    let err = client.complete("s", "u").await.unwrap_err();

    assert!(matches!(err, ModelError::NotConfigured(_)), "got {err:?}");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/chat")
        .with_status(500)
        .with_body("boom")
        .expect(3)
        .create_async()
        .await;

    let client = client_for(&server.url(), 2);
    let err = client.complete("s", "u").await.unwrap_err();

    assert!(matches!(err, ModelError::Unavailable(_)), "got {err:?}");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_undecodable_body_is_invalid_response() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/api/chat")
        .with_status(200)
        .with_body("not json")
        .create_async()
        .await;

    let client = client_for(&server.url(), 2);
    let err = client.complete("s", "u").await.unwrap_err();
    assert!(matches!(err, ModelError::InvalidResponse(_)), "got {err:?}");
}

#[tokio::test]
async fn test_health_check_lists_models() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/api/tags")
        .with_status(200)
        .with_body(json!({"models": [{"name": "nomic-embed-text:latest"}, {"name": "qwen2.5-coder:7b"}]}).to_string())
        .create_async()
        .await;

    let client = client_for(&server.url(), 0);
    let health = client.health_check().await.unwrap();

    assert!(health.reachable);
    assert!(health.model_available);
    assert_eq!(health.models.len(), 2);
}

#[tokio::test]
async fn test_health_check_model_not_pulled() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/api/tags")
        .with_status(200)
        .with_body(json!({"models": [{"name": "llama3:latest"}]}).to_string())
        .create_async()
        .await;

    let health = client_for(&server.url(), 0).health_check().await.unwrap();
    assert!(health.reachable);
    assert!(!health.model_available);
    assert!(!health.is_healthy());
}

#[tokio::test]
async fn test_health_check_unreachable_host() {
    let health = client_for("http://127.0.0.1:1", 0).health_check().await.unwrap();
    assert!(!health.reachable);
    assert!(!health.model_available);
}
