//! Integration tests for the Messages API refiner against a mock server.
//!
//! Test coverage:
//! - Request shape and headers
//! - Retry of transient errors (429, 529)
//! - No retry on permanent errors (401)
//! - Empty completions

use coverloop::domain::models::LlmConfig;
use coverloop::domain::ports::{ChatMessage, Refiner, RefinerError};
use coverloop::infrastructure::llm::AnthropicRefiner;
use mockito::{Matcher, Server};
use serde_json::json;

fn test_config(base_url: String) -> LlmConfig {
    LlmConfig {
        api_key: Some("test-key".to_string()),
        base_url,
        rate_limit_rps: 100.0,
        max_retries: 3,
        initial_backoff_ms: 10,
        max_backoff_ms: 100,
        timeout_secs: 10,
        ..LlmConfig::default()
    }
}

fn response_body(text: &str) -> String {
    json!({
        "id": "msg_01ABC123",
        "type": "message",
        "role": "assistant",
        "content": [{ "type": "text", "text": text }],
        "model": "claude-sonnet-4-5-20250929",
        "stop_reason": "end_turn",
        "usage": { "input_tokens": 42, "output_tokens": 7 }
    })
    .to_string()
}

fn conversation() -> Vec<ChatMessage> {
    vec![
        ChatMessage::system("You write patterns."),
        ChatMessage::user("Make it faster."),
    ]
}

#[tokio::test]
async fn test_completion_success() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/messages")
        .match_header("x-api-key", "test-key")
        .match_header("anthropic-version", "2023-06-01")
        .match_body(Matcher::PartialJson(json!({
            "system": "You write patterns.",
            "messages": [{ "role": "user", "content": "Make it faster." }]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(response_body("s(\"bd*4\")"))
        .expect(1)
        .create_async()
        .await;

    let refiner = AnthropicRefiner::new(&test_config(server.url())).expect("client");
    let reply = refiner.complete(&conversation()).await.unwrap();

    assert_eq!(reply, "s(\"bd*4\")");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_rate_limit_is_retried() {
    let mut server = Server::new_async().await;
    let limited = server
        .mock("POST", "/v1/messages")
        .with_status(429)
        .with_body(r#"{"error": {"type": "rate_limit_error", "message": "Rate limit exceeded"}}"#)
        .expect(1)
        .create_async()
        .await;
    let overloaded = server
        .mock("POST", "/v1/messages")
        .with_status(529)
        .with_body(r#"{"error": {"type": "overloaded_error", "message": "Overloaded"}}"#)
        .expect(1)
        .create_async()
        .await;
    let ok = server
        .mock("POST", "/v1/messages")
        .with_status(200)
        .with_body(response_body("note(\"c3\")"))
        .expect(1)
        .create_async()
        .await;

    let refiner = AnthropicRefiner::new(&test_config(server.url())).expect("client");
    let reply = refiner.complete(&conversation()).await.unwrap();

    assert_eq!(reply, "note(\"c3\")");
    limited.assert_async().await;
    overloaded.assert_async().await;
    ok.assert_async().await;
}

#[tokio::test]
async fn test_invalid_key_is_not_retried() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/messages")
        .with_status(401)
        .with_body(r#"{"error": {"type": "authentication_error", "message": "invalid x-api-key"}}"#)
        .expect(1)
        .create_async()
        .await;

    let refiner = AnthropicRefiner::new(&test_config(server.url())).expect("client");
    let err = refiner.complete(&conversation()).await.unwrap_err();

    assert!(matches!(err, RefinerError::Unavailable(_)), "{err}");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/messages")
        .with_status(500)
        .with_body(r#"{"error": {"type": "api_error", "message": "boom"}}"#)
        .expect(3)
        .create_async()
        .await;

    let mut config = test_config(server.url());
    config.max_retries = 2;
    let refiner = AnthropicRefiner::new(&config).expect("client");
    let err = refiner.complete(&conversation()).await.unwrap_err();

    assert!(matches!(err, RefinerError::Unavailable(_)));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_blank_completion_is_empty_response() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/v1/messages")
        .with_status(200)
        .with_body(response_body("   \n"))
        .create_async()
        .await;

    let refiner = AnthropicRefiner::new(&test_config(server.url())).expect("client");
    let err = refiner.complete(&conversation()).await.unwrap_err();

    assert!(matches!(err, RefinerError::EmptyResponse));
}

#[tokio::test]
async fn test_trailing_slash_in_base_url() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/messages")
        .with_status(200)
        .with_body(response_body("s(\"hh*8\")"))
        .expect(1)
        .create_async()
        .await;

    let refiner =
        AnthropicRefiner::new(&test_config(format!("{}/", server.url()))).expect("client");
    refiner.complete(&conversation()).await.unwrap();

    mock.assert_async().await;
}
