//! HTTP backend tests against a local mock server.

use serde_json::{json, Value};
use warden_llm::{AnthropicBackend, OpenAIBackend, TextGenerationBackend};
use warden_test_utils::{LlmError, WardenError};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn anthropic(server: &MockServer) -> AnthropicBackend {
    AnthropicBackend::new("test-key", "claude-test").with_base_url(format!("{}/v1", server.uri()))
}

fn openai(server: &MockServer) -> OpenAIBackend {
    OpenAIBackend::new("test-key", "gpt-test").with_base_url(format!("{}/v1", server.uri()))
}

async fn last_body(server: &MockServer) -> Value {
    let requests = server.received_requests().await.unwrap_or_default();
    let request = requests.last().expect("no request received");
    serde_json::from_slice(&request.body).expect("request body is not JSON")
}

// ============================================================================
// ANTHROPIC
// ============================================================================

#[tokio::test]
async fn test_anthropic_generate_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "msg_01",
            "type": "message",
            "role": "assistant",
            "model": "claude-test",
            "content": [{"type": "text", "text": "All clear."}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 12, "output_tokens": 3}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let text = anthropic(&server).generate("Review this", 1234).await.unwrap();
    assert_eq!(text, "All clear.");

    let body = last_body(&server).await;
    assert_eq!(body["model"], "claude-test");
    assert_eq!(body["max_tokens"], 1234);
    assert_eq!(body["messages"][0]["role"], "user");
    assert_eq!(body["messages"][0]["content"], "Review this");
}

#[tokio::test]
async fn test_anthropic_unauthorized_is_invalid_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "type": "error",
            "error": {"type": "authentication_error", "message": "invalid x-api-key"}
        })))
        .mount(&server)
        .await;

    let err = anthropic(&server).generate("hi", 10).await.unwrap_err();
    assert_eq!(
        err,
        WardenError::Llm(LlmError::InvalidApiKey {
            provider: "anthropic".to_string()
        })
    );
}

#[tokio::test]
async fn test_anthropic_rate_limited_reads_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "3"))
        .mount(&server)
        .await;

    let err = anthropic(&server).generate("hi", 10).await.unwrap_err();
    assert_eq!(
        err,
        WardenError::Llm(LlmError::RateLimited {
            provider: "anthropic".to_string(),
            retry_after_ms: 3000,
        })
    );
}

#[tokio::test]
async fn test_anthropic_server_error_keeps_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "type": "error",
            "error": {"type": "overloaded_error", "message": "Overloaded"}
        })))
        .mount(&server)
        .await;

    let err = anthropic(&server).generate("hi", 10).await.unwrap_err();
    assert_eq!(
        err,
        WardenError::Llm(LlmError::RequestFailed {
            provider: "anthropic".to_string(),
            status: 503,
            message: "Overloaded".to_string(),
        })
    );
}

#[tokio::test]
async fn test_anthropic_reply_without_text_is_invalid() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "tool_use", "id": "t1", "name": "x", "input": {}}]
        })))
        .mount(&server)
        .await;

    let err = anthropic(&server).generate("hi", 10).await.unwrap_err();
    assert!(matches!(
        err,
        WardenError::Llm(LlmError::InvalidResponse { ref provider, .. }) if provider == "anthropic"
    ));
}

// ============================================================================
// OPENAI
// ============================================================================

#[tokio::test]
async fn test_openai_generate_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "model": "gpt-test",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Looks good."},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 5, "completion_tokens": 3, "total_tokens": 8}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let text = openai(&server).generate("Review this", 777).await.unwrap();
    assert_eq!(text, "Looks good.");

    let body = last_body(&server).await;
    assert_eq!(body["model"], "gpt-test");
    assert_eq!(body["max_tokens"], 777);
    assert_eq!(body["messages"][0]["content"], "Review this");
}

#[tokio::test]
async fn test_openai_null_content_is_invalid() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": null},
                "finish_reason": "tool_calls"
            }]
        })))
        .mount(&server)
        .await;

    let err = openai(&server).generate("hi", 10).await.unwrap_err();
    assert!(matches!(err, WardenError::Llm(LlmError::InvalidResponse { .. })));
}

#[tokio::test]
async fn test_openai_error_statuses() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let err = openai(&server).generate("hi", 10).await.unwrap_err();
    assert_eq!(
        err,
        WardenError::Llm(LlmError::RequestFailed {
            provider: "openai".to_string(),
            status: 500,
            message: "upstream exploded".to_string(),
        })
    );
    assert_eq!(err.to_string().contains("openai"), true);
}

#[tokio::test]
async fn test_openai_forbidden_and_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer bad-key"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let bad = OpenAIBackend::new("bad-key", "gpt-test").with_base_url(format!("{}/v1", server.uri()));
    assert!(matches!(
        bad.generate("hi", 10).await,
        Err(WardenError::Llm(LlmError::InvalidApiKey { .. }))
    ));

    assert_eq!(
        openai(&server).generate("hi", 10).await.unwrap_err(),
        WardenError::Llm(LlmError::RateLimited {
            provider: "openai".to_string(),
            retry_after_ms: 0,
        })
    );
}
