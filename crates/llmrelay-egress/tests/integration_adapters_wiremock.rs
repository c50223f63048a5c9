//! Integration tests for the generation adapters using wiremock

use llmrelay_core::{Error, GenerationAdapter, GenerationRequest, HttpCheck};
use llmrelay_egress::{
    AuthStyle, HttpClientConfig, OllamaAdapter, OpenAiCompatibleAdapter, ReqwestHttpCheck,
    create_client,
};
use std::time::Duration;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, header, method, path, query_param},
};

fn client() -> reqwest::Client {
    create_client(&HttpClientConfig::default().with_timeout_secs(5)).unwrap()
}

#[tokio::test]
async fn test_ollama_generate_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(serde_json::json!({
            "model": "mistral:latest",
            "prompt": "Say hello",
            "system": "Be terse",
            "stream": false,
            "options": { "num_predict": 16 }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "model": "mistral:latest",
            "response": "Hello",
            "done": true,
            "prompt_eval_count": 12,
            "eval_count": 3
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let adapter = OllamaAdapter::new(client(), mock_server.uri(), "mistral:latest");
    let request = GenerationRequest::new("Say hello")
        .with_system_prompt("Be terse")
        .with_max_tokens(16);

    let generation = adapter.generate(&request).await.unwrap();
    assert_eq!(generation.text, "Hello");
    assert_eq!(generation.tokens_used, Some(15));
}

#[tokio::test]
async fn test_ollama_list_models() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "models": [
                { "name": "mistral:latest", "size": 4109865159u64 },
                { "name": "llama3:8b" }
            ]
        })))
        .mount(&mock_server)
        .await;

    let adapter = OllamaAdapter::new(client(), mock_server.uri(), "mistral:latest");
    let models = adapter.list_models().await.unwrap();

    let names: Vec<_> = models.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["mistral:latest", "llama3:8b"]);
}

#[tokio::test]
async fn test_ollama_server_error_is_transport() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
        .mount(&mock_server)
        .await;

    let adapter = OllamaAdapter::new(client(), mock_server.uri(), "mistral:latest");
    let err = adapter
        .generate(&GenerationRequest::new("hi"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Transport(ref msg) if msg.contains("500") && msg.contains("model not loaded")));
}

#[tokio::test]
async fn test_openai_generate_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(serde_json::json!({
            "model": "gpt-4o-mini",
            "messages": [{ "role": "user", "content": "Hello!" }],
            "max_tokens": 100
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": "Hello from mock API!" },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let adapter = OpenAiCompatibleAdapter::new(
        client(),
        &mock_server.uri(),
        "/chat/completions",
        "gpt-4o-mini",
        AuthStyle::Bearer("test-key".to_string()),
    );

    let generation = adapter
        .generate(&GenerationRequest::new("Hello!").with_max_tokens(100))
        .await
        .unwrap();
    assert_eq!(generation.text, "Hello from mock API!");
    assert_eq!(generation.tokens_used, Some(15));
}

#[tokio::test]
async fn test_openai_auth_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": { "message": "Incorrect API key provided", "type": "invalid_request_error" }
        })))
        .mount(&mock_server)
        .await;

    let adapter = OpenAiCompatibleAdapter::new(
        client(),
        &mock_server.uri(),
        "/chat/completions",
        "gpt-4o-mini",
        AuthStyle::Bearer("wrong".to_string()),
    );

    let err = adapter
        .generate(&GenerationRequest::new("hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Auth(ref msg) if msg.contains("Incorrect API key")));
}

#[tokio::test]
async fn test_openai_rate_limit_reads_retry_after() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "30"))
        .mount(&mock_server)
        .await;

    let adapter = OpenAiCompatibleAdapter::new(
        client(),
        &mock_server.uri(),
        "/chat/completions",
        "gpt-4o-mini",
        AuthStyle::Bearer("test-key".to_string()),
    );

    let err = adapter
        .generate(&GenerationRequest::new("hi"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::RateLimited {
            retry_after_secs: Some(30)
        }
    ));
}

#[tokio::test]
async fn test_openai_empty_choices_is_invalid_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": []
        })))
        .mount(&mock_server)
        .await;

    let adapter = OpenAiCompatibleAdapter::new(
        client(),
        &mock_server.uri(),
        "/v1/chat/completions",
        "default",
        AuthStyle::None,
    );

    let err = adapter
        .generate(&GenerationRequest::new("hi"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_response");
}

#[tokio::test]
async fn test_azure_uses_api_key_header() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/openai/deployments/my-deployment/chat/completions"))
        .and(query_param("api-version", "2024-02-01"))
        .and(header("api-key", "azure-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "hi" } }]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let adapter = OpenAiCompatibleAdapter::azure(
        client(),
        &mock_server.uri(),
        "my-deployment",
        "azure-key".to_string(),
    );

    let generation = adapter.generate(&GenerationRequest::new("hi")).await.unwrap();
    assert_eq!(generation.text, "hi");
    assert_eq!(generation.tokens_used, None);
}

#[tokio::test]
async fn test_http_check_requires_exact_200() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let check = ReqwestHttpCheck::new(client());
    let timeout = Duration::from_secs(2);

    assert!(check.get_ok(&format!("{}/api/tags", mock_server.uri()), timeout).await);
    assert!(!check.get_ok(&format!("{}/api/health", mock_server.uri()), timeout).await);
    assert!(!check.get_ok(&format!("{}/missing", mock_server.uri()), timeout).await);
}

#[tokio::test]
async fn test_http_check_times_out() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&mock_server)
        .await;

    let check = ReqwestHttpCheck::new(client());
    assert!(!check.get_ok(&mock_server.uri(), Duration::from_millis(100)).await);
}

#[tokio::test]
async fn test_http_check_connection_refused() {
    let check = ReqwestHttpCheck::new(client());
    assert!(!check.get_ok("http://127.0.0.1:1/", Duration::from_secs(1)).await);
}
