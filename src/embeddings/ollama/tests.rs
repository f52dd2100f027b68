use super::*;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> OllamaClient {
    let address = server.address();
    let config = OllamaConfig {
        host: address.ip().to_string(),
        port: address.port(),
        model: "embed-model".to_string(),
        completion_model: "chat-model".to_string(),
        ..OllamaConfig::default()
    };
    OllamaClient::new(&config)
        .expect("Failed to create client")
        .with_timeout(Duration::from_secs(5))
        .with_retry_attempts(1)
}

#[test]
fn client_configuration() {
    let config = OllamaConfig {
        host: "test-host".to_string(),
        port: 1234,
        model: "test-model".to_string(),
        ..OllamaConfig::default()
    };
    let client = OllamaClient::new(&config).expect("Failed to create client");

    assert_eq!(client.model, "test-model");
    assert_eq!(client.completion_model, config.completion_model);
    assert_eq!(client.base_url.host_str(), Some("test-host"));
    assert_eq!(client.base_url.port(), Some(1234));
    assert_eq!(client.retry_attempts, DEFAULT_RETRY_ATTEMPTS);
}

#[test]
fn client_builder_methods() {
    let client = OllamaClient::new(&OllamaConfig::default())
        .expect("Failed to create client")
        .with_timeout(Duration::from_secs(60))
        .with_retry_attempts(0);

    assert_eq!(client.retry_attempts, 1);
}

#[tokio::test]
async fn embed_posts_model_and_input() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(serde_json::json!({
            "model": "embed-model",
            "input": "Intro Hello"
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "embeddings": [[0.1, 0.2, 0.3]] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let vector = client.embed("Intro Hello").await.expect("embed should succeed");

    assert_eq!(vector, vec![0.1, 0.2, 0.3]);
}

#[tokio::test]
async fn empty_embedding_response_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "embeddings": [] })),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    let error = client.embed("text").await.expect_err("embed should fail");

    assert!(matches!(error, DocsError::Embedding(_)));
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).with_retry_attempts(3);
    let error = client.embed("text").await.expect_err("embed should fail");

    assert!(error.to_string().contains("404"), "unexpected error: {error}");
}

#[tokio::test]
async fn complete_returns_generated_text() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(serde_json::json!({
            "model": "chat-model",
            "stream": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "model": "chat-model",
            "response": "  Use the camera component.  ",
            "done": true
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let answer = client
        .complete("Question: how do I add a camera?")
        .await
        .expect("complete should succeed");

    assert_eq!(answer, "Use the camera component.");
}

#[tokio::test]
async fn completion_failure_maps_to_completion_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let error = client.complete("prompt").await.expect_err("should fail");

    assert!(matches!(error, DocsError::Completion(_)));
}

#[tokio::test]
async fn health_check_requires_both_models() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "models": [{ "name": "embed-model" }]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = tokio::task::spawn_blocking(move || client.health_check())
        .await
        .expect("task should join");

    let message = result.expect_err("chat model is missing").to_string();
    assert!(message.contains("chat-model"), "unexpected error: {message}");
}
