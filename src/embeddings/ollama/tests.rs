use super::*;
use crate::config::OllamaConfig;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> OllamaClient {
    let address = server.address();
    let config = OllamaConfig {
        host: address.ip().to_string(),
        port: address.port(),
        batch_size: 2,
        ..OllamaConfig::default()
    };
    OllamaClient::new(&config)
        .expect("Failed to create client")
        .with_retry_attempts(1)
}

/// The client is blocking, so run it off the async test runtime
async fn blocking<T, F>(f: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .expect("blocking task should not panic")
}

#[test]
fn client_configuration() {
    let config = OllamaConfig {
        protocol: "http".to_string(),
        host: "test-host".to_string(),
        port: 1234,
        embedding_model: "embed-model".to_string(),
        generation_model: "chat-model".to_string(),
        batch_size: 128,
        timeout_secs: 5,
    };
    let client = OllamaClient::new(&config).expect("Failed to create client");

    assert_eq!(client.embedding_model, "embed-model");
    assert_eq!(client.generation_model, "chat-model");
    assert_eq!(client.batch_size, 128);
    assert_eq!(client.base_url.host_str(), Some("test-host"));
    assert_eq!(client.base_url.port(), Some(1234));
    assert_eq!(client.retry_attempts, DEFAULT_RETRY_ATTEMPTS);
}

#[test]
fn client_builder_methods() {
    let client = OllamaClient::new(&OllamaConfig::default())
        .expect("Failed to create client")
        .with_timeout(Duration::from_secs(60))
        .with_retry_attempts(5);
    assert_eq!(client.retry_attempts, 5);

    let client = client.with_retry_attempts(0);
    assert_eq!(client.retry_attempts, 1);
}

#[test]
fn model_name_matching() {
    assert!(model_matches("llama2:latest", "llama2"));
    assert!(model_matches("llama2", "llama2"));
    assert!(model_matches("llama2:7b", "llama2:7b"));
    assert!(!model_matches("llama2:7b", "llama2"));
    assert!(!model_matches("llama2:latest", "llama2:7b"));
    assert!(!model_matches("nomic-embed-text:latest", "llama2"));
}

#[tokio::test(flavor = "multi_thread")]
async fn embed_batch_splits_requests() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({ "input": ["a", "b"] })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "embeddings": [[1.0, 0.0], [0.0, 1.0]] })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({ "input": ["c"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [[0.5, 0.5]] })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let texts: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
    let embeddings = blocking(move || client.embed(&texts))
        .await
        .expect("embedding should succeed");

    assert_eq!(
        embeddings,
        vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.5, 0.5]]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn embed_rejects_count_mismatch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [[1.0]] })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let texts = vec!["first".to_string(), "second".to_string()];
    let result = blocking(move || client.embed(&texts)).await;

    let message = format!("{:#}", result.expect_err("mismatch should fail"));
    assert!(message.contains("Mismatch"), "unexpected error: {message}");
}

#[tokio::test(flavor = "multi_thread")]
async fn embed_empty_input_skips_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let embeddings = blocking(move || client.embed(&[]))
        .await
        .expect("empty input should succeed");
    assert!(embeddings.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "error": "model not found" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).with_retry_attempts(3);
    let result = blocking(move || client.embed(&["text here".to_string()])).await;

    let message = format!("{:#}", result.expect_err("404 should fail"));
    assert!(message.contains("HTTP 404"), "unexpected error: {message}");
}

#[tokio::test(flavor = "multi_thread")]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "models": [] })))
        .mount(&server)
        .await;

    let client = client_for(&server).with_retry_attempts(2);
    let result = blocking(move || client.ping()).await;
    assert!(result.is_ok(), "ping should succeed after retry: {result:?}");
}

#[tokio::test(flavor = "multi_thread")]
async fn health_check_requires_both_models() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [
                { "name": "nomic-embed-text:latest", "size": 274302450 },
                { "name": "mistral:latest" }
            ]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = blocking(move || client.health_check()).await;

    let message = format!("{:#}", result.expect_err("llama2 is missing"));
    assert!(message.contains("llama2"), "unexpected error: {message}");
}

#[tokio::test(flavor = "multi_thread")]
async fn generate_streams_fragments_in_order() {
    let server = MockServer::start().await;
    let body = [
        r#"{"model":"llama2","message":{"role":"assistant","content":"The "},"done":false}"#,
        r#"{"model":"llama2","message":{"role":"assistant","content":"answer"},"done":false}"#,
        "",
        r#"{"model":"llama2","message":{"role":"assistant","content":""},"done":true}"#,
    ]
    .join("\n");
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "model": "llama2",
            "stream": true,
            "messages": [
                { "role": "system", "content": "context line" },
                { "role": "user", "content": "what?" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let fragments = blocking(move || {
        let mut fragments = Vec::new();
        let mut collect = |fragment: &str| {
            fragments.push(fragment.to_string());
            Ok(())
        };
        client.generate("context line", "what?", &mut collect)?;
        anyhow::Ok(fragments)
    })
    .await
    .expect("generation should succeed");

    assert_eq!(fragments, vec!["The ".to_string(), "answer".to_string()]);
}

#[tokio::test(flavor = "multi_thread")]
async fn generate_surfaces_stream_errors() {
    let server = MockServer::start().await;
    let body = [
        r#"{"message":{"role":"assistant","content":"partial"},"done":false}"#,
        r#"{"error":"model crashed"}"#,
    ]
    .join("\n");
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = blocking(move || client.generate("", "q", &mut |_| Ok(()))).await;

    let message = format!("{:#}", result.expect_err("stream error should fail"));
    assert!(message.contains("model crashed"), "unexpected error: {message}");
}

#[tokio::test(flavor = "multi_thread")]
async fn generate_requires_done_marker() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"message":{"role":"assistant","content":"cut"},"done":false}"#,
        ))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = blocking(move || client.generate("", "q", &mut |_| Ok(()))).await;
    assert!(result.is_err());
}
