//! HTTP provider tests against a local mock server.
//!
//! Embedders use blocking reqwest, so they run on a blocking thread inside
//! a multi-threaded runtime.

use std::sync::Arc;
use std::time::Duration;

use docs_assistant::config::{EmbeddingConfig, GenerationConfig};
use docs_assistant::embedding::{Batched, GeminiEmbedder, OllamaEmbedder};
use docs_assistant::generate::{GeminiGenerator, Generator, OllamaGenerator};
use docs_assistant::progress::NoProgress;
use docs_assistant::retry::RetryPolicy;
use docs_assistant_core::Embedder;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn fast_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        base_delay: Duration::from_millis(5),
    }
}

fn embedding_config(provider: &str, url: &str) -> EmbeddingConfig {
    EmbeddingConfig {
        provider: provider.to_string(),
        url: Some(url.to_string()),
        ..EmbeddingConfig::default()
    }
}

fn generation_config(provider: &str, url: &str) -> GenerationConfig {
    GenerationConfig {
        provider: provider.to_string(),
        url: Some(url.to_string()),
        ..GenerationConfig::default()
    }
}

fn texts(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn gemini_embedder_posts_batch_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/text-embedding-004:batchEmbedContents"))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "requests": [
                { "model": "models/text-embedding-004", "content": { "parts": [{ "text": "first" }] } },
                { "model": "models/text-embedding-004", "content": { "parts": [{ "text": "second" }] } }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [
                { "values": [1.0, 0.0, 0.0] },
                { "values": [0.0, 1.0, 0.0] }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let embedder =
        GeminiEmbedder::with_api_key(&embedding_config("gemini", &server.uri()), "test-key");
    let matrix = tokio::task::spawn_blocking(move || embedder.embed(&texts(&["first", "second"])))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(matrix.shape(), (2, 3));
    assert_eq!(matrix.row(0), &[1.0, 0.0, 0.0]);
    assert_eq!(matrix.row(1), &[0.0, 1.0, 0.0]);
}

#[tokio::test(flavor = "multi_thread")]
async fn embedder_retries_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[0.5, 0.5]]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let embedder =
        OllamaEmbedder::new(&embedding_config("ollama", &server.uri())).with_retry(fast_retry(3));
    let matrix = tokio::task::spawn_blocking(move || embedder.embed(&texts(&["hello"])))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(matrix.row(0), &[0.5, 0.5]);
}

#[tokio::test(flavor = "multi_thread")]
async fn embedder_gives_up_after_max_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .expect(3)
        .mount(&server)
        .await;

    let embedder =
        OllamaEmbedder::new(&embedding_config("ollama", &server.uri())).with_retry(fast_retry(2));
    let err = tokio::task::spawn_blocking(move || embedder.embed(&texts(&["hello"])))
        .await
        .unwrap()
        .unwrap_err();
    assert!(format!("{:#}", err).contains("429"), "err={:#}", err);
}

#[tokio::test(flavor = "multi_thread")]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/text-embedding-004:batchEmbedContents"))
        .respond_with(ResponseTemplate::new(400).set_body_string("API key not valid"))
        .expect(1)
        .mount(&server)
        .await;

    let embedder = GeminiEmbedder::with_api_key(&embedding_config("gemini", &server.uri()), "bad")
        .with_retry(fast_retry(4));
    let err = tokio::task::spawn_blocking(move || embedder.embed(&texts(&["hello"])))
        .await
        .unwrap()
        .unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("400"), "msg={}", msg);
    assert!(msg.contains("API key not valid"), "msg={}", msg);
}

#[tokio::test(flavor = "multi_thread")]
async fn embedder_connection_error_hides_api_key() {
    // Nothing listens on port 1.
    let embedder = GeminiEmbedder::with_api_key(
        &embedding_config("gemini", "http://127.0.0.1:1"),
        "SECRET-KEY-123",
    )
    .with_retry(fast_retry(0));
    let err = tokio::task::spawn_blocking(move || embedder.embed(&texts(&["hello"])))
        .await
        .unwrap()
        .unwrap_err();
    let msg = format!("{:#}", err);
    assert!(msg.contains("Gemini connection error"), "msg={}", msg);
    assert!(!msg.contains("SECRET-KEY-123"), "msg={}", msg);
}

#[tokio::test(flavor = "multi_thread")]
async fn batched_embedder_splits_requests_in_order() {
    let server = MockServer::start().await;
    // One row per input, carrying the input's length so order is checkable.
    let respond = |req: &Request| {
        let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
        let rows: Vec<Vec<f32>> = body["input"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| vec![t.as_str().unwrap().len() as f32, 1.0])
            .collect();
        ResponseTemplate::new(200).set_body_json(json!({ "embeddings": rows }))
    };
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(respond)
        .expect(3)
        .mount(&server)
        .await;

    let inner = Arc::new(OllamaEmbedder::new(&embedding_config("ollama", &server.uri())));
    let batched = Batched::new(inner, 2, Arc::new(NoProgress));
    let input = texts(&["a", "bb", "ccc", "dddd", "eeeee"]);
    let matrix = tokio::task::spawn_blocking(move || batched.embed(&input))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(matrix.rows(), 5);
    let firsts: Vec<f32> = matrix.iter_rows().map(|r| r[0]).collect();
    assert_eq!(firsts, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
}

#[tokio::test]
async fn gemini_generator_returns_candidate_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-1.5-flash:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "contents": [{ "role": "user", "parts": [{ "text": "What is the deploy window?" }] }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Tuesdays " }, { "text": "after 10am." }] }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let generator =
        GeminiGenerator::with_api_key(&generation_config("gemini", &server.uri()), "test-key");
    assert_eq!(generator.model_name(), "models/gemini-1.5-flash");
    let answer = generator.generate("What is the deploy window?").await.unwrap();
    assert_eq!(answer, "Tuesdays after 10am.");
}

#[tokio::test]
async fn gemini_generator_reports_blocked_prompt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-1.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        })))
        .mount(&server)
        .await;

    let generator =
        GeminiGenerator::with_api_key(&generation_config("gemini", &server.uri()), "k");
    let err = generator.generate("anything").await.unwrap_err();
    assert!(err.to_string().contains("SAFETY"));
}

#[tokio::test]
async fn generator_connection_error_hides_api_key() {
    let generator = GeminiGenerator::with_api_key(
        &generation_config("gemini", "http://127.0.0.1:1"),
        "SECRET-KEY-123",
    )
    .with_retry(fast_retry(0));
    let err = generator.generate("anything").await.unwrap_err();
    let msg = format!("{:#}", err);
    assert!(msg.contains("Gemini connection error"), "msg={}", msg);
    assert!(!msg.contains("SECRET-KEY-123"), "msg={}", msg);
}

#[tokio::test]
async fn ollama_generator_retries_then_answers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({ "model": "llama3.1", "stream": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "Use the staging cluster."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let generator =
        OllamaGenerator::new(&generation_config("ollama", &server.uri())).with_retry(fast_retry(2));
    let answer = generator.generate("Where do I test?").await.unwrap();
    assert_eq!(answer, "Use the staging cluster.");
}
