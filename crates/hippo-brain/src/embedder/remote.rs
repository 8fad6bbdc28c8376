// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP embedder for hosted and self-hosted embedding APIs.
//!
//! Handles the three request/response shapes in use (OpenAI-style,
//! Cohere, Ollama), bearer authentication, and a single retry on
//! transient status codes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use hippo_core::types::{AdapterType, EmbeddingInput, EmbeddingOutput, HealthStatus};
use hippo_core::{Embedder, HippoError, PluginAdapter};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::types::l2_normalize;

/// Request/response shape spoken by an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    /// `{model, input}` → `data[0].embedding`
    OpenAi,
    /// `{model, texts, input_type}` → `embeddings[0]`
    Cohere,
    /// `{model, input}` → `embeddings[0]` (or legacy `embedding`)
    Ollama,
}

impl WireFormat {
    fn default_dim(&self) -> usize {
        match self {
            WireFormat::OpenAi => 1536,
            WireFormat::Cohere => 1024,
            WireFormat::Ollama => 768,
        }
    }

    fn request_body(&self, model: &str, text: &str) -> Value {
        match self {
            WireFormat::OpenAi | WireFormat::Ollama => json!({
                "model": model,
                "input": text,
            }),
            WireFormat::Cohere => json!({
                "model": model,
                "texts": [text],
                "input_type": "search_document",
            }),
        }
    }

    fn extract(&self, body: &Value) -> Option<Vec<f32>> {
        let array = match self {
            WireFormat::OpenAi => body["data"][0]["embedding"].as_array(),
            WireFormat::Cohere => body["embeddings"][0].as_array(),
            WireFormat::Ollama => body["embeddings"][0]
                .as_array()
                .or_else(|| body["embedding"].as_array()),
        }?;
        let vector: Vec<f32> = array
            .iter()
            .filter_map(|v| v.as_f64().map(|f| f as f32))
            .collect();
        if vector.is_empty() || vector.len() != array.len() {
            return None;
        }
        Some(vector)
    }
}

/// Embedder that calls a remote HTTP API.
#[derive(Debug)]
pub struct RemoteEmbedder {
    name: String,
    client: reqwest::Client,
    format: WireFormat,
    url: String,
    model: String,
    timeout: Duration,
    max_retries: u32,
    /// Dimension observed on the first successful response. 0 until then.
    learned_dim: AtomicUsize,
}

impl RemoteEmbedder {
    pub fn new(
        name: &str,
        format: WireFormat,
        url: String,
        model: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, HippoError> {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        if let Some(key) = api_key {
            headers.insert(
                "authorization",
                HeaderValue::from_str(&format!("Bearer {key}")).map_err(|e| {
                    HippoError::Config(format!("invalid embeddings API key header value: {e}"))
                })?,
            );
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| HippoError::Upstream {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            name: name.to_string(),
            client,
            format,
            url,
            model,
            timeout,
            max_retries: 1,
            learned_dim: AtomicUsize::new(0),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn embed_single(&self, text: &str) -> Result<Vec<f32>, HippoError> {
        if text.trim().is_empty() {
            return Ok(vec![0.0; self.dimensions()]);
        }

        let body = self.format.request_body(&self.model, text);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, embedder = %self.name, "retrying embedding request after transient error");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }

            let response = self
                .client
                .post(&self.url)
                .json(&body)
                .timeout(self.timeout)
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        HippoError::Timeout {
                            duration: self.timeout,
                        }
                    } else {
                        HippoError::Upstream {
                            message: format!("embedding request failed: {e}"),
                            source: Some(Box::new(e)),
                        }
                    }
                })?;

            let status = response.status();
            debug!(status = %status, attempt, embedder = %self.name, "embedding response received");

            if status.is_success() {
                let payload: Value = response.json().await.map_err(|e| HippoError::Upstream {
                    message: format!("failed to parse embedding response: {e}"),
                    source: Some(Box::new(e)),
                })?;
                let mut vector = self.format.extract(&payload).ok_or_else(|| {
                    HippoError::upstream(format!(
                        "{} response carried no embedding vector",
                        self.name
                    ))
                })?;
                self.check_dimension(vector.len())?;
                l2_normalize(&mut vector);
                return Ok(vector);
            }

            let body = response.text().await.unwrap_or_default();
            if is_transient_error(status) && attempt < self.max_retries {
                warn!(status = %status, body = %body, "transient embedding error, will retry");
                last_error = Some(HippoError::upstream(format!(
                    "{} returned {status}: {body}",
                    self.name
                )));
                continue;
            }

            return Err(HippoError::upstream(format!(
                "{} returned {status}: {}",
                self.name,
                api_error_message(&body)
            )));
        }

        Err(last_error.unwrap_or_else(|| {
            HippoError::upstream("embedding request failed after retries")
        }))
    }

    fn check_dimension(&self, got: usize) -> Result<(), HippoError> {
        match self
            .learned_dim
            .compare_exchange(0, got, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) => Ok(()),
            Err(expected) if expected == got => Ok(()),
            Err(expected) => Err(HippoError::upstream(format!(
                "{} returned a {got}-dimensional vector, expected {expected}",
                self.name
            ))),
        }
    }
}

/// Pull a readable message out of an error body, falling back to the raw text.
fn api_error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.to_string();
    };
    value["error"]["message"]
        .as_str()
        .or_else(|| value["message"].as_str())
        .or_else(|| value["error"].as_str())
        .or_else(|| value["detail"].as_str())
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string())
}

/// Returns true for HTTP status codes that indicate transient errors worth retrying.
fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503 | 529)
}

#[async_trait]
impl PluginAdapter for RemoteEmbedder {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, HippoError> {
        match self.embed_single("health check").await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    fn dimensions(&self) -> usize {
        match self.learned_dim.load(Ordering::SeqCst) {
            0 => self.format.default_dim(),
            d => d,
        }
    }

    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, HippoError> {
        let mut embeddings = Vec::with_capacity(input.texts.len());
        for text in &input.texts {
            embeddings.push(self.embed_single(text).await?);
        }
        Ok(EmbeddingOutput {
            embeddings,
            dimensions: self.dimensions(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn embedder(server: &MockServer, format: WireFormat, route: &str) -> RemoteEmbedder {
        RemoteEmbedder::new(
            "test",
            format,
            format!("{}{route}", server.uri()),
            "test-model".to_string(),
            Some("sk-test".to_string()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn openai_format_success_is_normalized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(body_partial_json(json!({"model": "test-model", "input": "hello"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"embedding": [3.0, 4.0]}]
            })))
            .mount(&server)
            .await;

        let e = embedder(&server, WireFormat::OpenAi, "/v1/embeddings");
        let v = e.embed_one("hello").await.unwrap();
        assert!((v[0] - 0.6).abs() < 1e-6 && (v[1] - 0.8).abs() < 1e-6);
        assert_eq!(e.dimensions(), 2);
    }

    #[tokio::test]
    async fn cohere_format_sends_texts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embed"))
            .and(body_partial_json(json!({"texts": ["hello"], "input_type": "search_document"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "embeddings": [[1.0, 0.0, 0.0]]
            })))
            .mount(&server)
            .await;

        let e = embedder(&server, WireFormat::Cohere, "/v1/embed");
        assert_eq!(e.embed_one("hello").await.unwrap(), vec![1.0, 0.0, 0.0]);
    }

    #[tokio::test]
    async fn ollama_format_accepts_legacy_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "embedding": [0.0, 2.0]
            })))
            .mount(&server)
            .await;

        let e = embedder(&server, WireFormat::Ollama, "/api/embed");
        assert_eq!(e.embed_one("hello").await.unwrap(), vec![0.0, 1.0]);
    }

    #[tokio::test]
    async fn sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer sk-test"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"embedding": [1.0]}]
            })))
            .mount(&server)
            .await;

        let e = embedder(&server, WireFormat::OpenAi, "/");
        assert!(e.embed_one("x").await.is_ok());
    }

    #[tokio::test]
    async fn retries_on_429() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"embedding": [1.0, 0.0]}]
            })))
            .mount(&server)
            .await;

        let e = embedder(&server, WireFormat::OpenAi, "/");
        assert_eq!(e.embed_one("x").await.unwrap(), vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn fails_on_401_with_api_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"message": "Incorrect API key provided"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let e = embedder(&server, WireFormat::OpenAi, "/");
        let err = e.embed_one("x").await.unwrap_err();
        assert!(err.is_upstream());
        assert!(err.to_string().contains("Incorrect API key"), "got: {err}");
    }

    #[tokio::test]
    async fn exhausts_retries_on_503() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .expect(2)
            .mount(&server)
            .await;

        let e = embedder(&server, WireFormat::OpenAi, "/");
        let err = e.embed_one("x").await.unwrap_err();
        assert!(err.to_string().contains("overloaded"), "got: {err}");
    }

    #[tokio::test]
    async fn missing_vector_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;

        let e = embedder(&server, WireFormat::OpenAi, "/");
        assert!(e.embed_one("x").await.unwrap_err().is_upstream());
    }

    #[tokio::test]
    async fn dimension_change_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"embedding": [1.0, 0.0]}]
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"embedding": [1.0, 0.0, 0.0]}]
            })))
            .mount(&server)
            .await;

        let e = embedder(&server, WireFormat::OpenAi, "/");
        e.embed_one("first").await.unwrap();
        let err = e.embed_one("second").await.unwrap_err();
        assert!(err.to_string().contains("expected 2"), "got: {err}");
    }

    #[tokio::test]
    async fn blank_text_skips_the_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let e = embedder(&server, WireFormat::Ollama, "/");
        let v = e.embed_one("  ").await.unwrap();
        assert_eq!(v.len(), 768);
        assert!(v.iter().all(|x| *x == 0.0));
    }
}
