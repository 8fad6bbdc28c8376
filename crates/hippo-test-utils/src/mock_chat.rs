// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock chat model for deterministic testing.
//!
//! `MockChatModel` implements `ChatModel` with pre-configured replies,
//! enabling fast, CI-runnable tests without external API calls.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use hippo_core::types::{AdapterType, ChatCompletion, ChatMessage, HealthStatus, TokenUsage};
use hippo_core::{ChatModel, HippoError, PluginAdapter};

/// Computes a reply from the request when the queue is empty.
pub type Responder = Arc<dyn Fn(&[ChatMessage]) -> String + Send + Sync>;

enum Reply {
    Text(String),
    Fail(String),
}

/// A mock chat model that returns pre-configured replies.
///
/// Replies are popped from a FIFO queue. When the queue is empty the
/// responder is consulted if one is set, otherwise the default text
/// ("mock response") is returned. Every request is recorded.
pub struct MockChatModel {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    requests: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
    default_reply: String,
    delay: Option<Duration>,
    responder: Option<Responder>,
}

impl MockChatModel {
    /// Create a new mock model with an empty reply queue.
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            default_reply: "mock response".to_string(),
            delay: None,
            responder: None,
        }
    }

    /// Create a mock model pre-loaded with the given replies.
    pub fn with_responses(responses: Vec<String>) -> Self {
        let model = Self::new();
        Self {
            replies: Arc::new(Mutex::new(responses.into_iter().map(Reply::Text).collect())),
            ..model
        }
    }

    /// Reply used once the queue is drained.
    pub fn with_default(mut self, text: impl Into<String>) -> Self {
        self.default_reply = text.into();
        self
    }

    /// Sleep this long before answering each request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Compute replies from the request once the queue is drained.
    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&[ChatMessage]) -> String + Send + Sync + 'static,
    {
        self.responder = Some(Arc::new(responder));
        self
    }

    /// Add a reply to the end of the queue.
    pub async fn add_response(&self, text: impl Into<String>) {
        self.replies.lock().await.push_back(Reply::Text(text.into()));
    }

    /// Queue an upstream failure.
    pub async fn add_error(&self, message: impl Into<String>) {
        self.replies.lock().await.push_back(Reply::Fail(message.into()));
    }

    /// Every request received so far, in order.
    pub async fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().await.clone()
    }

    pub async fn request_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    async fn next_reply(&self, messages: &[ChatMessage]) -> Reply {
        if let Some(reply) = self.replies.lock().await.pop_front() {
            return reply;
        }
        match &self.responder {
            Some(responder) => Reply::Text(responder(messages)),
            None => Reply::Text(self.default_reply.clone()),
        }
    }
}

impl Default for MockChatModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockChatModel {
    fn name(&self) -> &str {
        "mock-chat"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, HippoError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<ChatCompletion, HippoError> {
        self.requests.lock().await.push(messages.to_vec());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.next_reply(messages).await {
            Reply::Text(text) => Ok(ChatCompletion {
                message: ChatMessage::assistant(text),
                usage: Some(TokenUsage {
                    input_tokens: 10,
                    output_tokens: 20,
                }),
            }),
            Reply::Fail(message) => Err(HippoError::upstream(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hello() -> Vec<ChatMessage> {
        vec![ChatMessage::user("hello")]
    }

    #[tokio::test]
    async fn default_response_when_queue_empty() {
        let model = MockChatModel::new();
        let out = model.generate(&hello()).await.unwrap();
        assert_eq!(out.message.content, "mock response");
        assert_eq!(out.usage.unwrap().total(), 30);
    }

    #[tokio::test]
    async fn queued_responses_returned_in_order() {
        let model = MockChatModel::with_responses(vec!["first".to_string(), "second".to_string()])
            .with_default("fallback");

        assert_eq!(model.generate(&hello()).await.unwrap().message.content, "first");
        assert_eq!(model.generate(&hello()).await.unwrap().message.content, "second");
        assert_eq!(model.generate(&hello()).await.unwrap().message.content, "fallback");
        assert_eq!(model.request_count().await, 3);
    }

    #[tokio::test]
    async fn queued_error_is_upstream() {
        let model = MockChatModel::new();
        model.add_error("boom").await;
        let err = model.generate(&hello()).await.unwrap_err();
        assert!(err.is_upstream());
        assert_eq!(model.generate(&hello()).await.unwrap().message.content, "mock response");
    }

    #[tokio::test]
    async fn responder_sees_request() {
        let model = MockChatModel::new().with_responder(|msgs| format!("echo: {}", msgs[0].content));
        model.add_response("queued first").await;
        assert_eq!(model.generate(&hello()).await.unwrap().message.content, "queued first");
        assert_eq!(model.generate(&hello()).await.unwrap().message.content, "echo: hello");
    }

    #[tokio::test]
    async fn requests_are_recorded() {
        let model = MockChatModel::new();
        model
            .generate(&[ChatMessage::system("sys"), ChatMessage::user("u")])
            .await
            .unwrap();
        let requests = model.requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0][0].content, "sys");
        assert_eq!(requests[0][1].content, "u");
    }

    #[tokio::test(start_paused = true)]
    async fn delay_is_applied() {
        let model = MockChatModel::new().with_delay(Duration::from_secs(5));
        let started = tokio::time::Instant::now();
        model.generate(&hello()).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(5));
    }
}
