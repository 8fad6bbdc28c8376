// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-compatible chat model adapter.
//!
//! Implements [`ChatModel`] over the `/chat/completions` endpoint. Any server
//! speaking that protocol works (OpenAI, Ollama, vLLM, LM Studio).

pub mod client;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use hippo_config::model::ProviderConfig;
use hippo_core::error::HippoError;
use hippo_core::traits::{ChatModel, PluginAdapter};
use hippo_core::types::{AdapterType, ChatCompletion, ChatMessage, HealthStatus, TokenUsage};
use tracing::{debug, info};

use crate::client::OpenAiClient;
use crate::types::{ApiMessage, CompletionRequest};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Chat model backed by an OpenAI-compatible API.
///
/// API key resolution order: config -> `OPENAI_API_KEY` env var. A key is
/// required only when talking to api.openai.com.
pub struct OpenAiProvider {
    client: OpenAiClient,
    max_tokens: u32,
}

impl OpenAiProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, HippoError> {
        let api_key = resolve_api_key(&config.api_key, &config.base_url)?;
        let client = OpenAiClient::new(
            api_key.as_deref(),
            &config.base_url,
            config.model.clone(),
            Duration::from_secs(config.timeout_secs),
        )?;

        info!(
            model = config.model,
            endpoint = client.endpoint(),
            "chat provider initialized"
        );

        Ok(Self {
            client,
            max_tokens: config.max_tokens,
        })
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }

    fn to_request(&self, messages: &[ChatMessage]) -> CompletionRequest {
        CompletionRequest {
            model: self.client.model().to_string(),
            messages: messages.iter().map(ApiMessage::from).collect(),
            max_tokens: Some(self.max_tokens),
        }
    }
}

#[async_trait]
impl PluginAdapter for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, HippoError> {
        // The client is constructed eagerly; a bad key or URL shows up on first use.
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl ChatModel for OpenAiProvider {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<ChatCompletion, HippoError> {
        let request = self.to_request(messages);
        let response = self.client.complete(&request).await?;
        debug!(id = %response.id, "completion received");

        let usage = response.usage.map(|u| TokenUsage {
            input_tokens: u32::try_from(u.prompt_tokens).unwrap_or(u32::MAX),
            output_tokens: u32::try_from(u.completion_tokens).unwrap_or(u32::MAX),
        });
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| HippoError::upstream("completion response has no choices"))?;

        Ok(ChatCompletion {
            message: choice.message.into_chat_message(),
            usage,
        })
    }
}

fn resolve_api_key(
    config_key: &Option<String>,
    base_url: &str,
) -> Result<Option<String>, HippoError> {
    if let Some(key) = config_key.as_deref().filter(|k| !k.is_empty()) {
        return Ok(Some(key.to_string()));
    }
    if let Some(key) = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()) {
        return Ok(Some(key));
    }
    if base_url.trim_end_matches('/') == OPENAI_BASE_URL {
        return Err(HippoError::Config(
            "no API key: set provider.api_key or OPENAI_API_KEY".into(),
        ));
    }
    Ok(None)
}
