// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for hippo.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level hippo configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HippoConfig {
    /// Agent identity and logging.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Brain storage, triggers, and deadlines.
    #[serde(default)]
    pub brain: BrainConfig,

    /// Embedder selection.
    #[serde(default)]
    pub embeddings: EmbeddingsConfig,

    /// Chat model used for maintenance and the shell.
    #[serde(default)]
    pub provider: ProviderConfig,
}

/// Agent identity and behavior configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name of the agent.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Inline system prompt string. Overridden by `system_prompt_file` if both set.
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Path to a markdown file containing the system prompt.
    #[serde(default)]
    pub system_prompt_file: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
            system_prompt: None,
            system_prompt_file: None,
        }
    }
}

fn default_agent_name() -> String {
    "hippo".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Brain configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BrainConfig {
    /// Root directory holding `brain/` prompts and `vector_db/`.
    #[serde(default = "default_storage_dir")]
    pub storage_dir: String,

    /// Model context window in tokens. 0 disables the usage trigger.
    #[serde(default)]
    pub context_window: u64,

    /// Run maintenance every N retrievals.
    #[serde(default = "default_interaction_period")]
    pub interaction_period: u64,

    /// Wall-clock budget for one maintenance pass.
    #[serde(default = "default_maintenance_timeout_secs")]
    pub maintenance_timeout_secs: u64,

    /// How long shutdown waits for the final pass.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,

    /// Interval for scheduled maintenance in long-running modes. 0 disables it.
    #[serde(default)]
    pub schedule_secs: u64,

    /// Directory of prompt templates copied into `<storage_dir>/brain/`.
    /// Built-in templates are used when unset.
    #[serde(default)]
    pub template_dir: Option<String>,
}

impl Default for BrainConfig {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            context_window: 0,
            interaction_period: default_interaction_period(),
            maintenance_timeout_secs: default_maintenance_timeout_secs(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            schedule_secs: 0,
            template_dir: None,
        }
    }
}

impl BrainConfig {
    pub fn storage_path(&self) -> PathBuf {
        PathBuf::from(&self.storage_dir)
    }

    pub fn maintenance_timeout(&self) -> Duration {
        Duration::from_secs(self.maintenance_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

fn default_storage_dir() -> String {
    dirs::data_dir()
        .map(|d| d.join("hippo"))
        .unwrap_or_else(|| PathBuf::from(".hippo"))
        .display()
        .to_string()
}

fn default_interaction_period() -> u64 {
    100
}

fn default_maintenance_timeout_secs() -> u64 {
    600
}

fn default_shutdown_timeout_secs() -> u64 {
    600
}

/// Embedder configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingsConfig {
    /// One of: static, openai, cohere, mistral, jina, mixedbread, ollama, openai_compat.
    /// Unrecognized values fall back to `static`.
    #[serde(default = "default_embeddings_mode")]
    pub mode: String,

    /// API key for remote embedders.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Endpoint override. Required for `openai_compat`.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Model override for remote embedders.
    #[serde(default)]
    pub model: Option<String>,

    /// Path to the msgpack static vocabulary.
    /// Defaults to `<storage_dir>/embeddings/static.msgpack`.
    #[serde(default)]
    pub static_path: Option<String>,

    /// Download source for the static vocabulary when the file is absent.
    #[serde(default)]
    pub static_url: Option<String>,

    /// Per-request timeout for remote embedders.
    #[serde(default = "default_embeddings_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            mode: default_embeddings_mode(),
            api_key: None,
            base_url: None,
            model: None,
            static_path: None,
            static_url: None,
            timeout_secs: default_embeddings_timeout_secs(),
        }
    }
}

fn default_embeddings_mode() -> String {
    "static".to_string()
}

fn default_embeddings_timeout_secs() -> u64 {
    30
}

/// OpenAI-compatible chat provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Base URL of the chat-completions API (without `/chat/completions`).
    #[serde(default = "default_provider_base_url")]
    pub base_url: String,

    /// API key. Falls back to the `OPENAI_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model identifier.
    #[serde(default = "default_provider_model")]
    pub model: String,

    /// Maximum tokens in a generated response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Per-request timeout.
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_provider_base_url(),
            api_key: None,
            model: default_provider_model(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_provider_timeout_secs(),
        }
    }
}

fn default_provider_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_provider_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_provider_timeout_secs() -> u64 {
    120
}
