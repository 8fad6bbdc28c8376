// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! System prompt loading.

use hippo_config::model::AgentConfig;
use tracing::{info, warn};

/// Loads the system prompt following config priority: file > inline > default.
///
/// An unreadable or blank prompt file falls through to the next source.
pub async fn load_system_prompt(config: &AgentConfig) -> String {
    if let Some(ref file_path) = config.system_prompt_file {
        match tokio::fs::read_to_string(file_path).await {
            Ok(content) => {
                let trimmed = content.trim();
                if !trimmed.is_empty() {
                    info!(path = file_path.as_str(), "loaded system prompt from file");
                    return trimmed.to_string();
                }
            }
            Err(e) => {
                warn!(
                    path = file_path.as_str(),
                    error = %e,
                    "failed to read system prompt file, falling back"
                );
            }
        }
    }

    if let Some(ref prompt) = config.system_prompt
        && !prompt.is_empty()
    {
        return prompt.clone();
    }

    format!(
        "You are {}, a helpful assistant with a long-term memory.",
        config.name
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_prompt_names_agent() {
        let prompt = load_system_prompt(&AgentConfig::default()).await;
        assert!(prompt.contains("hippo"));
    }

    #[tokio::test]
    async fn inline_prompt_wins_over_default() {
        let config = AgentConfig {
            system_prompt: Some("Custom prompt.".into()),
            ..Default::default()
        };
        assert_eq!(load_system_prompt(&config).await, "Custom prompt.");
    }

    #[tokio::test]
    async fn file_prompt_wins_over_inline() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("sys-prompt.md");
        std::fs::write(&file_path, "  File-based prompt.\n").unwrap();

        let config = AgentConfig {
            system_prompt: Some("Inline.".into()),
            system_prompt_file: Some(file_path.to_string_lossy().into_owned()),
            ..Default::default()
        };
        assert_eq!(load_system_prompt(&config).await, "File-based prompt.");
    }

    #[tokio::test]
    async fn missing_file_falls_back_to_inline() {
        let config = AgentConfig {
            system_prompt: Some("Inline.".into()),
            system_prompt_file: Some("/nonexistent/hippo/prompt.md".into()),
            ..Default::default()
        };
        assert_eq!(load_system_prompt(&config).await, "Inline.");
    }
}
