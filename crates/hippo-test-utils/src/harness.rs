// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end brain tests.
//!
//! `BrainHarness` opens a real [`Brain`] in a temp directory, wired to a
//! [`MockChatModel`] and a one-hot word embedder, and exposes the
//! response-engine adapter alongside it.

use std::path::Path;
use std::sync::Arc;

use hippo_brain::{Brain, BrainAdapter};
use hippo_config::model::BrainConfig;
use hippo_core::types::ChatMessage;
use hippo_core::{ChatModel, HippoError};

use crate::embedder::word_embedder;
use crate::mock_chat::MockChatModel;

/// Builder for [`BrainHarness`].
pub struct BrainHarnessBuilder {
    responses: Vec<String>,
    words: Vec<String>,
    config: BrainConfig,
    responder: Option<Box<dyn Fn(&[ChatMessage]) -> String + Send + Sync>>,
}

impl BrainHarnessBuilder {
    fn new() -> Self {
        Self {
            responses: Vec::new(),
            words: Vec::new(),
            config: BrainConfig::default(),
            responder: None,
        }
    }

    /// Set mock chat model replies.
    pub fn with_mock_responses(mut self, responses: Vec<String>) -> Self {
        self.responses = responses;
        self
    }

    /// Compute replies from the request once the queued ones are used up.
    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&[ChatMessage]) -> String + Send + Sync + 'static,
    {
        self.responder = Some(Box::new(responder));
        self
    }

    /// Words the embedder knows, one axis each.
    pub fn with_vocabulary(mut self, words: &[&str]) -> Self {
        self.words = words.iter().map(|w| w.to_string()).collect();
        self
    }

    pub fn with_interaction_period(mut self, period: u64) -> Self {
        self.config.interaction_period = period;
        self
    }

    pub fn with_context_window(mut self, tokens: u64) -> Self {
        self.config.context_window = tokens;
        self
    }

    pub fn with_maintenance_timeout_secs(mut self, secs: u64) -> Self {
        self.config.maintenance_timeout_secs = secs;
        self
    }

    pub fn with_shutdown_timeout_secs(mut self, secs: u64) -> Self {
        self.config.shutdown_timeout_secs = secs;
        self
    }

    /// Build the harness, creating the temp storage directory.
    pub async fn build(self) -> Result<BrainHarness, HippoError> {
        let temp_dir = tempfile::TempDir::new()?;
        let mut config = self.config;
        config.storage_dir = temp_dir.path().display().to_string();

        let mut chat = if self.responses.is_empty() {
            MockChatModel::new()
        } else {
            MockChatModel::with_responses(self.responses)
        };
        if let Some(responder) = self.responder {
            chat = chat.with_responder(responder);
        }
        let chat = Arc::new(chat);

        let words: Vec<&str> = self.words.iter().map(String::as_str).collect();
        let model: Arc<dyn ChatModel> = chat.clone();
        let brain = Brain::open(&config, word_embedder(&words), model).await?;
        let adapter = BrainAdapter::new(brain.clone());

        Ok(BrainHarness {
            brain,
            adapter,
            chat,
            config,
            temp_dir,
        })
    }
}

/// A brain under test with its mock collaborators.
pub struct BrainHarness {
    pub brain: Brain,
    pub adapter: BrainAdapter,
    pub chat: Arc<MockChatModel>,
    pub config: BrainConfig,
    temp_dir: tempfile::TempDir,
}

impl BrainHarness {
    pub fn builder() -> BrainHarnessBuilder {
        BrainHarnessBuilder::new()
    }

    /// Root of the brain's storage.
    pub fn storage_dir(&self) -> &Path {
        self.temp_dir.path()
    }
}
