// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter between a response engine and the [`Brain`].
//!
//! The engine pushes every turn message through [`BrainAdapter::on_turn_message`],
//! asks for a memory preamble before calling the model, and reports token
//! usage afterwards. The adapter also implements [`ConditionalProvider`] so
//! it can be registered with a [`hippo_context::ContextAssembler`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use hippo_context::{ConditionalProvider, inject_preamble};
use hippo_core::HippoError;
use hippo_core::types::ChatMessage;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::brain::Brain;

/// Response-engine shim over a [`Brain`]. Cheap to clone.
#[derive(Clone)]
pub struct BrainAdapter {
    brain: Brain,
    /// Per-session prompt of the turn being assembled.
    current_queries: Arc<RwLock<HashMap<String, String>>>,
}

impl BrainAdapter {
    pub fn new(brain: Brain) -> Self {
        Self {
            brain,
            current_queries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn brain(&self) -> &Brain {
        &self.brain
    }

    /// Record one message of the current turn.
    pub fn on_turn_message(&self, session_id: &str, message: ChatMessage) {
        self.brain.ingest(session_id, message);
    }

    /// Retrieved memories for `user_prompt` as a system message, if any.
    ///
    /// A cancelled `cancel` token, like a closed brain, yields `None`.
    pub async fn retrieve_preamble(
        &self,
        session_id: &str,
        user_prompt: &str,
        cancel: Option<&CancellationToken>,
    ) -> Option<ChatMessage> {
        let text = match self.brain.try_retrieve(user_prompt, cancel).await {
            Ok(text) => text,
            Err(e) => {
                debug!(session_id, error = %e, "no memory preamble");
                return None;
            }
        };
        if text.is_empty() {
            return None;
        }
        debug!(session_id, bytes = text.len(), "injecting memory preamble");
        Some(ChatMessage::system(text))
    }

    /// Insert the preamble for `user_prompt` into `messages`: after the
    /// leading system prompt, or first when there is none. Returns whether
    /// anything was inserted.
    pub async fn inject(
        &self,
        session_id: &str,
        user_prompt: &str,
        messages: &mut Vec<ChatMessage>,
        cancel: Option<&CancellationToken>,
    ) -> bool {
        match self.retrieve_preamble(session_id, user_prompt, cancel).await {
            Some(preamble) => {
                inject_preamble(messages, preamble);
                true
            }
            None => false,
        }
    }

    /// Forward the turn's token usage.
    pub fn note_usage(&self, tokens: u64) {
        self.brain.on_context_usage(tokens);
    }

    /// Shut the brain down.
    pub async fn close(&self) {
        self.brain.shutdown().await;
    }

    /// Set the prompt used by [`ConditionalProvider::provide_context`] for a session.
    pub async fn set_current_query(&self, session_id: &str, query: &str) {
        self.current_queries
            .write()
            .await
            .insert(session_id.to_string(), query.to_string());
    }

    pub async fn clear_current_query(&self, session_id: &str) {
        self.current_queries.write().await.remove(session_id);
    }

    async fn current_query(&self, session_id: &str) -> String {
        self.current_queries
            .read()
            .await
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ConditionalProvider for BrainAdapter {
    /// The memory preamble for the session's current query, or nothing.
    async fn provide_context(&self, session_id: &str) -> Result<Vec<ChatMessage>, HippoError> {
        let query = self.current_query(session_id).await;
        if query.is_empty() {
            return Ok(vec![]);
        }
        Ok(self
            .retrieve_preamble(session_id, &query, None)
            .await
            .into_iter()
            .collect())
    }
}
