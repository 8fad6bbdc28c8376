// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prompt assembly for hippo.
//!
//! A request is built from three parts:
//! - the system prompt,
//! - conditional context from registered [`ConditionalProvider`]s,
//! - the conversation history.

pub mod conditional;
pub mod system_prompt;

use hippo_config::model::AgentConfig;
use hippo_core::types::{ChatMessage, Role};
use hippo_core::HippoError;

pub use conditional::ConditionalProvider;
pub use system_prompt::load_system_prompt;

/// Insert `preamble` right after the leading system message, or at the front
/// when the conversation has none.
pub fn inject_preamble(messages: &mut Vec<ChatMessage>, preamble: ChatMessage) {
    let at = match messages.first() {
        Some(first) if first.role == Role::System => 1,
        _ => 0,
    };
    messages.insert(at, preamble);
}

/// Builds the message list sent to the chat model for each turn.
pub struct ContextAssembler {
    system_prompt: String,
    conditional_providers: Vec<Box<dyn ConditionalProvider>>,
}

impl ContextAssembler {
    pub async fn new(agent_config: &AgentConfig) -> Self {
        Self::with_system_prompt(load_system_prompt(agent_config).await)
    }

    pub fn with_system_prompt(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            conditional_providers: Vec::new(),
        }
    }

    /// Registers a conditional context provider.
    ///
    /// Providers are called in registration order during assembly.
    pub fn add_conditional_provider(&mut self, provider: Box<dyn ConditionalProvider>) {
        self.conditional_providers.push(provider);
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// System prompt, then conditional context, then `history`.
    pub async fn assemble(
        &self,
        session_id: &str,
        history: &[ChatMessage],
    ) -> Result<Vec<ChatMessage>, HippoError> {
        let mut messages = vec![ChatMessage::system(self.system_prompt.clone())];
        for cp in &self.conditional_providers {
            messages.extend(cp.provide_context(session_id).await?);
        }
        messages.extend(history.iter().cloned());
        Ok(messages)
    }
}
