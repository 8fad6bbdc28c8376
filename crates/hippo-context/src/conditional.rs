// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conditional context: providers that contribute session-specific messages
//! (retrieved memories, for instance) between the system prompt and history.

use async_trait::async_trait;
use hippo_core::types::ChatMessage;
use hippo_core::HippoError;

/// A provider that supplies conditional context for a session.
///
/// The assembler calls every registered provider in registration order and
/// places their output after the system prompt and before the history.
#[async_trait]
pub trait ConditionalProvider: Send + Sync {
    /// Returns context messages to inject for the given session.
    ///
    /// Returns an empty vec if no conditional context applies.
    async fn provide_context(&self, session_id: &str) -> Result<Vec<ChatMessage>, HippoError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockConditionalProvider {
        messages: Vec<ChatMessage>,
    }

    #[async_trait]
    impl ConditionalProvider for MockConditionalProvider {
        async fn provide_context(&self, _session_id: &str) -> Result<Vec<ChatMessage>, HippoError> {
            Ok(self.messages.clone())
        }
    }

    #[tokio::test]
    async fn conditional_provider_returns_messages() {
        let provider = MockConditionalProvider {
            messages: vec![ChatMessage::system("User prefers concise answers.")],
        };

        let result = provider.provide_context("session-1").await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].content, "User prefers concise answers.");
    }

    #[tokio::test]
    async fn conditional_provider_empty() {
        let provider = MockConditionalProvider { messages: vec![] };
        let result = provider.provide_context("session-1").await.unwrap();
        assert!(result.is_empty());
    }
}
