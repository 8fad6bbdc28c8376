// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the hippo memory engine.
//!
//! Provides the error type, chat message types, and the adapter traits
//! (chat models and embedders) that the brain is written against.

pub mod error;
pub mod traits;
pub mod types;

pub use error::HippoError;
pub use types::{
    AdapterType, ChatCompletion, ChatMessage, EmbeddingInput, EmbeddingOutput, HealthStatus, Role,
    TokenUsage, ToolCall,
};

pub use traits::{ChatModel, Embedder, PluginAdapter};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hippo_error_has_all_variants() {
        let _config = HippoError::Config("test".into());
        let _not_found = HippoError::NotFound { what: "id".into() };
        let _invalid = HippoError::InvalidArgument("missing type".into());
        let _unavailable = HippoError::Unavailable("closed".into());
        let _upstream = HippoError::Upstream {
            message: "test".into(),
            source: None,
        };
        let _storage = HippoError::Storage {
            source: Box::new(std::io::Error::other("test")),
        };
        let _corrupt = HippoError::Corruption("bad blob".into());
        let _timeout = HippoError::Timeout {
            duration: std::time::Duration::from_secs(30),
        };
        let _cancelled = HippoError::Cancelled;
        let _internal = HippoError::Internal("test".into());
    }

    #[test]
    fn upstream_errors_are_classified() {
        assert!(HippoError::upstream("503").is_upstream());
        assert!(
            HippoError::Timeout {
                duration: std::time::Duration::from_secs(1)
            }
            .is_upstream()
        );
        assert!(!HippoError::Cancelled.is_upstream());
    }

    #[test]
    fn adapter_type_round_trips_through_strings() {
        use std::str::FromStr;

        for variant in [AdapterType::Provider, AdapterType::Embedding, AdapterType::Storage] {
            let parsed = AdapterType::from_str(&variant.to_string()).expect("should parse back");
            assert_eq!(variant, parsed);
        }
    }

    #[test]
    fn role_uses_lowercase_names() {
        use std::str::FromStr;

        assert_eq!(Role::Assistant.to_string(), "assistant");
        assert_eq!(Role::from_str("tool").unwrap(), Role::Tool);
        assert_eq!(serde_json::to_string(&Role::System).unwrap(), "\"system\"");
    }

    #[test]
    fn empty_message_detection() {
        assert!(ChatMessage::assistant("").is_empty());
        assert!(!ChatMessage::user("hi").is_empty());

        let mut call_only = ChatMessage::assistant("");
        call_only.tool_calls.push(ToolCall {
            id: "call-1".into(),
            name: "search".into(),
            arguments: "{}".into(),
        });
        assert!(!call_only.is_empty());
    }

    #[test]
    fn tool_message_carries_call_id() {
        let msg = ChatMessage::tool("call-7", "42");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call-7"));
    }

    #[test]
    fn token_usage_total() {
        let usage = TokenUsage {
            input_tokens: 700,
            output_tokens: 50,
        };
        assert_eq!(usage.total(), 750);
    }

    #[test]
    fn all_traits_are_exported() {
        fn _assert_plugin_adapter<T: PluginAdapter>() {}
        fn _assert_chat_model<T: ChatModel>() {}
        fn _assert_embedder<T: Embedder>() {}
    }
}
