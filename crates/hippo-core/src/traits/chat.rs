// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat model trait consumed by the brain's maintenance pipeline and the shell.

use async_trait::async_trait;

use crate::error::HippoError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ChatCompletion, ChatMessage};

/// A language model that turns a message list into one assistant message.
///
/// The brain only ever sends short, self-contained conversations; no
/// tool definitions or streaming are involved.
#[async_trait]
pub trait ChatModel: PluginAdapter {
    /// Generates the next assistant message for `messages`.
    async fn generate(&self, messages: &[ChatMessage]) -> Result<ChatCompletion, HippoError>;
}
