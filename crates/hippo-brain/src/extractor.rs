// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session assimilation: turns a buffered conversation into facts, a
//! reflection, and a summary.

use std::sync::Arc;

use chrono::Utc;
use hippo_core::types::{ChatMessage, Role};
use hippo_core::{ChatModel, HippoError};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::maintenance::MaintenanceContext;
use crate::prompts::{PromptKind, PromptLibrary};
use crate::store::VectorStore;
use crate::types::{ExtractedFact, FactSource, MemoryType, Metadata, keys};

/// Facts below this confidence are discarded at extraction time.
pub const EXTRACT_MIN_CONFIDENCE: f64 = 0.7;

const SUMMARIZER_SYSTEM: &str =
    "You are a meticulous note-taker who writes faithful, compact conversation summaries.";

/// Render messages as `role: content` lines for prompt filling.
pub fn render_conversation(messages: &[ChatMessage]) -> String {
    let mut out = String::new();
    for msg in messages {
        out.push_str(&msg.role.to_string());
        out.push_str(": ");
        if msg.role == Role::Tool {
            if let Some(id) = &msg.tool_call_id {
                out.push_str(&format!("[Tool ID: {id}] "));
            }
        }
        out.push_str(&msg.content);
        if !msg.tool_calls.is_empty() {
            match serde_json::to_string(&msg.tool_calls) {
                Ok(json) => out.push_str(&format!("\n[Tool Calls: {json}]")),
                Err(e) => warn!(error = %e, "failed to encode tool calls for prompt"),
            }
        }
        out.push('\n');
    }
    out
}

/// Parse a JSON array out of an LLM response.
///
/// Tries the whole response first, then the span from the first `[` to the
/// last `]`. Returns `None` (after logging) if neither parses.
pub fn parse_json_array<T: DeserializeOwned>(response: &str, step: &str) -> Option<Vec<T>> {
    let trimmed = response.trim();
    if let Ok(items) = serde_json::from_str::<Vec<T>>(trimmed) {
        return Some(items);
    }

    let span = match (trimmed.find('['), trimmed.rfind(']')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => {
            warn!(step, "LLM response contained no JSON array");
            debug!(step, response, "raw response");
            return None;
        }
    };
    match serde_json::from_str::<Vec<T>>(span) {
        Ok(items) => Some(items),
        Err(e) => {
            warn!(step, error = %e, "failed to parse LLM JSON response");
            debug!(step, response, "raw response");
            None
        }
    }
}

/// Parse a JSON object out of an LLM response, the same way as
/// [`parse_json_array`] but spanning the first `{` to the last `}`.
pub fn parse_json_object<T: DeserializeOwned>(response: &str, step: &str) -> Option<T> {
    let trimmed = response.trim();
    if let Ok(value) = serde_json::from_str::<T>(trimmed) {
        return Some(value);
    }

    let span = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => {
            warn!(step, "LLM response contained no JSON object");
            debug!(step, response, "raw response");
            return None;
        }
    };
    match serde_json::from_str::<T>(span) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(step, error = %e, "failed to parse LLM JSON response");
            debug!(step, response, "raw response");
            None
        }
    }
}

/// Runs the per-session maintenance steps.
pub struct MemoryExtractor {
    store: Arc<VectorStore>,
    prompts: Arc<PromptLibrary>,
    chat: Arc<dyn ChatModel>,
}

impl MemoryExtractor {
    pub fn new(store: Arc<VectorStore>, prompts: Arc<PromptLibrary>, chat: Arc<dyn ChatModel>) -> Self {
        Self {
            store,
            prompts,
            chat,
        }
    }

    /// Extract durable facts from `conversation` and store those with enough
    /// confidence. Returns how many were stored.
    pub async fn extract_facts(
        &self,
        ctx: &MaintenanceContext,
        conversation: &str,
    ) -> Result<usize, HippoError> {
        let Some(prompt) = self.prompts.render(PromptKind::Extract, conversation).await else {
            return Ok(0);
        };
        let response = ctx
            .generate(self.chat.as_ref(), &[ChatMessage::user(prompt)])
            .await?;
        let facts: Vec<ExtractedFact> = parse_json_array(&response, "extract").unwrap_or_default();

        let now = Utc::now();
        let mut stored = 0;
        for fact in facts {
            let text = fact.fact.trim();
            if text.is_empty() || fact.confidence < EXTRACT_MIN_CONFIDENCE {
                debug!(fact = text, confidence = fact.confidence, "discarding extracted fact");
                continue;
            }
            let mut metadata = Metadata::for_type(MemoryType::Fact, now)
                .with(keys::CATEGORY, fact.category.clone())
                .with(keys::CONFIDENCE, format!("{:.2}", fact.confidence))
                .with(keys::SOURCE, FactSource::Conversation.as_str());
            if let Some(turn) = fact.source_turn_string() {
                metadata.insert(keys::SOURCE_TURN, turn);
            }
            match self.store.add(text, metadata).await {
                Ok(id) => {
                    crate::metrics::record_memory_added(MemoryType::Fact);
                    debug!(id = %id, fact = text, "stored extracted fact");
                    stored += 1;
                }
                Err(e) => warn!(error = %e, fact = text, "failed to store extracted fact"),
            }
        }
        Ok(stored)
    }

    /// Ask the model to critique the session and store the reflection.
    pub async fn reflect(&self, ctx: &MaintenanceContext, conversation: &str) -> Result<bool, HippoError> {
        let Some(prompt) = self.prompts.render(PromptKind::Reflection, conversation).await else {
            return Ok(false);
        };
        let response = ctx
            .generate(self.chat.as_ref(), &[ChatMessage::user(prompt)])
            .await?;
        self.store_text(MemoryType::Reflection, &response).await
    }

    /// Summarize the session. Returns `true` only when a summary was stored.
    pub async fn summarize(&self, ctx: &MaintenanceContext, conversation: &str) -> Result<bool, HippoError> {
        let Some(prompt) = self.prompts.render(PromptKind::Compact, conversation).await else {
            return Ok(false);
        };
        let response = ctx
            .generate(
                self.chat.as_ref(),
                &[ChatMessage::system(SUMMARIZER_SYSTEM), ChatMessage::user(prompt)],
            )
            .await?;
        self.store_text(MemoryType::Summary, &response).await
    }

    /// Extract facts from the persona documents that seed a new brain.
    pub async fn ingest_persona(
        &self,
        ctx: &MaintenanceContext,
        human: &str,
        soul: &str,
    ) -> Result<usize, HippoError> {
        let mut messages = Vec::new();
        if !soul.trim().is_empty() {
            messages.push(ChatMessage::assistant(format!("My Soul Configuration:\n{soul}")));
        }
        if !human.trim().is_empty() {
            messages.push(ChatMessage::user(format!("Information about my human:\n{human}")));
        }
        if messages.is_empty() {
            return Ok(0);
        }
        self.extract_facts(ctx, &render_conversation(&messages)).await
    }

    async fn store_text(&self, kind: MemoryType, response: &str) -> Result<bool, HippoError> {
        let text = response.trim();
        if text.is_empty() {
            warn!(kind = kind.as_str(), "model returned an empty response, nothing stored");
            return Ok(false);
        }
        let id = self
            .store
            .add(text, Metadata::for_type(kind, Utc::now()))
            .await?;
        crate::metrics::record_memory_added(kind);
        debug!(id = %id, kind = kind.as_str(), "stored memory");
        Ok(true)
    }
}
