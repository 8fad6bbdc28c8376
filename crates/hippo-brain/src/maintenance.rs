// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared plumbing for a maintenance pass: trigger reasons, the per-pass
//! deadline and cancellation context, and the report handed back to callers.

use std::time::Duration;

use chrono::{DateTime, Utc};
use hippo_core::types::ChatMessage;
use hippo_core::{ChatModel, HippoError};
use strum::{Display, EnumString};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a maintenance pass was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum MaintenanceReason {
    InteractionThreshold,
    ContextUsageHigh,
    NewSession,
    Shutdown,
    Manual,
    Startup,
    Scheduled,
}

/// Deadline and cancellation shared by every LLM call in one pass.
#[derive(Debug, Clone)]
pub struct MaintenanceContext {
    cancel: CancellationToken,
    deadline: Instant,
    budget: Duration,
}

impl MaintenanceContext {
    pub fn new(cancel: CancellationToken, budget: Duration) -> Self {
        Self {
            cancel,
            deadline: Instant::now() + budget,
            budget,
        }
    }

    /// Fails once the pass has been cancelled or has run out of time.
    pub fn check(&self) -> Result<(), HippoError> {
        if self.cancel.is_cancelled() {
            return Err(HippoError::Cancelled);
        }
        if Instant::now() >= self.deadline {
            return Err(HippoError::Timeout {
                duration: self.budget,
            });
        }
        Ok(())
    }

    /// Run one chat completion within the pass budget and return its text.
    pub async fn generate(
        &self,
        chat: &dyn ChatModel,
        messages: &[ChatMessage],
    ) -> Result<String, HippoError> {
        self.check()?;
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(HippoError::Cancelled),
            res = tokio::time::timeout_at(self.deadline, chat.generate(messages)) => match res {
                Ok(completion) => Ok(completion?.message.content),
                Err(_) => Err(HippoError::Timeout { duration: self.budget }),
            },
        }
    }
}

/// True for errors that end the whole pass rather than a single step.
pub fn is_abort(err: &HippoError) -> bool {
    matches!(err, HippoError::Cancelled | HippoError::Timeout { .. })
}

/// Outcome of the compaction phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompactionReport {
    pub duplicates_removed: usize,
    pub summaries_consolidated: usize,
    pub consolidated_added: usize,
    pub low_confidence_removed: usize,
    pub stale_removed: usize,
    pub facts_promoted: usize,
}

/// Outcome of one maintenance pass.
#[derive(Debug, Clone)]
pub struct MaintenanceReport {
    pub reason: MaintenanceReason,
    pub started_at: DateTime<Utc>,
    pub sessions_processed: usize,
    pub facts_added: usize,
    pub reflections_added: usize,
    /// Reasoning steps added to session topology graphs.
    pub topology_steps_added: usize,
    pub summaries_added: usize,
    pub compaction: CompactionReport,
    /// Set when the pass stopped early on timeout or cancellation.
    pub aborted: Option<String>,
    pub duration: Duration,
}

impl MaintenanceReport {
    pub fn new(reason: MaintenanceReason) -> Self {
        Self {
            reason,
            started_at: Utc::now(),
            sessions_processed: 0,
            facts_added: 0,
            reflections_added: 0,
            topology_steps_added: 0,
            summaries_added: 0,
            compaction: CompactionReport::default(),
            aborted: None,
            duration: Duration::ZERO,
        }
    }

    pub fn completed(&self) -> bool {
        self.aborted.is_none()
    }
}

/// Result of asking for maintenance.
#[derive(Debug, Clone)]
pub enum MaintenanceOutcome {
    Ran(MaintenanceReport),
    /// Another pass held the lock; this trigger was dropped.
    Skipped,
}

#[cfg(test)]
mod tests {
    use super::*;
    use hippo_test_utils::MockChatModel;
    use std::str::FromStr;

    #[test]
    fn reasons_render_snake_case() {
        assert_eq!(MaintenanceReason::InteractionThreshold.to_string(), "interaction_threshold");
        assert_eq!(MaintenanceReason::ContextUsageHigh.to_string(), "context_usage_high");
        assert_eq!(
            MaintenanceReason::from_str("new_session").unwrap(),
            MaintenanceReason::NewSession
        );
    }

    #[tokio::test]
    async fn generate_returns_text() {
        let chat = MockChatModel::new();
        chat.add_response("hello").await;
        let ctx = MaintenanceContext::new(CancellationToken::new(), Duration::from_secs(5));
        let out = ctx.generate(&chat, &[ChatMessage::user("hi")]).await.unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn cancelled_context_refuses_calls() {
        let chat = MockChatModel::new();
        let token = CancellationToken::new();
        token.cancel();
        let ctx = MaintenanceContext::new(token, Duration::from_secs(5));
        let err = ctx.generate(&chat, &[ChatMessage::user("hi")]).await.unwrap_err();
        assert!(matches!(err, HippoError::Cancelled));
        assert!(is_abort(&err));
        assert_eq!(chat.request_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_call_hits_deadline() {
        let chat = MockChatModel::new().with_delay(Duration::from_secs(30));
        let ctx = MaintenanceContext::new(CancellationToken::new(), Duration::from_secs(1));
        let err = ctx.generate(&chat, &[ChatMessage::user("hi")]).await.unwrap_err();
        assert!(matches!(err, HippoError::Timeout { .. }));
        assert!(ctx.check().is_err());
    }

    #[test]
    fn upstream_errors_do_not_abort() {
        assert!(!is_abort(&HippoError::upstream("503")));
    }
}
