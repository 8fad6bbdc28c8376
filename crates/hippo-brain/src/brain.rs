// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Brain: owns the buffer, the vector store and the prompt library, and
//! decides when to turn buffered conversation into long-term memory.
//!
//! Retrieval and ingestion are on the chat hot path and never wait on
//! maintenance. Maintenance is single-flight: a trigger that finds a pass
//! already running is dropped, not queued.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use hippo_config::model::BrainConfig;
use hippo_core::types::ChatMessage;
use hippo_core::{ChatModel, Embedder, HippoError};
use serde::Serialize;
use strum::Display;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::buffer::ShortTermBuffer;
use crate::compaction::Compactor;
use crate::extractor::{MemoryExtractor, render_conversation};
use crate::maintenance::{
    MaintenanceContext, MaintenanceOutcome, MaintenanceReason, MaintenanceReport, is_abort,
};
use crate::metrics;
use crate::prompts::PromptLibrary;
use crate::retriever::Retriever;
use crate::store::VectorStore;
use crate::topology::{TOPOLOGY_DIR, TopologyAnalyzer, TopologyStore};
use crate::types::{MemoryItem, MemoryType};

/// Fraction of the context window that triggers maintenance.
pub const CONTEXT_USAGE_THRESHOLD: f64 = 0.60;

/// Prompt directory under the storage root.
pub const PROMPTS_DIR: &str = "brain";
/// Vector store directory under the storage root.
pub const VECTOR_DB_DIR: &str = "vector_db";

/// Lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BrainState {
    Idle,
    Maintaining,
    Closed,
}

/// Point-in-time counters for status output.
#[derive(Debug, Clone, Serialize)]
pub struct BrainStats {
    pub facts: usize,
    pub summaries: usize,
    pub reflections: usize,
    pub buffered_sessions: usize,
    pub buffered_messages: usize,
    pub interaction_count: u64,
    pub last_maintenance: Option<DateTime<Utc>>,
    pub state: BrainState,
}

struct BrainInner {
    context_window: u64,
    interaction_period: u64,
    maintenance_timeout: Duration,
    shutdown_timeout: Duration,

    store: Arc<VectorStore>,
    buffer: ShortTermBuffer,
    prompts: Arc<PromptLibrary>,
    retriever: Retriever,
    extractor: MemoryExtractor,
    topology: TopologyAnalyzer,
    compactor: Compactor,

    interactions: AtomicU64,
    maintenance: tokio::sync::Mutex<()>,
    maintaining: AtomicBool,
    closed: AtomicBool,
    last_maintenance: parking_lot::Mutex<Option<DateTime<Utc>>>,

    /// Stops the schedule loop once shutdown begins.
    stop: CancellationToken,
    /// Force-cancels in-flight passes when shutdown runs out of patience.
    abort: CancellationToken,
    /// Background maintenance and schedule tasks.
    tasks: TaskTracker,
}

/// Handle to a hierarchical memory. Cheap to clone.
#[derive(Clone)]
pub struct Brain {
    inner: Arc<BrainInner>,
}

impl Brain {
    /// Open the brain rooted at `config.storage_dir`.
    ///
    /// Creates `<storage_dir>/brain/` (filling in missing prompt templates)
    /// and `<storage_dir>/vector_db/`, then loads the stored collection.
    /// Reasoning graphs go to `<storage_dir>/topology/` once one is written.
    pub async fn open(
        config: &BrainConfig,
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatModel>,
    ) -> Result<Self, HippoError> {
        let root = config.storage_path();
        create_dir(&root).await?;

        let prompts = Arc::new(PromptLibrary::new(root.join(PROMPTS_DIR)));
        prompts
            .sync_templates(config.template_dir.as_deref().map(Path::new))
            .await?;

        let store = Arc::new(VectorStore::open(&root.join(VECTOR_DB_DIR), embedder).await?);
        metrics::set_store_items(store.count());
        info!(
            storage_dir = %root.display(),
            items = store.count(),
            "brain opened"
        );

        let graphs = TopologyStore::new(root.join(TOPOLOGY_DIR));
        Ok(Self::assemble(config, store, prompts, graphs, chat))
    }

    fn assemble(
        config: &BrainConfig,
        store: Arc<VectorStore>,
        prompts: Arc<PromptLibrary>,
        graphs: TopologyStore,
        chat: Arc<dyn ChatModel>,
    ) -> Self {
        let inner = BrainInner {
            context_window: config.context_window,
            interaction_period: config.interaction_period,
            maintenance_timeout: config.maintenance_timeout(),
            shutdown_timeout: config.shutdown_timeout(),
            retriever: Retriever::new(store.clone()),
            extractor: MemoryExtractor::new(store.clone(), prompts.clone(), chat.clone()),
            topology: TopologyAnalyzer::new(prompts.clone(), chat.clone(), graphs),
            compactor: Compactor::new(store.clone(), prompts.clone(), chat),
            store,
            buffer: ShortTermBuffer::new(),
            prompts,
            interactions: AtomicU64::new(0),
            maintenance: tokio::sync::Mutex::new(()),
            maintaining: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            last_maintenance: parking_lot::Mutex::new(None),
            stop: CancellationToken::new(),
            abort: CancellationToken::new(),
            tasks: TaskTracker::new(),
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Buffer one message for `session_id`.
    pub fn ingest(&self, session_id: &str, message: ChatMessage) {
        if self.is_closed() {
            debug!(session_id, "brain closed, dropping ingested message");
            return;
        }
        self.inner.buffer.push(session_id, message);
    }

    /// Retrieve memories relevant to `query` as preamble text.
    ///
    /// Never fails: a closed brain or a failed search yields an empty string.
    pub async fn retrieve(&self, query: &str) -> String {
        match self.try_retrieve(query, None).await {
            Ok(text) => text,
            Err(e) => {
                debug!(error = %e, "retrieval unavailable");
                String::new()
            }
        }
    }

    /// Like [`Brain::retrieve`], but reports a closed brain or a cancelled
    /// `cancel` token as `Unavailable`.
    pub async fn try_retrieve(
        &self,
        query: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<String, HippoError> {
        if self.is_closed() {
            return Err(HippoError::Unavailable("brain is closed".to_string()));
        }

        let n = self.inner.interactions.fetch_add(1, Ordering::SeqCst) + 1;
        let period = self.inner.interaction_period;
        if period > 0 && n % period == 0 {
            debug!(interactions = n, "interaction threshold reached");
            self.trigger_background(MaintenanceReason::InteractionThreshold);
        }

        let started = Instant::now();
        let text = match cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => {
                    return Err(HippoError::Unavailable("retrieval cancelled".to_string()));
                }
                text = self.inner.retriever.retrieve(query) => text,
            },
            None => self.inner.retriever.retrieve(query).await,
        };
        metrics::record_retrieve_duration(started.elapsed());
        Ok(text)
    }

    /// Report how many tokens the current chat turn uses.
    pub fn on_context_usage(&self, tokens: u64) {
        let window = self.inner.context_window;
        if window == 0 {
            return;
        }
        let usage = tokens as f64 / window as f64;
        if usage >= CONTEXT_USAGE_THRESHOLD {
            debug!(tokens, window, usage, "context usage high");
            self.trigger_background(MaintenanceReason::ContextUsageHigh);
        }
    }

    /// Run a maintenance pass now and wait for it.
    ///
    /// Returns [`MaintenanceOutcome::Skipped`] when another pass holds the lock.
    pub async fn trigger(&self, reason: MaintenanceReason) -> Result<MaintenanceOutcome, HippoError> {
        if self.is_closed() {
            return Err(HippoError::Unavailable("brain is closed".to_string()));
        }
        let Ok(_guard) = self.inner.maintenance.try_lock() else {
            info!(reason = %reason, "maintenance already running, trigger dropped");
            metrics::record_maintenance_skipped(reason);
            return Ok(MaintenanceOutcome::Skipped);
        };
        let report = self
            .run_pass(reason, self.inner.abort.child_token(), self.inner.maintenance_timeout)
            .await;
        Ok(MaintenanceOutcome::Ran(report))
    }

    /// Start a maintenance pass without waiting for it.
    pub fn trigger_background(&self, reason: MaintenanceReason) {
        if self.is_closed() {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(reason = %reason, "no async runtime, maintenance not started");
            return;
        };
        let brain = self.clone();
        self.inner.tasks.spawn_on(
            async move {
                if let Err(e) = brain.trigger(reason).await {
                    debug!(reason = %reason, error = %e, "background maintenance not run");
                }
            },
            &handle,
        );
    }

    /// Trigger maintenance every `every` until shutdown. A zero interval disables it.
    pub fn spawn_schedule(&self, every: Duration) {
        if every.is_zero() || self.is_closed() {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("no async runtime, scheduled maintenance disabled");
            return;
        };
        let brain = self.clone();
        let stop = self.inner.stop.clone();
        self.inner.tasks.spawn_on(
            async move {
                let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = stop.cancelled() => break,
                        _ = ticker.tick() => {
                            if let Err(e) = brain.trigger(MaintenanceReason::Scheduled).await {
                                debug!(error = %e, "scheduled maintenance not run");
                            }
                        }
                    }
                }
                debug!("maintenance schedule stopped");
            },
            &handle,
        );
        info!(every_secs = every.as_secs(), "scheduled maintenance enabled");
    }

    /// One full pass. The caller holds the maintenance lock.
    #[tracing::instrument(skip_all, fields(reason = %reason))]
    async fn run_pass(
        &self,
        reason: MaintenanceReason,
        cancel: CancellationToken,
        budget: Duration,
    ) -> MaintenanceReport {
        let inner = &self.inner;
        inner.interactions.store(0, Ordering::SeqCst);
        inner.maintaining.store(true, Ordering::SeqCst);
        metrics::record_maintenance_run(reason);
        info!("maintenance pass started");

        let started = Instant::now();
        let ctx = MaintenanceContext::new(cancel, budget);
        let mut report = MaintenanceReport::new(reason);

        let result = match self.assimilate(&ctx, &mut report).await {
            Ok(()) => inner.compactor.compact(&ctx, &mut report.compaction).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => *inner.last_maintenance.lock() = Some(Utc::now()),
            Err(e) => {
                warn!(error = %e, "maintenance pass aborted");
                report.aborted = Some(e.to_string());
            }
        }

        report.duration = started.elapsed();
        metrics::record_maintenance_duration(report.duration);
        metrics::set_store_items(inner.store.count());
        inner.maintaining.store(false, Ordering::SeqCst);
        info!(
            sessions = report.sessions_processed,
            facts = report.facts_added,
            reflections = report.reflections_added,
            topology_steps = report.topology_steps_added,
            summaries = report.summaries_added,
            compaction = ?report.compaction,
            elapsed_ms = report.duration.as_millis() as u64,
            completed = report.completed(),
            "maintenance pass finished"
        );
        report
    }

    /// Phase A: extract, reflect, map reasoning topology and summarize each
    /// buffered session.
    async fn assimilate(
        &self,
        ctx: &MaintenanceContext,
        report: &mut MaintenanceReport,
    ) -> Result<(), HippoError> {
        let inner = &self.inner;
        for session_id in inner.buffer.sessions() {
            ctx.check()?;
            let snapshot = inner.buffer.snapshot(&session_id);
            if snapshot.messages.is_empty() {
                continue;
            }
            debug!(session_id = %session_id, messages = snapshot.messages.len(), "assimilating session");
            report.sessions_processed += 1;
            let conversation = render_conversation(&snapshot.messages);

            match inner.extractor.extract_facts(ctx, &conversation).await {
                Ok(n) => report.facts_added += n,
                Err(e) => step_failed("extract", &session_id, e)?,
            }
            match inner.extractor.reflect(ctx, &conversation).await {
                Ok(stored) => report.reflections_added += usize::from(stored),
                Err(e) => step_failed("reflect", &session_id, e)?,
            }
            match inner.topology.analyze(ctx, &session_id, &conversation).await {
                Ok(n) => report.topology_steps_added += n,
                Err(e) => step_failed("topology", &session_id, e)?,
            }
            match inner.extractor.summarize(ctx, &conversation).await {
                Ok(true) => {
                    report.summaries_added += 1;
                    inner.buffer.release(&session_id, snapshot.high_water);
                }
                Ok(false) => {}
                Err(e) => step_failed("summarize", &session_id, e)?,
            }
        }
        Ok(())
    }

    /// Stop accepting work, finish or cancel in-flight maintenance, run a
    /// final pass, and close the store. Safe to call more than once.
    pub async fn shutdown(&self) {
        let inner = &self.inner;
        if inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("brain shutting down");
        inner.stop.cancel();
        inner.tasks.close();

        let grace = inner.shutdown_timeout;
        let waited = async {
            inner.tasks.wait().await;
            inner.maintenance.lock().await
        };
        let guard = match tokio::time::timeout(grace, waited).await {
            Ok(guard) => guard,
            Err(_) => {
                warn!(
                    timeout_secs = grace.as_secs(),
                    "in-flight maintenance did not finish, cancelling"
                );
                inner.abort.cancel();
                inner.tasks.wait().await;
                inner.maintenance.lock().await
            }
        };

        self.run_pass(MaintenanceReason::Shutdown, CancellationToken::new(), grace)
            .await;
        drop(guard);

        if let Err(e) = inner.store.close().await {
            warn!(error = %e, "failed to close vector store");
        }
        info!("brain closed");
    }

    /// Seed long-term memory with facts from the persona documents.
    pub async fn ingest_persona(&self, human: &str, soul: &str) -> Result<usize, HippoError> {
        if self.is_closed() {
            return Err(HippoError::Unavailable("brain is closed".to_string()));
        }
        let ctx = MaintenanceContext::new(self.inner.abort.child_token(), self.inner.maintenance_timeout);
        let stored = self.inner.extractor.ingest_persona(&ctx, human, soul).await?;
        info!(facts = stored, "persona ingested");
        Ok(stored)
    }

    /// Every stored memory, with `metadata.id` filled in.
    pub fn memories(&self) -> Vec<MemoryItem> {
        self.inner.store.list_all()
    }

    /// Delete one memory. Returns whether it existed.
    pub async fn forget(&self, id: &str) -> Result<bool, HippoError> {
        if self.is_closed() {
            return Err(HippoError::Unavailable("brain is closed".to_string()));
        }
        let removed = self.inner.store.delete(id).await?;
        if removed {
            metrics::record_memory_deleted("manual");
            metrics::set_store_items(self.inner.store.count());
        }
        Ok(removed)
    }

    /// Buffered messages for one session.
    pub fn buffered(&self, session_id: &str) -> Vec<ChatMessage> {
        self.inner.buffer.get(session_id)
    }

    pub fn interaction_count(&self) -> u64 {
        self.inner.interactions.load(Ordering::SeqCst)
    }

    pub fn last_maintenance(&self) -> Option<DateTime<Utc>> {
        *self.inner.last_maintenance.lock()
    }

    pub fn state(&self) -> BrainState {
        if self.is_closed() {
            BrainState::Closed
        } else if self.inner.maintaining.load(Ordering::SeqCst) {
            BrainState::Maintaining
        } else {
            BrainState::Idle
        }
    }

    pub fn prompts(&self) -> &PromptLibrary {
        &self.inner.prompts
    }

    pub fn store(&self) -> &Arc<VectorStore> {
        &self.inner.store
    }

    pub fn stats(&self) -> BrainStats {
        let inner = &self.inner;
        BrainStats {
            facts: inner.store.count_by_type(MemoryType::Fact),
            summaries: inner.store.count_by_type(MemoryType::Summary),
            reflections: inner.store.count_by_type(MemoryType::Reflection),
            buffered_sessions: inner.buffer.sessions().len(),
            buffered_messages: inner.buffer.message_count(),
            interaction_count: self.interaction_count(),
            last_maintenance: self.last_maintenance(),
            state: self.state(),
        }
    }
}

/// Log a failed Phase A step. Timeouts and cancellation end the pass.
fn step_failed(step: &str, session_id: &str, err: HippoError) -> Result<(), HippoError> {
    if is_abort(&err) {
        return Err(err);
    }
    warn!(step, session_id, error = %err, "maintenance step failed, continuing");
    metrics::record_llm_error(step);
    Ok(())
}

async fn create_dir(dir: &Path) -> Result<(), HippoError> {
    tokio::fs::create_dir_all(dir).await?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o755)).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::StaticEmbedder;
    use hippo_test_utils::MockChatModel;
    use tracing_test::traced_test;

    async fn open(dir: &Path, chat: Arc<MockChatModel>, tune: impl FnOnce(&mut BrainConfig)) -> Brain {
        let mut config = BrainConfig {
            storage_dir: dir.display().to_string(),
            ..Default::default()
        };
        tune(&mut config);
        let embedder: Arc<dyn Embedder> = Arc::new(StaticEmbedder::empty(8));
        Brain::open(&config, embedder, chat).await.unwrap()
    }

    async fn wait_for(brain: &Brain, state: BrainState) {
        for _ in 0..200 {
            if brain.state() == state {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("brain never reached {state}");
    }

    #[tokio::test]
    async fn open_creates_layout() {
        let dir = tempfile::tempdir().unwrap();
        let brain = open(dir.path(), Arc::new(MockChatModel::new()), |_| {}).await;
        assert!(dir.path().join("brain").join("extract.prompt").exists());
        assert!(dir.path().join("vector_db").join(crate::store::DB_FILE).exists());
        assert_eq!(brain.state(), BrainState::Idle);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    #[traced_test]
    async fn overlapping_trigger_is_dropped_and_logged() {
        let dir = tempfile::tempdir().unwrap();
        let chat = Arc::new(MockChatModel::new().with_delay(Duration::from_millis(300)));
        let brain = open(dir.path(), chat, |_| {}).await;
        brain.ingest("s1", ChatMessage::user("hello there"));

        brain.trigger_background(MaintenanceReason::Manual);
        wait_for(&brain, BrainState::Maintaining).await;

        let outcome = brain.trigger(MaintenanceReason::Manual).await.unwrap();
        assert!(matches!(outcome, MaintenanceOutcome::Skipped));
        assert!(logs_contain("maintenance already running"));
        brain.shutdown().await;
    }

    #[tokio::test]
    async fn closed_brain_rejects_work() {
        let dir = tempfile::tempdir().unwrap();
        let brain = open(dir.path(), Arc::new(MockChatModel::new()), |_| {}).await;
        brain.shutdown().await;
        brain.shutdown().await;

        assert_eq!(brain.state(), BrainState::Closed);
        assert!(matches!(
            brain.trigger(MaintenanceReason::Manual).await,
            Err(HippoError::Unavailable(_))
        ));
        assert!(matches!(
            brain.try_retrieve("q", None).await,
            Err(HippoError::Unavailable(_))
        ));
        assert_eq!(brain.retrieve("q").await, "");
        brain.ingest("s", ChatMessage::user("late"));
        assert!(brain.buffered("s").is_empty());
    }

    #[tokio::test]
    async fn cancelled_retrieve_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let brain = open(dir.path(), Arc::new(MockChatModel::new()), |_| {}).await;
        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(
            brain.try_retrieve("q", Some(&token)).await,
            Err(HippoError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn summarized_session_is_released() {
        let dir = tempfile::tempdir().unwrap();
        let chat = Arc::new(MockChatModel::with_responses(vec![
            "[]".to_string(),
            "The user said hello.".to_string(),
            "Greeting exchanged.".to_string(),
        ]));
        let brain = open(dir.path(), chat.clone(), |_| {}).await;
        brain.ingest("s1", ChatMessage::user("hello"));
        brain.ingest("s1", ChatMessage::assistant("hi!"));

        let MaintenanceOutcome::Ran(report) = brain.trigger(MaintenanceReason::Manual).await.unwrap() else {
            panic!("pass was skipped");
        };
        assert!(report.completed());
        assert_eq!(report.sessions_processed, 1);
        assert_eq!(report.reflections_added, 1);
        assert_eq!(report.summaries_added, 1);
        assert!(brain.buffered("s1").is_empty());
        assert!(brain.last_maintenance().is_some());

        let stats = brain.stats();
        assert_eq!(stats.summaries, 1);
        assert_eq!(stats.reflections, 1);
        assert_eq!(stats.buffered_sessions, 0);
        // extract, reflect, summarize, then promotion over the new summary
        assert_eq!(chat.request_count().await, 4);
    }

    #[tokio::test]
    async fn topology_runs_between_reflect_and_summarize() {
        let dir = tempfile::tempdir().unwrap();
        let chat = MockChatModel::with_responses(vec![
            "[]".to_string(),
            "The user wanted a fix.".to_string(),
            r#"{"steps":[{"id":1,"content":"spot bug"},{"id":2,"content":"patch"}],
                "bonds":[{"from":1,"to":2,"type":"deep"}]}"#
                .to_string(),
            "Bug fixed.".to_string(),
        ])
        .with_default("[]");
        let chat = Arc::new(chat);
        let brain = open(dir.path(), chat.clone(), |_| {}).await;
        std::fs::write(
            dir.path().join("brain").join("topology_extraction.prompt"),
            "TOPOLOGY\n{agent_cot_trace + final_answer}",
        )
        .unwrap();
        brain.ingest("s1", ChatMessage::user("it crashes"));
        brain.ingest("s1", ChatMessage::assistant("patched"));

        let MaintenanceOutcome::Ran(report) = brain.trigger(MaintenanceReason::Manual).await.unwrap() else {
            panic!("pass was skipped");
        };
        assert!(report.completed());
        assert_eq!(report.topology_steps_added, 2);
        assert_eq!(report.summaries_added, 1);

        let requests = chat.requests().await;
        assert!(requests[2][0].content.starts_with("TOPOLOGY\nuser: it crashes"));
        let graph = TopologyStore::new(dir.path().join(TOPOLOGY_DIR))
            .load("s1")
            .await
            .unwrap();
        assert_eq!(graph.steps.len(), 2);
        assert_eq!(graph.edges.len(), 1);
    }

    #[tokio::test]
    async fn failed_summary_keeps_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let chat = Arc::new(MockChatModel::new());
        chat.add_response("[]").await;
        chat.add_response("reflection").await;
        chat.add_error("upstream down").await;
        let brain = open(dir.path(), chat, |_| {}).await;
        brain.ingest("s1", ChatMessage::user("remember this"));

        let MaintenanceOutcome::Ran(report) = brain.trigger(MaintenanceReason::Manual).await.unwrap() else {
            panic!("pass was skipped");
        };
        assert!(report.completed());
        assert_eq!(report.summaries_added, 0);
        assert_eq!(brain.buffered("s1").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pass_aborts_at_deadline() {
        let dir = tempfile::tempdir().unwrap();
        let chat = Arc::new(MockChatModel::new().with_delay(Duration::from_secs(120)));
        let brain = open(dir.path(), chat, |c| c.maintenance_timeout_secs = 60).await;
        brain.ingest("s1", ChatMessage::user("slow"));

        let MaintenanceOutcome::Ran(report) = brain.trigger(MaintenanceReason::Manual).await.unwrap() else {
            panic!("pass was skipped");
        };
        assert!(!report.completed());
        assert!(brain.last_maintenance().is_none());
        assert_eq!(brain.buffered("s1").len(), 1);
        assert_eq!(brain.state(), BrainState::Idle);
    }

    #[tokio::test]
    async fn context_window_zero_never_triggers() {
        let dir = tempfile::tempdir().unwrap();
        let chat = Arc::new(MockChatModel::new());
        let brain = open(dir.path(), chat.clone(), |c| c.context_window = 0).await;
        brain.ingest("s1", ChatMessage::user("hello"));
        brain.on_context_usage(u64::MAX);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(chat.request_count().await, 0);
        assert_eq!(brain.buffered("s1").len(), 1);
    }

    #[tokio::test]
    async fn persona_facts_are_stored() {
        let dir = tempfile::tempdir().unwrap();
        let chat = Arc::new(MockChatModel::new());
        chat.add_response(r#"[{"fact":"Human lives in Lisbon","category":"location","confidence":0.9}]"#)
            .await;
        let brain = open(dir.path(), chat.clone(), |_| {}).await;

        assert_eq!(brain.ingest_persona("Lives in Lisbon.", "Be kind.").await.unwrap(), 1);
        assert_eq!(brain.ingest_persona("", " ").await.unwrap(), 0);
        assert_eq!(chat.request_count().await, 1);
        assert_eq!(brain.stats().facts, 1);
    }

    #[tokio::test]
    async fn forget_removes_memory() {
        let dir = tempfile::tempdir().unwrap();
        let chat = Arc::new(MockChatModel::new());
        let brain = open(dir.path(), chat, |_| {}).await;
        let id = brain
            .store()
            .add("note", crate::types::Metadata::for_type(MemoryType::Fact, Utc::now()))
            .await
            .unwrap();
        assert!(brain.forget(&id).await.unwrap());
        assert!(!brain.forget(&id).await.unwrap());
        assert!(brain.memories().is_empty());
    }
}
