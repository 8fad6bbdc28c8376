// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Global compaction over the long-term store.
//!
//! Runs on one snapshot of the collection, in a fixed order: dedupe facts,
//! consolidate summaries, clean up weak or stale items, then promote facts
//! out of summaries. Each step logs its own failure and the pass moves on;
//! only timeout or cancellation stops the remaining steps.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use hippo_core::types::ChatMessage;
use hippo_core::{ChatModel, HippoError};
use tracing::{debug, info, warn};

use crate::extractor::parse_json_array;
use crate::maintenance::{CompactionReport, MaintenanceContext, is_abort};
use crate::prompts::{PromptKind, PromptLibrary};
use crate::store::VectorStore;
use crate::types::{
    DuplicateGroup, ExtractedFact, FactSource, MemoryItem, MemoryType, Metadata, keys,
};

/// Deduplication runs only when there are more facts than this.
pub const DEDUPE_MIN_FACTS: usize = 10;
/// Consolidation runs only when there are more summaries than this.
pub const CONSOLIDATE_MIN_SUMMARIES: usize = 5;
pub const CONSOLIDATE_WINDOW: usize = 5;
/// Facts below this confidence are removed by cleanup.
pub const CLEANUP_MIN_CONFIDENCE: f64 = 0.5;
/// Unused items older than this are removed by cleanup.
pub const STALE_AFTER_DAYS: i64 = 30;
/// Summaries considered for promotion per pass.
pub const PROMOTE_MAX_SUMMARIES: usize = 3;
pub const PROMOTE_MIN_CONFIDENCE: f64 = 0.8;
/// A candidate closer than this to an existing fact is a duplicate.
pub const PROMOTE_MIN_DISTANCE: f32 = 0.15;

const DEDUPER_SYSTEM: &str = "You are a careful librarian who merges duplicate notes.";
const CONSOLIDATOR_SYSTEM: &str = "You are a meticulous note-taker who merges summaries without losing detail.";
const PROMOTER_SYSTEM: &str = "You are an analyst who lifts durable facts out of summaries.";

/// Why cleanup removed an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupCause {
    LowConfidence,
    Stale,
}

/// Decide whether cleanup should remove `item` at time `now`.
///
/// Facts with a confidence below [`CLEANUP_MIN_CONFIDENCE`] go first. Any item
/// never accessed and older than [`STALE_AFTER_DAYS`] goes next. Items without
/// a parseable `created_at` are never considered stale.
pub fn cleanup_verdict(item: &MemoryItem, now: DateTime<Utc>) -> Option<CleanupCause> {
    let md = &item.metadata;
    if md.memory_type() == Some(MemoryType::Fact)
        && md.confidence().is_some_and(|c| c < CLEANUP_MIN_CONFIDENCE)
    {
        return Some(CleanupCause::LowConfidence);
    }
    if md.access_count() == 0
        && md
            .created_at()
            .is_some_and(|created| now - created > ChronoDuration::days(STALE_AFTER_DAYS))
    {
        return Some(CleanupCause::Stale);
    }
    None
}

/// Runs the compaction phase of a maintenance pass.
pub struct Compactor {
    store: Arc<VectorStore>,
    prompts: Arc<PromptLibrary>,
    chat: Arc<dyn ChatModel>,
}

impl Compactor {
    pub fn new(store: Arc<VectorStore>, prompts: Arc<PromptLibrary>, chat: Arc<dyn ChatModel>) -> Self {
        Self {
            store,
            prompts,
            chat,
        }
    }

    /// Run every compaction step. Returns `Err` only when the pass was
    /// cancelled or ran out of time; the report reflects work done so far.
    pub async fn compact(&self, ctx: &MaintenanceContext, report: &mut CompactionReport) -> Result<(), HippoError> {
        let snapshot = self.store.list_all();
        let facts: Vec<&MemoryItem> = snapshot
            .iter()
            .filter(|i| i.memory_type() == Some(MemoryType::Fact))
            .collect();
        let summaries: Vec<&MemoryItem> = snapshot
            .iter()
            .filter(|i| i.memory_type() == Some(MemoryType::Summary))
            .collect();
        debug!(
            items = snapshot.len(),
            facts = facts.len(),
            summaries = summaries.len(),
            "compaction snapshot"
        );

        let mut deleted: HashSet<String> = HashSet::new();

        if facts.len() > DEDUPE_MIN_FACTS {
            match self.dedupe(ctx, &facts, &mut deleted).await {
                Ok(n) => report.duplicates_removed = n,
                Err(e) if is_abort(&e) => return Err(e),
                Err(e) => step_failed("dedupe", &e),
            }
        }

        if summaries.len() > CONSOLIDATE_MIN_SUMMARIES {
            if let Err(e) = self.consolidate(ctx, &summaries, &mut deleted, report).await {
                if is_abort(&e) {
                    return Err(e);
                }
                step_failed("consolidate", &e);
            }
        }

        let cleaned = self.cleanup(&snapshot, &mut deleted, report).await;

        // Promotion skips summaries cleanup just removed.
        let candidates: Vec<&MemoryItem> = summaries
            .iter()
            .copied()
            .filter(|s| !cleaned.contains(&s.id))
            .take(PROMOTE_MAX_SUMMARIES)
            .collect();
        if !candidates.is_empty() {
            match self.promote(ctx, &candidates).await {
                Ok(n) => report.facts_promoted = n,
                Err(e) if is_abort(&e) => return Err(e),
                Err(e) => step_failed("promote", &e),
            }
        }

        Ok(())
    }

    async fn dedupe(
        &self,
        ctx: &MaintenanceContext,
        facts: &[&MemoryItem],
        deleted: &mut HashSet<String>,
    ) -> Result<usize, HippoError> {
        let list: String = facts
            .iter()
            .map(|f| format!("[{}]: {}\n", f.id, f.content))
            .collect();
        let Some(prompt) = self.prompts.render(PromptKind::DeduplicateFacts, &list).await else {
            return Ok(0);
        };
        let response = ctx
            .generate(
                self.chat.as_ref(),
                &[ChatMessage::system(DEDUPER_SYSTEM), ChatMessage::user(prompt)],
            )
            .await?;
        let groups: Vec<DuplicateGroup> =
            parse_json_array(&response, "deduplicate_facts").unwrap_or_default();

        let known: HashSet<&str> = facts.iter().map(|f| f.id.as_str()).collect();
        let mut removed = 0;
        for group in groups {
            for dup in group.duplicate_ids {
                if dup == group.primary_id || deleted.contains(&dup) {
                    continue;
                }
                if !known.contains(dup.as_str()) {
                    debug!(id = %dup, "deduplicator named an unknown id, ignoring");
                    continue;
                }
                match self.store.delete(&dup).await {
                    Ok(_) => {
                        crate::metrics::record_memory_deleted("duplicate");
                        deleted.insert(dup);
                        removed += 1;
                    }
                    Err(e) => warn!(id = %dup, error = %e, "failed to delete duplicate fact"),
                }
            }
        }
        if removed > 0 {
            info!(removed, "removed duplicate facts");
        }
        Ok(removed)
    }

    async fn consolidate(
        &self,
        ctx: &MaintenanceContext,
        summaries: &[&MemoryItem],
        deleted: &mut HashSet<String>,
        report: &mut CompactionReport,
    ) -> Result<(), HippoError> {
        for window in summaries.chunks(CONSOLIDATE_WINDOW) {
            if window.len() < 2 {
                continue;
            }
            let list: String = window.iter().map(|s| format!("- {}\n", s.content)).collect();
            let Some(prompt) = self
                .prompts
                .render(PromptKind::ConsolidateSummaries, &list)
                .await
            else {
                return Ok(());
            };

            let merged = match ctx
                .generate(
                    self.chat.as_ref(),
                    &[ChatMessage::system(CONSOLIDATOR_SYSTEM), ChatMessage::user(prompt)],
                )
                .await
            {
                Ok(text) => text,
                Err(e) if is_abort(&e) => return Err(e),
                Err(e) => {
                    step_failed("consolidate", &e);
                    continue;
                }
            };
            let merged = merged.trim();
            if merged.is_empty() {
                warn!("consolidation returned an empty summary, keeping originals");
                continue;
            }

            let metadata =
                Metadata::for_type(MemoryType::Summary, Utc::now()).with(keys::SUBTYPE, "consolidated");
            if let Err(e) = self.store.add(merged, metadata).await {
                warn!(error = %e, "failed to store consolidated summary, keeping originals");
                continue;
            }
            crate::metrics::record_memory_added(MemoryType::Summary);
            report.consolidated_added += 1;

            for summary in window {
                match self.store.delete(&summary.id).await {
                    Ok(_) => {
                        crate::metrics::record_memory_deleted("consolidated");
                        deleted.insert(summary.id.clone());
                        report.summaries_consolidated += 1;
                    }
                    Err(e) => warn!(id = %summary.id, error = %e, "failed to delete consolidated summary"),
                }
            }
        }
        Ok(())
    }

    /// Returns the ids cleanup removed.
    async fn cleanup(
        &self,
        snapshot: &[MemoryItem],
        deleted: &mut HashSet<String>,
        report: &mut CompactionReport,
    ) -> HashSet<String> {
        let now = Utc::now();
        let mut cleaned = HashSet::new();
        for item in snapshot {
            if item.id.is_empty() || deleted.contains(&item.id) {
                continue;
            }
            let Some(cause) = cleanup_verdict(item, now) else {
                continue;
            };
            match self.store.delete(&item.id).await {
                Ok(_) => {
                    let label = match cause {
                        CleanupCause::LowConfidence => {
                            report.low_confidence_removed += 1;
                            "low_confidence"
                        }
                        CleanupCause::Stale => {
                            report.stale_removed += 1;
                            "stale"
                        }
                    };
                    crate::metrics::record_memory_deleted(label);
                    debug!(id = %item.id, cause = label, "cleaned up memory");
                    deleted.insert(item.id.clone());
                    cleaned.insert(item.id.clone());
                }
                Err(e) => warn!(id = %item.id, error = %e, "cleanup delete failed"),
            }
        }
        cleaned
    }

    async fn promote(&self, ctx: &MaintenanceContext, summaries: &[&MemoryItem]) -> Result<usize, HippoError> {
        let fact_filter = Metadata::new().with(keys::TYPE, MemoryType::Fact.as_str());
        let mut promoted = 0;

        for summary in summaries {
            let Some(prompt) = self
                .prompts
                .render(PromptKind::PromoteFacts, &summary.content)
                .await
            else {
                return Ok(promoted);
            };
            let response = match ctx
                .generate(
                    self.chat.as_ref(),
                    &[ChatMessage::system(PROMOTER_SYSTEM), ChatMessage::user(prompt)],
                )
                .await
            {
                Ok(text) => text,
                Err(e) if is_abort(&e) => return Err(e),
                Err(e) => {
                    step_failed("promote", &e);
                    continue;
                }
            };

            let candidates: Vec<ExtractedFact> =
                parse_json_array(&response, "promote_facts").unwrap_or_default();
            for candidate in candidates {
                let text = candidate.fact.trim();
                if text.is_empty() || candidate.confidence < PROMOTE_MIN_CONFIDENCE {
                    continue;
                }
                match self.store.search(text, 1, &fact_filter).await {
                    Ok(hits) => {
                        if let Some(nearest) = hits.first() {
                            if nearest.distance() < PROMOTE_MIN_DISTANCE {
                                debug!(fact = text, existing = %nearest.item.id, "promotion candidate already known");
                                continue;
                            }
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, fact = text, "similarity check failed, skipping candidate");
                        continue;
                    }
                }

                let metadata = Metadata::for_type(MemoryType::Fact, Utc::now())
                    .with(keys::CATEGORY, candidate.category.clone())
                    .with(keys::SOURCE, FactSource::SummaryPromotion.as_str())
                    .with(keys::CONFIDENCE, format!("{:.2}", candidate.confidence));
                match self.store.add(text, metadata).await {
                    Ok(_) => {
                        crate::metrics::record_memory_added(MemoryType::Fact);
                        promoted += 1;
                    }
                    Err(e) => warn!(error = %e, fact = text, "failed to store promoted fact"),
                }
            }
        }
        if promoted > 0 {
            info!(promoted, "promoted facts from summaries");
        }
        Ok(promoted)
    }
}

fn step_failed(step: &'static str, err: &HippoError) {
    crate::metrics::record_llm_error(step);
    warn!(step, error = %err, "compaction step failed, continuing");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::StaticEmbedder;
    use hippo_core::Embedder;
    use hippo_test_utils::MockChatModel;
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    struct Fixture {
        compactor: Compactor,
        store: Arc<VectorStore>,
        chat: Arc<MockChatModel>,
        prompts: Arc<PromptLibrary>,
        _dir: tempfile::TempDir,
    }

    async fn fixture(chat: MockChatModel) -> Fixture {
        let vocab = HashMap::from([
            ("alpha".to_string(), vec![1.0, 0.0, 0.0, 0.0]),
            ("beta".to_string(), vec![0.0, 1.0, 0.0, 0.0]),
            ("gamma".to_string(), vec![0.0, 0.0, 1.0, 0.0]),
            ("sun".to_string(), vec![0.0, 0.0, 0.0, 1.0]),
        ]);
        let embedder: Arc<dyn Embedder> = Arc::new(StaticEmbedder::from_vocabulary(4, vocab).unwrap());
        let store = Arc::new(VectorStore::open_in_memory(embedder).await.unwrap());
        let dir = tempfile::tempdir().unwrap();
        let prompts = Arc::new(PromptLibrary::new(dir.path().join("brain")));
        prompts.sync_templates(None).await.unwrap();
        let chat = Arc::new(chat);
        Fixture {
            compactor: Compactor::new(store.clone(), prompts.clone(), chat.clone()),
            store,
            chat,
            prompts,
            _dir: dir,
        }
    }

    fn ctx() -> MaintenanceContext {
        MaintenanceContext::new(CancellationToken::new(), Duration::from_secs(60))
    }

    fn system_prompt(msgs: &[ChatMessage]) -> &str {
        msgs.first().map(|m| m.content.as_str()).unwrap_or_default()
    }

    async fn add_summaries(store: &VectorStore, n: usize) {
        for i in 0..n {
            store
                .add(
                    &format!("sun day {i}"),
                    Metadata::for_type(MemoryType::Summary, Utc::now()).with(keys::ID, format!("s{i}")),
                )
                .await
                .unwrap();
        }
    }

    fn summaries(store: &VectorStore) -> Vec<MemoryItem> {
        store
            .list_all()
            .into_iter()
            .filter(|i| i.memory_type() == Some(MemoryType::Summary))
            .collect()
    }

    #[tokio::test]
    async fn summaries_are_consolidated_in_windows_of_five() {
        let f = fixture(MockChatModel::new().with_responder(|msgs| {
            if system_prompt(msgs) == CONSOLIDATOR_SYSTEM {
                "merged sun days".to_string()
            } else {
                "[]".to_string()
            }
        }))
        .await;
        add_summaries(&f.store, 7).await;

        let mut report = CompactionReport::default();
        f.compactor.compact(&ctx(), &mut report).await.unwrap();

        assert_eq!(report.summaries_consolidated, 7);
        assert_eq!(report.consolidated_added, 2);
        let left = summaries(&f.store);
        assert_eq!(left.len(), 2);
        for s in &left {
            assert_eq!(s.content, "merged sun days");
            assert_eq!(s.metadata.get(keys::SUBTYPE), Some("consolidated"));
        }

        let requests = f.chat.requests().await;
        let windows: Vec<&Vec<ChatMessage>> = requests
            .iter()
            .filter(|r| system_prompt(r) == CONSOLIDATOR_SYSTEM)
            .collect();
        assert_eq!(windows.len(), 2);
        assert!(windows[0][1].content.contains("- sun day 4\n"));
        assert!(!windows[0][1].content.contains("sun day 5"));
        assert!(windows[1][1].content.contains("- sun day 6\n"));

        // Consolidated originals are still offered for promotion.
        let promoted: Vec<&Vec<ChatMessage>> = requests
            .iter()
            .filter(|r| system_prompt(r) == PROMOTER_SYSTEM)
            .collect();
        assert_eq!(promoted.len(), PROMOTE_MAX_SUMMARIES);
        assert!(promoted[0][1].content.contains("sun day 0"));
    }

    #[tokio::test]
    async fn single_summary_tail_window_is_left_alone() {
        let f = fixture(MockChatModel::new().with_responder(|msgs| {
            if system_prompt(msgs) == CONSOLIDATOR_SYSTEM {
                "merged".to_string()
            } else {
                "[]".to_string()
            }
        }))
        .await;
        add_summaries(&f.store, 6).await;

        let mut report = CompactionReport::default();
        f.compactor.compact(&ctx(), &mut report).await.unwrap();

        assert_eq!(report.summaries_consolidated, 5);
        assert_eq!(report.consolidated_added, 1);
        assert!(f.store.get("s5").is_some());
        assert!(f.store.get("s0").is_none());
    }

    #[tokio::test]
    async fn five_summaries_are_not_consolidated() {
        let f = fixture(MockChatModel::new().with_default("[]")).await;
        add_summaries(&f.store, 5).await;

        let mut report = CompactionReport::default();
        f.compactor.compact(&ctx(), &mut report).await.unwrap();

        assert_eq!(report.summaries_consolidated, 0);
        assert_eq!(summaries(&f.store).len(), 5);
    }

    #[tokio::test]
    async fn missing_consolidation_prompt_skips_the_step() {
        let f = fixture(MockChatModel::new().with_default("[]")).await;
        tokio::fs::remove_file(f.prompts.dir().join(PromptKind::ConsolidateSummaries.file_name()))
            .await
            .unwrap();
        add_summaries(&f.store, 7).await;

        let mut report = CompactionReport::default();
        f.compactor.compact(&ctx(), &mut report).await.unwrap();

        assert_eq!(report.summaries_consolidated, 0);
        assert_eq!(summaries(&f.store).len(), 7);
        let requests = f.chat.requests().await;
        assert!(requests.iter().all(|r| system_prompt(r) != CONSOLIDATOR_SYSTEM));
    }

    #[tokio::test]
    async fn promotion_adds_only_new_confident_facts() {
        let f = fixture(MockChatModel::new().with_responder(|msgs| {
            if system_prompt(msgs) == PROMOTER_SYSTEM {
                r#"[{"fact":"beta","category":"pref","confidence":0.9},
                    {"fact":"gamma","confidence":0.5},
                    {"fact":"alpha","confidence":0.95}]"#
                    .to_string()
            } else {
                "[]".to_string()
            }
        }))
        .await;
        f.store
            .add("alpha", Metadata::for_type(MemoryType::Fact, Utc::now()).with(keys::CONFIDENCE, "0.9"))
            .await
            .unwrap();
        f.store
            .add("sun summary", Metadata::for_type(MemoryType::Summary, Utc::now()))
            .await
            .unwrap();

        let mut report = CompactionReport::default();
        f.compactor.compact(&ctx(), &mut report).await.unwrap();

        assert_eq!(report.facts_promoted, 1);
        let facts: Vec<(String, Option<String>)> = f
            .store
            .list_all()
            .into_iter()
            .filter(|i| i.memory_type() == Some(MemoryType::Fact))
            .map(|i| (i.content.clone(), i.metadata.get(keys::SOURCE).map(str::to_string)))
            .collect();
        assert_eq!(
            facts,
            vec![
                ("alpha".to_string(), None),
                ("beta".to_string(), Some("summary_promotion".to_string())),
            ]
        );
    }

    #[tokio::test]
    async fn deduplicator_unknown_ids_are_ignored() {
        let f = fixture(MockChatModel::new().with_responder(|msgs| {
            if system_prompt(msgs) == DEDUPER_SYSTEM {
                r#"[{"primary_id":"f0","duplicate_ids":["f1","ghost","f0"]}]"#.to_string()
            } else {
                "[]".to_string()
            }
        }))
        .await;
        for i in 0..11 {
            f.store
                .add(
                    &format!("alpha {i}"),
                    Metadata::for_type(MemoryType::Fact, Utc::now()).with(keys::ID, format!("f{i}")),
                )
                .await
                .unwrap();
        }

        let mut report = CompactionReport::default();
        f.compactor.compact(&ctx(), &mut report).await.unwrap();

        assert_eq!(report.duplicates_removed, 1);
        assert!(f.store.get("f1").is_none());
        assert!(f.store.get("f0").is_some());
        assert_eq!(f.store.count(), 10);
    }

    #[tokio::test]
    async fn cancelled_pass_stops_compaction() {
        let f = fixture(MockChatModel::new().with_default("merged")).await;
        add_summaries(&f.store, 7).await;
        let token = CancellationToken::new();
        token.cancel();

        let mut report = CompactionReport::default();
        let ctx = MaintenanceContext::new(token, Duration::from_secs(60));
        assert!(f.compactor.compact(&ctx, &mut report).await.is_err());
        assert_eq!(summaries(&f.store).len(), 7);
    }

    fn item(kind: &str, md: Metadata) -> MemoryItem {
        MemoryItem {
            id: "x".into(),
            content: "c".into(),
            metadata: md.with(keys::TYPE, kind),
            vector: vec![],
        }
    }

    #[test]
    fn low_confidence_fact_is_removed() {
        let now = Utc::now();
        let md = Metadata::for_type(MemoryType::Fact, now).with(keys::CONFIDENCE, "0.40");
        assert_eq!(cleanup_verdict(&item("fact", md), now), Some(CleanupCause::LowConfidence));
    }

    #[test]
    fn missing_confidence_is_not_low() {
        let now = Utc::now();
        let md = Metadata::for_type(MemoryType::Fact, now);
        assert_eq!(cleanup_verdict(&item("fact", md), now), None);
    }

    #[test]
    fn malformed_confidence_counts_as_zero() {
        let now = Utc::now();
        let md = Metadata::for_type(MemoryType::Fact, now).with(keys::CONFIDENCE, "very");
        assert_eq!(cleanup_verdict(&item("fact", md), now), Some(CleanupCause::LowConfidence));
    }

    #[test]
    fn low_confidence_summary_is_kept() {
        let now = Utc::now();
        let md = Metadata::for_type(MemoryType::Summary, now).with(keys::CONFIDENCE, "0.1");
        assert_eq!(cleanup_verdict(&item("summary", md), now), None);
    }

    #[test]
    fn stale_unused_items_are_removed() {
        let now = Utc::now();
        let old = now - ChronoDuration::days(40);
        let md = Metadata::for_type(MemoryType::Reflection, old);
        assert_eq!(cleanup_verdict(&item("reflection", md), now), Some(CleanupCause::Stale));

        let accessed = Metadata::for_type(MemoryType::Reflection, old).with(keys::ACCESS_COUNT, "2");
        assert_eq!(cleanup_verdict(&item("reflection", accessed), now), None);

        let recent = Metadata::for_type(MemoryType::Reflection, now - ChronoDuration::days(29));
        assert_eq!(cleanup_verdict(&item("reflection", recent), now), None);
    }

    #[test]
    fn unparseable_created_at_is_never_stale() {
        let now = Utc::now();
        let md = Metadata::new().with(keys::CREATED_AT, "last tuesday");
        assert_eq!(cleanup_verdict(&item("summary", md), now), None);
    }
}
