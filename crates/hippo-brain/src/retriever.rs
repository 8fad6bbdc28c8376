// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query-time retrieval of stored memories.
//!
//! Runs one fact search and one summary search, bumps the access counters of
//! every hit, and renders the results as the preamble text injected into a
//! chat turn. Retrieval never calls the chat model.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::store::VectorStore;
use crate::types::{Metadata, MemoryType, ScoredItem, keys};

/// Facts returned per query.
pub const FACT_RESULTS: usize = 5;
/// Summaries returned per query.
pub const SUMMARY_RESULTS: usize = 3;

/// Header line of the rendered preamble.
pub const PREAMBLE_HEADER: &str = "### Retrieved Relevant Memories ###";

/// Vector retrieval over facts and summaries.
pub struct Retriever {
    store: Arc<VectorStore>,
}

impl Retriever {
    pub fn new(store: Arc<VectorStore>) -> Self {
        Self { store }
    }

    /// Facts first, then summaries. A failed search contributes nothing.
    pub async fn search(&self, query: &str) -> Vec<ScoredItem> {
        let facts = self.search_type(query, FACT_RESULTS, MemoryType::Fact);
        let summaries = self.search_type(query, SUMMARY_RESULTS, MemoryType::Summary);
        let (mut facts, summaries) = tokio::join!(facts, summaries);
        facts.extend(summaries);
        facts
    }

    async fn search_type(&self, query: &str, k: usize, kind: MemoryType) -> Vec<ScoredItem> {
        let filter = Metadata::new().with(keys::TYPE, kind.as_str());
        match self.store.search(query, k, &filter).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(memory_type = kind.as_str(), error = %e, "memory search failed");
                Vec::new()
            }
        }
    }

    /// Increment `access_count` and stamp `last_accessed` on every hit.
    ///
    /// The in-memory copies in `hits` are updated as well. Persisting is
    /// best-effort; failures are logged.
    pub async fn record_access(&self, hits: &mut [ScoredItem]) {
        let now = Utc::now();
        for hit in hits.iter_mut() {
            match self.store.touch(&hit.item.id, now).await {
                Ok(Some(count)) => {
                    hit.item.metadata.insert(keys::ACCESS_COUNT, count.to_string());
                    hit.item.metadata.insert(keys::LAST_ACCESSED, now.to_rfc3339());
                }
                Ok(None) => debug!(id = %hit.item.id, "memory removed before access was recorded"),
                Err(e) => debug!(id = %hit.item.id, error = %e, "could not persist access stats"),
            }
        }
    }

    /// Search, record access, and render. Empty when nothing matched.
    pub async fn retrieve(&self, query: &str) -> String {
        let mut hits = self.search(query).await;
        if hits.is_empty() {
            return String::new();
        }
        self.record_access(&mut hits).await;
        render_preamble(&hits)
    }
}

/// Render hits as the preamble block, one `- [TYPE] content` line each.
pub fn render_preamble(hits: &[ScoredItem]) -> String {
    if hits.is_empty() {
        return String::new();
    }
    let mut out = String::from(PREAMBLE_HEADER);
    out.push('\n');
    for hit in hits {
        let label = match hit.item.memory_type() {
            Some(MemoryType::Fact) => "FACT",
            Some(MemoryType::Summary) => "SUMMARY",
            Some(MemoryType::Reflection) => "REFLECTION",
            None => "MEMORY",
        };
        out.push_str(&format!("- [{label}] {}\n", hit.item.content));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::StaticEmbedder;
    use hippo_core::Embedder;
    use std::collections::HashMap;

    async fn store() -> Arc<VectorStore> {
        let vocab = HashMap::from([
            ("dog".to_string(), vec![1.0, 0.0, 0.0]),
            ("walk".to_string(), vec![0.9, 0.1, 0.0]),
            ("tea".to_string(), vec![0.0, 0.0, 1.0]),
        ]);
        let embedder: Arc<dyn Embedder> = Arc::new(StaticEmbedder::from_vocabulary(3, vocab).unwrap());
        Arc::new(VectorStore::open_in_memory(embedder).await.unwrap())
    }

    fn typed(kind: MemoryType) -> Metadata {
        Metadata::for_type(kind, Utc::now())
    }

    #[tokio::test]
    async fn empty_store_renders_nothing() {
        let retriever = Retriever::new(store().await);
        assert_eq!(retriever.retrieve("dog").await, "");
    }

    #[tokio::test]
    async fn facts_come_before_summaries() {
        let store = store().await;
        store.add("dog walk", typed(MemoryType::Summary)).await.unwrap();
        store.add("dog", typed(MemoryType::Fact)).await.unwrap();
        store.add("tea", typed(MemoryType::Reflection)).await.unwrap();

        let out = Retriever::new(store).retrieve("dog").await;
        assert_eq!(
            out,
            "### Retrieved Relevant Memories ###\n- [FACT] dog\n- [SUMMARY] dog walk\n"
        );
    }

    #[tokio::test]
    async fn result_counts_are_capped() {
        let store = store().await;
        for i in 0..8 {
            store.add(&format!("dog {i}"), typed(MemoryType::Fact)).await.unwrap();
            store.add(&format!("walk {i}"), typed(MemoryType::Summary)).await.unwrap();
        }
        let hits = Retriever::new(store).search("dog").await;
        let facts = hits.iter().filter(|h| h.item.memory_type() == Some(MemoryType::Fact)).count();
        let summaries = hits.len() - facts;
        assert_eq!(facts, FACT_RESULTS);
        assert_eq!(summaries, SUMMARY_RESULTS);
    }

    #[tokio::test]
    async fn access_is_recorded_and_persisted() {
        let store = store().await;
        let yesterday = Utc::now() - chrono::Duration::days(1);
        let id = store
            .add("dog", Metadata::for_type(MemoryType::Fact, yesterday))
            .await
            .unwrap();
        let retriever = Retriever::new(store.clone());

        retriever.retrieve("dog").await;
        retriever.retrieve("dog").await;

        let item = store.get(&id).unwrap();
        assert_eq!(item.metadata.access_count(), 2);
        assert_ne!(
            item.metadata.get(keys::LAST_ACCESSED),
            item.metadata.get(keys::CREATED_AT)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_retrievals_all_count() {
        let store = store().await;
        let id = store.add("tea", typed(MemoryType::Fact)).await.unwrap();
        let retriever = Arc::new(Retriever::new(store.clone()));

        let mut tasks = Vec::new();
        for _ in 0..20 {
            let r = retriever.clone();
            tasks.push(tokio::spawn(async move { r.retrieve("tea").await }));
        }
        for t in tasks {
            assert!(t.await.unwrap().contains("- [FACT] tea"));
        }

        assert_eq!(store.get(&id).unwrap().metadata.access_count(), 20);
    }

    #[tokio::test]
    async fn closed_store_degrades_to_empty() {
        let store = store().await;
        store.add("dog", typed(MemoryType::Fact)).await.unwrap();
        store.close().await.unwrap();
        assert_eq!(Retriever::new(store).retrieve("dog").await, "");
    }
}
