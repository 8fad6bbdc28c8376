// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Memory domain types shared by the store, the maintenance pipeline, and retrieval.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Well-known metadata keys.
pub mod keys {
    pub const ID: &str = "id";
    pub const TYPE: &str = "type";
    pub const CREATED_AT: &str = "created_at";
    pub const ACCESS_COUNT: &str = "access_count";
    pub const LAST_ACCESSED: &str = "last_accessed";
    pub const CONFIDENCE: &str = "confidence";
    pub const CATEGORY: &str = "category";
    pub const SOURCE: &str = "source";
    pub const SOURCE_TURN: &str = "source_turn";
    pub const SUBTYPE: &str = "subtype";
}

/// Kind of long-term memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryType {
    /// Atomic, durable statement about the user or the world.
    Fact,
    /// Condensed narrative of a session segment or a consolidation.
    Summary,
    /// Self-critique about how the assistant handled a session.
    Reflection,
}

impl MemoryType {
    /// Convert to string for metadata storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::Fact => "fact",
            MemoryType::Summary => "summary",
            MemoryType::Reflection => "reflection",
        }
    }

    /// Parse from a metadata value. Unknown values yield `None`.
    pub fn from_str_value(s: &str) -> Option<Self> {
        match s {
            "fact" => Some(MemoryType::Fact),
            "summary" => Some(MemoryType::Summary),
            "reflection" => Some(MemoryType::Reflection),
            _ => None,
        }
    }
}

/// Origin of a fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactSource {
    /// Extracted directly from a conversation.
    Conversation,
    /// Lifted out of a stored summary during compaction.
    SummaryPromotion,
}

impl FactSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FactSource::Conversation => "conversation",
            FactSource::SummaryPromotion => "summary_promotion",
        }
    }
}

/// Free-form string metadata attached to a memory item.
///
/// Values are kept as strings. Typed accessors parse defensively: a malformed
/// value is logged and treated as zero rather than failing the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, String>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata for a new item of `kind` created at `now`.
    pub fn for_type(kind: MemoryType, now: DateTime<Utc>) -> Self {
        let stamp = now.to_rfc3339();
        Self::new()
            .with(keys::TYPE, kind.as_str())
            .with(keys::CREATED_AT, stamp.clone())
            .with(keys::ACCESS_COUNT, "0")
            .with(keys::LAST_ACCESSED, stamp)
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    /// True when every key/value pair of `filter` is present here.
    pub fn matches(&self, filter: &Metadata) -> bool {
        filter
            .0
            .iter()
            .all(|(k, v)| self.0.get(k).is_some_and(|mine| mine == v))
    }

    /// Overlays every pair of `other` onto this map.
    pub fn merge(&mut self, other: &Metadata) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }

    pub fn memory_type(&self) -> Option<MemoryType> {
        self.get(keys::TYPE).and_then(MemoryType::from_str_value)
    }

    /// Parsed `confidence`, or `None` when the key is absent.
    pub fn confidence(&self) -> Option<f64> {
        let raw = self.get(keys::CONFIDENCE)?;
        if raw.is_empty() {
            return None;
        }
        Some(raw.trim().parse::<f64>().unwrap_or_else(|_| {
            tracing::warn!(value = raw, "malformed confidence metadata, treating as 0");
            0.0
        }))
    }

    pub fn access_count(&self) -> u64 {
        match self.get(keys::ACCESS_COUNT) {
            None => 0,
            Some(raw) => raw.trim().parse::<u64>().unwrap_or_else(|_| {
                tracing::warn!(value = raw, "malformed access_count metadata, treating as 0");
                0
            }),
        }
    }

    /// Parsed `created_at`. Unparseable timestamps yield `None`.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.get(keys::CREATED_AT)?;
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A stored long-term memory.
#[derive(Debug, Clone)]
pub struct MemoryItem {
    pub id: String,
    pub content: String,
    pub metadata: Metadata,
    /// L2-normalized embedding of `content`.
    pub vector: Vec<f32>,
}

impl MemoryItem {
    pub fn memory_type(&self) -> Option<MemoryType> {
        self.metadata.memory_type()
    }
}

/// A memory with its similarity to a query.
#[derive(Debug, Clone)]
pub struct ScoredItem {
    pub item: MemoryItem,
    /// Cosine similarity in `[-1, 1]`.
    pub similarity: f32,
}

impl ScoredItem {
    /// Cosine distance, `1 - similarity`.
    pub fn distance(&self) -> f32 {
        1.0 - self.similarity
    }
}

/// A fact as returned by the extraction and promotion prompts.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractedFact {
    pub fact: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub confidence: f64,
    /// Turn index the model attributed the fact to. Models emit numbers or strings.
    #[serde(default)]
    pub source_turn: Option<serde_json::Value>,
}

impl ExtractedFact {
    pub fn source_turn_string(&self) -> Option<String> {
        match self.source_turn.as_ref()? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// One group reported by the deduplication prompt.
#[derive(Debug, Clone, Deserialize)]
pub struct DuplicateGroup {
    #[serde(default)]
    pub primary_id: String,
    #[serde(default)]
    pub duplicate_ids: Vec<String>,
}

/// Convert f32 vector to bytes for SQLite BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Convert SQLite BLOB back to f32 vector. Trailing partial chunks are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Cosine similarity of two L2-normalized vectors, i.e. their dot product.
///
/// Vectors of different length have no meaningful similarity; callers
/// filter those out before scoring.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Scales `v` to unit length in place. The zero vector is left untouched.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
