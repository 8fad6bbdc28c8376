// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite-backed vector store with an in-memory similarity index.
//!
//! Rows live in a single `memories` table (embedding as little-endian f32
//! BLOB, metadata as JSON text). The full collection is mirrored in memory
//! so searches never touch SQLite. Writes go to disk first and are applied
//! to the index under the same writer lock, so a failed write leaves both
//! untouched.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use hippo_core::{Embedder, HippoError};
use parking_lot::RwLock;
use tokio_rusqlite::Connection;
use tracing::{debug, warn};

use crate::types::{
    Metadata, MemoryItem, MemoryType, ScoredItem, blob_to_vec, cosine_similarity, keys,
    vec_to_blob,
};

/// File name of the collection inside the vector DB directory.
pub const DB_FILE: &str = "memories.db";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS memories (
    seq       INTEGER PRIMARY KEY AUTOINCREMENT,
    id        TEXT NOT NULL UNIQUE,
    content   TEXT NOT NULL,
    metadata  TEXT NOT NULL,
    embedding BLOB NOT NULL
);";

fn storage_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> HippoError {
    HippoError::Storage {
        source: Box::new(e),
    }
}

/// Persistent collection of [`MemoryItem`]s.
pub struct VectorStore {
    conn: Connection,
    embedder: Arc<dyn Embedder>,
    index: RwLock<Vec<MemoryItem>>,
    /// Serializes DB writes together with their index update.
    writer: tokio::sync::Mutex<()>,
    closed: AtomicBool,
}

impl VectorStore {
    /// Open (or create) the collection under `dir`.
    ///
    /// The directory is created with mode 0755. Rows that fail to decode are
    /// logged and left out of the index.
    pub async fn open(dir: &Path, embedder: Arc<dyn Embedder>) -> Result<Self, HippoError> {
        create_dir(dir).await?;
        let path = dir.join(DB_FILE);
        let conn = Connection::open(&path)
            .await
            .map_err(|e| HippoError::Storage {
                source: Box::new(e),
            })?;
        let store = Self::init(conn, embedder).await?;
        debug!(path = %path.display(), items = store.count(), "vector store opened");
        Ok(store)
    }

    /// A non-persistent store for tests and dry runs.
    pub async fn open_in_memory(embedder: Arc<dyn Embedder>) -> Result<Self, HippoError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| HippoError::Storage {
                source: Box::new(e),
            })?;
        Self::init(conn, embedder).await
    }

    async fn init(conn: Connection, embedder: Arc<dyn Embedder>) -> Result<Self, HippoError> {
        let rows = conn
            .call(|conn| -> Result<Vec<(String, String, String, Vec<u8>)>, rusqlite::Error> {
                conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL;")?;
                conn.execute_batch(SCHEMA)?;
                let mut stmt = conn.prepare(
                    "SELECT id, content, metadata, embedding FROM memories ORDER BY seq",
                )?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(storage_err)?;

        let index = rows
            .into_iter()
            .filter_map(|(id, content, metadata, blob)| match decode_row(id, content, &metadata, &blob) {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!(error = %e, "skipping unreadable memory row");
                    None
                }
            })
            .collect();

        Ok(Self {
            conn,
            embedder,
            index: RwLock::new(index),
            writer: tokio::sync::Mutex::new(()),
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<(), HippoError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(HippoError::Unavailable("vector store is closed".to_string()))
        } else {
            Ok(())
        }
    }

    /// Embed `content` and persist it. Returns the item id.
    ///
    /// `metadata.id` is honored when present and removed from the stored
    /// metadata. `metadata.type` is required. Missing bookkeeping keys
    /// (`created_at`, `access_count`, `last_accessed`) are filled in.
    pub async fn add(&self, content: &str, mut metadata: Metadata) -> Result<String, HippoError> {
        self.ensure_open()?;

        match metadata.get(keys::TYPE) {
            None => {
                return Err(HippoError::InvalidArgument(
                    "metadata.type is required".to_string(),
                ));
            }
            Some(t) if MemoryType::from_str_value(t).is_none() => {
                return Err(HippoError::InvalidArgument(format!(
                    "unknown memory type `{t}`"
                )));
            }
            Some(_) => {}
        }

        let id = metadata
            .remove(keys::ID)
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let now = Utc::now().to_rfc3339();
        if !metadata.contains_key(keys::CREATED_AT) {
            metadata.insert(keys::CREATED_AT, now.clone());
        }
        if !metadata.contains_key(keys::ACCESS_COUNT) {
            metadata.insert(keys::ACCESS_COUNT, "0");
        }
        if !metadata.contains_key(keys::LAST_ACCESSED) {
            metadata.insert(keys::LAST_ACCESSED, now);
        }

        let vector = self
            .embedder
            .embed_one(content)
            .await
            .map_err(|e| HippoError::InvalidArgument(format!("failed to embed content: {e}")))?;

        let metadata_json = serde_json::to_string(&metadata)
            .map_err(|e| HippoError::Internal(format!("failed to encode metadata: {e}")))?;

        let _guard = self.writer.lock().await;
        if self.index.read().iter().any(|item| item.id == id) {
            return Err(HippoError::InvalidArgument(format!(
                "memory `{id}` already exists"
            )));
        }

        let row_id = id.clone();
        let row_content = content.to_string();
        let blob = vec_to_blob(&vector);
        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT INTO memories (id, content, metadata, embedding) VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![row_id, row_content, metadata_json, blob],
                )?;
                Ok(())
            })
            .await
            .map_err(storage_err)?;

        self.index.write().push(MemoryItem {
            id: id.clone(),
            content: content.to_string(),
            metadata,
            vector,
        });
        Ok(id)
    }

    /// Top-`k` items by cosine similarity whose metadata matches `filter`.
    ///
    /// Ties keep insertion order. Items whose vector length differs from the
    /// query's are not comparable and are skipped.
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        filter: &Metadata,
    ) -> Result<Vec<ScoredItem>, HippoError> {
        self.ensure_open()?;
        if k == 0 || self.index.read().is_empty() {
            return Ok(Vec::new());
        }

        let query_vec = self.embedder.embed_one(query).await?;

        let mut scored: Vec<ScoredItem> = {
            let index = self.index.read();
            index
                .iter()
                .filter(|item| item.metadata.matches(filter))
                .filter(|item| item.vector.len() == query_vec.len())
                .map(|item| ScoredItem {
                    similarity: cosine_similarity(&query_vec, &item.vector),
                    item: item.clone(),
                })
                .collect()
        };

        // sort_by is stable, so equal scores stay in insertion order.
        scored.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        scored.truncate(k);
        Ok(scored)
    }

    /// Every item, in insertion order, with `metadata.id` filled in.
    pub fn list_all(&self) -> Vec<MemoryItem> {
        self.index
            .read()
            .iter()
            .map(|item| {
                let mut item = item.clone();
                item.metadata.insert(keys::ID, item.id.clone());
                item
            })
            .collect()
    }

    /// Look up one item by id.
    pub fn get(&self, id: &str) -> Option<MemoryItem> {
        self.index.read().iter().find(|item| item.id == id).cloned()
    }

    /// Remove an item. Absent ids are not an error. Returns whether a row was removed.
    pub async fn delete(&self, id: &str) -> Result<bool, HippoError> {
        self.ensure_open()?;
        let _guard = self.writer.lock().await;

        let row_id = id.to_string();
        let removed = self
            .conn
            .call(move |conn| -> Result<usize, rusqlite::Error> {
                conn.execute("DELETE FROM memories WHERE id = ?1", rusqlite::params![row_id])
            })
            .await
            .map_err(storage_err)?;

        self.index.write().retain(|item| item.id != id);
        Ok(removed > 0)
    }

    /// Overlay `patch` onto an item's metadata and persist it.
    ///
    /// Returns `false` when the item no longer exists. `id` and `type` in the
    /// patch are ignored.
    pub async fn update_metadata(&self, id: &str, patch: &Metadata) -> Result<bool, HippoError> {
        self.ensure_open()?;
        let _guard = self.writer.lock().await;

        let Some(mut metadata) = self.get(id).map(|item| item.metadata) else {
            return Ok(false);
        };
        for (k, v) in patch.iter() {
            if k != keys::ID && k != keys::TYPE {
                metadata.insert(k.clone(), v.clone());
            }
        }
        self.write_metadata(id, metadata).await?;
        Ok(true)
    }

    /// Record one access: increment `access_count` and stamp `last_accessed`.
    ///
    /// The count is read from the index under the writer lock, so concurrent
    /// callers never lose an increment. Returns the new count, or `None` when
    /// the item no longer exists.
    pub async fn touch(&self, id: &str, at: DateTime<Utc>) -> Result<Option<u64>, HippoError> {
        self.ensure_open()?;
        let _guard = self.writer.lock().await;

        let Some(mut metadata) = self.get(id).map(|item| item.metadata) else {
            return Ok(None);
        };
        let count = metadata.access_count() + 1;
        metadata.insert(keys::ACCESS_COUNT, count.to_string());
        metadata.insert(keys::LAST_ACCESSED, at.to_rfc3339());
        self.write_metadata(id, metadata).await?;
        Ok(Some(count))
    }

    /// Persist `metadata` for `id` and mirror it into the index.
    /// Callers hold the writer lock.
    async fn write_metadata(&self, id: &str, metadata: Metadata) -> Result<(), HippoError> {
        let metadata_json = serde_json::to_string(&metadata)
            .map_err(|e| HippoError::Internal(format!("failed to encode metadata: {e}")))?;

        let row_id = id.to_string();
        self.conn
            .call(move |conn| -> Result<usize, rusqlite::Error> {
                conn.execute(
                    "UPDATE memories SET metadata = ?1 WHERE id = ?2",
                    rusqlite::params![metadata_json, row_id],
                )
            })
            .await
            .map_err(storage_err)?;

        let mut index = self.index.write();
        if let Some(item) = index.iter_mut().find(|item| item.id == id) {
            item.metadata = metadata;
        }
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.index.read().len()
    }

    /// Item counts per memory type.
    pub fn count_by_type(&self, kind: MemoryType) -> usize {
        self.index
            .read()
            .iter()
            .filter(|item| item.memory_type() == Some(kind))
            .count()
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Close the underlying connection. Later calls fail with `Unavailable`.
    pub async fn close(&self) -> Result<(), HippoError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let _guard = self.writer.lock().await;
        self.conn.clone().close().await.map_err(|e| HippoError::Storage {
            source: Box::new(e),
        })
    }
}

fn decode_row(
    id: String,
    content: String,
    metadata: &str,
    blob: &[u8],
) -> Result<MemoryItem, HippoError> {
    let metadata: Metadata = serde_json::from_str(metadata)
        .map_err(|e| HippoError::Corruption(format!("memory `{id}` metadata: {e}")))?;
    if blob.len() % 4 != 0 {
        return Err(HippoError::Corruption(format!(
            "memory `{id}` embedding has {} bytes",
            blob.len()
        )));
    }
    Ok(MemoryItem {
        id,
        content,
        metadata,
        vector: blob_to_vec(blob),
    })
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
