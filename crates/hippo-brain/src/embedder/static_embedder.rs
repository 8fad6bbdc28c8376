// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Offline embedder backed by a precomputed token vocabulary.
//!
//! The vocabulary is a MessagePack map `{dim, embeddings: {token: [f64]}}`.
//! A text embeds to the mean of its token vectors, L2-normalized. Tokens
//! missing from the vocabulary contribute zeros but still count toward the mean.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use hippo_core::types::{AdapterType, EmbeddingInput, EmbeddingOutput, HealthStatus};
use hippo_core::{Embedder, HippoError, PluginAdapter};
use serde::{Deserialize, Serialize};

use crate::types::l2_normalize;

/// Dimension used when no vocabulary is available.
pub const DEFAULT_STATIC_DIM: usize = 384;

/// On-disk vocabulary layout.
#[derive(Debug, Serialize, Deserialize)]
pub struct VocabularyFile {
    pub dim: usize,
    pub embeddings: HashMap<String, Vec<f64>>,
}

/// Deterministic, dependency-free embedder.
pub struct StaticEmbedder {
    vocab: HashMap<String, Vec<f32>>,
    dim: usize,
}

impl StaticEmbedder {
    /// Build from an in-memory vocabulary. Every vector must have length `dim`.
    pub fn from_vocabulary(
        dim: usize,
        embeddings: HashMap<String, Vec<f64>>,
    ) -> Result<Self, HippoError> {
        if dim == 0 {
            return Err(HippoError::Corruption(
                "static vocabulary declares dimension 0".to_string(),
            ));
        }
        let mut vocab = HashMap::with_capacity(embeddings.len());
        for (token, vector) in embeddings {
            if vector.len() != dim {
                return Err(HippoError::Corruption(format!(
                    "static vocabulary token `{token}` has {} values, expected {dim}",
                    vector.len()
                )));
            }
            vocab.insert(token, vector.into_iter().map(|x| x as f32).collect());
        }
        Ok(Self { vocab, dim })
    }

    /// Decode a MessagePack vocabulary.
    pub fn from_msgpack_bytes(bytes: &[u8]) -> Result<Self, HippoError> {
        let file: VocabularyFile = rmp_serde::from_slice(bytes)
            .map_err(|e| HippoError::Corruption(format!("invalid static vocabulary: {e}")))?;
        Self::from_vocabulary(file.dim, file.embeddings)
    }

    /// Read and decode a vocabulary file.
    pub async fn load(path: &Path) -> Result<Self, HippoError> {
        let bytes = tokio::fs::read(path).await?;
        let embedder = tokio::task::spawn_blocking(move || Self::from_msgpack_bytes(&bytes))
            .await
            .map_err(|e| HippoError::Internal(format!("vocabulary decode task failed: {e}")))??;
        tracing::debug!(
            path = %path.display(),
            tokens = embedder.vocab.len(),
            dim = embedder.dim,
            "loaded static vocabulary"
        );
        Ok(embedder)
    }

    /// An embedder with no vocabulary. Every text maps to the zero vector.
    pub fn empty(dim: usize) -> Self {
        Self {
            vocab: HashMap::new(),
            dim,
        }
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocab.len()
    }

    /// Embed one text synchronously.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut sum = vec![0.0_f32; self.dim];
        let lowered = text.to_lowercase();
        let mut tokens = 0usize;
        for token in lowered.split_whitespace() {
            tokens += 1;
            if let Some(v) = self.vocab.get(token) {
                for (acc, x) in sum.iter_mut().zip(v) {
                    *acc += x;
                }
            }
        }
        if tokens == 0 {
            return sum;
        }
        let n = tokens as f32;
        for x in sum.iter_mut() {
            *x /= n;
        }
        l2_normalize(&mut sum);
        sum
    }
}

#[async_trait]
impl PluginAdapter for StaticEmbedder {
    fn name(&self) -> &str {
        "static"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, HippoError> {
        if self.vocab.is_empty() {
            Ok(HealthStatus::Degraded("static vocabulary is empty".to_string()))
        } else {
            Ok(HealthStatus::Healthy)
        }
    }
}

#[async_trait]
impl Embedder for StaticEmbedder {
    fn dimensions(&self) -> usize {
        self.dim
    }

    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, HippoError> {
        let embeddings = input.texts.iter().map(|t| self.embed_text(t)).collect();
        Ok(EmbeddingOutput {
            embeddings,
            dimensions: self.dim,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tiny() -> StaticEmbedder {
        let mut vocab = HashMap::new();
        vocab.insert("dog".to_string(), vec![1.0, 0.0, 0.0]);
        vocab.insert("cat".to_string(), vec![0.0, 1.0, 0.0]);
        vocab.insert("max".to_string(), vec![0.0, 0.0, 2.0]);
        StaticEmbedder::from_vocabulary(3, vocab).unwrap()
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let e = tiny();
        assert_eq!(e.embed_text(""), vec![0.0; 3]);
        assert_eq!(e.embed_text("   \n\t"), vec![0.0; 3]);
    }

    #[test]
    fn unknown_only_text_is_zero_vector() {
        assert_eq!(tiny().embed_text("zebra giraffe"), vec![0.0; 3]);
    }

    #[test]
    fn tokens_are_lowercased() {
        let e = tiny();
        assert_eq!(e.embed_text("DOG"), e.embed_text("dog"));
    }

    #[test]
    fn output_is_unit_length() {
        let v = tiny().embed_text("dog max unknown");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn mismatched_vector_length_is_rejected() {
        let mut vocab = HashMap::new();
        vocab.insert("dog".to_string(), vec![1.0, 0.0]);
        let err = StaticEmbedder::from_vocabulary(3, vocab).err().unwrap();
        assert!(matches!(err, HippoError::Corruption(_)));
    }

    #[test]
    fn msgpack_vocabulary_decodes() {
        let file = VocabularyFile {
            dim: 2,
            embeddings: HashMap::from([("hi".to_string(), vec![0.5, 0.5])]),
        };
        let bytes = rmp_serde::to_vec_named(&file).unwrap();
        let e = StaticEmbedder::from_msgpack_bytes(&bytes).unwrap();
        assert_eq!(e.dimensions(), 2);
        assert_eq!(e.vocabulary_size(), 1);
    }

    #[test]
    fn garbage_bytes_are_corruption() {
        let err = StaticEmbedder::from_msgpack_bytes(b"not msgpack").err().unwrap();
        assert!(matches!(err, HippoError::Corruption(_)));
    }

    #[tokio::test]
    async fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("static.msgpack");
        let file = VocabularyFile {
            dim: 3,
            embeddings: HashMap::from([("dog".to_string(), vec![1.0, 0.0, 0.0])]),
        };
        std::fs::write(&path, rmp_serde::to_vec_named(&file).unwrap()).unwrap();
        let e = StaticEmbedder::load(&path).await.unwrap();
        assert_eq!(e.embed_text("dog"), vec![1.0, 0.0, 0.0]);
    }

    proptest! {
        #[test]
        fn norm_is_zero_or_one(text in "[a-z ]{0,40}") {
            let v = tiny().embed_text(&text);
            prop_assert_eq!(v.len(), 3);
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            prop_assert!(norm == 0.0 || (norm - 1.0).abs() < 1e-5);
        }

        #[test]
        fn embedding_is_deterministic(text in "\\PC{0,60}") {
            let e = tiny();
            prop_assert_eq!(e.embed_text(&text), e.embed_text(&text));
        }
    }
}
