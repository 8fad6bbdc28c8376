// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding adapter trait for vector embedding generation.

use async_trait::async_trait;

use crate::error::HippoError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{EmbeddingInput, EmbeddingOutput};

/// Adapter for turning text into fixed-length, L2-normalized vectors.
///
/// Implementations must be safe for concurrent use.
#[async_trait]
pub trait Embedder: PluginAdapter {
    /// Vector length produced by this embedder.
    fn dimensions(&self) -> usize;

    /// Generates one embedding per input text, in order.
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, HippoError>;

    /// Embeds a single text.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, HippoError> {
        let output = self
            .embed(EmbeddingInput {
                texts: vec![text.to_string()],
            })
            .await?;
        output
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| HippoError::Internal("embedding returned no results".to_string()))
    }
}
