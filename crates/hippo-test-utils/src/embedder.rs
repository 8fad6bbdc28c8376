// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic embedders for tests.

use std::collections::HashMap;
use std::sync::Arc;

use hippo_brain::StaticEmbedder;
use hippo_core::Embedder;

/// A static embedder where each word of `words` gets its own axis.
///
/// Texts sharing no listed word are orthogonal; unlisted words embed to zero.
/// With no words at all the embedder has one dimension and maps everything
/// to the zero vector.
pub fn word_embedder(words: &[&str]) -> Arc<dyn Embedder> {
    let dim = words.len().max(1);
    let vocab: HashMap<String, Vec<f64>> = words
        .iter()
        .enumerate()
        .map(|(i, w)| {
            let mut v = vec![0.0; dim];
            v[i] = 1.0;
            (w.to_lowercase(), v)
        })
        .collect();
    match StaticEmbedder::from_vocabulary(dim, vocab) {
        Ok(embedder) => Arc::new(embedder),
        // Unreachable: every vector above has length `dim`.
        Err(_) => Arc::new(StaticEmbedder::empty(dim)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn words_are_orthogonal() {
        let e = word_embedder(&["alpha", "beta"]);
        assert_eq!(e.dimensions(), 2);
        assert_eq!(e.embed_one("alpha").await.unwrap(), vec![1.0, 0.0]);
        assert_eq!(e.embed_one("BETA").await.unwrap(), vec![0.0, 1.0]);
        assert_eq!(e.embed_one("gamma").await.unwrap(), vec![0.0, 0.0]);
    }
}
