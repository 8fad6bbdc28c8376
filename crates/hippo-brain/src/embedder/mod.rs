// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedder selection.
//!
//! Every embedder is deterministic for a fixed configuration and produces
//! L2-normalized vectors of a fixed dimension. `embeddings.mode` picks one of
//! the built-in backends; unrecognized modes fall back to the closest family
//! name or, failing that, to the static embedder.

pub mod remote;
pub mod static_embedder;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use hippo_config::model::EmbeddingsConfig;
use hippo_core::{Embedder, HippoError};
use tracing::{info, warn};

use crate::vocabulary::VocabularyManager;

pub use remote::{RemoteEmbedder, WireFormat};
pub use static_embedder::{DEFAULT_STATIC_DIM, StaticEmbedder};

/// The configured embedding backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingMode {
    Static,
    OpenAi,
    Cohere,
    Mistral,
    Jina,
    Mixedbread,
    Ollama,
    OpenAiCompat,
}

const FAMILIES: &[(&str, EmbeddingMode)] = &[
    ("openai", EmbeddingMode::OpenAi),
    ("cohere", EmbeddingMode::Cohere),
    ("mistral", EmbeddingMode::Mistral),
    ("jina", EmbeddingMode::Jina),
    ("mixedbread", EmbeddingMode::Mixedbread),
    ("ollama", EmbeddingMode::Ollama),
];

impl EmbeddingMode {
    /// Resolve a configured mode string.
    ///
    /// Exact names win. Anything mentioning `compat` is treated as an
    /// OpenAI-compatible endpoint; otherwise a known family prefix is used.
    /// Everything else becomes [`EmbeddingMode::Static`].
    pub fn parse(mode: &str) -> Self {
        let normalized = mode.trim().to_lowercase().replace('-', "_");
        match normalized.as_str() {
            "static" | "" => return EmbeddingMode::Static,
            "openai_compat" => return EmbeddingMode::OpenAiCompat,
            _ => {}
        }
        if let Some((_, exact)) = FAMILIES.iter().find(|(name, _)| *name == normalized) {
            return *exact;
        }

        let resolved = if normalized.contains("compat") {
            Some(EmbeddingMode::OpenAiCompat)
        } else {
            FAMILIES
                .iter()
                .find(|(name, _)| normalized.starts_with(name))
                .map(|(_, m)| *m)
        };
        match resolved {
            Some(m) => {
                info!(mode, resolved = m.as_str(), "resolved embedding mode by family name");
                m
            }
            None => {
                warn!(mode, "unknown embedding mode, falling back to static");
                EmbeddingMode::Static
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingMode::Static => "static",
            EmbeddingMode::OpenAi => "openai",
            EmbeddingMode::Cohere => "cohere",
            EmbeddingMode::Mistral => "mistral",
            EmbeddingMode::Jina => "jina",
            EmbeddingMode::Mixedbread => "mixedbread",
            EmbeddingMode::Ollama => "ollama",
            EmbeddingMode::OpenAiCompat => "openai_compat",
        }
    }

    fn default_url(&self) -> Option<&'static str> {
        match self {
            EmbeddingMode::OpenAi => Some("https://api.openai.com/v1/embeddings"),
            EmbeddingMode::Cohere => Some("https://api.cohere.ai/v1/embed"),
            EmbeddingMode::Mistral => Some("https://api.mistral.ai/v1/embeddings"),
            EmbeddingMode::Jina => Some("https://api.jina.ai/v1/embeddings"),
            EmbeddingMode::Mixedbread => Some("https://api.mixedbread.ai/v1/embeddings"),
            EmbeddingMode::Ollama => Some("http://localhost:11434/api/embed"),
            EmbeddingMode::Static | EmbeddingMode::OpenAiCompat => None,
        }
    }

    fn default_model(&self) -> &'static str {
        match self {
            EmbeddingMode::OpenAi | EmbeddingMode::OpenAiCompat => "text-embedding-3-small",
            EmbeddingMode::Cohere => "embed-english-v3.0",
            EmbeddingMode::Mistral => "mistral-embed",
            EmbeddingMode::Jina => "jina-embeddings-v2-base-en",
            EmbeddingMode::Mixedbread => "mixedbread-ai/mxbai-embed-large-v1",
            EmbeddingMode::Ollama => "nomic-embed-text",
            EmbeddingMode::Static => "static",
        }
    }

    fn wire_format(&self) -> WireFormat {
        match self {
            EmbeddingMode::Cohere => WireFormat::Cohere,
            EmbeddingMode::Ollama => WireFormat::Ollama,
            _ => WireFormat::OpenAi,
        }
    }

    /// Environment variable consulted when `embeddings.api_key` is unset.
    fn api_key_env(&self) -> Option<&'static str> {
        match self {
            EmbeddingMode::OpenAi => Some("OPENAI_API_KEY"),
            EmbeddingMode::Cohere => Some("COHERE_API_KEY"),
            EmbeddingMode::Mistral => Some("MISTRAL_API_KEY"),
            EmbeddingMode::Jina => Some("JINA_API_KEY"),
            EmbeddingMode::Mixedbread => Some("MIXEDBREAD_API_KEY"),
            EmbeddingMode::Ollama | EmbeddingMode::OpenAiCompat | EmbeddingMode::Static => None,
        }
    }
}

/// Endpoint URL for a mode, honoring `base_url` overrides.
///
/// For `openai_compat` the base URL names the API root and `/embeddings` is
/// appended. For the hosted modes an override replaces the full URL.
fn endpoint_for(mode: EmbeddingMode, base_url: Option<&str>) -> Result<String, HippoError> {
    let base = base_url.map(str::trim).filter(|u| !u.is_empty());
    match (mode, base) {
        (EmbeddingMode::OpenAiCompat, Some(base)) => {
            Ok(format!("{}/embeddings", base.trim_end_matches('/')))
        }
        (EmbeddingMode::OpenAiCompat, None) => Err(HippoError::Config(
            "embeddings.base_url is required for openai_compat".to_string(),
        )),
        (_, Some(base)) => Ok(base.to_string()),
        (m, None) => m
            .default_url()
            .map(str::to_string)
            .ok_or_else(|| HippoError::Config(format!("no endpoint for mode {}", m.as_str()))),
    }
}

/// Build the embedder described by `config`.
///
/// The static vocabulary lives under `<storage_dir>/embeddings/` unless
/// `embeddings.static_path` says otherwise; it is downloaded from
/// `embeddings.static_url` when missing.
pub async fn build_embedder(
    config: &EmbeddingsConfig,
    storage_dir: &Path,
) -> Result<Arc<dyn Embedder>, HippoError> {
    let mode = EmbeddingMode::parse(&config.mode);

    if mode == EmbeddingMode::Static {
        let manager = VocabularyManager::new(storage_dir, config.static_path.as_deref());
        let embedder = match manager.ensure_vocabulary(config.static_url.as_deref()).await? {
            Some(path) => StaticEmbedder::load(&path).await?,
            None => {
                warn!(
                    path = %manager.vocabulary_path().display(),
                    "no static vocabulary available, every text embeds to the zero vector"
                );
                StaticEmbedder::empty(DEFAULT_STATIC_DIM)
            }
        };
        info!(dim = embedder.dimensions(), "static embedder ready");
        return Ok(Arc::new(embedder));
    }

    let api_key = config
        .api_key
        .clone()
        .filter(|k| !k.is_empty())
        .or_else(|| mode.api_key_env().and_then(|var| std::env::var(var).ok()));
    if api_key.is_none() && mode.api_key_env().is_some() {
        return Err(HippoError::Config(format!(
            "embeddings.api_key is required for mode `{}`",
            mode.as_str()
        )));
    }

    let model = config
        .model
        .clone()
        .unwrap_or_else(|| mode.default_model().to_string());
    let url = endpoint_for(mode, config.base_url.as_deref())?;

    let embedder = RemoteEmbedder::new(
        mode.as_str(),
        mode.wire_format(),
        url,
        model,
        api_key,
        Duration::from_secs(config.timeout_secs),
    )?;
    info!(mode = mode.as_str(), model = embedder.model(), "remote embedder ready");
    Ok(Arc::new(embedder))
}
