// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! First-run setup for the static embedder vocabulary.
//!
//! Resolves where the vocabulary lives and, when it is missing and a
//! download URL is configured, fetches it once into the storage directory.

use std::path::{Path, PathBuf};

use hippo_core::HippoError;
use tracing::{info, warn};

/// Manages the static vocabulary file.
pub struct VocabularyManager {
    path: PathBuf,
}

impl VocabularyManager {
    /// `override_path` wins over the default `<storage_dir>/embeddings/static.msgpack`.
    pub fn new(storage_dir: &Path, override_path: Option<&str>) -> Self {
        let path = match override_path.filter(|p| !p.trim().is_empty()) {
            Some(p) => PathBuf::from(p),
            None => storage_dir.join("embeddings").join("static.msgpack"),
        };
        Self { path }
    }

    pub fn vocabulary_path(&self) -> &Path {
        &self.path
    }

    pub fn is_available(&self) -> bool {
        self.path.is_file()
    }

    /// Returns the vocabulary path if a usable file exists after this call.
    ///
    /// A failed download is logged and reported as `None` so the brain can
    /// still start with an empty vocabulary.
    pub async fn ensure_vocabulary(&self, url: Option<&str>) -> Result<Option<PathBuf>, HippoError> {
        if self.is_available() {
            return Ok(Some(self.path.clone()));
        }
        let Some(url) = url.filter(|u| !u.trim().is_empty()) else {
            return Ok(None);
        };

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        info!(url, "static vocabulary not found, downloading");
        let partial = self.path.with_extension("msgpack.part");
        match download_file(url, &partial).await {
            Ok(size) => {
                tokio::fs::rename(&partial, &self.path).await?;
                info!(path = %self.path.display(), size, "static vocabulary downloaded");
                Ok(Some(self.path.clone()))
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&partial).await;
                warn!(error = %e, url, "static vocabulary download failed");
                Ok(None)
            }
        }
    }
}

/// Download a file from a URL to a local path.
async fn download_file(url: &str, dest: &Path) -> Result<usize, HippoError> {
    let response = reqwest::get(url)
        .await
        .map_err(|e| HippoError::upstream(format!("failed to download {url}: {e}")))?;

    if !response.status().is_success() {
        return Err(HippoError::upstream(format!(
            "download failed with status {}: {url}",
            response.status()
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| HippoError::upstream(format!("failed to read body from {url}: {e}")))?;

    tokio::fs::write(dest, &bytes).await?;
    Ok(bytes.len())
}
