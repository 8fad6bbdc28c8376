// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prompt templates for the maintenance pipeline.
//!
//! Templates live as plain files under `<storage_dir>/brain/` so they can be
//! edited without a rebuild. Missing files are populated on startup from a
//! configured template directory or from the built-in set. A missing file at
//! maintenance time skips the step that needs it.

use std::path::{Path, PathBuf};

use hippo_core::HippoError;
use tracing::{debug, info, warn};

/// Optional prefix prepended to every prompt when present.
pub const TOPOLOGY_INJECTION_FILE: &str = "topology_injection.prompt";

/// The prompts the maintenance pipeline uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    Extract,
    Reflection,
    Compact,
    PromoteFacts,
    DeduplicateFacts,
    ConsolidateSummaries,
    TopologyExtraction,
}

impl PromptKind {
    pub const ALL: [PromptKind; 7] = [
        PromptKind::Extract,
        PromptKind::Reflection,
        PromptKind::Compact,
        PromptKind::PromoteFacts,
        PromptKind::DeduplicateFacts,
        PromptKind::ConsolidateSummaries,
        PromptKind::TopologyExtraction,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            PromptKind::Extract => "extract.prompt",
            PromptKind::Reflection => "reflection.prompt",
            PromptKind::Compact => "compact.prompt",
            PromptKind::PromoteFacts => "promote_facts.prompt",
            PromptKind::DeduplicateFacts => "deduplicate_facts.prompt",
            PromptKind::ConsolidateSummaries => "consolidate_summaries.prompt",
            PromptKind::TopologyExtraction => "topology_extraction.prompt",
        }
    }

    /// Placeholders this prompt accepts, preferred first.
    pub fn placeholders(&self) -> &'static [&'static str] {
        match self {
            PromptKind::Extract => &["{conversation}", "{conversation_text_or_last_N_messages}"],
            PromptKind::Reflection => &["{conversation}", "{context + your_previous_output}"],
            PromptKind::Compact => &["{full_or_recent_conversation_text}", "{conversation}"],
            PromptKind::PromoteFacts => &["{summary_text}"],
            PromptKind::DeduplicateFacts => &["{facts_list}"],
            PromptKind::ConsolidateSummaries => &["{summaries_list}"],
            PromptKind::TopologyExtraction => &["{agent_cot_trace + final_answer}", "{conversation}"],
        }
    }

    /// Compiled-in default. Topology extraction is opt-in and has none.
    fn builtin(&self) -> Option<&'static str> {
        let text = match self {
            PromptKind::Extract => include_str!("../templates/brain/extract.prompt"),
            PromptKind::Reflection => include_str!("../templates/brain/reflection.prompt"),
            PromptKind::Compact => include_str!("../templates/brain/compact.prompt"),
            PromptKind::PromoteFacts => include_str!("../templates/brain/promote_facts.prompt"),
            PromptKind::DeduplicateFacts => {
                include_str!("../templates/brain/deduplicate_facts.prompt")
            }
            PromptKind::ConsolidateSummaries => {
                include_str!("../templates/brain/consolidate_summaries.prompt")
            }
            PromptKind::TopologyExtraction => return None,
        };
        Some(text)
    }
}

/// Reads prompt files from the brain directory.
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    dir: PathBuf,
}

impl PromptLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the prompt directory and write any missing prompt files.
    ///
    /// Files are taken from `template_dir` when it has them, otherwise from the
    /// built-in set. Existing files are never overwritten. Returns the names of
    /// the files written.
    pub async fn sync_templates(&self, template_dir: Option<&Path>) -> Result<Vec<String>, HippoError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&self.dir, std::fs::Permissions::from_mode(0o755)).await?;
        }

        let mut written = Vec::new();
        let names = PromptKind::ALL
            .iter()
            .map(|k| k.file_name())
            .chain(std::iter::once(TOPOLOGY_INJECTION_FILE));

        for name in names {
            let dest = self.dir.join(name);
            if tokio::fs::try_exists(&dest).await? {
                continue;
            }
            let from_template = match template_dir {
                Some(dir) => read_optional(&dir.join(name)).await?,
                None => None,
            };
            let builtin = PromptKind::ALL
                .iter()
                .find(|k| k.file_name() == name)
                .and_then(PromptKind::builtin);
            let content = match (from_template, builtin) {
                (Some(content), _) => content,
                (None, Some(text)) => text.to_string(),
                (None, None) => continue,
            };
            tokio::fs::write(&dest, content).await?;
            written.push(name.to_string());
        }

        if !written.is_empty() {
            info!(dir = %self.dir.display(), files = ?written, "installed prompt templates");
        }
        Ok(written)
    }

    /// Load a prompt, with the topology injection prefix when one exists.
    ///
    /// Returns `None` when the prompt file is missing or unreadable.
    pub async fn load(&self, kind: PromptKind) -> Option<String> {
        let path = self.dir.join(kind.file_name());
        let body = match read_optional(&path).await {
            Ok(Some(body)) => body,
            Ok(None) => {
                warn!(prompt = kind.file_name(), "prompt file missing, skipping step");
                return None;
            }
            Err(e) => {
                warn!(prompt = kind.file_name(), error = %e, "prompt file unreadable, skipping step");
                return None;
            }
        };

        match read_optional(&self.dir.join(TOPOLOGY_INJECTION_FILE)).await {
            Ok(Some(prefix)) if !prefix.trim().is_empty() => {
                debug!(prompt = kind.file_name(), "applying topology injection prefix");
                Some(format!("{prefix}\n\n{body}"))
            }
            _ => Some(body),
        }
    }

    /// True when the prompt file for `kind` is present.
    pub async fn has(&self, kind: PromptKind) -> bool {
        tokio::fs::try_exists(self.dir.join(kind.file_name()))
            .await
            .unwrap_or(false)
    }

    /// Load `kind` and substitute `value` for its placeholder.
    pub async fn render(&self, kind: PromptKind, value: &str) -> Option<String> {
        let template = self.load(kind).await?;
        Some(fill(&template, kind.placeholders(), value))
    }
}

/// Replace the first occurrence of the first placeholder present in `template`.
///
/// A template with none of the placeholders gets the value appended so the
/// model still sees its input.
pub fn fill(template: &str, placeholders: &[&str], value: &str) -> String {
    match placeholders.iter().find(|p| template.contains(**p)) {
        Some(p) => template.replacen(*p, value, 1),
        None => format!("{template}\n\n{value}"),
    }
}

async fn read_optional(path: &Path) -> Result<Option<String>, HippoError> {
    match tokio::fs::read_to_string(path).await {
        Ok(s) => Ok(Some(s)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_carry_their_placeholder() {
        for kind in PromptKind::ALL {
            let Some(text) = kind.builtin() else {
                continue;
            };
            assert!(
                text.contains(kind.placeholders()[0]),
                "{} lacks {}",
                kind.file_name(),
                kind.placeholders()[0]
            );
        }
    }

    #[test]
    fn fill_replaces_first_occurrence_only() {
        let out = fill("a {x} b {x}", &["{x}"], "V");
        assert_eq!(out, "a V b {x}");
    }

    #[test]
    fn fill_accepts_legacy_placeholder() {
        let out = fill(
            "Conversation: {conversation_text_or_last_N_messages}",
            PromptKind::Extract.placeholders(),
            "hi",
        );
        assert_eq!(out, "Conversation: hi");
    }

    #[test]
    fn fill_appends_when_placeholder_missing() {
        assert_eq!(fill("Summarize.", &["{summary_text}"], "S"), "Summarize.\n\nS");
    }

    #[tokio::test]
    async fn sync_writes_builtins_once() {
        let dir = tempfile::tempdir().unwrap();
        let lib = PromptLibrary::new(dir.path().join("brain"));
        let written = lib.sync_templates(None).await.unwrap();
        assert_eq!(written.len(), PromptKind::ALL.len() - 1);
        assert!(!dir.path().join("brain").join(TOPOLOGY_INJECTION_FILE).exists());
        assert!(!lib.dir().join(PromptKind::TopologyExtraction.file_name()).exists());

        std::fs::write(lib.dir().join("extract.prompt"), "custom {conversation}").unwrap();
        assert!(lib.sync_templates(None).await.unwrap().is_empty());
        let loaded = lib.load(PromptKind::Extract).await.unwrap();
        assert_eq!(loaded, "custom {conversation}");
    }

    #[tokio::test]
    async fn template_dir_overrides_builtins() {
        let templates = tempfile::tempdir().unwrap();
        std::fs::write(templates.path().join("compact.prompt"), "T {conversation}").unwrap();
        std::fs::write(templates.path().join(TOPOLOGY_INJECTION_FILE), "You are hippo.").unwrap();

        let dir = tempfile::tempdir().unwrap();
        let lib = PromptLibrary::new(dir.path().join("brain"));
        lib.sync_templates(Some(templates.path())).await.unwrap();

        let rendered = lib.render(PromptKind::Compact, "CONV").await.unwrap();
        assert_eq!(rendered, "You are hippo.\n\nT CONV");
        let extract = lib.load(PromptKind::Extract).await.unwrap();
        assert!(extract.starts_with("You are hippo.\n\n"));
    }

    #[tokio::test]
    async fn topology_extraction_comes_only_from_template_dir() {
        let templates = tempfile::tempdir().unwrap();
        std::fs::write(
            templates.path().join("topology_extraction.prompt"),
            include_str!("../templates/brain/topology_extraction.prompt"),
        )
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let lib = PromptLibrary::new(dir.path().join("brain"));
        assert!(!lib.has(PromptKind::TopologyExtraction).await);
        let written = lib.sync_templates(Some(templates.path())).await.unwrap();
        assert_eq!(written.len(), PromptKind::ALL.len());
        assert!(lib.has(PromptKind::TopologyExtraction).await);

        let rendered = lib.render(PromptKind::TopologyExtraction, "user: hi\n").await.unwrap();
        assert!(rendered.ends_with("Trace:\nuser: hi\n\n"));
    }

    #[tokio::test]
    async fn missing_prompt_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let lib = PromptLibrary::new(dir.path());
        assert!(lib.load(PromptKind::Reflection).await.is_none());
    }
}
