// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `hippo status` command implementation.
//!
//! Runs health checks against the storage directory, the embedder and the
//! chat model without opening the brain.

use std::io::IsTerminal;
use std::path::Path;
use std::time::{Duration, Instant};

use hippo_brain::brain::{PROMPTS_DIR, VECTOR_DB_DIR};
use hippo_config::model::HippoConfig;
use hippo_core::types::HealthStatus;
use hippo_core::{HippoError, PluginAdapter};
use serde::Serialize;

use crate::bootstrap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Result of a single health check.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, message: impl Into<String>, start: Instant) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.into(),
            duration: start.elapsed(),
        }
    }
}

/// Run the `hippo status` command.
///
/// `--json` prints the check list for scripting; `--plain` or a non-TTY
/// stdout disables colors.
pub async fn run_status(config: &HippoConfig, json: bool, plain: bool) -> Result<(), HippoError> {
    let results = vec![
        check_storage(&config.brain.storage_path()),
        check_embedder(config).await,
        check_chat_model(config).await,
    ];

    if json {
        let out = serde_json::to_string_pretty(&results)
            .map_err(|e| HippoError::Internal(format!("failed to serialize status: {e}")))?;
        println!("{out}");
    } else {
        let use_color = !plain && std::io::stdout().is_terminal();
        print_results(&results, use_color);
    }
    Ok(())
}

fn check_storage(root: &Path) -> CheckResult {
    let start = Instant::now();
    if !root.exists() {
        return CheckResult::new(
            "Storage",
            CheckStatus::Warn,
            format!("{} missing (created on first run)", root.display()),
            start,
        );
    }
    let missing: Vec<&str> = [PROMPTS_DIR, VECTOR_DB_DIR]
        .into_iter()
        .filter(|d| !root.join(d).is_dir())
        .collect();
    match std::fs::metadata(root) {
        Ok(meta) if meta.permissions().readonly() => {
            CheckResult::new("Storage", CheckStatus::Fail, "read-only", start)
        }
        Ok(_) if !missing.is_empty() => CheckResult::new(
            "Storage",
            CheckStatus::Warn,
            format!("missing {}", missing.join(", ")),
            start,
        ),
        Ok(_) => CheckResult::new("Storage", CheckStatus::Pass, root.display().to_string(), start),
        Err(e) => CheckResult::new("Storage", CheckStatus::Fail, e.to_string(), start),
    }
}

async fn check_embedder(config: &HippoConfig) -> CheckResult {
    let start = Instant::now();
    let embedder = match bootstrap::embedder(config).await {
        Ok(e) => e,
        Err(e) => return CheckResult::new("Embedder", CheckStatus::Fail, e.to_string(), start),
    };
    if let Some(result) = health("Embedder", embedder.as_ref(), start).await {
        return result;
    }
    match embedder.embed_one("status check").await {
        Ok(v) => CheckResult::new(
            "Embedder",
            CheckStatus::Pass,
            format!("{} ({} dims)", config.embeddings.mode, v.len()),
            start,
        ),
        Err(e) => CheckResult::new("Embedder", CheckStatus::Fail, e.to_string(), start),
    }
}

async fn check_chat_model(config: &HippoConfig) -> CheckResult {
    let start = Instant::now();
    let chat = match bootstrap::chat_model(config) {
        Ok(c) => c,
        Err(e) => return CheckResult::new("Chat model", CheckStatus::Fail, e.to_string(), start),
    };
    health("Chat model", chat.as_ref(), start)
        .await
        .unwrap_or_else(|| CheckResult::new("Chat model", CheckStatus::Pass, config.provider.model.clone(), start))
}

/// A result when the adapter is not healthy, `None` when it is.
async fn health<A: PluginAdapter + ?Sized>(name: &str, adapter: &A, start: Instant) -> Option<CheckResult> {
    match adapter.health_check().await {
        Ok(HealthStatus::Healthy) => None,
        Ok(HealthStatus::Degraded(msg)) => Some(CheckResult::new(name, CheckStatus::Warn, msg, start)),
        Ok(HealthStatus::Unhealthy(msg)) => Some(CheckResult::new(name, CheckStatus::Fail, msg, start)),
        Err(e) => Some(CheckResult::new(name, CheckStatus::Fail, e.to_string(), start)),
    }
}

fn print_results(results: &[CheckResult], use_color: bool) {
    use colored::Colorize;

    println!();
    println!("  hippo status");
    println!("  {}", "-".repeat(50));

    let mut issues = 0;
    for r in results {
        let ms = r.duration.as_millis();
        let (tag, message) = match (r.status, use_color) {
            (CheckStatus::Pass, true) => ("✓".green().to_string(), r.message.clone()),
            (CheckStatus::Warn, true) => ("!".yellow().to_string(), r.message.yellow().to_string()),
            (CheckStatus::Fail, true) => ("✗".red().to_string(), r.message.red().to_string()),
            (CheckStatus::Pass, false) => ("[OK]  ".to_string(), r.message.clone()),
            (CheckStatus::Warn, false) => ("[WARN]".to_string(), r.message.clone()),
            (CheckStatus::Fail, false) => ("[FAIL]".to_string(), r.message.clone()),
        };
        if r.status != CheckStatus::Pass {
            issues += 1;
        }
        println!("    {tag} {:<12} {message} ({ms}ms)", r.name);
    }

    println!();
    match issues {
        0 => println!("  All checks passed."),
        1 => println!("  1 issue found."),
        n => println!("  {n} issues found."),
    }
    println!();
}
