// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot subcommands that open the brain, do one thing, and shut it down.

use std::io::IsTerminal;
use std::path::Path;

use colored::Colorize;
use hippo_brain::brain::PROMPTS_DIR;
use hippo_brain::{Brain, BrainStats, MaintenanceOutcome, MaintenanceReason, MaintenanceReport, PromptLibrary};
use hippo_config::model::HippoConfig;
use hippo_core::HippoError;

/// `hippo recall <query>`: print the retrieval preamble.
pub async fn run_recall(brain: &Brain, query: &str) -> Result<(), HippoError> {
    let preamble = brain.try_retrieve(query, None).await?;
    if preamble.is_empty() {
        println!("no memories matched");
    } else {
        print!("{preamble}");
    }
    Ok(())
}

/// `hippo maintain`: one manual pass, waited for.
pub async fn run_maintain(brain: &Brain) -> Result<(), HippoError> {
    match brain.trigger(MaintenanceReason::Manual).await? {
        MaintenanceOutcome::Ran(report) => print_report(&report),
        MaintenanceOutcome::Skipped => println!("maintenance already running"),
    }
    Ok(())
}

pub fn print_report(report: &MaintenanceReport) {
    let c = &report.compaction;
    println!(
        "maintenance ({}) finished in {:.1}s",
        report.reason,
        report.duration.as_secs_f64()
    );
    println!(
        "  sessions {}  facts +{}  reflections +{}  topology steps +{}  summaries +{}",
        report.sessions_processed,
        report.facts_added,
        report.reflections_added,
        report.topology_steps_added,
        report.summaries_added
    );
    println!(
        "  duplicates -{}  consolidated {}->{}  low confidence -{}  stale -{}  promoted +{}",
        c.duplicates_removed,
        c.summaries_consolidated,
        c.consolidated_added,
        c.low_confidence_removed,
        c.stale_removed,
        c.facts_promoted
    );
    if let Some(reason) = &report.aborted {
        println!("  {}", format!("stopped early: {reason}").yellow());
    }
}

/// `hippo stats [--json]`.
pub fn run_stats(brain: &Brain, json: bool) -> Result<(), HippoError> {
    let stats = brain.stats();
    if json {
        let out = serde_json::to_string_pretty(&stats)
            .map_err(|e| HippoError::Internal(format!("failed to serialize stats: {e}")))?;
        println!("{out}");
    } else {
        print_stats(&stats, std::io::stdout().is_terminal());
    }
    Ok(())
}

fn print_stats(stats: &BrainStats, use_color: bool) {
    let last = stats
        .last_maintenance
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "never".to_string());
    println!();
    println!("  hippo stats");
    println!("  {}", "-".repeat(35));
    let rows = [
        ("Facts", stats.facts.to_string()),
        ("Summaries", stats.summaries.to_string()),
        ("Reflections", stats.reflections.to_string()),
        ("Buffered", format!("{} message(s) in {} session(s)", stats.buffered_messages, stats.buffered_sessions)),
        ("Interactions", stats.interaction_count.to_string()),
        ("Last pass", last),
    ];
    for (label, value) in rows {
        if use_color {
            println!("    {:<14}{}", label.dimmed(), value);
        } else {
            println!("    {label:<14}{value}");
        }
    }
    println!();
}

/// `hippo forget <id>`.
pub async fn run_forget(brain: &Brain, id: &str) -> Result<(), HippoError> {
    if brain.forget(id).await? {
        println!("forgot {id}");
    } else {
        println!("no memory with id {id}");
    }
    Ok(())
}

/// `hippo init-prompts`: write missing prompt templates without opening the store.
pub async fn run_init_prompts(config: &HippoConfig) -> Result<(), HippoError> {
    let library = PromptLibrary::new(config.brain.storage_path().join(PROMPTS_DIR));
    let written = library
        .sync_templates(config.brain.template_dir.as_deref().map(Path::new))
        .await?;
    if written.is_empty() {
        println!("prompts up to date in {}", library.dir().display());
    } else {
        for name in &written {
            println!("wrote {}", library.dir().join(name).display());
        }
    }
    Ok(())
}

/// `hippo config show`: effective configuration as TOML, secrets masked.
pub fn run_config_show(config: &HippoConfig) -> Result<(), HippoError> {
    println!("{}", render_config(config)?);
    Ok(())
}

fn render_config(config: &HippoConfig) -> Result<String, HippoError> {
    let mut shown = config.clone();
    mask(&mut shown.provider.api_key);
    mask(&mut shown.embeddings.api_key);
    toml::to_string_pretty(&shown)
        .map_err(|e| HippoError::Internal(format!("failed to render config: {e}")))
}

fn mask(secret: &mut Option<String>) {
    if secret.as_deref().is_some_and(|s| !s.is_empty()) {
        *secret = Some("********".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_show_masks_keys() {
        let mut config = HippoConfig::default();
        config.provider.api_key = Some("sk-secret".into());
        let out = render_config(&config).unwrap();
        assert!(!out.contains("sk-secret"));
        assert!(out.contains("********"));
        assert!(out.contains("[brain]"));
    }

    #[tokio::test]
    async fn init_prompts_writes_into_storage_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = HippoConfig::default();
        config.brain.storage_dir = dir.path().display().to_string();

        run_init_prompts(&config).await.unwrap();
        assert!(dir.path().join("brain/compact.prompt").exists());
    }
}
