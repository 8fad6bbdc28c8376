// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process setup shared by the subcommands: tracing, adapters, and the brain.

use std::sync::Arc;
use std::time::Duration;

use hippo_brain::{Brain, build_embedder};
use hippo_config::model::HippoConfig;
use hippo_core::{ChatModel, Embedder, HippoError};
use hippo_openai::OpenAiProvider;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Installs the fmt subscriber. `RUST_LOG` wins over `agent.log_level`.
pub fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("hippo={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

pub async fn embedder(config: &HippoConfig) -> Result<Arc<dyn Embedder>, HippoError> {
    build_embedder(&config.embeddings, &config.brain.storage_path()).await
}

pub fn chat_model(config: &HippoConfig) -> Result<Arc<dyn ChatModel>, HippoError> {
    Ok(Arc::new(OpenAiProvider::new(&config.provider)?))
}

/// Opens the brain with the configured adapters and registers metrics.
pub async fn open_brain(config: &HippoConfig) -> Result<Brain, HippoError> {
    let embedder = embedder(config).await?;
    let chat = chat_model(config)?;
    open_brain_with(config, embedder, chat).await
}

pub async fn open_brain_with(
    config: &HippoConfig,
    embedder: Arc<dyn Embedder>,
    chat: Arc<dyn ChatModel>,
) -> Result<Brain, HippoError> {
    hippo_brain::metrics::register_metrics();
    let brain = Brain::open(&config.brain, embedder, chat).await?;
    info!(state = %brain.state(), "brain ready");
    Ok(brain)
}

/// Starts the maintenance schedule when `brain.schedule_secs` is set.
pub fn start_schedule(config: &HippoConfig, brain: &Brain) {
    if config.brain.schedule_secs > 0 {
        info!(every_secs = config.brain.schedule_secs, "scheduled maintenance enabled");
        brain.spawn_schedule(Duration::from_secs(config.brain.schedule_secs));
    }
}
