// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hippo - hierarchical long-term memory for chat agents.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod bootstrap;
mod commands;
mod shell;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use hippo_config::model::HippoConfig;
use hippo_core::HippoError;

/// Hippo - hierarchical long-term memory for chat agents.
#[derive(Parser, Debug)]
#[command(name = "hippo", version, about, long_about = None)]
struct Cli {
    /// Load configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Chat with the configured model, backed by long-term memory.
    Shell,
    /// Print the memories retrieved for a query.
    Recall {
        /// Free-text query.
        query: String,
    },
    /// Run one maintenance pass now.
    Maintain,
    /// Show memory counts and maintenance state.
    Stats {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Delete a memory by id.
    Forget {
        id: String,
    },
    /// Check storage, embedder and chat model health.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
        /// Disable colors.
        #[arg(long)]
        plain: bool,
    },
    /// Write any missing prompt templates to the storage directory.
    InitPrompts,
    /// Inspect configuration.
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Print the effective configuration with secrets masked.
    Show,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => hippo_config::load_and_validate_path(path),
        None => hippo_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            hippo_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    bootstrap::init_tracing(&config.agent.log_level);

    let Some(command) = cli.command else {
        println!("hippo: use --help for available commands");
        return;
    };

    if let Err(e) = run(command, config).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: HippoConfig) -> Result<(), HippoError> {
    match command {
        Commands::Shell => shell::run_shell(config).await,
        Commands::Status { json, plain } => status::run_status(&config, json, plain).await,
        Commands::InitPrompts => commands::run_init_prompts(&config).await,
        Commands::Config {
            action: ConfigCommands::Show,
        } => commands::run_config_show(&config),
        Commands::Recall { query } => with_brain(&config, |brain| async move {
            commands::run_recall(&brain, &query).await
        })
        .await,
        Commands::Maintain => {
            with_brain(&config, |brain| async move { commands::run_maintain(&brain).await }).await
        }
        Commands::Stats { json } => {
            with_brain(&config, |brain| async move { commands::run_stats(&brain, json) }).await
        }
        Commands::Forget { id } => with_brain(&config, |brain| async move {
            commands::run_forget(&brain, &id).await
        })
        .await,
    }
}

/// Opens the brain, runs `f`, and always shuts the brain down afterwards.
async fn with_brain<F, Fut>(config: &HippoConfig, f: F) -> Result<(), HippoError>
where
    F: FnOnce(hippo_brain::Brain) -> Fut,
    Fut: std::future::Future<Output = Result<(), HippoError>>,
{
    let brain = bootstrap::open_brain(config).await?;
    let result = f(brain.clone()).await;
    brain.shutdown().await;
    result
}
