// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `hippo shell` command implementation.
//!
//! A small response engine in front of the brain: each turn assembles the
//! system prompt, retrieved memories and session history, calls the chat
//! model, and feeds the exchange back into the brain.

use std::sync::Arc;

use colored::Colorize;
use hippo_brain::{Brain, BrainAdapter, MaintenanceOutcome, MaintenanceReason};
use hippo_config::model::HippoConfig;
use hippo_context::ContextAssembler;
use hippo_core::types::{ChatMessage, TokenUsage};
use hippo_core::{ChatModel, HippoError};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::{debug, warn};

use crate::bootstrap;
use crate::commands::print_report;

/// One assistant reply and what it cost.
#[derive(Debug, Clone)]
pub struct Reply {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

/// A chat session wired through the brain.
pub struct Conversation {
    session_id: String,
    adapter: BrainAdapter,
    chat: Arc<dyn ChatModel>,
    assembler: ContextAssembler,
    history: Vec<ChatMessage>,
}

impl Conversation {
    /// The adapter is registered with `assembler` as a conditional provider,
    /// so memories land right after the system prompt.
    pub fn new(adapter: BrainAdapter, chat: Arc<dyn ChatModel>, mut assembler: ContextAssembler) -> Self {
        assembler.add_conditional_provider(Box::new(adapter.clone()));
        Self {
            session_id: new_session_id(),
            adapter,
            chat,
            assembler,
            history: Vec::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Run one turn. On error the history and the brain are left untouched.
    pub async fn respond(&mut self, input: &str) -> Result<Reply, HippoError> {
        let user = ChatMessage::user(input);

        self.adapter.set_current_query(&self.session_id, input).await;
        let mut turn = self.history.clone();
        turn.push(user.clone());
        let assembled = self.assembler.assemble(&self.session_id, &turn).await;
        self.adapter.clear_current_query(&self.session_id).await;
        let messages = assembled?;
        debug!(session_id = %self.session_id, messages = messages.len(), "context assembled");

        let completion = self.chat.generate(&messages).await?;
        let reply = completion.message;

        self.adapter.on_turn_message(&self.session_id, user.clone());
        self.adapter.on_turn_message(&self.session_id, reply.clone());
        if let Some(usage) = completion.usage {
            self.adapter.note_usage(usage.total());
        }

        let text = reply.content.clone();
        self.history.push(user);
        self.history.push(reply);
        Ok(Reply {
            text,
            usage: completion.usage,
        })
    }

    /// Drop the local history and continue under a fresh session id.
    pub fn start_new_session(&mut self) {
        self.history.clear();
        self.session_id = new_session_id();
        self.adapter.brain().trigger_background(MaintenanceReason::NewSession);
    }
}

fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Runs the `hippo shell` REPL until `/quit`, Ctrl+C or Ctrl+D, then shuts
/// the brain down.
pub async fn run_shell(config: HippoConfig) -> Result<(), HippoError> {
    let chat = bootstrap::chat_model(&config)?;
    let embedder = bootstrap::embedder(&config).await?;
    let brain = bootstrap::open_brain_with(&config, embedder, chat.clone()).await?;
    bootstrap::start_schedule(&config, &brain);
    brain.trigger_background(MaintenanceReason::Startup);

    let adapter = BrainAdapter::new(brain.clone());
    let assembler = ContextAssembler::new(&config.agent).await;
    let mut conversation = Conversation::new(adapter.clone(), chat, assembler);

    let mut rl = DefaultEditor::new()
        .map_err(|e| HippoError::Internal(format!("failed to initialize readline: {e}")))?;

    println!("{}", "hippo shell".bold().green());
    println!(
        "Commands: {} {} {} {}\n",
        "/maintain".yellow(),
        "/stats".yellow(),
        "/new".yellow(),
        "/quit".yellow()
    );

    let prompt = format!("{}> ", config.agent.name.as_str().green());
    loop {
        match rl.readline(&prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(&line);

                match trimmed {
                    "/quit" | "/exit" => break,
                    "/maintain" => maintain(&brain).await,
                    "/stats" => print_stats(&brain),
                    "/new" => {
                        conversation.start_new_session();
                        println!("{}", "new session".dimmed());
                    }
                    _ => match conversation.respond(trimmed).await {
                        Ok(reply) => println!("{}\n", reply.text),
                        Err(e) => eprintln!("{}: {e}", "error".red()),
                    },
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{}: {e}", "error".red());
                break;
            }
        }
    }

    println!("{}", "saving memories...".dimmed());
    adapter.close().await;
    println!("{}", "goodbye".dimmed());
    Ok(())
}

async fn maintain(brain: &Brain) {
    match brain.trigger(MaintenanceReason::Manual).await {
        Ok(MaintenanceOutcome::Ran(report)) => print_report(&report),
        Ok(MaintenanceOutcome::Skipped) => {
            println!("{}", "maintenance already running".yellow());
        }
        Err(e) => {
            warn!(error = %e, "manual maintenance failed");
            eprintln!("{}: {e}", "error".red());
        }
    }
}

fn print_stats(brain: &Brain) {
    let s = brain.stats();
    println!(
        "{} facts, {} summaries, {} reflections, {} buffered message(s), state {}",
        s.facts, s.summaries, s.reflections, s.buffered_messages, s.state
    );
}
