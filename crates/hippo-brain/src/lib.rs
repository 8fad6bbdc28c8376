// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hierarchical long-term memory for conversational agents.
//!
//! Recent turns sit in a per-session short-term buffer. A maintenance pass
//! turns them into facts, reflections and summaries in a persistent vector
//! store, then compacts the store (dedupe, consolidate, cleanup, promote).
//! At turn time the relevant memories are retrieved and handed back as a
//! preamble for the chat model.
//!
//! ## Architecture
//!
//! - **Embedders**: static vocabulary or remote HTTP endpoint ([`embedder`])
//! - **VectorStore**: SQLite persistence with an in-memory cosine index
//! - **ShortTermBuffer**: capped per-session message FIFO
//! - **PromptLibrary**: editable prompt templates under `<storage_dir>/brain/`
//! - **MemoryExtractor** / **Compactor**: the two maintenance phases
//! - **TopologyAnalyzer**: optional per-session reasoning graphs under
//!   `<storage_dir>/topology/`
//! - **Brain**: orchestration, triggers and lifecycle
//! - **BrainAdapter**: the response-engine integration point

pub mod brain;
pub mod buffer;
pub mod compaction;
pub mod embedder;
pub mod extractor;
pub mod maintenance;
pub mod metrics;
pub mod prompts;
pub mod provider;
pub mod retriever;
pub mod store;
pub mod topology;
pub mod types;
pub mod vocabulary;

pub use brain::{Brain, BrainState, BrainStats};
pub use buffer::{MAX_BUFFER, ShortTermBuffer};
pub use compaction::Compactor;
pub use embedder::{EmbeddingMode, RemoteEmbedder, StaticEmbedder, build_embedder};
pub use extractor::MemoryExtractor;
pub use maintenance::{MaintenanceOutcome, MaintenanceReason, MaintenanceReport};
pub use prompts::{PromptKind, PromptLibrary};
pub use provider::BrainAdapter;
pub use retriever::Retriever;
pub use store::VectorStore;
pub use topology::{BondKind, TopologyAnalyzer, TopologyGraph, TopologyStore};
pub use types::*;
pub use vocabulary::VocabularyManager;
