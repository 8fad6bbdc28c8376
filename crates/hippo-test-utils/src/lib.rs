// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for hippo.
//!
//! Provides mock adapters and a brain harness for fast, deterministic,
//! CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockChatModel`] - Scripted chat model that records every request
//! - [`word_embedder`] - One-hot static embedder over a fixed word list
//! - [`BrainHarness`] - A [`hippo_brain::Brain`] in a temp directory wired to the mocks

pub mod embedder;
pub mod harness;
pub mod mock_chat;

pub use embedder::word_embedder;
pub use harness::{BrainHarness, BrainHarnessBuilder};
pub use mock_chat::MockChatModel;
