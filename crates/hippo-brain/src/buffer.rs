// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-session short-term buffer of recent chat messages.

use std::collections::{HashMap, VecDeque};

use hippo_core::types::ChatMessage;
use parking_lot::Mutex;

/// Maximum messages retained per session. Oldest are evicted first.
pub const MAX_BUFFER: usize = 40;

#[derive(Debug, Clone)]
struct Entry {
    seq: u64,
    message: ChatMessage,
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<String, VecDeque<Entry>>,
    next_seq: u64,
}

/// Messages captured by [`ShortTermBuffer::snapshot`], plus the sequence
/// number of the newest one so it can be released later without touching
/// anything pushed after the snapshot.
#[derive(Debug, Clone)]
pub struct BufferSnapshot {
    pub messages: Vec<ChatMessage>,
    pub high_water: u64,
}

/// FIFO of recent messages per session, capped at [`MAX_BUFFER`].
#[derive(Default)]
pub struct ShortTermBuffer {
    inner: Mutex<Inner>,
}

impl ShortTermBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message. Messages with no content and no tool calls are dropped.
    pub fn push(&self, session_id: &str, message: ChatMessage) {
        if message.is_empty() {
            return;
        }
        let mut inner = self.inner.lock();
        inner.next_seq += 1;
        let seq = inner.next_seq;
        let queue = inner.sessions.entry(session_id.to_string()).or_default();
        queue.push_back(Entry { seq, message });
        while queue.len() > MAX_BUFFER {
            queue.pop_front();
        }
    }

    /// Copy of a session's messages in push order.
    pub fn get(&self, session_id: &str) -> Vec<ChatMessage> {
        self.snapshot(session_id).messages
    }

    pub fn snapshot(&self, session_id: &str) -> BufferSnapshot {
        let inner = self.inner.lock();
        let Some(queue) = inner.sessions.get(session_id) else {
            return BufferSnapshot {
                messages: Vec::new(),
                high_water: 0,
            };
        };
        BufferSnapshot {
            messages: queue
                .iter()
                .filter(|e| !e.message.is_empty())
                .map(|e| e.message.clone())
                .collect(),
            high_water: queue.back().map(|e| e.seq).unwrap_or(0),
        }
    }

    /// Drop messages up to and including `up_to_seq`.
    pub fn release(&self, session_id: &str, up_to_seq: u64) {
        let mut inner = self.inner.lock();
        let drained = match inner.sessions.get_mut(session_id) {
            Some(queue) => {
                while queue.front().is_some_and(|e| e.seq <= up_to_seq) {
                    queue.pop_front();
                }
                queue.is_empty()
            }
            None => false,
        };
        if drained {
            inner.sessions.remove(session_id);
        }
    }

    pub fn clear(&self, session_id: &str) {
        self.inner.lock().sessions.remove(session_id);
    }

    /// Session ids currently holding messages, sorted.
    pub fn sessions(&self) -> Vec<String> {
        let inner = self.inner.lock();
        let mut ids: Vec<String> = inner
            .sessions
            .iter()
            .filter(|(_, q)| !q.is_empty())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn message_count(&self) -> usize {
        self.inner.lock().sessions.values().map(VecDeque::len).sum()
    }
}
