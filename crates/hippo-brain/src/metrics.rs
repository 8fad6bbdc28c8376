// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade; nothing is exported unless the host installs
//! a recorder.

use std::time::Duration;

use metrics::{describe_counter, describe_gauge, describe_histogram};

use crate::maintenance::MaintenanceReason;
use crate::types::MemoryType;

/// Register all hippo metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        "hippo_maintenance_runs_total",
        "Maintenance passes started, by trigger reason"
    );
    describe_counter!(
        "hippo_maintenance_skipped_total",
        "Maintenance triggers dropped because a pass was already running"
    );
    describe_counter!("hippo_memories_added_total", "Memories stored, by type");
    describe_counter!("hippo_memories_deleted_total", "Memories removed, by cause");
    describe_counter!(
        "hippo_llm_errors_total",
        "Failed or unparseable chat model calls, by maintenance step"
    );
    describe_histogram!(
        "hippo_retrieve_duration_seconds",
        "Time spent retrieving memories for a turn"
    );
    describe_histogram!(
        "hippo_maintenance_duration_seconds",
        "Wall-clock duration of a maintenance pass"
    );
    describe_gauge!("hippo_vector_store_items", "Items in the vector store");
}

pub fn record_maintenance_run(reason: MaintenanceReason) {
    metrics::counter!("hippo_maintenance_runs_total", "reason" => reason.to_string()).increment(1);
}

pub fn record_maintenance_skipped(reason: MaintenanceReason) {
    metrics::counter!("hippo_maintenance_skipped_total", "reason" => reason.to_string())
        .increment(1);
}

pub fn record_memory_added(kind: MemoryType) {
    metrics::counter!("hippo_memories_added_total", "type" => kind.as_str()).increment(1);
}

/// `cause` is one of `duplicate`, `consolidated`, `low_confidence`, `stale`, `manual`.
pub fn record_memory_deleted(cause: &str) {
    metrics::counter!("hippo_memories_deleted_total", "cause" => cause.to_string()).increment(1);
}

pub fn record_llm_error(step: &str) {
    metrics::counter!("hippo_llm_errors_total", "step" => step.to_string()).increment(1);
}

pub fn record_retrieve_duration(elapsed: Duration) {
    metrics::histogram!("hippo_retrieve_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_maintenance_duration(elapsed: Duration) {
    metrics::histogram!("hippo_maintenance_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn set_store_items(count: usize) {
    metrics::gauge!("hippo_vector_store_items").set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_recorder_is_a_noop() {
        register_metrics();
        record_maintenance_run(MaintenanceReason::Manual);
        record_maintenance_skipped(MaintenanceReason::ContextUsageHigh);
        record_memory_added(MemoryType::Fact);
        record_memory_deleted("stale");
        record_llm_error("extract");
        record_retrieve_duration(Duration::from_millis(3));
        record_maintenance_duration(Duration::from_secs(1));
        set_store_items(7);
    }
}
