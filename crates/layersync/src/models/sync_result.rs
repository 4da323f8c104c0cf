//! Accumulated outcome of a sync pass

use serde::{Deserialize, Serialize};

/// How bad a recorded leaf failure is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureSeverity {
    /// Retryable on a later pass (timeouts, server errors)
    Soft,
    /// Not expected to succeed without intervention (rejected request)
    Hard,
    /// The resource's local state can no longer be trusted
    Fatal,
}

/// A failure reported by one resource during a pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafFailure {
    pub resource_id: String,
    pub message: String,
    pub severity: FailureSeverity,
}

/// Mutable accumulator shared by every leaf in a pass
///
/// Leaves only add to it and there is no reset, so whatever was recorded
/// before a cancellation survives it.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncResult {
    /// Number of conflicts between local and remote state
    pub conflicts: u64,
    /// Number of non-retryable errors
    pub hard_errors: u64,
    /// Number of retryable errors
    pub soft_errors: u64,
    /// Number of changes applied locally or remotely
    pub changes: u64,
    /// Number of leaves whose sync ran
    pub resources_synced: u64,
    /// Whether any leaf reported a fatal error
    pub fatal: bool,
    /// Individual failures in the order they were recorded
    pub failures: Vec<LeafFailure>,
}

impl SyncResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_conflicts(&mut self, count: u64) {
        self.conflicts += count;
    }

    pub fn record_changes(&mut self, count: u64) {
        self.changes += count;
    }

    pub(crate) fn record_visit(&mut self) {
        self.resources_synced += 1;
    }

    /// Record a failure for a resource, bumping the matching counter
    pub fn record_failure(
        &mut self,
        resource_id: impl Into<String>,
        severity: FailureSeverity,
        message: impl Into<String>,
    ) {
        match severity {
            FailureSeverity::Soft => self.soft_errors += 1,
            FailureSeverity::Hard => self.hard_errors += 1,
            FailureSeverity::Fatal => {
                self.hard_errors += 1;
                self.fatal = true;
            }
        }
        self.failures.push(LeafFailure {
            resource_id: resource_id.into(),
            message: message.into(),
            severity,
        });
    }

    pub fn record_soft_error(
        &mut self,
        resource_id: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.record_failure(resource_id, FailureSeverity::Soft, message);
    }

    pub fn record_hard_error(
        &mut self,
        resource_id: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.record_failure(resource_id, FailureSeverity::Hard, message);
    }

    pub fn record_fatal(&mut self, resource_id: impl Into<String>, message: impl Into<String>) {
        self.record_failure(resource_id, FailureSeverity::Fatal, message);
    }

    /// Total number of recorded errors (soft and hard)
    pub fn error_count(&self) -> u64 {
        self.soft_errors + self.hard_errors
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn has_changes(&self) -> bool {
        self.changes > 0
    }
}
