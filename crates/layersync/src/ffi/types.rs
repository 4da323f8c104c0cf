//! FFI-friendly type wrappers for UniFFI export
//!
//! These types convert internal Rust types to FFI-compatible versions:
//! - `DateTime<Utc>` → `i64` (Unix timestamp in milliseconds)
//! - `Extras` → `HashMap<String, String>`
//! - Library errors → a flat error enum

use std::collections::HashMap;

use crate::error::SyncError;
use crate::events::SyncEvent;
use crate::models::{
    FailureSeverity, LeafFailure, PassOutcome, PassReport, SyncResult, SyncSchedule,
};

// ============================================================================
// Error Types
// ============================================================================

/// FFI-friendly error type
#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum LayerSyncError {
    #[error("No matching account: {message}")]
    NoMatchingAccount { message: String },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Already syncing: {message}")]
    AlreadyRunning { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Sync error: {message}")]
    Sync { message: String },
}

impl From<SyncError> for LayerSyncError {
    fn from(e: SyncError) -> Self {
        let message = e.to_string();
        match e {
            SyncError::NoMatchingAccount { .. } => LayerSyncError::NoMatchingAccount { message },
            SyncError::InvalidInterval => LayerSyncError::InvalidArgument { message },
            SyncError::AlreadyRunning { .. } => LayerSyncError::AlreadyRunning { message },
            SyncError::MalformedTree(_) => LayerSyncError::Sync { message },
            SyncError::Storage(_) => LayerSyncError::Storage { message },
        }
    }
}

impl From<anyhow::Error> for LayerSyncError {
    fn from(e: anyhow::Error) -> Self {
        LayerSyncError::Storage {
            message: format!("{:#}", e),
        }
    }
}

// ============================================================================
// Sync Result Types
// ============================================================================

/// Severity of a recorded failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiFailureSeverity {
    Soft,
    Hard,
    Fatal,
}

impl From<FailureSeverity> for FfiFailureSeverity {
    fn from(s: FailureSeverity) -> Self {
        match s {
            FailureSeverity::Soft => FfiFailureSeverity::Soft,
            FailureSeverity::Hard => FfiFailureSeverity::Hard,
            FailureSeverity::Fatal => FfiFailureSeverity::Fatal,
        }
    }
}

/// FFI-friendly leaf failure
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiLeafFailure {
    pub resource_id: String,
    pub message: String,
    pub severity: FfiFailureSeverity,
}

impl From<LeafFailure> for FfiLeafFailure {
    fn from(f: LeafFailure) -> Self {
        Self {
            resource_id: f.resource_id,
            message: f.message,
            severity: f.severity.into(),
        }
    }
}

/// FFI-friendly sync result
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSyncResult {
    pub conflicts: u64,
    pub hard_errors: u64,
    pub soft_errors: u64,
    pub changes: u64,
    pub resources_synced: u64,
    pub fatal: bool,
    pub failures: Vec<FfiLeafFailure>,
}

impl From<SyncResult> for FfiSyncResult {
    fn from(r: SyncResult) -> Self {
        Self {
            conflicts: r.conflicts,
            hard_errors: r.hard_errors,
            soft_errors: r.soft_errors,
            changes: r.changes,
            resources_synced: r.resources_synced,
            fatal: r.fatal,
            failures: r.failures.into_iter().map(FfiLeafFailure::from).collect(),
        }
    }
}

/// How a pass ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiPassOutcome {
    Finished,
    Canceled,
}

impl From<PassOutcome> for FfiPassOutcome {
    fn from(o: PassOutcome) -> Self {
        match o {
            PassOutcome::Finished => FfiPassOutcome::Finished,
            PassOutcome::Canceled => FfiPassOutcome::Canceled,
        }
    }
}

/// FFI-friendly pass report
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPassReport {
    pub account: String,
    pub authority: String,
    pub outcome: FfiPassOutcome,
    pub result: FfiSyncResult,
    /// Unix timestamp (milliseconds since epoch)
    pub started_at: i64,
    pub duration_ms: u64,
}

impl From<PassReport> for FfiPassReport {
    fn from(r: PassReport) -> Self {
        Self {
            account: r.account,
            authority: r.authority,
            outcome: r.outcome.into(),
            result: r.result.into(),
            started_at: r.started_at.timestamp_millis(),
            duration_ms: r.duration_ms,
        }
    }
}

// ============================================================================
// Schedule Types
// ============================================================================

/// FFI-friendly periodic sync registration
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSchedule {
    pub account: String,
    pub authority: String,
    pub extras: HashMap<String, String>,
    pub interval_secs: u64,
    /// Unix timestamp (milliseconds since epoch)
    pub updated_at: i64,
}

impl From<SyncSchedule> for FfiSchedule {
    fn from(s: SyncSchedule) -> Self {
        Self {
            account: s.account,
            authority: s.authority,
            extras: s.extras.into_iter().collect(),
            interval_secs: s.interval_secs,
            updated_at: s.updated_at.timestamp_millis(),
        }
    }
}

// ============================================================================
// Event Callback
// ============================================================================

/// Lifecycle event names
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiSyncEvent {
    Start,
    Finish,
    Canceled,
    Changes,
}

impl From<SyncEvent> for FfiSyncEvent {
    fn from(e: SyncEvent) -> Self {
        match e {
            SyncEvent::Start => FfiSyncEvent::Start,
            SyncEvent::Finish => FfiSyncEvent::Finish,
            SyncEvent::Canceled => FfiSyncEvent::Canceled,
            SyncEvent::Changes => FfiSyncEvent::Changes,
        }
    }
}

impl From<FfiSyncEvent> for SyncEvent {
    fn from(e: FfiSyncEvent) -> Self {
        match e {
            FfiSyncEvent::Start => SyncEvent::Start,
            FfiSyncEvent::Finish => SyncEvent::Finish,
            FfiSyncEvent::Canceled => SyncEvent::Canceled,
            FfiSyncEvent::Changes => SyncEvent::Changes,
        }
    }
}

/// Callback interface receiving lifecycle events
///
/// Kotlin can rebroadcast these as intents; Swift can post notifications.
#[uniffi::export(callback_interface)]
pub trait SyncEventCallback: Send + Sync {
    /// Called for every lifecycle event
    ///
    /// # Arguments
    /// * `event` - The event kind
    /// * `action` - Fully qualified action name (e.g. `org.layersync.sync_finish`)
    fn on_event(&self, event: FfiSyncEvent, action: String);
}

// ============================================================================
// Log Callback
// ============================================================================

/// Log level for FFI callback
#[derive(Debug, Clone, Copy, uniffi::Enum)]
pub enum FfiLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<log::Level> for FfiLogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => FfiLogLevel::Error,
            log::Level::Warn => FfiLogLevel::Warn,
            log::Level::Info => FfiLogLevel::Info,
            log::Level::Debug => FfiLogLevel::Debug,
            log::Level::Trace => FfiLogLevel::Trace,
        }
    }
}

impl From<FfiLogLevel> for log::Level {
    fn from(level: FfiLogLevel) -> Self {
        match level {
            FfiLogLevel::Error => log::Level::Error,
            FfiLogLevel::Warn => log::Level::Warn,
            FfiLogLevel::Info => log::Level::Info,
            FfiLogLevel::Debug => log::Level::Debug,
            FfiLogLevel::Trace => log::Level::Trace,
        }
    }
}

/// Callback interface for receiving log messages from Rust
///
/// Swift should implement this using os_log/Logger; Kotlin using android.util.Log.
#[uniffi::export(callback_interface)]
pub trait LogCallback: Send + Sync {
    /// Called when a log message is emitted
    ///
    /// # Arguments
    /// * `level` - The log level (error, warn, info, debug, trace)
    /// * `target` - The logging target (typically module path, e.g., "layersync::sync")
    /// * `message` - The log message
    fn on_log(&self, level: FfiLogLevel, target: String, message: String);
}
