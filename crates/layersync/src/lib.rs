//! layersync - Cancellable, hierarchical sync orchestration
//!
//! This crate provides platform-independent sync scheduling including:
//! - A resource tree of layer groups and syncable layers
//! - Cooperative cancellation checked before every node
//! - A pre-order orchestrator that records failures and keeps going
//! - Lifecycle events (`sync_start`, `sync_finish`, `sync_canceled`, `sync_changes`)
//! - Periodic sync registration through a host interface
//! - SQLite persistence for schedules and the last sync time
//!
//! The crate has no platform dependencies and exposes a UniFFI facade
//! for Android and iOS hosts.

uniffi::setup_scaffolding!();

pub mod cancel;
pub mod error;
pub mod events;
pub mod ffi;
pub mod host;
pub mod models;
pub mod remote;
pub mod settings;
pub mod storage;
pub mod sync;

pub use cancel::CancellationFlag;
pub use error::SyncError;
pub use events::{ChannelEventSink, EventSink, LogEventSink, SyncEvent};
pub use host::{LocalHost, SyncHost};
pub use models::{
    Account, AccountSelector, Extras, FailureSeverity, LeafFailure, PassOutcome, PassReport,
    ResourceGroup, ResourceNode, SyncResult, SyncSchedule, SyncableResource,
};
pub use remote::{RemoteLayer, RetryPolicy};
pub use settings::{SyncSettings, TreeSpec};
pub use storage::{InMemorySyncStore, ScheduleStore, SettingsStore, SqliteSyncStore};
pub use sync::{
    // Pass execution
    LifecycleNotifier, SyncOrchestrator, SyncScheduler, SyncTrigger,
    // Timing (for periodic drivers)
    MAX_INTERVAL_SECS, cooldown_elapsed, millis_to_datetime, next_sync_in,
};
