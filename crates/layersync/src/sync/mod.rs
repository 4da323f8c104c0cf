//! Sync engine: tree walk, pass lifecycle and scheduling
//!
//! A pass is triggered through [`SyncScheduler::perform_sync`], walked by
//! [`SyncOrchestrator`] and reported through a [`LifecycleNotifier`].

mod notifier;
mod orchestrator;
mod scheduler;
mod timing;

pub use notifier::LifecycleNotifier;
pub use orchestrator::{MAX_TREE_DEPTH, SyncOrchestrator};
pub use scheduler::{SyncScheduler, SyncTrigger};
pub use timing::{MAX_INTERVAL_SECS, cooldown_elapsed, millis_to_datetime, next_sync_in};
