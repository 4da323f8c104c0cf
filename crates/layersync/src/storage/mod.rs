//! Storage traits and implementations
//!
//! Persists the last-sync timestamp and periodic sync registrations. The
//! trait-based design allows swapping between in-memory and SQLite storage.

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemorySyncStore;
pub use sqlite::SqliteSyncStore;
pub use traits::{KEY_LAST_SYNC_TIMESTAMP, ScheduleStore, SettingsStore};
