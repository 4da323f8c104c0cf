//! Storage trait definitions

use anyhow::Result;

use crate::models::SyncSchedule;

/// Settings key holding the last successful sync time (epoch millis)
pub const KEY_LAST_SYNC_TIMESTAMP: &str = "last_sync_timestamp";

/// Key-value settings persisted across passes
pub trait SettingsStore: Send + Sync {
    /// Read an integer setting
    fn get_i64(&self, key: &str) -> Result<Option<i64>>;

    /// Write an integer setting (upsert)
    fn put_i64(&self, key: &str, value: i64) -> Result<()>;

    /// Remove a setting
    fn remove(&self, key: &str) -> Result<()>;

    /// Last successful sync time in epoch milliseconds
    fn last_sync_timestamp(&self) -> Result<Option<i64>> {
        self.get_i64(KEY_LAST_SYNC_TIMESTAMP)
    }
}

/// Persistence for periodic sync registrations
///
/// Schedules are keyed by (account, authority).
pub trait ScheduleStore: Send + Sync {
    /// Insert or replace the schedule for its (account, authority) pair
    fn upsert_schedule(&self, schedule: SyncSchedule) -> Result<()>;

    /// Get the schedule for a pair
    fn get_schedule(&self, account: &str, authority: &str) -> Result<Option<SyncSchedule>>;

    /// Delete the schedule for a pair, returning whether one existed
    fn delete_schedule(&self, account: &str, authority: &str) -> Result<bool>;

    /// Delete every schedule of an account, returning how many were removed
    fn delete_schedules_for_account(&self, account: &str) -> Result<usize>;

    /// List all schedules, ordered by account then authority
    fn list_schedules(&self) -> Result<Vec<SyncSchedule>>;
}
