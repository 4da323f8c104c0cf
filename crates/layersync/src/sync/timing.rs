//! Sync timing utilities for periodic triggers
//!
//! Pure functions that can be tested without a running scheduler.

use chrono::{DateTime, TimeDelta, Utc};

/// Convert a persisted epoch-millis timestamp to a `DateTime`
pub fn millis_to_datetime(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}

/// Longest accepted sync interval
///
/// chrono durations are bounded by `i64::MAX` milliseconds.
pub const MAX_INTERVAL_SECS: u64 = i64::MAX as u64 / 1000;

/// Check if enough time has elapsed since the last sync to allow a new sync.
///
/// # Arguments
/// * `last_sync_at` - When the last successful sync completed (None if never synced)
/// * `cooldown_secs` - Minimum seconds that must elapse between syncs
///
/// # Returns
/// `true` if enough time has passed (or never synced), `false` if still in cooldown
pub fn cooldown_elapsed(last_sync_at: Option<DateTime<Utc>>, cooldown_secs: u64) -> bool {
    match last_sync_at {
        Some(last) => {
            let elapsed = (Utc::now() - last).num_seconds();
            i64::try_from(cooldown_secs).is_ok_and(|cooldown| elapsed >= cooldown)
        }
        None => true,
    }
}

/// Time until the next periodic trigger is due
///
/// Zero when the interval already elapsed or the account never synced.
/// `Duration::MAX` when the due time is beyond what chrono can represent.
pub fn next_sync_in(
    last_sync_at: Option<DateTime<Utc>>,
    interval_secs: u64,
) -> std::time::Duration {
    let Some(last) = last_sync_at else {
        return std::time::Duration::ZERO;
    };
    let due = i64::try_from(interval_secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .and_then(|interval| last.checked_add_signed(interval));

    match due {
        Some(due) => (due - Utc::now()).to_std().unwrap_or(std::time::Duration::ZERO),
        None => std::time::Duration::MAX,
    }
}
