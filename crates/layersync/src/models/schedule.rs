//! Periodic sync registration

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Free-form extras passed along with a periodic sync
pub type Extras = BTreeMap<String, String>;

/// A periodic sync registered for one (account, authority) pair
///
/// At most one schedule exists per pair; registering again replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSchedule {
    /// Account name
    pub account: String,
    /// Content authority the account syncs against
    pub authority: String,
    /// Extras handed to each triggered pass
    pub extras: Extras,
    /// Seconds between triggers
    pub interval_secs: u64,
    /// When the schedule was created or last changed
    pub updated_at: DateTime<Utc>,
}

impl SyncSchedule {
    pub fn new(
        account: impl Into<String>,
        authority: impl Into<String>,
        extras: Extras,
        interval_secs: u64,
    ) -> Self {
        Self {
            account: account.into(),
            authority: authority.into(),
            extras,
            interval_secs,
            updated_at: Utc::now(),
        }
    }

    /// Key identifying the schedule
    pub fn key(&self) -> (String, String) {
        (self.account.clone(), self.authority.clone())
    }
}
