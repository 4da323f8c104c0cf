//! Summary of a finished or cancelled pass

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SyncResult;

/// How a pass terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PassOutcome {
    /// Ran to the end; errors may still have been recorded
    Finished,
    /// Stopped early because cancellation was requested
    Canceled,
}

/// Report returned to the trigger once a pass ends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassReport {
    pub account: String,
    pub authority: String,
    pub outcome: PassOutcome,
    pub result: SyncResult,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl PassReport {
    pub fn is_canceled(&self) -> bool {
        self.outcome == PassOutcome::Canceled
    }
}
