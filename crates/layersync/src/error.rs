//! Error types for scheduling and sync passes

/// Errors surfaced by the scheduler and orchestrator
///
/// Leaf failures are never reported through this type: they are recorded
/// into the pass's [`SyncResult`](crate::models::SyncResult) instead.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("No account of type '{account_type}' matches {selector}")]
    NoMatchingAccount {
        account_type: String,
        selector: String,
    },

    #[error(
        "Sync interval must be between 1 and {} seconds",
        crate::sync::MAX_INTERVAL_SECS
    )]
    InvalidInterval,

    #[error("A sync pass is already running for {account} / {authority}")]
    AlreadyRunning { account: String, authority: String },

    #[error("Resource tree is malformed: {0}")]
    MalformedTree(String),

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}
