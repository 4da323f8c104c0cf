//! SyncService facade for UniFFI export
//!
//! A high-level, FFI-friendly API over the scheduler, host registry and
//! storage. The host platform calls [`SyncService::perform_sync`] from its
//! own background worker whenever a periodic sync fires.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::events::{EventSink, SyncEvent};
use crate::ffi::logging::{init_ffi_logger, set_log_callback, set_log_level};
use crate::ffi::types::*;
use crate::host::LocalHost;
use crate::models::{Account, AccountSelector, Extras};
use crate::settings::{SyncSettings, TreeSpec};
use crate::storage::{SettingsStore, SqliteSyncStore};
use crate::sync::{SyncScheduler, SyncTrigger};

/// Adapts a foreign event callback into an [`EventSink`]
struct CallbackSink {
    callback: Box<dyn SyncEventCallback>,
}

impl EventSink for CallbackSink {
    fn emit(&self, event: SyncEvent) {
        self.callback.on_event(event.into(), event.action());
    }
}

/// Main service object for sync operations
#[derive(uniffi::Object)]
pub struct SyncService {
    authority: String,
    account_type: String,
    store: Arc<SqliteSyncStore>,
    host: Arc<LocalHost>,
    scheduler: Arc<SyncScheduler>,
}

impl SyncService {
    fn account(&self, name: String) -> Account {
        Account::new(name, self.account_type.clone())
    }

    fn selector(account: Option<String>) -> AccountSelector {
        account.map_or(AccountSelector::All, AccountSelector::Named)
    }
}

#[uniffi::export]
impl SyncService {
    /// Create a new SyncService
    ///
    /// # Arguments
    /// * `db_path` - Path to the SQLite database holding schedules and the last sync time
    /// * `account_type` - Account type periodic syncs are registered for
    /// * `authority` - Content authority passed to every layer
    /// * `callback` - Receives lifecycle events
    #[uniffi::constructor]
    pub fn new(
        db_path: String,
        account_type: String,
        authority: String,
        callback: Box<dyn SyncEventCallback>,
    ) -> Result<Arc<Self>, LayerSyncError> {
        if let Some(parent) = PathBuf::from(&db_path).parent() {
            std::fs::create_dir_all(parent).map_err(|e| LayerSyncError::Storage {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let store = Arc::new(SqliteSyncStore::new(&db_path)?);
        let host = Arc::new(LocalHost::new(store.clone()));
        let scheduler = Arc::new(SyncScheduler::new(
            account_type.clone(),
            host.clone(),
            Arc::new(CallbackSink { callback }),
            store.clone(),
        ));

        Ok(Arc::new(Self {
            authority,
            account_type,
            store,
            host,
            scheduler,
        }))
    }

    // ========================================================================
    // Accounts
    // ========================================================================

    /// Register an account name with the service
    pub fn add_account(&self, name: String) -> Result<(), LayerSyncError> {
        self.host.add_account(self.account(name))?;
        Ok(())
    }

    /// Remove an account and its periodic syncs
    pub fn remove_account(&self, name: String) -> Result<bool, LayerSyncError> {
        Ok(self.host.remove_account(&self.account(name))?)
    }

    /// List registered account names
    pub fn list_accounts(&self) -> Result<Vec<String>, LayerSyncError> {
        Ok(self
            .host
            .accounts()?
            .into_iter()
            .map(|a| a.name)
            .collect())
    }

    // ========================================================================
    // Resource Tree
    // ========================================================================

    /// Replace the layer tree from its JSON description
    ///
    /// The JSON uses the same `{"kind": "group" | "layer", ...}` format as
    /// the `tree` field of `settings.json`.
    pub fn set_layers_json(&self, tree_json: String) -> Result<u32, LayerSyncError> {
        let tree: TreeSpec =
            serde_json::from_str(&tree_json).map_err(|e| LayerSyncError::InvalidArgument {
                message: format!("Invalid layer tree: {}", e),
            })?;
        let settings = SyncSettings {
            authority: self.authority.clone(),
            tree,
            ..SyncSettings::default()
        };
        let root = settings
            .build_tree()
            .map_err(|e| LayerSyncError::InvalidArgument {
                message: e.to_string(),
            })?;
        let leaves = root.leaf_count() as u32;
        self.scheduler.set_root(Some(Arc::new(root)));
        Ok(leaves)
    }

    /// Drop the layer tree; later passes finish without syncing anything
    pub fn clear_layers(&self) {
        self.scheduler.set_root(None);
    }

    // ========================================================================
    // Scheduling
    // ========================================================================

    /// Register a periodic sync for one account, or all when `account` is None
    ///
    /// Returns the number of accounts registered.
    pub fn schedule(
        &self,
        account: Option<String>,
        interval_secs: u64,
        extras: HashMap<String, String>,
    ) -> Result<u32, LayerSyncError> {
        let extras: Extras = extras.into_iter().collect();
        let count = self.scheduler.schedule(
            &Self::selector(account),
            &self.authority,
            &extras,
            interval_secs,
        )?;
        Ok(count as u32)
    }

    /// Remove the periodic sync for one account, or all when `account` is None
    pub fn unschedule(&self, account: Option<String>) -> Result<u32, LayerSyncError> {
        let removed = self
            .scheduler
            .unschedule(&Self::selector(account), &self.authority)?;
        Ok(removed as u32)
    }

    /// List registered periodic syncs
    pub fn list_schedules(&self) -> Result<Vec<FfiSchedule>, LayerSyncError> {
        Ok(self
            .scheduler
            .schedules()?
            .into_iter()
            .map(FfiSchedule::from)
            .collect())
    }

    // ========================================================================
    // Sync
    // ========================================================================

    /// Run one pass for an account, blocking until it ends
    ///
    /// # Arguments
    /// * `account` - Account the host triggered the sync for
    /// * `extras` - Extras from the host trigger
    /// * `timeout_ms` - Cancel the pass if it takes longer than this
    pub fn perform_sync(
        &self,
        account: String,
        extras: HashMap<String, String>,
        timeout_ms: Option<u64>,
    ) -> Result<FfiPassReport, LayerSyncError> {
        let mut trigger = SyncTrigger::new(self.account(account), self.authority.clone())
            .with_extras(extras.into_iter().collect());
        if let Some(ms) = timeout_ms {
            trigger = trigger.with_timeout(Duration::from_millis(ms));
        }

        let report = self.scheduler.perform_sync(&trigger)?;
        Ok(FfiPassReport::from(report))
    }

    /// Cancel the running pass for an account
    ///
    /// Emits `sync_canceled` immediately. Returns false if nothing was running.
    pub fn cancel_sync(&self, account: String) -> bool {
        self.scheduler.cancel_sync(&account, &self.authority)
    }

    /// Whether a pass is running for an account
    pub fn is_syncing(&self, account: String) -> bool {
        self.scheduler.is_syncing(&account, &self.authority)
    }

    /// Last successful sync time (milliseconds since epoch)
    pub fn last_sync_timestamp(&self) -> Result<Option<i64>, LayerSyncError> {
        Ok(self.store.last_sync_timestamp()?)
    }
}

// ============================================================================
// Free Functions
// ============================================================================

/// Install the Rust logger and route records to `callback`
///
/// Safe to call more than once; later calls only replace the callback and level.
#[uniffi::export]
pub fn initialize_logging(callback: Box<dyn LogCallback>, max_level: FfiLogLevel) {
    let level: log::Level = max_level.into();
    if init_ffi_logger(level).is_err() {
        log::debug!("Logger already installed, updating callback");
    }
    set_log_callback(Some(Arc::from(callback)));
    set_log_level(level);
}

/// Change the maximum log level forwarded to the callback
#[uniffi::export]
pub fn set_logging_level(max_level: FfiLogLevel) {
    set_log_level(max_level.into());
}

/// Fully qualified action name for an event (e.g. `org.layersync.sync_start`)
#[uniffi::export]
pub fn event_action_name(event: FfiSyncEvent) -> String {
    SyncEvent::from(event).action()
}

/// Event for a short or fully qualified action name, if it is one of ours
#[uniffi::export]
pub fn parse_event_action(name: String) -> Option<FfiSyncEvent> {
    SyncEvent::parse(&name).map(FfiSyncEvent::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct Recorder(Arc<Mutex<Vec<FfiSyncEvent>>>);

    impl SyncEventCallback for Recorder {
        fn on_event(&self, event: FfiSyncEvent, action: String) {
            assert!(action.starts_with("org.layersync."));
            self.0.lock().unwrap().push(event);
        }
    }

    fn service(dir: &TempDir) -> (Arc<SyncService>, Arc<Mutex<Vec<FfiSyncEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let service = SyncService::new(
            dir.path().join("nested/sync.db").to_string_lossy().into_owned(),
            "org.layersync.account".to_string(),
            "org.layersync.provider".to_string(),
            Box::new(Recorder(events.clone())),
        )
        .unwrap();
        (service, events)
    }

    #[test]
    fn test_schedule_and_sync_empty_tree() {
        let dir = TempDir::new().unwrap();
        let (service, events) = service(&dir);
        service.add_account("alice".to_string()).unwrap();

        service.schedule(None, 60, Default::default()).unwrap();
        service
            .schedule(Some("alice".to_string()), 120, Default::default())
            .unwrap();
        let schedules = service.list_schedules().unwrap();
        assert_eq!(schedules.len(), 1);
        assert_eq!(schedules[0].interval_secs, 120);

        let report = service
            .perform_sync("alice".to_string(), Default::default(), None)
            .unwrap();
        assert_eq!(report.outcome, FfiPassOutcome::Finished);
        assert_eq!(
            *events.lock().unwrap(),
            vec![FfiSyncEvent::Start, FfiSyncEvent::Finish]
        );
        assert!(service.last_sync_timestamp().unwrap().is_some());
    }

    #[test]
    fn test_schedule_unknown_account() {
        let dir = TempDir::new().unwrap();
        let (service, _) = service(&dir);
        let err = service
            .schedule(Some("nobody".to_string()), 60, Default::default())
            .unwrap_err();
        assert!(matches!(err, LayerSyncError::NoMatchingAccount { .. }));
    }

    #[test]
    fn test_set_layers_json() {
        let dir = TempDir::new().unwrap();
        let (service, _) = service(&dir);
        let leaves = service
            .set_layers_json(
                r#"{"kind": "group", "children": [
                    {"kind": "layer", "id": "roads", "url": "http://127.0.0.1:9/roads"}
                ]}"#
                .to_string(),
            )
            .unwrap();
        assert_eq!(leaves, 1);

        let err = service.set_layers_json("{}".to_string()).unwrap_err();
        assert!(matches!(err, LayerSyncError::InvalidArgument { .. }));
    }

    #[test]
    fn test_remove_account() {
        let dir = TempDir::new().unwrap();
        let (service, _) = service(&dir);
        service.add_account("alice".to_string()).unwrap();
        service.schedule(None, 60, Default::default()).unwrap();

        assert!(service.remove_account("alice".to_string()).unwrap());
        assert!(service.list_accounts().unwrap().is_empty());
        assert!(service.list_schedules().unwrap().is_empty());
        assert!(!service.cancel_sync("alice".to_string()));
    }

    #[test]
    fn test_event_action_name() {
        assert_eq!(
            event_action_name(FfiSyncEvent::Canceled),
            "org.layersync.sync_canceled"
        );
    }

    #[test]
    fn test_parse_event_action() {
        assert_eq!(
            parse_event_action("org.layersync.sync_changes".to_string()),
            Some(FfiSyncEvent::Changes)
        );
        assert_eq!(parse_event_action("sync_start".to_string()), Some(FfiSyncEvent::Start));
        assert_eq!(parse_event_action("org.layersync.sync_paused".to_string()), None);
    }
}
