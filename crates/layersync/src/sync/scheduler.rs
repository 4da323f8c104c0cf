//! Periodic sync registration and pass execution

use std::collections::HashMap;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use super::notifier::LifecycleNotifier;
use super::orchestrator::SyncOrchestrator;
use super::timing::MAX_INTERVAL_SECS;
use crate::cancel::CancellationFlag;
use crate::error::SyncError;
use crate::events::EventSink;
use crate::host::SyncHost;
use crate::models::{
    Account, AccountSelector, Extras, PassOutcome, PassReport, ResourceGroup, SyncResult,
    SyncSchedule,
};
use crate::storage::SettingsStore;

/// One invocation from the host trigger mechanism
#[derive(Debug, Clone)]
pub struct SyncTrigger {
    pub account: Account,
    pub authority: String,
    pub extras: Extras,
    /// Cancel the pass if it runs longer than this
    pub timeout: Option<Duration>,
}

impl SyncTrigger {
    pub fn new(account: Account, authority: impl Into<String>) -> Self {
        Self {
            account,
            authority: authority.into(),
            extras: Extras::new(),
            timeout: None,
        }
    }

    pub fn with_extras(mut self, extras: Extras) -> Self {
        self.extras = extras;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

type PassKey = (String, String);

/// Handles to a pass that is currently running
struct InFlight {
    cancel: CancellationFlag,
    notifier: Arc<LifecycleNotifier>,
}

/// Registers periodic syncs with the host and runs triggered passes
///
/// Each pass gets its own cancellation flag, result and notifier. Passes
/// for different (account, authority) pairs may run concurrently; a second
/// trigger for a pair that is already running is rejected.
pub struct SyncScheduler {
    account_type: String,
    host: Arc<dyn SyncHost>,
    sink: Arc<dyn EventSink>,
    settings: Arc<dyn SettingsStore>,
    root: RwLock<Option<Arc<ResourceGroup>>>,
    in_flight: Mutex<HashMap<PassKey, InFlight>>,
}

impl SyncScheduler {
    pub fn new(
        account_type: impl Into<String>,
        host: Arc<dyn SyncHost>,
        sink: Arc<dyn EventSink>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        Self {
            account_type: account_type.into(),
            host,
            sink,
            settings,
            root: RwLock::new(None),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn account_type(&self) -> &str {
        &self.account_type
    }

    /// Replace the resource tree used by subsequent passes
    ///
    /// Passes already running keep the tree they started with.
    pub fn set_root(&self, root: Option<Arc<ResourceGroup>>) {
        match self.root.write() {
            Ok(mut guard) => *guard = root,
            Err(poisoned) => *poisoned.into_inner() = root,
        }
    }

    fn current_root(&self) -> Option<Arc<ResourceGroup>> {
        match self.root.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn in_flight(&self) -> MutexGuard<'_, HashMap<PassKey, InFlight>> {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn matching_accounts(&self, selector: &AccountSelector) -> Result<Vec<Account>, SyncError> {
        let accounts: Vec<Account> = self
            .host
            .accounts_by_type(&self.account_type)?
            .into_iter()
            .filter(|a| selector.matches(a))
            .collect();

        if accounts.is_empty() {
            return Err(SyncError::NoMatchingAccount {
                account_type: self.account_type.clone(),
                selector: selector.to_string(),
            });
        }
        Ok(accounts)
    }

    /// Register periodic syncs for every matching account
    ///
    /// Re-registering a pair replaces its interval and extras. Returns the
    /// number of accounts registered.
    pub fn schedule(
        &self,
        selector: &AccountSelector,
        authority: &str,
        extras: &Extras,
        interval_secs: u64,
    ) -> Result<usize, SyncError> {
        if interval_secs == 0 || interval_secs > MAX_INTERVAL_SECS {
            return Err(SyncError::InvalidInterval);
        }

        let accounts = self.matching_accounts(selector)?;
        for account in &accounts {
            self.host.add_periodic_sync(SyncSchedule::new(
                account.name.clone(),
                authority,
                extras.clone(),
                interval_secs,
            ))?;
            log::info!(
                "Scheduled {} / {} every {}s",
                account.name,
                authority,
                interval_secs
            );
        }
        Ok(accounts.len())
    }

    /// Remove periodic syncs for every matching account
    ///
    /// Returns the number of registrations actually removed.
    pub fn unschedule(
        &self,
        selector: &AccountSelector,
        authority: &str,
    ) -> Result<usize, SyncError> {
        let accounts = self.matching_accounts(selector)?;
        let mut removed = 0;
        for account in &accounts {
            if self.host.remove_periodic_sync(account, authority)? {
                log::info!("Unscheduled {} / {}", account.name, authority);
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// All periodic syncs registered with the host
    pub fn schedules(&self) -> Result<Vec<SyncSchedule>, SyncError> {
        Ok(self.host.periodic_syncs()?)
    }

    /// Run one pass for the trigger, blocking until it ends
    pub fn perform_sync(&self, trigger: &SyncTrigger) -> Result<PassReport, SyncError> {
        let key = (trigger.account.name.clone(), trigger.authority.clone());
        let cancel = CancellationFlag::new();
        let notifier = Arc::new(LifecycleNotifier::new(
            self.sink.clone(),
            self.settings.clone(),
        ));

        {
            let mut in_flight = self.in_flight();
            if in_flight.contains_key(&key) {
                return Err(SyncError::AlreadyRunning {
                    account: key.0,
                    authority: key.1,
                });
            }
            in_flight.insert(
                key.clone(),
                InFlight {
                    cancel: cancel.clone(),
                    notifier: notifier.clone(),
                },
            );
        }

        let _registration = PassRegistration {
            scheduler: self,
            key,
            cancel: cancel.clone(),
            notifier: notifier.clone(),
        };
        self.run_pass(trigger, &cancel, &notifier)
    }

    fn run_pass(
        &self,
        trigger: &SyncTrigger,
        cancel: &CancellationFlag,
        notifier: &LifecycleNotifier,
    ) -> Result<PassReport, SyncError> {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut result = SyncResult::new();

        log::info!(
            "Sync pass starting for {} / {}",
            trigger.account.name,
            trigger.authority
        );
        notifier.notify_start();

        let watchdog = trigger.timeout.map(|timeout| spawn_watchdog(timeout, cancel.clone()));

        let walked = match self.current_root() {
            Some(root) => {
                SyncOrchestrator::new(trigger.authority.clone()).run(&root, cancel, &mut result)
            }
            None => {
                log::debug!("No resource tree set, nothing to sync");
                Ok(())
            }
        };

        if let Some(stop) = watchdog {
            // Receiver may already be gone if the timeout fired
            let _ = stop.send(());
        }

        if let Err(e) = walked {
            log::error!("Sync pass aborted: {}", e);
            cancel.request_cancel();
            notifier.notify_canceled();
            return Err(e);
        }

        let outcome = notifier.complete(cancel, &result)?;
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            PassOutcome::Finished => log::info!(
                "Sync pass finished for {} / {} in {}ms ({} resources, {} errors)",
                trigger.account.name,
                trigger.authority,
                duration_ms,
                result.resources_synced,
                result.error_count()
            ),
            PassOutcome::Canceled => log::info!(
                "Sync pass canceled for {} / {} after {}ms",
                trigger.account.name,
                trigger.authority,
                duration_ms
            ),
        }

        Ok(PassReport {
            account: trigger.account.name.clone(),
            authority: trigger.authority.clone(),
            outcome,
            result,
            started_at,
            duration_ms,
        })
    }

    /// Cancel the in-flight pass for a pair
    ///
    /// Sets the pass's flag and emits `sync_canceled` right away. Returns
    /// `false` if no pass was running or it already finished, in which case
    /// nothing is emitted.
    pub fn cancel_sync(&self, account: &str, authority: &str) -> bool {
        let key = (account.to_string(), authority.to_string());
        let pass = self
            .in_flight()
            .get(&key)
            .map(|pass| (pass.cancel.clone(), pass.notifier.clone()));

        match pass {
            Some((cancel, notifier)) => {
                cancel.request_cancel();
                notifier.notify_canceled()
            }
            None => {
                log::debug!("Cancel for {} / {} arrived with no pass running", account, authority);
                false
            }
        }
    }

    /// Cancel every in-flight pass, returning how many this call ended
    pub fn cancel_all(&self) -> usize {
        let passes: Vec<_> = self
            .in_flight()
            .values()
            .map(|pass| (pass.cancel.clone(), pass.notifier.clone()))
            .collect();

        passes
            .iter()
            .filter(|(cancel, notifier)| {
                cancel.request_cancel();
                notifier.notify_canceled()
            })
            .count()
    }

    pub fn is_syncing(&self, account: &str, authority: &str) -> bool {
        self.in_flight()
            .contains_key(&(account.to_string(), authority.to_string()))
    }

    /// When the last uncancelled pass finished
    pub fn last_sync_at(&self) -> Result<Option<DateTime<Utc>>, SyncError> {
        let millis = self.settings.last_sync_timestamp()?;
        Ok(millis.and_then(super::timing::millis_to_datetime))
    }
}

/// Keeps a pass registered as in flight until it ends, normally or by unwinding
///
/// A pass that never reached a terminal event (a leaf panicked) is reported
/// as canceled so observers are not left waiting after `sync_start`.
struct PassRegistration<'a> {
    scheduler: &'a SyncScheduler,
    key: PassKey,
    cancel: CancellationFlag,
    notifier: Arc<LifecycleNotifier>,
}

impl Drop for PassRegistration<'_> {
    fn drop(&mut self) {
        self.scheduler.in_flight().remove(&self.key);

        if !self.notifier.is_finished() && !self.notifier.is_canceled() {
            log::error!(
                "Sync pass for {} / {} ended without completing",
                self.key.0,
                self.key.1
            );
            self.cancel.request_cancel();
            self.notifier.notify_canceled();
        }
    }
}

/// Request cancellation after `timeout` unless told to stop first
fn spawn_watchdog(timeout: Duration, cancel: CancellationFlag) -> mpsc::Sender<()> {
    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    std::thread::spawn(move || {
        if let Err(RecvTimeoutError::Timeout) = stop_rx.recv_timeout(timeout) {
            log::warn!("Sync pass exceeded {:?}, requesting cancel", timeout);
            cancel.request_cancel();
        }
    });
    stop_tx
}
