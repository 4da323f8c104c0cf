//! Periodic driver for sync passes
//!
//! Stands in for a platform job scheduler: one timer per registered
//! schedule, each firing a blocking pass on tokio's blocking pool.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use log::{debug, error, info, warn};
use tokio::task::JoinSet;
use tokio::time::{self, MissedTickBehavior};

use layersync::{
    Account, AccountSelector, LocalHost, LogEventSink, PassReport, SqliteSyncStore, SyncError,
    SyncSchedule, SyncScheduler, SyncSettings, SyncTrigger, next_sync_in,
};

pub struct Daemon {
    settings: SyncSettings,
    scheduler: Arc<SyncScheduler>,
}

impl Daemon {
    /// Open the database named by the settings and register everything
    pub fn new(settings: SyncSettings) -> Result<Self> {
        let db_path = settings
            .database_path()
            .context("No data directory available for the sync database")?;
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        info!("Using sync database at {}", db_path.display());

        let store = Arc::new(SqliteSyncStore::new(&db_path)?);
        Self::with_store(settings, store)
    }

    /// Register accounts, load the layer tree and upsert periodic syncs
    pub fn with_store(settings: SyncSettings, store: Arc<SqliteSyncStore>) -> Result<Self> {
        let accounts = settings.accounts();
        if accounts.is_empty() {
            bail!("No accounts configured; list them in settings.json or set LAYERSYNC_ACCOUNT");
        }

        let host = Arc::new(LocalHost::new(store.clone()));
        for account in accounts {
            host.add_account(account)?;
        }

        let scheduler = Arc::new(SyncScheduler::new(
            settings.account_type.clone(),
            host,
            Arc::new(LogEventSink),
            store,
        ));

        let root = settings.build_tree()?;
        info!(
            "Loaded resource tree with {} layers, {} levels deep",
            root.leaf_count(),
            root.depth()
        );
        scheduler.set_root(Some(Arc::new(root)));

        scheduler.schedule(
            &AccountSelector::All,
            &settings.authority,
            &settings.extras,
            settings.interval_secs,
        )?;

        Ok(Self {
            settings,
            scheduler,
        })
    }

    pub fn scheduler(&self) -> &Arc<SyncScheduler> {
        &self.scheduler
    }

    /// Schedules registered for the configured authority
    fn schedules(&self) -> Result<Vec<SyncSchedule>> {
        Ok(self
            .scheduler
            .schedules()?
            .into_iter()
            .filter(|s| s.authority == self.settings.authority)
            .collect())
    }

    fn trigger_for(&self, schedule: &SyncSchedule) -> SyncTrigger {
        let account = Account::new(schedule.account.clone(), self.settings.account_type.clone());
        let trigger = SyncTrigger::new(account, schedule.authority.clone())
            .with_extras(schedule.extras.clone());
        match self.settings.pass_timeout() {
            Some(timeout) => trigger.with_timeout(timeout),
            None => trigger,
        }
    }

    /// Run one pass on the blocking pool and log how it ended
    async fn run_pass(&self, schedule: &SyncSchedule) -> Option<PassReport> {
        let scheduler = self.scheduler.clone();
        let trigger = self.trigger_for(schedule);

        match tokio::task::spawn_blocking(move || scheduler.perform_sync(&trigger)).await {
            Ok(Ok(report)) => {
                log_report(&report);
                Some(report)
            }
            Ok(Err(SyncError::AlreadyRunning { account, authority })) => {
                debug!("Skipping trigger, {} / {} is still syncing", account, authority);
                None
            }
            Ok(Err(e)) => {
                error!("Sync pass for {} failed: {}", schedule.account, e);
                None
            }
            Err(e) => {
                error!("Sync task for {} panicked: {}", schedule.account, e);
                None
            }
        }
    }

    /// Run every schedule once, one after another
    pub async fn run_once(&self) -> Result<Vec<PassReport>> {
        let mut reports = Vec::new();
        for schedule in self.schedules()? {
            if let Some(report) = self.run_pass(&schedule).await {
                reports.push(report);
            }
        }
        Ok(reports)
    }

    /// Drive every schedule until Ctrl+C or SIGTERM
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let mut timers = JoinSet::new();
        for schedule in self.schedules()? {
            timers.spawn(self.clone().drive(schedule));
        }

        tokio::select! {
            _ = shutdown_signal() => {
                let canceled = self.scheduler.cancel_all();
                info!("Shutting down, canceled {} running passes", canceled);
            }
            _ = timers.join_next() => warn!("Sync timer exited unexpectedly"),
        }

        timers.abort_all();
        Ok(())
    }

    async fn drive(self: Arc<Self>, schedule: SyncSchedule) {
        let last = self.scheduler.last_sync_at().unwrap_or_else(|e| {
            warn!("Could not read last sync time: {}", e);
            None
        });
        let first = next_sync_in(last, schedule.interval_secs);
        let period = Duration::from_secs(schedule.interval_secs);

        info!(
            "Driving {} / {} every {}s (first pass in {}s)",
            schedule.account,
            schedule.authority,
            schedule.interval_secs,
            first.as_secs()
        );

        let Some(start) = time::Instant::now().checked_add(first) else {
            warn!(
                "{} / {} is never due, not driving it",
                schedule.account, schedule.authority
            );
            return std::future::pending().await;
        };

        let mut ticker = time::interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.run_pass(&schedule).await;
        }
    }
}

fn log_report(report: &PassReport) {
    let result = &report.result;
    if report.is_canceled() {
        info!(
            "{} / {} canceled after {}ms ({} layers synced)",
            report.account, report.authority, report.duration_ms, result.resources_synced
        );
    } else {
        info!(
            "{} / {} finished in {}ms: {} layers, {} changes, {} conflicts, {} errors",
            report.account,
            report.authority,
            report.duration_ms,
            result.resources_synced,
            result.changes,
            result.conflicts,
            result.error_count()
        );
    }

    for failure in &result.failures {
        warn!(
            "  {} ({:?}): {}",
            failure.resource_id, failure.severity, failure.message
        );
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
