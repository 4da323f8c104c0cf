//! Host-side account registry and periodic sync registration
//!
//! The scheduler never stores schedules itself. It asks a [`SyncHost`] which
//! accounts exist and hands periodic registrations to it, the way a mobile
//! platform's sync framework would.

use std::sync::{Arc, RwLock};

use anyhow::{Result, anyhow};

use crate::models::{Account, SyncSchedule};
use crate::storage::ScheduleStore;

/// Registration interface offered by the host scheduling facility
pub trait SyncHost: Send + Sync {
    /// All accounts of the given type
    fn accounts_by_type(&self, account_type: &str) -> Result<Vec<Account>>;

    /// Register or replace the periodic sync for the schedule's (account, authority)
    fn add_periodic_sync(&self, schedule: SyncSchedule) -> Result<()>;

    /// Remove the periodic sync for a pair, returning whether one existed
    fn remove_periodic_sync(&self, account: &Account, authority: &str) -> Result<bool>;

    /// All registered periodic syncs
    fn periodic_syncs(&self) -> Result<Vec<SyncSchedule>>;
}

/// In-process host backed by an account list and a [`ScheduleStore`]
pub struct LocalHost {
    accounts: RwLock<Vec<Account>>,
    schedules: Arc<dyn ScheduleStore>,
}

impl LocalHost {
    pub fn new(schedules: Arc<dyn ScheduleStore>) -> Self {
        Self {
            accounts: RwLock::new(Vec::new()),
            schedules,
        }
    }

    /// Add an account; adding an existing account is a no-op
    pub fn add_account(&self, account: Account) -> Result<()> {
        let mut accounts = self
            .accounts
            .write()
            .map_err(|_| anyhow!("Account registry lock poisoned"))?;
        if !accounts.contains(&account) {
            accounts.push(account);
        }
        Ok(())
    }

    /// Remove an account together with all of its periodic syncs
    pub fn remove_account(&self, account: &Account) -> Result<bool> {
        let removed = {
            let mut accounts = self
                .accounts
                .write()
                .map_err(|_| anyhow!("Account registry lock poisoned"))?;
            let before = accounts.len();
            accounts.retain(|a| a != account);
            before != accounts.len()
        };

        if removed {
            let dropped = self.schedules.delete_schedules_for_account(&account.name)?;
            log::info!(
                "Removed account {} ({} periodic syncs dropped)",
                account.name,
                dropped
            );
        }
        Ok(removed)
    }

    pub fn accounts(&self) -> Result<Vec<Account>> {
        let accounts = self
            .accounts
            .read()
            .map_err(|_| anyhow!("Account registry lock poisoned"))?;
        Ok(accounts.clone())
    }
}

impl SyncHost for LocalHost {
    fn accounts_by_type(&self, account_type: &str) -> Result<Vec<Account>> {
        Ok(self
            .accounts()?
            .into_iter()
            .filter(|a| a.account_type == account_type)
            .collect())
    }

    fn add_periodic_sync(&self, schedule: SyncSchedule) -> Result<()> {
        self.schedules.upsert_schedule(schedule)
    }

    fn remove_periodic_sync(&self, account: &Account, authority: &str) -> Result<bool> {
        self.schedules.delete_schedule(&account.name, authority)
    }

    fn periodic_syncs(&self) -> Result<Vec<SyncSchedule>> {
        self.schedules.list_schedules()
    }
}
