//! In-memory storage implementation
//!
//! Used by tests and by hosts that do not need persistence.

use anyhow::{Result, anyhow};
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{ScheduleStore, SettingsStore};
use crate::models::SyncSchedule;

/// In-memory implementation of [`SettingsStore`] and [`ScheduleStore`]
#[derive(Default)]
pub struct InMemorySyncStore {
    settings: RwLock<HashMap<String, i64>>,
    /// Keyed by (account, authority) so listing is ordered
    schedules: RwLock<BTreeMap<(String, String), SyncSchedule>>,
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| anyhow!("In-memory store lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| anyhow!("In-memory store lock poisoned"))
}

impl InMemorySyncStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for InMemorySyncStore {
    fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        Ok(read(&self.settings)?.get(key).copied())
    }

    fn put_i64(&self, key: &str, value: i64) -> Result<()> {
        write(&self.settings)?.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        write(&self.settings)?.remove(key);
        Ok(())
    }
}

impl ScheduleStore for InMemorySyncStore {
    fn upsert_schedule(&self, schedule: SyncSchedule) -> Result<()> {
        write(&self.schedules)?.insert(schedule.key(), schedule);
        Ok(())
    }

    fn get_schedule(&self, account: &str, authority: &str) -> Result<Option<SyncSchedule>> {
        let key = (account.to_string(), authority.to_string());
        Ok(read(&self.schedules)?.get(&key).cloned())
    }

    fn delete_schedule(&self, account: &str, authority: &str) -> Result<bool> {
        let key = (account.to_string(), authority.to_string());
        Ok(write(&self.schedules)?.remove(&key).is_some())
    }

    fn delete_schedules_for_account(&self, account: &str) -> Result<usize> {
        let mut schedules = write(&self.schedules)?;
        let before = schedules.len();
        schedules.retain(|(acct, _), _| acct != account);
        Ok(before - schedules.len())
    }

    fn list_schedules(&self) -> Result<Vec<SyncSchedule>> {
        Ok(read(&self.schedules)?.values().cloned().collect())
    }
}
