//! SQLite-backed settings and schedule storage

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use rusqlite_migration::{M, Migrations};

use super::{ScheduleStore, SettingsStore};
use crate::models::{Extras, SyncSchedule};

/// Database migrations
///
/// Each migration is applied in order. The user_version pragma tracks which
/// migrations have been applied.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        // Migration 1: Initial schema
        M::up(
            r#"
            -- Integer settings (last sync timestamp, ...)
            CREATE TABLE settings (
                key TEXT PRIMARY KEY,
                value INTEGER NOT NULL
            );

            -- One periodic sync per (account, authority)
            CREATE TABLE periodic_syncs (
                account TEXT NOT NULL,
                authority TEXT NOT NULL,
                extras TEXT NOT NULL DEFAULT '{}',
                interval_secs INTEGER NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (account, authority)
            );
            "#,
        ),
    ])
}

/// SQLite implementation of [`SettingsStore`] and [`ScheduleStore`]
pub struct SqliteSyncStore {
    conn: Mutex<Connection>,
}

impl SqliteSyncStore {
    /// Open (or create) the store at `db_path`
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;
        Self::with_connection(conn)
    }

    /// Open a private in-memory database
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::with_connection(conn)
    }

    fn with_connection(mut conn: Connection) -> Result<Self> {
        // WAL lets the host read settings while a pass writes the timestamp
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            "#,
        )?;

        migrations()
            .to_latest(&mut conn)
            .context("Failed to run database migrations")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Database connection lock poisoned"))
    }
}

/// Raw row from `periodic_syncs`
type ScheduleRow = (String, String, String, i64, String);

fn schedule_from_row(row: ScheduleRow) -> Result<SyncSchedule> {
    let (account, authority, extras_json, interval_secs, updated_at) = row;
    let extras: Extras =
        serde_json::from_str(&extras_json).context("Failed to parse schedule extras")?;
    let updated_at = DateTime::parse_from_rfc3339(&updated_at)
        .context("Failed to parse schedule timestamp")?
        .with_timezone(&Utc);

    Ok(SyncSchedule {
        account,
        authority,
        extras,
        interval_secs: interval_secs as u64,
        updated_at,
    })
}

fn read_schedule_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScheduleRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

impl SettingsStore for SqliteSyncStore {
    fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        let conn = self.conn()?;
        let value = conn
            .query_row("SELECT value FROM settings WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn put_i64(&self, key: &str, value: i64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM settings WHERE key = ?", [key])?;
        Ok(())
    }
}

impl ScheduleStore for SqliteSyncStore {
    fn upsert_schedule(&self, schedule: SyncSchedule) -> Result<()> {
        let extras_json = serde_json::to_string(&schedule.extras)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO periodic_syncs
             (account, authority, extras, interval_secs, updated_at)
             VALUES (?, ?, ?, ?, ?)",
            params![
                schedule.account,
                schedule.authority,
                extras_json,
                schedule.interval_secs as i64,
                schedule.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn get_schedule(&self, account: &str, authority: &str) -> Result<Option<SyncSchedule>> {
        let row = {
            let conn = self.conn()?;
            conn.query_row(
                "SELECT account, authority, extras, interval_secs, updated_at
                 FROM periodic_syncs WHERE account = ? AND authority = ?",
                [account, authority],
                read_schedule_row,
            )
            .optional()?
        };
        row.map(schedule_from_row).transpose()
    }

    fn delete_schedule(&self, account: &str, authority: &str) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM periodic_syncs WHERE account = ? AND authority = ?",
            [account, authority],
        )?;
        Ok(deleted > 0)
    }

    fn delete_schedules_for_account(&self, account: &str) -> Result<usize> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM periodic_syncs WHERE account = ?", [account])?;
        Ok(deleted)
    }

    fn list_schedules(&self) -> Result<Vec<SyncSchedule>> {
        let rows = {
            let conn = self.conn()?;
            let mut stmt = conn.prepare(
                "SELECT account, authority, extras, interval_secs, updated_at
                 FROM periodic_syncs ORDER BY account, authority",
            )?;
            let rows = stmt
                .query_map([], read_schedule_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };
        rows.into_iter().map(schedule_from_row).collect()
    }
}
