//! Persisted process-wide settings.
//!
//! # Responsibility
//! - Own the sync enablement flag and the last successful sync time.
//!
//! # Invariants
//! - Values live in the `settings` key/value table of the settings database.
//! - An absent key reads as its default (`false` / `None`).
//! - Writes are upserts stamped with the write time in epoch milliseconds.

use crate::db::{open_db, open_db_in_memory, DbError};
use chrono::{DateTime, Utc};
use log::info;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

pub const SYNC_ENABLED_KEY: &str = "sync.enabled";
pub const SYNC_LAST_SUCCESS_KEY: &str = "sync.last_success_at";

pub type SettingsResult<T> = Result<T, SettingsError>;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("invalid value for setting `{key}`: {value}")]
    InvalidValue { key: &'static str, value: String },
}

impl From<rusqlite::Error> for SettingsError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// SQLite-backed settings shared across tasks.
pub struct SettingsStore {
    conn: Mutex<Connection>,
}

impl SettingsStore {
    pub fn open(path: impl AsRef<Path>) -> SettingsResult<Self> {
        Ok(Self::from_connection(open_db(path)?))
    }

    pub fn open_in_memory() -> SettingsResult<Self> {
        Ok(Self::from_connection(open_db_in_memory()?))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn sync_enabled(&self) -> SettingsResult<bool> {
        match self.get(SYNC_ENABLED_KEY)? {
            None => Ok(false),
            Some(value) => match value.as_str() {
                "1" | "true" => Ok(true),
                "0" | "false" => Ok(false),
                _ => Err(SettingsError::InvalidValue {
                    key: SYNC_ENABLED_KEY,
                    value,
                }),
            },
        }
    }

    pub fn set_sync_enabled(&self, enabled: bool) -> SettingsResult<()> {
        self.put(SYNC_ENABLED_KEY, if enabled { "1" } else { "0" })?;
        info!("event=settings_write module=settings status=ok key={SYNC_ENABLED_KEY} value={enabled}");
        Ok(())
    }

    /// Writes the flag only when it has never been set.
    pub fn seed_sync_enabled(&self, enabled: bool) -> SettingsResult<bool> {
        if self.get(SYNC_ENABLED_KEY)?.is_some() {
            return Ok(false);
        }
        self.set_sync_enabled(enabled)?;
        Ok(true)
    }

    pub fn last_sync_at(&self) -> SettingsResult<Option<DateTime<Utc>>> {
        let Some(value) = self.get(SYNC_LAST_SUCCESS_KEY)? else {
            return Ok(None);
        };
        DateTime::parse_from_rfc3339(&value)
            .map(|parsed| Some(parsed.with_timezone(&Utc)))
            .map_err(|_| SettingsError::InvalidValue {
                key: SYNC_LAST_SUCCESS_KEY,
                value,
            })
    }

    pub fn set_last_sync_at(&self, at: DateTime<Utc>) -> SettingsResult<()> {
        self.put(SYNC_LAST_SUCCESS_KEY, &at.to_rfc3339())
    }

    fn get(&self, key: &str) -> SettingsResult<Option<String>> {
        let value = self
            .conn()
            .query_row(
                "SELECT value FROM settings WHERE key = ?1;",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn put(&self, key: &str, value: &str) -> SettingsResult<()> {
        self.conn().execute(
            "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at;",
            params![key, value, Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{SettingsError, SettingsStore, SYNC_ENABLED_KEY};

    #[test]
    fn corrupted_flag_is_reported() {
        let store = SettingsStore::open_in_memory().unwrap();
        store.put(SYNC_ENABLED_KEY, "maybe").unwrap();
        assert!(matches!(
            store.sync_enabled(),
            Err(SettingsError::InvalidValue { key, .. }) if key == SYNC_ENABLED_KEY
        ));
    }

    #[test]
    fn seed_does_not_override_explicit_choice() {
        let store = SettingsStore::open_in_memory().unwrap();
        store.set_sync_enabled(false).unwrap();
        assert!(!store.seed_sync_enabled(true).unwrap());
        assert!(!store.sync_enabled().unwrap());
    }
}
