//! Storage layer for mealscan.
//!
//! This module provides `SQLite`-based persistent storage for users, meals,
//! ingredients and nutrition rows. Referential integrity is delegated to
//! `SQLite` foreign keys with cascading deletes.

pub mod migrations;
pub mod schema;

mod aggregates;
mod meals;
mod users;

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{types::Type, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Text format of `meals.consumed_at`.
pub(crate) const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Storage engine for meals and profiles.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
        )?;

        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let count = |table: &str| -> Result<i64> {
            let sql = format!("SELECT COUNT(*) FROM {table}");
            Ok(self.conn.query_row(&sql, [], |row| row.get(0))?)
        };

        let (first, last): (Option<String>, Option<String>) = self.conn.query_row(
            "SELECT MIN(consumed_at), MAX(consumed_at) FROM meals",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            users: count("users")?,
            meals: count("meals")?,
            ingredients: count("ingredients")?,
            first_meal_at: first.and_then(|s| NaiveDateTime::parse_from_str(&s, DATETIME_FORMAT).ok()),
            last_meal_at: last.and_then(|s| NaiveDateTime::parse_from_str(&s, DATETIME_FORMAT).ok()),
            db_size_bytes,
        })
    }

    /// Read a single optional value, mapping "no rows" to `None`.
    fn query_optional<T, P, F>(&self, sql: &str, params: P, f: F) -> Result<Option<T>>
    where
        P: rusqlite::Params,
        F: FnOnce(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
    {
        Ok(self.conn.query_row(sql, params, f).optional()?)
    }
}

/// Statistics about the storage.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StorageStats {
    /// Number of user profiles.
    pub users: i64,
    /// Number of meals.
    pub meals: i64,
    /// Number of ingredient rows.
    pub ingredients: i64,
    /// Earliest `consumed_at`.
    pub first_meal_at: Option<NaiveDateTime>,
    /// Latest `consumed_at`.
    pub last_meal_at: Option<NaiveDateTime>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

/// Format a local timestamp for storage.
pub(crate) fn format_datetime(value: &NaiveDateTime) -> String {
    value.format(DATETIME_FORMAT).to_string()
}

/// Parse a stored local timestamp, failing the row on bad data.
pub(crate) fn parse_datetime(idx: usize, text: &str) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, DATETIME_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Parse a stored RFC 3339 timestamp, falling back to now on bad data.
pub(crate) fn parse_created_at(text: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(text).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
