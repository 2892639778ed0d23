//! Durable cache of accounts, mailboxes and messages on `SQLite`.
//!
//! Multi-row writes (mailbox replacement, new-message batches) run in one
//! transaction and roll back on failure. Timestamps are RFC 3339 text in UTC.

mod accounts;
mod mailboxes;
mod messages;
mod model;
mod policy;

use std::path::Path;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::debug;

use crate::Result;

pub use model::{CachedBody, EmailAddress, Envelope, MessageSummary, RemoteMessage};
pub use policy::{CacheEntity, ConsistencyPolicy, MAILBOX_TTL};

/// Handle to the cache database. Cloning shares the pool.
#[derive(Debug, Clone)]
pub struct CacheStore {
    pool: SqlitePool,
}

impl CacheStore {
    /// Opens (creating if needed) the database at `database_path` in WAL mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn new(database_path: &Path) -> Result<Self> {
        let url = format!("sqlite:{}?mode=rwc", database_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&pool)
            .await?;

        let store = Self { pool };
        store.initialize().await?;
        debug!(path = %database_path.display(), "opened cache database");
        Ok(store)
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS accounts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL UNIQUE,
                imap_url TEXT NOT NULL,
                oauth_access_token TEXT,
                oauth_refresh_token TEXT,
                oauth_expiry INTEGER,
                app_specific_password TEXT,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS mailboxes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                account_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                last_updated TEXT NOT NULL,
                UNIQUE(account_id, name)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                mailbox_name TEXT NOT NULL,
                account_id INTEGER NOT NULL,
                uid INTEGER NOT NULL,
                envelope BLOB NOT NULL,
                body_plain TEXT,
                body_html TEXT,
                body_raw BLOB,
                received_at TEXT NOT NULL,
                last_updated TEXT NOT NULL,
                UNIQUE(mailbox_name, uid, account_id)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_messages_mailbox
            ON messages(account_id, mailbox_name, uid)
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
