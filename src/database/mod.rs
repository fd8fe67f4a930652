// ABOUTME: SQLite database management for keyrelay durable storage
// ABOUTME: Owns the connection pool, schema migrations, and timestamp encoding
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keyrelay Contributors

//! # Database Management
//!
//! SQLite-backed persistence for grants, clients, sessions, and
//! notifications. Timestamps persist as INTEGER unix epoch milliseconds so
//! expiry comparisons are total-ordered: a record is live while
//! `now < expires_at` and sweepable once `expires_at <= now`.

mod clients;
mod grants;
mod notifications;
mod sessions;

use crate::errors::{AppError, AppResult};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use std::time::Duration;

/// Database manager for keyrelay durable records
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Create a new database connection and run migrations
    ///
    /// # Errors
    /// Returns `StoreUnavailable` if the connection or migration fails
    pub async fn new(database_url: &str) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(AppError::from)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        // A pooled in-memory database would hand each connection its own
        // empty database, so pin it to a single connection.
        let max_connections = if database_url.contains(":memory:") {
            1
        } else {
            5
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(AppError::from)?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Get a reference to the database pool for advanced operations
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Run database migrations
    ///
    /// # Errors
    /// Returns `StoreUnavailable` if schema creation fails
    pub async fn migrate(&self) -> AppResult<()> {
        self.migrate_grants().await?;
        self.migrate_clients().await?;
        self.migrate_sessions().await?;
        self.migrate_notifications().await?;
        Ok(())
    }

    async fn migrate_grants(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS grants (
                id TEXT PRIMARY KEY,
                grant_id TEXT,
                client_id TEXT NOT NULL,
                account_id TEXT,
                kind TEXT NOT NULL,
                jti TEXT,
                issued_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                data TEXT NOT NULL DEFAULT '{}',
                consumed INTEGER NOT NULL DEFAULT 0,
                consumed_at INTEGER
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_grants_family ON grants(grant_id)")
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_grants_client ON grants(client_id)")
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_grants_expiry ON grants(expires_at)")
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;

        Ok(())
    }

    async fn migrate_clients(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS clients (
                id TEXT PRIMARY KEY,
                client_id TEXT NOT NULL UNIQUE,
                client_secret_hash TEXT,
                redirect_uris TEXT NOT NULL,
                grant_types TEXT NOT NULL,
                response_types TEXT NOT NULL,
                scope TEXT,
                signing_alg TEXT,
                client_name TEXT,
                client_uri TEXT,
                logo_uri TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(())
    }

    async fn migrate_sessions(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                account_id TEXT,
                data TEXT NOT NULL DEFAULT '{}',
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_expiry ON sessions(expires_at)")
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;

        Ok(())
    }

    async fn migrate_notifications(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS notifications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                notification_type_id INTEGER NOT NULL,
                title TEXT NOT NULL,
                message TEXT NOT NULL,
                link_url TEXT,
                is_read INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                read_at INTEGER
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id, is_read)",
        )
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(())
    }
}

/// Encode a timestamp as unix epoch milliseconds for persistence
pub(crate) fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

/// Decode a persisted unix-epoch-milliseconds timestamp
pub(crate) fn from_millis(ms: i64) -> AppResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| AppError::internal(format!("persisted timestamp out of range: {ms}")))
}
