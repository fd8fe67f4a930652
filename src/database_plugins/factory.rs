// ABOUTME: Database factory selecting a backend from the connection URL
// ABOUTME: Enum dispatch so callers hold one concrete type regardless of engine
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keyrelay Contributors

use super::{sqlite::SqliteDatabase, DatabaseProvider};
use crate::errors::{AppError, AppResult};
use crate::models::{Client, Grant, NewNotification, Notification, Session};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

/// Database enum that dispatches to the backend selected by the URL
#[derive(Clone)]
pub enum Database {
    /// SQLite backend (file-backed or in-memory)
    Sqlite(SqliteDatabase),
}

impl Database {
    /// Human-readable backend name for logs and diagnostics
    #[must_use]
    pub const fn backend_info(&self) -> &'static str {
        match self {
            Self::Sqlite(_) => "SQLite",
        }
    }
}

#[async_trait]
impl DatabaseProvider for Database {
    async fn new(database_url: &str) -> AppResult<Self> {
        if database_url.starts_with("sqlite:") || database_url == ":memory:" {
            info!("creating SQLite database connection");
            let db = SqliteDatabase::new(database_url).await?;
            Ok(Self::Sqlite(db))
        } else if database_url.starts_with("postgresql:") || database_url.starts_with("postgres:") {
            Err(AppError::config(
                "PostgreSQL backend is not available in this build; use a sqlite: URL",
            ))
        } else {
            Err(AppError::config(format!(
                "unsupported database URL scheme: {database_url}"
            )))
        }
    }

    async fn migrate(&self) -> AppResult<()> {
        match self {
            Self::Sqlite(db) => db.migrate().await,
        }
    }

    async fn insert_grant(&self, grant: &Grant) -> AppResult<()> {
        match self {
            Self::Sqlite(db) => db.insert_grant(grant).await,
        }
    }

    async fn get_grant(&self, id: &str, now: DateTime<Utc>) -> AppResult<Option<Grant>> {
        match self {
            Self::Sqlite(db) => db.get_grant(id, now).await,
        }
    }

    async fn consume_grant(&self, id: &str, now: DateTime<Utc>) -> AppResult<Grant> {
        match self {
            Self::Sqlite(db) => db.consume_grant(id, now).await,
        }
    }

    async fn revoke_grant_family(&self, grant_id: &str, now: DateTime<Utc>) -> AppResult<u64> {
        match self {
            Self::Sqlite(db) => db.revoke_grant_family(grant_id, now).await,
        }
    }

    async fn sweep_expired_grants(&self, now: DateTime<Utc>) -> AppResult<u64> {
        match self {
            Self::Sqlite(db) => db.sweep_expired_grants(now).await,
        }
    }

    async fn insert_client(&self, client: &Client) -> AppResult<()> {
        match self {
            Self::Sqlite(db) => db.insert_client(client).await,
        }
    }

    async fn get_client(&self, client_id: &str) -> AppResult<Option<Client>> {
        match self {
            Self::Sqlite(db) => db.get_client(client_id).await,
        }
    }

    async fn update_client(&self, client: &Client) -> AppResult<()> {
        match self {
            Self::Sqlite(db) => db.update_client(client).await,
        }
    }

    async fn delete_client_unreferenced(
        &self,
        client_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        match self {
            Self::Sqlite(db) => db.delete_client_unreferenced(client_id, now).await,
        }
    }

    async fn delete_client_cascade(
        &self,
        client_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<u64> {
        match self {
            Self::Sqlite(db) => db.delete_client_cascade(client_id, now).await,
        }
    }

    async fn insert_session(&self, session: &Session) -> AppResult<()> {
        match self {
            Self::Sqlite(db) => db.insert_session(session).await,
        }
    }

    async fn get_session(&self, id: &str, now: DateTime<Utc>) -> AppResult<Option<Session>> {
        match self {
            Self::Sqlite(db) => db.get_session(id, now).await,
        }
    }

    async fn update_session_data(
        &self,
        id: &str,
        data: &serde_json::Value,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        match self {
            Self::Sqlite(db) => db.update_session_data(id, data, now).await,
        }
    }

    async fn bind_session_account(
        &self,
        id: &str,
        account_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        match self {
            Self::Sqlite(db) => db.bind_session_account(id, account_id, now).await,
        }
    }

    async fn touch_session(
        &self,
        id: &str,
        new_expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        match self {
            Self::Sqlite(db) => db.touch_session(id, new_expires_at, now).await,
        }
    }

    async fn delete_session(&self, id: &str) -> AppResult<()> {
        match self {
            Self::Sqlite(db) => db.delete_session(id).await,
        }
    }

    async fn sweep_expired_sessions(&self, now: DateTime<Utc>) -> AppResult<u64> {
        match self {
            Self::Sqlite(db) => db.sweep_expired_sessions(now).await,
        }
    }

    async fn insert_notification(
        &self,
        new: &NewNotification,
        now: DateTime<Utc>,
    ) -> AppResult<Notification> {
        match self {
            Self::Sqlite(db) => db.insert_notification(new, now).await,
        }
    }

    async fn get_notification(&self, id: i64) -> AppResult<Option<Notification>> {
        match self {
            Self::Sqlite(db) => db.get_notification(id).await,
        }
    }

    async fn list_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
        limit: u32,
    ) -> AppResult<Vec<Notification>> {
        match self {
            Self::Sqlite(db) => db.list_notifications(user_id, unread_only, limit).await,
        }
    }

    async fn mark_notification_read(
        &self,
        id: i64,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        match self {
            Self::Sqlite(db) => db.mark_notification_read(id, user_id, now).await,
        }
    }

    async fn mark_all_notifications_read(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<u64> {
        match self {
            Self::Sqlite(db) => db.mark_all_notifications_read(user_id, now).await,
        }
    }

    async fn delete_notification(&self, id: i64, user_id: Uuid) -> AppResult<()> {
        match self {
            Self::Sqlite(db) => db.delete_notification(id, user_id).await,
        }
    }

    async fn delete_all_notifications(&self, user_id: Uuid) -> AppResult<u64> {
        match self {
            Self::Sqlite(db) => db.delete_all_notifications(user_id).await,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_unknown_url_scheme() {
        let result = Database::new("mysql://localhost/keyrelay").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn postgres_url_reports_config_error() {
        let result = Database::new("postgresql://localhost/keyrelay").await;
        let err = result.err();
        assert!(err.is_some());
    }

    #[tokio::test]
    async fn sqlite_memory_url_selects_sqlite_backend() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        assert_eq!(db.backend_info(), "SQLite");
    }
}
