// ABOUTME: SQLite backend for the database abstraction layer
// ABOUTME: Thin delegating wrapper over the concrete sqlx-based store
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keyrelay Contributors

use super::DatabaseProvider;
use crate::database::Database;
use crate::errors::AppResult;
use crate::models::{Client, Grant, NewNotification, Notification, Session};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// SQLite-backed implementation of [`DatabaseProvider`]
#[derive(Clone)]
pub struct SqliteDatabase {
    inner: Database,
}

impl SqliteDatabase {
    /// Access the underlying store, mainly for tests
    #[must_use]
    pub const fn inner(&self) -> &Database {
        &self.inner
    }
}

#[async_trait]
impl DatabaseProvider for SqliteDatabase {
    async fn new(database_url: &str) -> AppResult<Self> {
        let inner = Database::new(database_url).await?;
        Ok(Self { inner })
    }

    async fn migrate(&self) -> AppResult<()> {
        self.inner.migrate().await
    }

    async fn insert_grant(&self, grant: &Grant) -> AppResult<()> {
        self.inner.insert_grant(grant).await
    }

    async fn get_grant(&self, id: &str, now: DateTime<Utc>) -> AppResult<Option<Grant>> {
        self.inner.get_grant(id, now).await
    }

    async fn consume_grant(&self, id: &str, now: DateTime<Utc>) -> AppResult<Grant> {
        self.inner.consume_grant(id, now).await
    }

    async fn revoke_grant_family(&self, grant_id: &str, now: DateTime<Utc>) -> AppResult<u64> {
        self.inner.revoke_grant_family(grant_id, now).await
    }

    async fn sweep_expired_grants(&self, now: DateTime<Utc>) -> AppResult<u64> {
        self.inner.sweep_expired_grants(now).await
    }

    async fn insert_client(&self, client: &Client) -> AppResult<()> {
        self.inner.insert_client(client).await
    }

    async fn get_client(&self, client_id: &str) -> AppResult<Option<Client>> {
        self.inner.get_client(client_id).await
    }

    async fn update_client(&self, client: &Client) -> AppResult<()> {
        self.inner.update_client(client).await
    }

    async fn delete_client_unreferenced(
        &self,
        client_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        self.inner.delete_client_unreferenced(client_id, now).await
    }

    async fn delete_client_cascade(
        &self,
        client_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<u64> {
        self.inner.delete_client_cascade(client_id, now).await
    }

    async fn insert_session(&self, session: &Session) -> AppResult<()> {
        self.inner.insert_session(session).await
    }

    async fn get_session(&self, id: &str, now: DateTime<Utc>) -> AppResult<Option<Session>> {
        self.inner.get_session(id, now).await
    }

    async fn update_session_data(
        &self,
        id: &str,
        data: &serde_json::Value,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        self.inner.update_session_data(id, data, now).await
    }

    async fn bind_session_account(
        &self,
        id: &str,
        account_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        self.inner.bind_session_account(id, account_id, now).await
    }

    async fn touch_session(
        &self,
        id: &str,
        new_expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        self.inner.touch_session(id, new_expires_at, now).await
    }

    async fn delete_session(&self, id: &str) -> AppResult<()> {
        self.inner.delete_session(id).await
    }

    async fn sweep_expired_sessions(&self, now: DateTime<Utc>) -> AppResult<u64> {
        self.inner.sweep_expired_sessions(now).await
    }

    async fn insert_notification(
        &self,
        new: &NewNotification,
        now: DateTime<Utc>,
    ) -> AppResult<Notification> {
        self.inner.insert_notification(new, now).await
    }

    async fn get_notification(&self, id: i64) -> AppResult<Option<Notification>> {
        self.inner.get_notification(id).await
    }

    async fn list_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
        limit: u32,
    ) -> AppResult<Vec<Notification>> {
        self.inner.list_notifications(user_id, unread_only, limit).await
    }

    async fn mark_notification_read(
        &self,
        id: i64,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        self.inner.mark_notification_read(id, user_id, now).await
    }

    async fn mark_all_notifications_read(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<u64> {
        self.inner.mark_all_notifications_read(user_id, now).await
    }

    async fn delete_notification(&self, id: i64, user_id: Uuid) -> AppResult<()> {
        self.inner.delete_notification(id, user_id).await
    }

    async fn delete_all_notifications(&self, user_id: Uuid) -> AppResult<u64> {
        self.inner.delete_all_notifications(user_id).await
    }
}
