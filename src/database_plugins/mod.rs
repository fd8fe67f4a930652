// ABOUTME: Database abstraction layer for keyrelay durable stores
// ABOUTME: Plugin architecture so another persistence engine can sit behind the trait
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keyrelay Contributors

use crate::errors::AppResult;
use crate::models::{Client, Grant, NewNotification, Notification, Session};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod factory;
pub mod sqlite;

/// Core database abstraction trait
///
/// All store operations take an explicit `now` so that callers (and tests)
/// control the clock; the engine itself never reads wall time. The expiry
/// predicate is uniform: a record is live while `now < expires_at`.
#[async_trait]
pub trait DatabaseProvider: Send + Sync + Clone {
    /// Create a new database connection
    async fn new(database_url: &str) -> AppResult<Self>
    where
        Self: Sized;

    /// Run database migrations to set up schema
    async fn migrate(&self) -> AppResult<()>;

    // ================================
    // Grant Record Store
    // ================================

    /// Insert a new grant; fails with `DuplicateId` on id collision
    async fn insert_grant(&self, grant: &Grant) -> AppResult<()>;

    /// Get a live grant; expired and missing are both `None`
    async fn get_grant(&self, id: &str, now: DateTime<Utc>) -> AppResult<Option<Grant>>;

    /// Atomically consume a grant; exactly one concurrent caller succeeds
    async fn consume_grant(&self, id: &str, now: DateTime<Utc>) -> AppResult<Grant>;

    /// Logically expire every grant in a family; idempotent
    async fn revoke_grant_family(&self, grant_id: &str, now: DateTime<Utc>) -> AppResult<u64>;

    /// Batch-delete grants past expiry
    async fn sweep_expired_grants(&self, now: DateTime<Utc>) -> AppResult<u64>;

    // ================================
    // Client Registry
    // ================================

    /// Insert a registered client; fails with `DuplicateId` on collision
    async fn insert_client(&self, client: &Client) -> AppResult<()>;

    /// Get a client by `client_id`
    async fn get_client(&self, client_id: &str) -> AppResult<Option<Client>>;

    /// Persist an updated client record
    async fn update_client(&self, client: &Client) -> AppResult<()>;

    /// Delete a client only if no live grant references it; refused with
    /// `ClientInUse` otherwise
    async fn delete_client_unreferenced(
        &self,
        client_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Delete a client and revoke its live grants atomically, returning the
    /// number of grants revoked
    async fn delete_client_cascade(&self, client_id: &str, now: DateTime<Utc>)
        -> AppResult<u64>;

    // ================================
    // Session Store
    // ================================

    /// Insert a new session
    async fn insert_session(&self, session: &Session) -> AppResult<()>;

    /// Get a live session; expired and missing are both `None`
    async fn get_session(&self, id: &str, now: DateTime<Utc>) -> AppResult<Option<Session>>;

    /// Replace a live session's payload in a single write
    async fn update_session_data(
        &self,
        id: &str,
        data: &serde_json::Value,
        now: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Bind an authenticated account to a live session
    async fn bind_session_account(
        &self,
        id: &str,
        account_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Extend a live session's expiry
    async fn touch_session(
        &self,
        id: &str,
        new_expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Delete a session; absent ids are a no-op
    async fn delete_session(&self, id: &str) -> AppResult<()>;

    /// Batch-delete sessions past expiry
    async fn sweep_expired_sessions(&self, now: DateTime<Utc>) -> AppResult<u64>;

    // ================================
    // Notifications
    // ================================

    /// Insert a notification and return the stored record
    async fn insert_notification(
        &self,
        new: &NewNotification,
        now: DateTime<Utc>,
    ) -> AppResult<Notification>;

    /// Get a single notification by id
    async fn get_notification(&self, id: i64) -> AppResult<Option<Notification>>;

    /// List a recipient's notifications, newest first
    async fn list_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
        limit: u32,
    ) -> AppResult<Vec<Notification>>;

    /// Mark one notification read
    async fn mark_notification_read(
        &self,
        id: i64,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Mark every unread notification of the recipient read
    async fn mark_all_notifications_read(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<u64>;

    /// Delete one notification
    async fn delete_notification(&self, id: i64, user_id: Uuid) -> AppResult<()>;

    /// Delete every notification of the recipient
    async fn delete_all_notifications(&self, user_id: Uuid) -> AppResult<u64>;
}
