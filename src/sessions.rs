// ABOUTME: Session store manager: opaque handles over JSON payloads with TTL expiry
// ABOUTME: Create, read, whole-payload update, sliding-expiry touch, destroy, sweep
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keyrelay Contributors

use crate::constants::limits;
use crate::database_plugins::{factory, DatabaseProvider};
use crate::errors::{AppError, AppResult};
use crate::models::Session;
use crate::utils::generate_session_id;
use crate::utils::time::bounded;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Durable session store keyed by unguessable opaque identifiers
///
/// Sessions expire by wall clock; an expired session is indistinguishable
/// from one that never existed.
#[derive(Clone)]
pub struct SessionStore {
    database: Arc<factory::Database>,
    default_ttl: ChronoDuration,
    op_timeout: Duration,
}

impl SessionStore {
    /// Create a session store with the given default lifetime
    #[must_use]
    pub fn new(
        database: Arc<factory::Database>,
        default_ttl: ChronoDuration,
        op_timeout: Duration,
    ) -> Self {
        Self {
            database,
            default_ttl,
            op_timeout,
        }
    }

    /// Session store with the stock one-hour default lifetime
    #[must_use]
    pub fn with_defaults(database: Arc<factory::Database>) -> Self {
        let ttl = ChronoDuration::seconds(
            i64::try_from(limits::DEFAULT_SESSION_TTL_SECS).unwrap_or(3_600),
        );
        Self::new(database, ttl, Duration::from_millis(limits::DEFAULT_OP_TIMEOUT_MS))
    }

    /// Create a session with a fresh opaque identifier
    ///
    /// `ttl` overrides the store default when given.
    pub async fn create(
        &self,
        initial_payload: serde_json::Value,
        ttl: Option<ChronoDuration>,
        now: DateTime<Utc>,
    ) -> AppResult<Session> {
        let session = Session {
            id: generate_session_id()?,
            account_id: None,
            data: initial_payload,
            created_at: now,
            expires_at: now + ttl.unwrap_or(self.default_ttl),
        };

        bounded(
            "create_session",
            self.op_timeout,
            self.database.insert_session(&session),
        )
        .await?;
        debug!(session = %session.id, expires_at = %session.expires_at, "session created");
        Ok(session)
    }

    /// Fetch a live session
    ///
    /// # Errors
    /// `NotFound` whether the session is absent or expired.
    pub async fn get(&self, id: &str, now: DateTime<Utc>) -> AppResult<Session> {
        bounded("get_session", self.op_timeout, self.database.get_session(id, now))
            .await?
            .ok_or_else(|| AppError::not_found("session"))
    }

    /// Read-modify-write a live session's payload
    ///
    /// The mutated payload is persisted as one atomic write; concurrent
    /// updates to the same session are last-writer-wins.
    pub async fn update<F>(&self, id: &str, now: DateTime<Utc>, mutate: F) -> AppResult<Session>
    where
        F: FnOnce(&mut serde_json::Value),
    {
        let mut session = self.get(id, now).await?;
        mutate(&mut session.data);
        bounded(
            "update_session",
            self.op_timeout,
            self.database.update_session_data(id, &session.data, now),
        )
        .await?;
        Ok(session)
    }

    /// Bind an authenticated account to a live session
    pub async fn attach_account(
        &self,
        id: &str,
        account_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        bounded(
            "attach_session_account",
            self.op_timeout,
            self.database.bind_session_account(id, account_id, now),
        )
        .await?;
        debug!(session = %id, account = %account_id, "session bound to account");
        Ok(())
    }

    /// Slide a live session's expiry forward
    ///
    /// # Errors
    /// `NotFound` if the session is absent or already expired; touching
    /// cannot resurrect a dead session.
    pub async fn touch(
        &self,
        id: &str,
        ttl: Option<ChronoDuration>,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let new_expiry = now + ttl.unwrap_or(self.default_ttl);
        bounded(
            "touch_session",
            self.op_timeout,
            self.database.touch_session(id, new_expiry, now),
        )
        .await
    }

    /// Destroy a session; destroying an absent session is a no-op
    pub async fn destroy(&self, id: &str) -> AppResult<()> {
        bounded(
            "destroy_session",
            self.op_timeout,
            self.database.delete_session(id),
        )
        .await?;
        debug!(session = %id, "session destroyed");
        Ok(())
    }

    /// Delete expired sessions in bulk, returning the number removed
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let removed = bounded(
            "sweep_expired_sessions",
            self.op_timeout,
            self.database.sweep_expired_sessions(now),
        )
        .await?;
        if removed > 0 {
            info!(count = removed, "expired sessions swept");
        }
        Ok(removed)
    }
}
