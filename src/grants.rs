// ABOUTME: Grant record store manager: bounded-time durable grant operations
// ABOUTME: Wraps the database layer with operation timeouts and structured logging
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keyrelay Contributors

use crate::database_plugins::{factory, DatabaseProvider};
use crate::errors::{AppError, AppResult};
use crate::models::Grant;
use crate::utils::time::bounded;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Durable store for single-use and revocable grants
///
/// Every operation is bounded by the configured operation timeout; a store
/// that does not answer in time surfaces as `StoreUnavailable` rather than
/// hanging the caller.
#[derive(Clone)]
pub struct GrantStore {
    database: Arc<factory::Database>,
    op_timeout: Duration,
}

impl GrantStore {
    /// Create a grant store over an open database
    #[must_use]
    pub fn new(database: Arc<factory::Database>, op_timeout: Duration) -> Self {
        Self {
            database,
            op_timeout,
        }
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>> + Send,
    {
        bounded(op, self.op_timeout, fut).await
    }

    /// Persist a new grant
    ///
    /// # Errors
    /// `DuplicateId` if the identifier already exists; `StoreUnavailable` on
    /// timeout or backend failure.
    pub async fn put(&self, grant: &Grant) -> AppResult<()> {
        self.bounded("put_grant", self.database.insert_grant(grant))
            .await?;
        debug!(grant = %grant.id, kind = %grant.kind, client_id = %grant.client_id, "grant stored");
        Ok(())
    }

    /// Fetch a live grant
    ///
    /// # Errors
    /// `NotFound` whether the grant is absent or expired; the two cases are
    /// indistinguishable to callers.
    pub async fn get(&self, id: &str, now: DateTime<Utc>) -> AppResult<Grant> {
        let grant = self
            .bounded("get_grant", self.database.get_grant(id, now))
            .await?;
        grant.ok_or_else(|| AppError::not_found("grant"))
    }

    /// Atomically consume a single-use grant
    ///
    /// Of N concurrent callers exactly one receives the grant; the rest see
    /// `AlreadyConsumed`. A timeout here means the outcome is unknown, the
    /// conditional write may have landed, so callers must not blindly retry;
    /// a retry that finds the grant spent will read `AlreadyConsumed`.
    pub async fn consume(&self, id: &str, now: DateTime<Utc>) -> AppResult<Grant> {
        let grant = self
            .bounded("consume_grant", self.database.consume_grant(id, now))
            .await?;
        debug!(grant = %grant.id, kind = %grant.kind, "grant consumed");
        Ok(grant)
    }

    /// Revoke every grant sharing a logical family id
    ///
    /// Idempotent: revoking an already-revoked family reports zero newly
    /// revoked grants and succeeds.
    pub async fn revoke_family(&self, grant_id: &str, now: DateTime<Utc>) -> AppResult<u64> {
        let revoked = self
            .bounded(
                "revoke_grant_family",
                self.database.revoke_grant_family(grant_id, now),
            )
            .await?;
        if revoked > 0 {
            info!(family = grant_id, count = revoked, "grant family revoked");
        }
        Ok(revoked)
    }

    /// Delete expired grants in bulk, returning the number removed
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let removed = self
            .bounded(
                "sweep_expired_grants",
                self.database.sweep_expired_grants(now),
            )
            .await?;
        if removed > 0 {
            info!(count = removed, "expired grants swept");
        }
        Ok(removed)
    }
}
