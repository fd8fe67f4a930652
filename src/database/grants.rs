// ABOUTME: Grant record persistence with race-safe single-use consumption
// ABOUTME: Implements insert, expiry-hiding reads, CAS consume, family revocation, and sweeps
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keyrelay Contributors

use super::{from_millis, to_millis, Database};
use crate::errors::{AppError, AppResult};
use crate::models::{Grant, GrantKind};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

const GRANT_COLUMNS: &str =
    "id, grant_id, client_id, account_id, kind, jti, issued_at, expires_at, data, consumed, consumed_at";

impl Database {
    /// Insert a new grant record
    ///
    /// # Errors
    /// Returns `DuplicateId` if the identifier already exists
    pub async fn insert_grant(&self, grant: &Grant) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO grants (id, grant_id, client_id, account_id, kind, jti, issued_at, expires_at, data, consumed, consumed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ",
        )
        .bind(&grant.id)
        .bind(&grant.grant_id)
        .bind(&grant.client_id)
        .bind(grant.account_id.map(|id| id.to_string()))
        .bind(grant.kind.as_str())
        .bind(&grant.jti)
        .bind(to_millis(grant.iat))
        .bind(to_millis(grant.exp))
        .bind(serialize_data(&grant.data)?)
        .bind(i64::from(grant.consumed))
        .bind(grant.consumed_at.map(to_millis))
        .execute(self.pool())
        .await
        .map_err(map_insert_error)?;

        Ok(())
    }

    /// Get a grant if it exists and has not expired
    ///
    /// Expired records are indistinguishable from absent ones.
    pub async fn get_grant(&self, id: &str, now: DateTime<Utc>) -> AppResult<Option<Grant>> {
        let row = sqlx::query(&format!(
            "SELECT {GRANT_COLUMNS} FROM grants WHERE id = ?1 AND expires_at > ?2"
        ))
        .bind(id)
        .bind(to_millis(now))
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        row.map(grant_from_row).transpose()
    }

    /// Atomically consume a grant: `consumed: false -> true`
    ///
    /// The transition is a single conditional UPDATE so that of N concurrent
    /// callers exactly one wins, regardless of how many server processes
    /// share the store. Losers see `AlreadyConsumed` when the grant is live
    /// but spent, and `NotFound` when it is absent or expired.
    pub async fn consume_grant(&self, id: &str, now: DateTime<Utc>) -> AppResult<Grant> {
        let now_ms = to_millis(now);

        let row = sqlx::query(&format!(
            r"
            UPDATE grants
            SET consumed = 1, consumed_at = ?2
            WHERE id = ?1 AND consumed = 0 AND expires_at > ?2
            RETURNING {GRANT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(now_ms)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        if let Some(row) = row {
            return grant_from_row(row);
        }

        // Distinguish "spent" from "absent or expired" without ever exposing
        // expired data: the follow-up read applies the same expiry predicate
        // as get.
        let consumed: Option<i64> = sqlx::query_scalar(
            "SELECT consumed FROM grants WHERE id = ?1 AND expires_at > ?2",
        )
        .bind(id)
        .bind(now_ms)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        match consumed {
            Some(_) => Err(AppError::already_consumed(id)),
            None => Err(AppError::not_found("grant")),
        }
    }

    /// Logically expire every grant sharing `grant_id`, effective immediately
    ///
    /// Idempotent; returns the number of grants newly revoked.
    pub async fn revoke_grant_family(
        &self,
        grant_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE grants SET expires_at = ?2 WHERE grant_id = ?1 AND expires_at > ?2",
        )
        .bind(grant_id)
        .bind(to_millis(now))
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(result.rows_affected())
    }

    /// Batch-delete grants whose expiry has passed
    ///
    /// Uses `expires_at <= now` so a grant expiring in the future is never
    /// removed, even at the boundary instant.
    pub async fn sweep_expired_grants(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM grants WHERE expires_at <= ?1")
            .bind(to_millis(now))
            .execute(self.pool())
            .await
            .map_err(AppError::from)?;

        Ok(result.rows_affected())
    }
}

/// Map a unique-constraint violation on insert to `DuplicateId`
fn map_insert_error(error: sqlx::Error) -> AppError {
    let is_unique = error
        .as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation);
    if is_unique {
        AppError::duplicate_id("grant").with_source(error)
    } else {
        AppError::from(error)
    }
}

fn serialize_data(data: &serde_json::Value) -> AppResult<String> {
    serde_json::to_string(data)
        .map_err(|e| AppError::internal(format!("failed to serialize grant payload: {e}")))
}

fn grant_from_row(row: SqliteRow) -> AppResult<Grant> {
    let kind_raw: String = row.get("kind");
    let kind = GrantKind::parse(&kind_raw)
        .ok_or_else(|| AppError::internal(format!("unknown grant kind in store: {kind_raw}")))?;

    let account_id = row
        .get::<Option<String>, _>("account_id")
        .map(|raw| {
            Uuid::parse_str(&raw)
                .map_err(|e| AppError::internal(format!("invalid account id in store: {e}")))
        })
        .transpose()?;

    let data_raw: String = row.get("data");
    let data = serde_json::from_str(&data_raw)
        .map_err(|e| AppError::internal(format!("invalid grant payload in store: {e}")))?;

    Ok(Grant {
        id: row.get("id"),
        grant_id: row.get("grant_id"),
        client_id: row.get("client_id"),
        account_id,
        kind,
        jti: row.get("jti"),
        iat: from_millis(row.get("issued_at"))?,
        exp: from_millis(row.get("expires_at"))?,
        data,
        consumed: row.get::<i64, _>("consumed") != 0,
        consumed_at: row
            .get::<Option<i64>, _>("consumed_at")
            .map(from_millis)
            .transpose()?,
    })
}
