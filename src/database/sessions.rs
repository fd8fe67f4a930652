// ABOUTME: Session persistence with expiry-hiding reads
// ABOUTME: Opaque handles, JSON payloads, and whole-payload atomic writes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keyrelay Contributors

use super::{from_millis, to_millis, Database};
use crate::errors::{AppError, AppResult};
use crate::models::Session;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

impl Database {
    /// Insert a new session record
    pub async fn insert_session(&self, session: &Session) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO sessions (id, account_id, data, created_at, expires_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(&session.id)
        .bind(session.account_id.map(|id| id.to_string()))
        .bind(encode_payload(&session.data)?)
        .bind(to_millis(session.created_at))
        .bind(to_millis(session.expires_at))
        .execute(self.pool())
        .await
        .map_err(map_insert_error)?;

        Ok(())
    }

    /// Get a session if it exists and has not expired
    pub async fn get_session(&self, id: &str, now: DateTime<Utc>) -> AppResult<Option<Session>> {
        let row = sqlx::query(
            r"
            SELECT id, account_id, data, created_at, expires_at
            FROM sessions WHERE id = ?1 AND expires_at > ?2
            ",
        )
        .bind(id)
        .bind(to_millis(now))
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        row.map(session_from_row).transpose()
    }

    /// Replace a live session's payload in a single write
    ///
    /// The whole payload is written in one statement; concurrent writers are
    /// last-writer-wins with no torn state.
    pub async fn update_session_data(
        &self,
        id: &str,
        data: &serde_json::Value,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let result =
            sqlx::query("UPDATE sessions SET data = ?2 WHERE id = ?1 AND expires_at > ?3")
                .bind(id)
                .bind(encode_payload(data)?)
                .bind(to_millis(now))
                .execute(self.pool())
                .await
                .map_err(AppError::from)?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("session"));
        }
        Ok(())
    }

    /// Bind an authenticated account to a live session
    pub async fn bind_session_account(
        &self,
        id: &str,
        account_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let result =
            sqlx::query("UPDATE sessions SET account_id = ?2 WHERE id = ?1 AND expires_at > ?3")
                .bind(id)
                .bind(account_id.to_string())
                .bind(to_millis(now))
                .execute(self.pool())
                .await
                .map_err(AppError::from)?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("session"));
        }
        Ok(())
    }

    /// Extend a live session's expiry
    pub async fn touch_session(
        &self,
        id: &str,
        new_expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let result =
            sqlx::query("UPDATE sessions SET expires_at = ?2 WHERE id = ?1 AND expires_at > ?3")
                .bind(id)
                .bind(to_millis(new_expires_at))
                .bind(to_millis(now))
                .execute(self.pool())
                .await
                .map_err(AppError::from)?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("session"));
        }
        Ok(())
    }

    /// Delete a session; absent ids are a no-op
    pub async fn delete_session(&self, id: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM sessions WHERE id = ?1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(AppError::from)?;
        Ok(())
    }

    /// Batch-delete sessions whose expiry has passed (`<=` boundary)
    pub async fn sweep_expired_sessions(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?1")
            .bind(to_millis(now))
            .execute(self.pool())
            .await
            .map_err(AppError::from)?;

        Ok(result.rows_affected())
    }
}

fn map_insert_error(error: sqlx::Error) -> AppError {
    let is_unique = error
        .as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation);
    if is_unique {
        AppError::duplicate_id("session").with_source(error)
    } else {
        AppError::from(error)
    }
}

fn encode_payload(data: &serde_json::Value) -> AppResult<String> {
    serde_json::to_string(data)
        .map_err(|e| AppError::internal(format!("failed to encode session payload: {e}")))
}

fn session_from_row(row: SqliteRow) -> AppResult<Session> {
    let account_id = row
        .get::<Option<String>, _>("account_id")
        .map(|raw| {
            Uuid::parse_str(&raw)
                .map_err(|e| AppError::internal(format!("invalid account id in store: {e}")))
        })
        .transpose()?;

    let data_raw: String = row.get("data");
    let data = serde_json::from_str(&data_raw)
        .map_err(|e| AppError::internal(format!("invalid session payload in store: {e}")))?;

    Ok(Session {
        id: row.get("id"),
        account_id,
        data,
        created_at: from_millis(row.get("created_at"))?,
        expires_at: from_millis(row.get("expires_at"))?,
    })
}
