// ABOUTME: Client registration persistence for the registry
// ABOUTME: Stores relying parties with JSON-encoded capability lists
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keyrelay Contributors

use super::{from_millis, to_millis, Database};
use crate::errors::{AppError, AppResult};
use crate::models::Client;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

const CLIENT_COLUMNS: &str = "id, client_id, client_secret_hash, redirect_uris, grant_types, \
     response_types, scope, signing_alg, client_name, client_uri, logo_uri, created_at, updated_at";

impl Database {
    /// Insert a newly registered client
    ///
    /// # Errors
    /// Returns `DuplicateId` if the `client_id` is already registered
    pub async fn insert_client(&self, client: &Client) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO clients (id, client_id, client_secret_hash, redirect_uris, grant_types,
                                 response_types, scope, signing_alg, client_name, client_uri,
                                 logo_uri, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ",
        )
        .bind(&client.id)
        .bind(&client.client_id)
        .bind(&client.client_secret_hash)
        .bind(encode_list(&client.redirect_uris)?)
        .bind(encode_list(&client.grant_types)?)
        .bind(encode_list(&client.response_types)?)
        .bind(&client.scope)
        .bind(&client.signing_alg)
        .bind(&client.client_name)
        .bind(&client.client_uri)
        .bind(&client.logo_uri)
        .bind(to_millis(client.created_at))
        .bind(to_millis(client.updated_at))
        .execute(self.pool())
        .await
        .map_err(map_insert_error)?;

        Ok(())
    }

    /// Get a client by its `client_id`
    pub async fn get_client(&self, client_id: &str) -> AppResult<Option<Client>> {
        let row = sqlx::query(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients WHERE client_id = ?1"
        ))
        .bind(client_id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        row.map(client_from_row).transpose()
    }

    /// Persist an updated client record
    ///
    /// `client_id` is the immutable key; every other mutable column is
    /// rewritten from the given record.
    pub async fn update_client(&self, client: &Client) -> AppResult<()> {
        let result = sqlx::query(
            r"
            UPDATE clients
            SET redirect_uris = ?2, grant_types = ?3, response_types = ?4, scope = ?5,
                signing_alg = ?6, client_name = ?7, client_uri = ?8, logo_uri = ?9,
                updated_at = ?10
            WHERE client_id = ?1
            ",
        )
        .bind(&client.client_id)
        .bind(encode_list(&client.redirect_uris)?)
        .bind(encode_list(&client.grant_types)?)
        .bind(encode_list(&client.response_types)?)
        .bind(&client.scope)
        .bind(&client.signing_alg)
        .bind(&client.client_name)
        .bind(&client.client_uri)
        .bind(&client.logo_uri)
        .bind(to_millis(client.updated_at))
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("client"));
        }
        Ok(())
    }

    /// Delete a client only if no live grant references it
    ///
    /// The referential check and the delete are one conditional statement,
    /// so a grant inserted concurrently can never leave a live grant
    /// pointing at a deleted client.
    pub async fn delete_client_unreferenced(
        &self,
        client_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r"
            DELETE FROM clients
            WHERE client_id = ?1
              AND NOT EXISTS (
                  SELECT 1 FROM grants WHERE client_id = ?1 AND expires_at > ?2
              )
            ",
        )
        .bind(client_id)
        .bind(to_millis(now))
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        // Zero rows is either a refused delete or an unknown client; the
        // follow-up read only classifies the error.
        let exists: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM clients WHERE client_id = ?1")
                .bind(client_id)
                .fetch_optional(self.pool())
                .await
                .map_err(AppError::from)?;

        match exists {
            Some(_) => Err(AppError::client_in_use(client_id)),
            None => Err(AppError::not_found("client")),
        }
    }

    /// Delete a client and revoke its live grants in one transaction
    ///
    /// Returns the number of grants revoked. The revocation and the delete
    /// commit together; no interleaved write can observe one without the
    /// other.
    pub async fn delete_client_cascade(
        &self,
        client_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<u64> {
        let mut tx = self.pool().begin().await.map_err(AppError::from)?;

        let revoked = sqlx::query(
            "UPDATE grants SET expires_at = ?2 WHERE client_id = ?1 AND expires_at > ?2",
        )
        .bind(client_id)
        .bind(to_millis(now))
        .execute(&mut *tx)
        .await
        .map_err(AppError::from)?;

        let deleted = sqlx::query("DELETE FROM clients WHERE client_id = ?1")
            .bind(client_id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::from)?;

        if deleted.rows_affected() == 0 {
            tx.rollback().await.map_err(AppError::from)?;
            return Err(AppError::not_found("client"));
        }

        tx.commit().await.map_err(AppError::from)?;
        Ok(revoked.rows_affected())
    }
}

fn map_insert_error(error: sqlx::Error) -> AppError {
    let is_unique = error
        .as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation);
    if is_unique {
        AppError::duplicate_id("client").with_source(error)
    } else {
        AppError::from(error)
    }
}

fn encode_list(values: &[String]) -> AppResult<String> {
    serde_json::to_string(values)
        .map_err(|e| AppError::internal(format!("failed to encode client list field: {e}")))
}

fn decode_list(raw: &str) -> AppResult<Vec<String>> {
    serde_json::from_str(raw)
        .map_err(|e| AppError::internal(format!("invalid client list field in store: {e}")))
}

fn client_from_row(row: SqliteRow) -> AppResult<Client> {
    Ok(Client {
        id: row.get("id"),
        client_id: row.get("client_id"),
        client_secret_hash: row.get("client_secret_hash"),
        redirect_uris: decode_list(&row.get::<String, _>("redirect_uris"))?,
        grant_types: decode_list(&row.get::<String, _>("grant_types"))?,
        response_types: decode_list(&row.get::<String, _>("response_types"))?,
        scope: row.get("scope"),
        signing_alg: row.get("signing_alg"),
        client_name: row.get("client_name"),
        client_uri: row.get("client_uri"),
        logo_uri: row.get("logo_uri"),
        created_at: from_millis(row.get("created_at"))?,
        updated_at: from_millis(row.get("updated_at"))?,
    })
}
