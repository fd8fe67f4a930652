// ABOUTME: Durable notification persistence, the system of record for delivery
// ABOUTME: Insert, listing, read-state mutation, and bulk deletion per recipient
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keyrelay Contributors

use super::{from_millis, to_millis, Database};
use crate::constants::limits::MAX_NOTIFICATION_PAGE;
use crate::errors::{AppError, AppResult};
use crate::models::{NewNotification, Notification};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, notification_type_id, title, message, link_url, is_read, created_at, read_at";

impl Database {
    /// Insert a notification and return the stored record with its stable id
    pub async fn insert_notification(
        &self,
        new: &NewNotification,
        now: DateTime<Utc>,
    ) -> AppResult<Notification> {
        let row = sqlx::query(&format!(
            r"
            INSERT INTO notifications (user_id, notification_type_id, title, message, link_url,
                                       is_read, created_at, read_at)
            VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, NULL)
            RETURNING {NOTIFICATION_COLUMNS}
            "
        ))
        .bind(new.user_id.to_string())
        .bind(new.notification_type_id)
        .bind(&new.title)
        .bind(&new.message)
        .bind(&new.link_url)
        .bind(to_millis(now))
        .fetch_one(self.pool())
        .await
        .map_err(AppError::from)?;

        notification_from_row(row)
    }

    /// Get a single notification by id
    pub async fn get_notification(&self, id: i64) -> AppResult<Option<Notification>> {
        let row = sqlx::query(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        row.map(notification_from_row).transpose()
    }

    /// List a recipient's notifications, newest first
    pub async fn list_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
        limit: u32,
    ) -> AppResult<Vec<Notification>> {
        let limit = i64::from(limit.min(MAX_NOTIFICATION_PAGE));

        let query = if unread_only {
            format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
                 WHERE user_id = ?1 AND is_read = 0 ORDER BY created_at DESC, id DESC LIMIT ?2"
            )
        } else {
            format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
                 WHERE user_id = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2"
            )
        };

        let rows = sqlx::query(&query)
            .bind(user_id.to_string())
            .bind(limit)
            .fetch_all(self.pool())
            .await
            .map_err(AppError::from)?;

        rows.into_iter().map(notification_from_row).collect()
    }

    /// Mark one of the recipient's notifications as read
    pub async fn mark_notification_read(
        &self,
        id: i64,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = 1, read_at = ?3 WHERE id = ?1 AND user_id = ?2",
        )
        .bind(id)
        .bind(user_id.to_string())
        .bind(to_millis(now))
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("notification"));
        }
        Ok(())
    }

    /// Mark every unread notification of the recipient as read
    pub async fn mark_all_notifications_read(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = 1, read_at = ?2 WHERE user_id = ?1 AND is_read = 0",
        )
        .bind(user_id.to_string())
        .bind(to_millis(now))
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(result.rows_affected())
    }

    /// Delete one of the recipient's notifications
    pub async fn delete_notification(&self, id: i64, user_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = ?1 AND user_id = ?2")
            .bind(id)
            .bind(user_id.to_string())
            .execute(self.pool())
            .await
            .map_err(AppError::from)?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("notification"));
        }
        Ok(())
    }

    /// Delete every notification of the recipient
    pub async fn delete_all_notifications(&self, user_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM notifications WHERE user_id = ?1")
            .bind(user_id.to_string())
            .execute(self.pool())
            .await
            .map_err(AppError::from)?;

        Ok(result.rows_affected())
    }
}

fn notification_from_row(row: SqliteRow) -> AppResult<Notification> {
    let user_raw: String = row.get("user_id");
    let user_id = Uuid::parse_str(&user_raw)
        .map_err(|e| AppError::internal(format!("invalid user id in store: {e}")))?;

    Ok(Notification {
        id: row.get("id"),
        user_id,
        notification_type_id: row.get("notification_type_id"),
        title: row.get("title"),
        message: row.get("message"),
        link_url: row.get("link_url"),
        is_read: row.get::<i64, _>("is_read") != 0,
        created_at: from_millis(row.get("created_at"))?,
        read_at: row
            .get::<Option<i64>, _>("read_at")
            .map(from_millis)
            .transpose()?,
    })
}
