// ABOUTME: Notification service: durable persistence first, live fan-out second
// ABOUTME: Publishing, listing, read-state mutation, and bulk deletion per recipient
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keyrelay Contributors

use crate::database_plugins::{factory, DatabaseProvider};
use crate::errors::AppResult;
use crate::models::{NewNotification, Notification};
use crate::utils::time::bounded;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

pub mod fanout;

pub use fanout::{DeliveryEvent, FanoutRegistry, LiveConnection};

/// Notification pipeline over a durable store and a live fan-out registry
///
/// The store is the system of record: a publish succeeds once the row is
/// durable, whether or not any connection is listening. Delivery is best
/// effort on top.
#[derive(Clone)]
pub struct NotificationService {
    database: Arc<factory::Database>,
    registry: Arc<FanoutRegistry>,
    op_timeout: Duration,
}

impl NotificationService {
    /// Create a service over an open database and fan-out registry
    #[must_use]
    pub fn new(
        database: Arc<factory::Database>,
        registry: Arc<FanoutRegistry>,
        op_timeout: Duration,
    ) -> Self {
        Self {
            database,
            registry,
            op_timeout,
        }
    }

    /// Access the fan-out registry, for wiring connections
    #[must_use]
    pub fn registry(&self) -> &Arc<FanoutRegistry> {
        &self.registry
    }

    /// Publish a notification: persist durably, then push to live connections
    ///
    /// Fan-out failures never fail the publish; the recipient reads the
    /// notification from the store on their next listing.
    pub async fn publish(
        &self,
        new: NewNotification,
        now: DateTime<Utc>,
    ) -> AppResult<Notification> {
        let stored = bounded(
            "publish_notification",
            self.op_timeout,
            self.database.insert_notification(&new, now),
        )
        .await?;

        let delivered = self
            .registry
            .deliver(
                stored.user_id,
                &DeliveryEvent::Notification {
                    notification: stored.clone(),
                },
            )
            .await;
        debug!(
            notification = stored.id,
            user = %stored.user_id,
            delivered,
            "notification published"
        );

        Ok(stored)
    }

    /// List a recipient's notifications, newest first
    pub async fn list(
        &self,
        user_id: Uuid,
        unread_only: bool,
        limit: u32,
    ) -> AppResult<Vec<Notification>> {
        bounded(
            "list_notifications",
            self.op_timeout,
            self.database.list_notifications(user_id, unread_only, limit),
        )
        .await
    }

    /// Mark one notification read; unknown ids are `NotFound`
    pub async fn mark_read(&self, id: i64, user_id: Uuid, now: DateTime<Utc>) -> AppResult<()> {
        bounded(
            "mark_notification_read",
            self.op_timeout,
            self.database.mark_notification_read(id, user_id, now),
        )
        .await
    }

    /// Mark every unread notification read, returning how many changed
    pub async fn mark_all_read(&self, user_id: Uuid, now: DateTime<Utc>) -> AppResult<u64> {
        let changed = bounded(
            "mark_all_notifications_read",
            self.op_timeout,
            self.database.mark_all_notifications_read(user_id, now),
        )
        .await?;
        if changed > 0 {
            info!(user = %user_id, count = changed, "notifications marked read");
        }
        Ok(changed)
    }

    /// Delete one notification; unknown ids are `NotFound`
    pub async fn delete(&self, id: i64, user_id: Uuid) -> AppResult<()> {
        bounded(
            "delete_notification",
            self.op_timeout,
            self.database.delete_notification(id, user_id),
        )
        .await
    }

    /// Delete every notification of the recipient, returning how many were removed
    pub async fn delete_all(&self, user_id: Uuid) -> AppResult<u64> {
        let removed = bounded(
            "delete_all_notifications",
            self.op_timeout,
            self.database.delete_all_notifications(user_id),
        )
        .await?;
        if removed > 0 {
            info!(user = %user_id, count = removed, "notifications deleted");
        }
        Ok(removed)
    }
}
