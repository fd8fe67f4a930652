// ABOUTME: In-process fan-out registry for real-time notification delivery
// ABOUTME: Tracks live per-device connections and pushes events over bounded channels
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keyrelay Contributors

use crate::models::Notification;
use dashmap::DashMap;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Event pushed to a live connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeliveryEvent {
    /// A notification addressed to the connection's recipient
    Notification {
        /// The durably stored notification
        notification: Notification,
    },
    /// Server-initiated keepalive
    Ping,
}

struct ConnectionHandle {
    id: Uuid,
    tx: mpsc::Sender<DeliveryEvent>,
}

/// A subscriber's live connection; events arrive in publish order
pub struct LiveConnection {
    /// Identifier used to unsubscribe this connection
    pub connection_id: Uuid,
    /// Ordered event stream for this connection
    pub events: mpsc::Receiver<DeliveryEvent>,
}

/// Registry of live connections keyed by recipient
///
/// A recipient may hold several connections at once (one per device); each
/// gets its own bounded channel, so per-connection ordering matches publish
/// order while connections never block each other.
pub struct FanoutRegistry {
    connections: DashMap<Uuid, Vec<ConnectionHandle>>,
    channel_capacity: usize,
    delivery_timeout: Duration,
}

impl FanoutRegistry {
    /// Create a registry with the given per-connection buffering and timeout
    #[must_use]
    pub fn new(channel_capacity: usize, delivery_timeout: Duration) -> Self {
        Self {
            connections: DashMap::new(),
            channel_capacity,
            delivery_timeout,
        }
    }

    /// Open a live connection for a recipient
    pub fn subscribe(&self, user_id: Uuid) -> LiveConnection {
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let connection_id = Uuid::new_v4();

        self.connections
            .entry(user_id)
            .or_default()
            .push(ConnectionHandle {
                id: connection_id,
                tx,
            });

        debug!(user = %user_id, connection = %connection_id, "connection subscribed");
        LiveConnection {
            connection_id,
            events: rx,
        }
    }

    /// Close a connection; unknown ids are a no-op, so unsubscribe is idempotent
    pub fn unsubscribe(&self, user_id: Uuid, connection_id: Uuid) {
        if let Some(mut entry) = self.connections.get_mut(&user_id) {
            entry.retain(|handle| handle.id != connection_id);
            let emptied = entry.is_empty();
            drop(entry);
            if emptied {
                self.connections.remove_if(&user_id, |_, handles| handles.is_empty());
            }
            debug!(user = %user_id, connection = %connection_id, "connection unsubscribed");
        }
    }

    /// Number of live connections for a recipient
    #[must_use]
    pub fn active_connections(&self, user_id: Uuid) -> usize {
        self.connections
            .get(&user_id)
            .map_or(0, |handles| handles.len())
    }

    /// Push an event to every live connection of a recipient
    ///
    /// Best effort: a full buffer, a closed receiver, or a send that exceeds
    /// the delivery timeout drops that connection from the registry without
    /// affecting the others. Returns the number of successful deliveries.
    pub async fn deliver(&self, user_id: Uuid, event: &DeliveryEvent) -> usize {
        // Senders are cloned out before any await so the map shard lock is
        // never held across suspension points.
        let targets: Vec<(Uuid, mpsc::Sender<DeliveryEvent>)> = match self.connections.get(&user_id)
        {
            Some(handles) => handles
                .iter()
                .map(|handle| (handle.id, handle.tx.clone()))
                .collect(),
            None => return 0,
        };

        if targets.is_empty() {
            return 0;
        }

        let sends = targets.into_iter().map(|(connection_id, tx)| {
            let event = event.clone();
            let timeout = self.delivery_timeout;
            async move {
                let outcome = tokio::time::timeout(timeout, tx.send(event)).await;
                match outcome {
                    Ok(Ok(())) => (connection_id, true),
                    Ok(Err(_)) => (connection_id, false),
                    Err(_) => {
                        warn!(connection = %connection_id, "delivery timed out, dropping connection");
                        (connection_id, false)
                    }
                }
            }
        });

        let results = join_all(sends).await;

        let mut delivered = 0;
        let mut dead = Vec::new();
        for (connection_id, ok) in results {
            if ok {
                delivered += 1;
            } else {
                dead.push(connection_id);
            }
        }

        if !dead.is_empty() {
            if let Some(mut entry) = self.connections.get_mut(&user_id) {
                entry.retain(|handle| !dead.contains(&handle.id));
            }
            self.connections.remove_if(&user_id, |_, handles| handles.is_empty());
        }

        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> FanoutRegistry {
        FanoutRegistry::new(8, Duration::from_millis(100))
    }

    #[tokio::test]
    async fn deliver_without_subscribers_is_zero() {
        let reg = registry();
        let delivered = reg.deliver(Uuid::new_v4(), &DeliveryEvent::Ping).await;
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent() {
        let reg = registry();
        let user = Uuid::new_v4();
        let conn = reg.subscribe(user);
        reg.unsubscribe(user, conn.connection_id);
        reg.unsubscribe(user, conn.connection_id);
        assert_eq!(reg.active_connections(user), 0);
    }

    #[tokio::test]
    async fn dropped_receiver_is_pruned_on_delivery() {
        let reg = registry();
        let user = Uuid::new_v4();
        let conn = reg.subscribe(user);
        drop(conn.events);

        let delivered = reg.deliver(user, &DeliveryEvent::Ping).await;
        assert_eq!(delivered, 0);
        assert_eq!(reg.active_connections(user), 0);
    }

    #[tokio::test]
    async fn multiple_connections_each_receive() {
        let reg = registry();
        let user = Uuid::new_v4();
        let mut a = reg.subscribe(user);
        let mut b = reg.subscribe(user);

        let delivered = reg.deliver(user, &DeliveryEvent::Ping).await;
        assert_eq!(delivered, 2);
        assert!(matches!(a.events.recv().await, Some(DeliveryEvent::Ping)));
        assert!(matches!(b.events.recv().await, Some(DeliveryEvent::Ping)));
    }
}
