use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::usecase::contracts::{PushChannel, PushEvent};

const CHANNEL_CAPACITY: usize = 64;

#[derive(Serialize)]
struct PushFrame<'a> {
    event: &'a str,
    payload: &'a serde_json::Value,
}

#[derive(Default)]
struct Channels {
    users: RwLock<HashMap<Uuid, broadcast::Sender<String>>>,
    rooms: RwLock<HashMap<String, broadcast::Sender<String>>>,
}

/// In-process push channel backed by per-user and per-room broadcast
/// channels. WebSocket handlers subscribe; emission is fire-and-forget and
/// a send with no connected receivers is simply dropped.
#[derive(Clone, Default)]
pub struct BroadcastPushChannel {
    channels: Arc<Channels>,
}

impl BroadcastPushChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe_user(&self, user_id: Uuid) -> broadcast::Receiver<String> {
        let mut users = self.channels.users.write().await;
        users
            .entry(user_id)
            .or_insert_with(|| {
                tracing::debug!(user_id = %user_id, "creating user push channel");
                broadcast::channel(CHANNEL_CAPACITY).0
            })
            .subscribe()
    }

    pub async fn subscribe_room(&self, room: &str) -> broadcast::Receiver<String> {
        let mut rooms = self.channels.rooms.write().await;
        rooms
            .entry(room.to_string())
            .or_insert_with(|| {
                tracing::debug!(room, "creating room push channel");
                broadcast::channel(CHANNEL_CAPACITY).0
            })
            .subscribe()
    }

    /// Drops the user channel once its last receiver disconnects.
    pub async fn release_user(&self, user_id: Uuid) {
        let mut users = self.channels.users.write().await;
        if let Some(tx) = users.get(&user_id) {
            if tx.receiver_count() == 0 {
                users.remove(&user_id);
                tracing::debug!(user_id = %user_id, "removed empty user push channel");
            }
        }
    }

    pub async fn release_room(&self, room: &str) {
        let mut rooms = self.channels.rooms.write().await;
        if let Some(tx) = rooms.get(room) {
            if tx.receiver_count() == 0 {
                rooms.remove(room);
                tracing::debug!(room, "removed empty room push channel");
            }
        }
    }

    fn encode(event: PushEvent, payload: &serde_json::Value) -> String {
        serde_json::to_string(&PushFrame {
            event: event.as_str(),
            payload,
        })
        .unwrap_or_default()
    }
}

impl PushChannel for BroadcastPushChannel {
    async fn emit_to_user(&self, user_id: Uuid, event: PushEvent, payload: serde_json::Value) {
        let users = self.channels.users.read().await;
        if let Some(tx) = users.get(&user_id) {
            if tx.send(Self::encode(event, &payload)).is_err() {
                tracing::debug!(user_id = %user_id, %event, "no connected receivers, event dropped");
            }
        } else {
            tracing::debug!(user_id = %user_id, %event, "user not connected, event dropped");
        }
    }

    async fn emit_to_room(&self, room: &str, event: PushEvent, payload: serde_json::Value) {
        let rooms = self.channels.rooms.read().await;
        if let Some(tx) = rooms.get(room) {
            if tx.send(Self::encode(event, &payload)).is_err() {
                tracing::debug!(room, %event, "no connected receivers, event dropped");
            }
        } else {
            tracing::debug!(room, %event, "room has no subscribers, event dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_subscriber_receives_emitted_event() {
        let push = BroadcastPushChannel::new();
        let user_id = Uuid::new_v4();
        let mut rx = push.subscribe_user(user_id).await;

        push.emit_to_user(user_id, PushEvent::NewNotification, json!({"unreadCount": 1}))
            .await;

        let frame = rx.recv().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["event"], "new-notification");
        assert_eq!(value["payload"]["unreadCount"], 1);
    }

    #[tokio::test]
    async fn test_emit_to_disconnected_user_is_dropped() {
        let push = BroadcastPushChannel::new();

        // No subscriber: must not panic or error.
        push.emit_to_user(Uuid::new_v4(), PushEvent::NotificationRead, json!({}))
            .await;
    }

    #[tokio::test]
    async fn test_events_are_scoped_per_user() {
        let push = BroadcastPushChannel::new();
        let u1 = Uuid::new_v4();
        let u2 = Uuid::new_v4();
        let mut rx1 = push.subscribe_user(u1).await;
        let mut rx2 = push.subscribe_user(u2).await;

        push.emit_to_user(u1, PushEvent::NewNotification, json!({"n": 1}))
            .await;

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_room_broadcast_reaches_all_subscribers() {
        let push = BroadcastPushChannel::new();
        let mut rx1 = push.subscribe_room("admin-notifications").await;
        let mut rx2 = push.subscribe_room("admin-notifications").await;

        push.emit_to_room("admin-notifications", PushEvent::NewNotification, json!({}))
            .await;

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_release_user_removes_empty_channel() {
        let push = BroadcastPushChannel::new();
        let user_id = Uuid::new_v4();
        let rx = push.subscribe_user(user_id).await;
        drop(rx);

        push.release_user(user_id).await;

        let users = push.channels.users.read().await;
        assert!(!users.contains_key(&user_id));
    }
}
