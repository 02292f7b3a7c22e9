//! Room membership and message fan-out for the real-time transport.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use super::connection::{ClientConnection, SendOutcome};
use super::events::ServerEvent;

/// Maximum lifetime send drops before a slow client is evicted from all
/// of its rooms.
const MAX_TOTAL_DROPS: u64 = 100;

/// Maintains the chat-id → connection-set mapping ("rooms") and fans
/// broadcast events out to every live subscriber. Membership lives only in
/// process memory; clients rebuild it on every connection handshake.
pub struct RoomBroker {
    rooms: RwLock<HashMap<Uuid, HashMap<String, Arc<ClientConnection>>>>,
}

impl RoomBroker {
    /// Create an empty broker.
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Add a connection to a chat's room. Idempotent: joining a room the
    /// connection is already in has no additional effect.
    pub async fn join(&self, connection: &Arc<ClientConnection>, chat_id: Uuid) {
        let mut rooms = self.rooms.write().await;
        rooms
            .entry(chat_id)
            .or_default()
            .insert(connection.id.clone(), Arc::clone(connection));
        connection.track_join(chat_id);
        debug!(conn_id = %connection.id, %chat_id, "joined room");
    }

    /// Remove a connection from a chat's room. Idempotent. Empty rooms are
    /// dropped so the map never accumulates dead chat entries.
    pub async fn leave(&self, connection: &ClientConnection, chat_id: Uuid) {
        let mut rooms = self.rooms.write().await;
        if let Some(members) = rooms.get_mut(&chat_id) {
            members.remove(&connection.id);
            if members.is_empty() {
                rooms.remove(&chat_id);
            }
        }
        connection.track_leave(chat_id);
        debug!(conn_id = %connection.id, %chat_id, "left room");
    }

    /// Remove a connection from every room it joined. Must run on every
    /// disconnect so the membership map is the sole authority for delivery.
    pub async fn leave_all(&self, connection: &ClientConnection) {
        let joined = connection.take_joined();
        if joined.is_empty() {
            return;
        }
        let mut rooms = self.rooms.write().await;
        for chat_id in joined {
            if let Some(members) = rooms.get_mut(&chat_id) {
                members.remove(&connection.id);
                if members.is_empty() {
                    rooms.remove(&chat_id);
                }
            }
        }
        debug!(conn_id = %connection.id, "cleared room memberships");
    }

    /// Deliver an event to every connection in a chat's room, best effort.
    /// The payload is serialized once and shared; per-connection ordering
    /// follows the order of `broadcast` calls. Dead connections and clients
    /// that dropped too many sends are evicted from all their rooms.
    pub async fn broadcast(&self, chat_id: Uuid, event: &ServerEvent) {
        let json = match sonic_rs::to_string(event) {
            Ok(j) => Arc::new(j),
            Err(e) => {
                warn!(%chat_id, error = %e, "failed to serialize event");
                return;
            }
        };

        let mut to_evict = Vec::new();
        {
            let rooms = self.rooms.read().await;
            let Some(members) = rooms.get(&chat_id) else {
                debug!(%chat_id, "broadcast to empty room");
                return;
            };
            let mut recipients = 0u32;
            for conn in members.values() {
                match conn.send(Arc::clone(&json)) {
                    SendOutcome::Delivered => recipients += 1,
                    SendOutcome::Disconnected => {
                        to_evict.push(Arc::clone(conn));
                    }
                    SendOutcome::Lagging => {
                        let drops = conn.drop_count();
                        if drops >= MAX_TOTAL_DROPS {
                            warn!(conn_id = %conn.id, %chat_id, drops, "evicting slow client");
                            to_evict.push(Arc::clone(conn));
                        } else {
                            warn!(conn_id = %conn.id, %chat_id, total_drops = drops, "dropped event (channel full)");
                        }
                    }
                }
            }
            debug!(%chat_id, recipients, "broadcast event");
        }

        for conn in to_evict {
            self.leave_all(&conn).await;
        }
    }

    /// Number of connections currently subscribed to a chat.
    pub async fn room_size(&self, chat_id: Uuid) -> usize {
        let rooms = self.rooms.read().await;
        rooms.get(&chat_id).map(HashMap::len).unwrap_or(0)
    }
}

impl Default for RoomBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::{Message, MessageKind};
    use crate::ws::events::MessagePayload;
    use chrono::Utc;
    use tokio::sync::mpsc;

    fn make_connection_with_rx(
        id: &str,
    ) -> (Arc<ClientConnection>, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(32);
        let conn = ClientConnection::new(id.to_string(), Uuid::new_v4(), tx);
        (Arc::new(conn), rx)
    }

    fn make_event(chat_id: Uuid, content: &str) -> ServerEvent {
        let message = Message {
            id: Uuid::new_v4(),
            chat_id,
            content: content.to_string(),
            is_system: false,
            is_markdown: false,
            sent_to_gateway: false,
            gateway_message_id: None,
            kind: MessageKind::User,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        ServerEvent::NewMessage(MessagePayload::from(&message))
    }

    #[tokio::test]
    async fn join_then_broadcast_delivers_exactly_once() {
        let broker = RoomBroker::new();
        let chat = Uuid::new_v4();
        let (conn, mut rx) = make_connection_with_rx("c1");
        broker.join(&conn, chat).await;

        broker.broadcast(chat, &make_event(chat, "hello")).await;

        let payload = rx.try_recv().expect("event delivered");
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["content"], "hello");
        assert!(rx.try_recv().is_err(), "must not be delivered twice");
    }

    #[tokio::test]
    async fn leave_stops_delivery() {
        let broker = RoomBroker::new();
        let chat = Uuid::new_v4();
        let (conn, mut rx) = make_connection_with_rx("c1");
        broker.join(&conn, chat).await;
        broker.leave(&conn, chat).await;

        broker.broadcast(chat, &make_event(chat, "after leave")).await;

        assert!(rx.try_recv().is_err());
        assert_eq!(broker.room_size(chat).await, 0);
    }

    #[tokio::test]
    async fn double_join_delivers_once() {
        let broker = RoomBroker::new();
        let chat = Uuid::new_v4();
        let (conn, mut rx) = make_connection_with_rx("c1");
        broker.join(&conn, chat).await;
        broker.join(&conn, chat).await;

        broker.broadcast(chat, &make_event(chat, "once")).await;

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
        assert_eq!(broker.room_size(chat).await, 1);
    }

    #[tokio::test]
    async fn leave_is_idempotent() {
        let broker = RoomBroker::new();
        let chat = Uuid::new_v4();
        let (conn, _rx) = make_connection_with_rx("c1");
        broker.join(&conn, chat).await;
        broker.leave(&conn, chat).await;
        broker.leave(&conn, chat).await;
        assert_eq!(broker.room_size(chat).await, 0);
    }

    #[tokio::test]
    async fn disconnect_clears_all_memberships() {
        let broker = RoomBroker::new();
        let chat_a = Uuid::new_v4();
        let chat_b = Uuid::new_v4();
        let (conn, mut rx) = make_connection_with_rx("c1");
        broker.join(&conn, chat_a).await;
        broker.join(&conn, chat_b).await;

        broker.leave_all(&conn).await;

        assert_eq!(broker.room_size(chat_a).await, 0);
        assert_eq!(broker.room_size(chat_b).await, 0);
        broker.broadcast(chat_a, &make_event(chat_a, "gone")).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_to_empty_room_does_not_error() {
        let broker = RoomBroker::new();
        let chat = Uuid::new_v4();
        broker.broadcast(chat, &make_event(chat, "nobody home")).await;
    }

    #[tokio::test]
    async fn dead_connection_is_evicted_and_not_delivered_to() {
        let broker = RoomBroker::new();
        let chat = Uuid::new_v4();
        let (dead, rx) = make_connection_with_rx("dead");
        let (live, mut live_rx) = make_connection_with_rx("live");
        broker.join(&dead, chat).await;
        broker.join(&live, chat).await;
        drop(rx);

        broker.broadcast(chat, &make_event(chat, "still works")).await;

        assert!(live_rx.try_recv().is_ok());
        assert_eq!(broker.room_size(chat).await, 1);
    }

    #[tokio::test]
    async fn only_room_members_receive_broadcasts() {
        let broker = RoomBroker::new();
        let chat_a = Uuid::new_v4();
        let chat_b = Uuid::new_v4();
        let (conn_a, mut rx_a) = make_connection_with_rx("a");
        let (conn_b, mut rx_b) = make_connection_with_rx("b");
        broker.join(&conn_a, chat_a).await;
        broker.join(&conn_b, chat_b).await;

        broker.broadcast(chat_a, &make_event(chat_a, "for a")).await;

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn events_arrive_in_broadcast_order() {
        let broker = RoomBroker::new();
        let chat = Uuid::new_v4();
        let (conn, mut rx) = make_connection_with_rx("c1");
        broker.join(&conn, chat).await;

        for i in 0..5 {
            broker.broadcast(chat, &make_event(chat, &format!("m{i}"))).await;
        }

        for i in 0..5 {
            let payload = rx.recv().await.unwrap();
            let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
            assert_eq!(value["content"], format!("m{i}"));
        }
    }

    #[tokio::test]
    async fn payload_is_serialized_once_and_shared() {
        let broker = RoomBroker::new();
        let chat = Uuid::new_v4();
        let (c1, mut rx1) = make_connection_with_rx("c1");
        let (c2, mut rx2) = make_connection_with_rx("c2");
        broker.join(&c1, chat).await;
        broker.join(&c2, chat).await;

        broker.broadcast(chat, &make_event(chat, "shared")).await;

        let p1 = rx1.recv().await.unwrap();
        let p2 = rx2.recv().await.unwrap();
        assert!(Arc::ptr_eq(&p1, &p2));
    }

    #[tokio::test]
    async fn slow_client_is_evicted_after_drop_threshold() {
        let broker = RoomBroker::new();
        let chat = Uuid::new_v4();
        let (tx, _stuck_rx) = mpsc::channel(1);
        let slow = Arc::new(ClientConnection::new("slow".to_string(), Uuid::new_v4(), tx));
        let (fast, mut fast_rx) = make_connection_with_rx("fast");
        broker.join(&slow, chat).await;
        broker.join(&fast, chat).await;

        // First send fills the slow client's buffer, then exceed the threshold.
        for _ in 0..=MAX_TOTAL_DROPS {
            broker.broadcast(chat, &make_event(chat, "flood")).await;
        }

        assert_eq!(broker.room_size(chat).await, 1);
        assert!(fast_rx.try_recv().is_ok());
    }
}
