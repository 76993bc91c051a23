//! Live WebSocket connections and their room memberships.
//!
//! The registry is the only in-memory shared state of the server. Each
//! connection owns an unbounded outbound queue drained by its writer task;
//! emitting never blocks on a slow socket.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use interlink_shared::protocol::{PresencePayload, ServerEvent};
use interlink_shared::room::{private_room, room_key};
use interlink_shared::types::{Role, UserId};

pub type ConnectionId = Uuid;

/// Identity of one registered connection, handed to its session task.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub user_id: UserId,
    pub role: Role,
    pub display_name: String,
}

struct Entry {
    conn: Connection,
    tx: mpsc::UnboundedSender<ServerEvent>,
    rooms: HashSet<String>,
}

#[derive(Default)]
struct Inner {
    connections: HashMap<ConnectionId, Entry>,
    rooms: HashMap<String, HashSet<ConnectionId>>,
    by_user: HashMap<UserId, HashSet<ConnectionId>>,
}

impl Inner {
    fn join(&mut self, id: ConnectionId, room: &str) -> bool {
        let Some(entry) = self.connections.get_mut(&id) else {
            return false;
        };
        if !entry.rooms.insert(room.to_string()) {
            return false;
        }
        self.rooms.entry(room.to_string()).or_default().insert(id);
        true
    }

    fn leave(&mut self, id: ConnectionId, room: &str) -> bool {
        let Some(entry) = self.connections.get_mut(&id) else {
            return false;
        };
        if !entry.rooms.remove(room) {
            return false;
        }
        if let Some(members) = self.rooms.get_mut(room) {
            members.remove(&id);
            if members.is_empty() {
                self.rooms.remove(room);
            }
        }
        true
    }

    fn send(&self, id: &ConnectionId, event: &ServerEvent) -> bool {
        let Some(entry) = self.connections.get(id) else {
            return false;
        };
        if entry.tx.send(event.clone()).is_err() {
            debug!(conn = %id, event = event.name(), "dropping event for closed connection");
            return false;
        }
        true
    }
}

/// Cloneable handle to the process-wide connection table.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<Inner>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a freshly authenticated connection and join it to its owner's
    /// private room.
    pub async fn register(
        &self,
        user_id: UserId,
        role: Role,
        display_name: String,
    ) -> (Connection, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Connection {
            id: Uuid::new_v4(),
            user_id,
            role,
            display_name,
        };

        let mut inner = self.inner.write().await;
        inner.connections.insert(
            conn.id,
            Entry {
                conn: conn.clone(),
                tx,
                rooms: HashSet::new(),
            },
        );
        inner.by_user.entry(user_id).or_default().insert(conn.id);
        inner.join(conn.id, &private_room(&user_id));

        info!(
            conn = %conn.id,
            user = %user_id,
            role = %role,
            total = inner.connections.len(),
            "connection registered"
        );

        (conn, rx)
    }

    /// Join the conversation room shared with `other`. Idempotent; returns
    /// the room key.
    pub async fn join_conversation(&self, conn: &Connection, other: &UserId) -> String {
        let room = room_key(&conn.user_id, other);
        let joined = self.inner.write().await.join(conn.id, &room);
        debug!(conn = %conn.id, room = %room, joined, "join conversation");
        room
    }

    /// Leave the conversation room shared with `other`. Leaving a room that
    /// was never joined is a no-op.
    pub async fn leave_conversation(&self, conn: &Connection, other: &UserId) -> bool {
        let room = room_key(&conn.user_id, other);
        let left = self.inner.write().await.leave(conn.id, &room);
        debug!(conn = %conn.id, room = %room, left, "leave conversation");
        left
    }

    /// Any registered connection of `user` whose socket is still open.
    pub async fn find_live_connection(&self, user: &UserId) -> Option<ConnectionId> {
        let inner = self.inner.read().await;
        inner.by_user.get(user)?.iter().copied().find(|id| {
            inner
                .connections
                .get(id)
                .is_some_and(|entry| !entry.tx.is_closed())
        })
    }

    #[cfg(test)]
    pub async fn is_in_room(&self, conn: ConnectionId, room: &str) -> bool {
        self.inner
            .read()
            .await
            .rooms
            .get(room)
            .is_some_and(|members| members.contains(&conn))
    }

    /// Deliver `event` to every member of `room` except `except`. Returns
    /// the number of connections reached.
    pub async fn emit_to_room(
        &self,
        room: &str,
        event: &ServerEvent,
        except: Option<ConnectionId>,
    ) -> usize {
        let inner = self.inner.read().await;
        let Some(members) = inner.rooms.get(room) else {
            return 0;
        };
        members
            .iter()
            .filter(|id| Some(**id) != except)
            .filter(|id| inner.send(id, event))
            .count()
    }

    pub async fn emit_to_connection(&self, conn: ConnectionId, event: ServerEvent) -> bool {
        self.inner.read().await.send(&conn, &event)
    }

    /// Deliver `event` to every connection but `except`.
    pub async fn broadcast_except(&self, except: ConnectionId, event: &ServerEvent) -> usize {
        let inner = self.inner.read().await;
        inner
            .connections
            .keys()
            .filter(|id| **id != except)
            .filter(|id| inner.send(id, event))
            .count()
    }

    /// Drop a connection with all of its memberships and tell everyone else
    /// that its user went offline.
    pub async fn unregister(&self, conn: ConnectionId) {
        let mut inner = self.inner.write().await;
        let Some(entry) = inner.connections.remove(&conn) else {
            return;
        };

        for room in &entry.rooms {
            if let Some(members) = inner.rooms.get_mut(room) {
                members.remove(&conn);
                if members.is_empty() {
                    inner.rooms.remove(room);
                }
            }
        }
        if let Some(ids) = inner.by_user.get_mut(&entry.conn.user_id) {
            ids.remove(&conn);
            if ids.is_empty() {
                inner.by_user.remove(&entry.conn.user_id);
            }
        }

        info!(
            conn = %conn,
            user = %entry.conn.user_id,
            total = inner.connections.len(),
            "connection closed"
        );

        let offline = ServerEvent::UserOffline(PresencePayload {
            user_id: entry.conn.user_id,
        });
        for id in inner.connections.keys() {
            inner.send(id, &offline);
        }
    }

    pub async fn live_connection_count(&self) -> usize {
        self.inner.read().await.connections.len()
    }
}
