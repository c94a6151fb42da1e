//! Connection Registry
//! Mission: Track live room connections and fan events out to them
//!
//! The registry is the only mutable state shared across connection tasks
//! and signal-ingestion calls. Rooms are sharded: each room has its own
//! lock, so connect/disconnect/broadcast in one room never contend with
//! another. Nothing here ever touches persistent storage, and no lock is
//! held across an await point.

use crate::auth::models::UserRole;
use crate::chat::protocol::ServerFrame;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// What a session task reads off its outbound channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Frame(ServerFrame),
    /// The connection was superseded by a newer one for the same user;
    /// the receiving task must tear itself down.
    Shutdown,
}

/// One live, authenticated session bound to exactly one user and room.
///
/// The registry owns the authoritative copy; the session task keeps a
/// clone so it can reply to its own client (rejection frames).
#[derive(Clone)]
pub struct Connection {
    pub user_id: i64,
    pub user_name: String,
    pub role: UserRole,
    /// Distinguishes this connection from an earlier or later one for the
    /// same user; cleanup is a no-op unless the serial still matches.
    pub serial: u64,
    pub connected_at: DateTime<Utc>,
    sender: mpsc::UnboundedSender<Outbound>,
}

impl Connection {
    /// Create a connection and the receiver its session task will drain.
    pub fn open(
        user_id: i64,
        user_name: String,
        role: UserRole,
        serial: u64,
    ) -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                user_id,
                user_name,
                role,
                serial,
                connected_at: Utc::now(),
                sender,
            },
            receiver,
        )
    }

    /// Hand a frame to the session task. Non-blocking; false means the
    /// receiver is gone (session already tearing down).
    pub fn send(&self, frame: ServerFrame) -> bool {
        self.sender.send(Outbound::Frame(frame)).is_ok()
    }

    fn shutdown(&self) {
        let _ = self.sender.send(Outbound::Shutdown);
    }
}

type RoomShard = Arc<Mutex<HashMap<i64, Connection>>>;

/// Live-connection registry, sharded per room.
pub struct ConnectionRegistry {
    rooms: RwLock<HashMap<i64, RoomShard>>,
    serial: AtomicU64,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            serial: AtomicU64::new(1),
        }
    }

    /// Allocate a serial for a new connection attempt.
    pub fn next_serial(&self) -> u64 {
        self.serial.fetch_add(1, Ordering::Relaxed)
    }

    fn shard(&self, room_id: i64) -> RoomShard {
        if let Some(shard) = self.rooms.read().get(&room_id) {
            return shard.clone();
        }
        self.rooms
            .write()
            .entry(room_id)
            .or_insert_with(|| Arc::new(Mutex::new(HashMap::new())))
            .clone()
    }

    fn existing_shard(&self, room_id: i64) -> Option<RoomShard> {
        self.rooms.read().get(&room_id).cloned()
    }

    /// Register a connection under its room. A user gets at most one
    /// tracked connection: an existing one is evicted and force-closed.
    /// Returns true when a prior connection was superseded.
    pub fn connect(&self, room_id: i64, conn: Connection) -> bool {
        let shard = self.shard(room_id);
        let mut members = shard.lock();
        if let Some(old) = members.insert(conn.user_id, conn) {
            warn!(
                user_id = old.user_id,
                room_id, "Superseding existing connection for user"
            );
            old.shutdown();
            return true;
        }
        false
    }

    /// Remove a connection. Idempotent: absent entries and mismatched
    /// serials (the slot now belongs to a replacement) are both no-ops.
    pub fn disconnect(&self, room_id: i64, user_id: i64, serial: u64) -> bool {
        let Some(shard) = self.existing_shard(room_id) else {
            return false;
        };
        let mut members = shard.lock();
        match members.get(&user_id) {
            Some(conn) if conn.serial == serial => {
                members.remove(&user_id);
                true
            }
            _ => false,
        }
    }

    /// Deliver a frame to a point-in-time snapshot of the room.
    ///
    /// The room lock is held only for the snapshot plus the non-blocking
    /// hand-off into each connection's channel. A dead receiver is logged
    /// and skipped; it never fails the broadcast. An empty room is a
    /// successful no-op. Returns the number of successful hand-offs.
    pub fn broadcast(&self, room_id: i64, frame: &ServerFrame) -> usize {
        let Some(shard) = self.existing_shard(room_id) else {
            return 0;
        };
        let members = shard.lock();
        let mut delivered = 0;
        for conn in members.values() {
            if conn.send(frame.clone()) {
                delivered += 1;
            } else {
                debug!(
                    user_id = conn.user_id,
                    room_id, "Skipping dead connection during broadcast"
                );
            }
        }
        delivered
    }

    /// Number of live connections in a room.
    pub fn connection_count(&self, room_id: i64) -> usize {
        self.existing_shard(room_id)
            .map(|shard| shard.lock().len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_conn(registry: &ConnectionRegistry, user_id: i64) -> (Connection, mpsc::UnboundedReceiver<Outbound>) {
        Connection::open(
            user_id,
            format!("user-{user_id}"),
            UserRole::Member,
            registry.next_serial(),
        )
    }

    #[test]
    fn test_broadcast_to_empty_room_is_noop() {
        let registry = ConnectionRegistry::new();
        assert_eq!(registry.broadcast(1, &ServerFrame::system("hi")), 0);
    }

    #[test]
    fn test_broadcast_reaches_all_members_in_order() {
        let registry = ConnectionRegistry::new();
        let (a, mut rx_a) = open_conn(&registry, 1);
        let (b, mut rx_b) = open_conn(&registry, 2);
        registry.connect(7, a);
        registry.connect(7, b);

        let first = ServerFrame::error("first");
        let second = ServerFrame::error("second");
        assert_eq!(registry.broadcast(7, &first), 2);
        assert_eq!(registry.broadcast(7, &second), 2);

        for rx in [&mut rx_a, &mut rx_b] {
            assert_eq!(rx.try_recv().unwrap(), Outbound::Frame(first.clone()));
            assert_eq!(rx.try_recv().unwrap(), Outbound::Frame(second.clone()));
        }
    }

    #[test]
    fn test_dead_receiver_is_isolated() {
        let registry = ConnectionRegistry::new();
        let (alive, mut rx_alive) = open_conn(&registry, 1);
        let (dead, rx_dead) = open_conn(&registry, 2);
        registry.connect(7, alive);
        registry.connect(7, dead);
        drop(rx_dead);

        let frame = ServerFrame::system("still here");
        assert_eq!(registry.broadcast(7, &frame), 1);
        assert_eq!(rx_alive.try_recv().unwrap(), Outbound::Frame(frame));
    }

    #[test]
    fn test_replacement_force_closes_old_connection() {
        let registry = ConnectionRegistry::new();
        let (old, mut rx_old) = open_conn(&registry, 1);
        let old_serial = old.serial;
        assert!(!registry.connect(7, old));

        let (new, mut rx_new) = open_conn(&registry, 1);
        let new_serial = new.serial;
        assert!(registry.connect(7, new));
        assert_eq!(registry.connection_count(7), 1);

        // The superseded connection is told to tear down.
        assert_eq!(rx_old.try_recv().unwrap(), Outbound::Shutdown);

        // Late cleanup from the superseded task must not evict the
        // replacement.
        assert!(!registry.disconnect(7, 1, old_serial));
        assert_eq!(registry.connection_count(7), 1);

        registry.broadcast(7, &ServerFrame::system("to the new one"));
        assert!(matches!(rx_new.try_recv().unwrap(), Outbound::Frame(_)));

        assert!(registry.disconnect(7, 1, new_serial));
        assert_eq!(registry.connection_count(7), 0);
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let registry = ConnectionRegistry::new();
        assert!(!registry.disconnect(99, 1, 1));

        let (conn, _rx) = open_conn(&registry, 1);
        let serial = conn.serial;
        registry.connect(5, conn);
        assert!(registry.disconnect(5, 1, serial));
        assert!(!registry.disconnect(5, 1, serial));
    }

    #[test]
    fn test_rooms_are_isolated() {
        let registry = ConnectionRegistry::new();
        let (a, mut rx_a) = open_conn(&registry, 1);
        let (b, mut rx_b) = open_conn(&registry, 2);
        registry.connect(1, a);
        registry.connect(2, b);

        assert_eq!(registry.broadcast(1, &ServerFrame::system("room 1 only")), 1);
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }
}
