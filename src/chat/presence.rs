//! Presence Tracking
//! Mission: Who is in which room right now
//!
//! Purely derived from registry transitions and process-local: it starts
//! empty on every boot and is never persisted.

use crate::auth::models::UserRole;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;

/// Derived view of one live connection.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PresenceEntry {
    pub user_id: i64,
    pub name: String,
    pub role: UserRole,
    pub connected_at: String,
}

struct TrackedEntry {
    entry: PresenceEntry,
    serial: u64,
}

/// Ephemeral per-room index of connected identities.
pub struct PresenceTracker {
    rooms: RwLock<HashMap<i64, Vec<TrackedEntry>>>,
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Mirror a registry connect. A re-connecting user replaces their
    /// previous entry, keeping the one-entry-per-user invariant.
    pub fn on_connect(&self, room_id: i64, serial: u64, entry: PresenceEntry) {
        let mut rooms = self.rooms.write();
        let entries = rooms.entry(room_id).or_default();
        entries.retain(|t| t.entry.user_id != entry.user_id);
        entries.push(TrackedEntry { entry, serial });
    }

    /// Mirror a registry disconnect; serial-guarded the same way, so a
    /// superseded connection's late cleanup leaves the replacement alone.
    pub fn on_disconnect(&self, room_id: i64, user_id: i64, serial: u64) {
        let mut rooms = self.rooms.write();
        if let Some(entries) = rooms.get_mut(&room_id) {
            entries.retain(|t| !(t.entry.user_id == user_id && t.serial == serial));
            if entries.is_empty() {
                rooms.remove(&room_id);
            }
        }
    }

    /// Current occupants of a room, in connection order.
    pub fn snapshot(&self, room_id: i64) -> Vec<PresenceEntry> {
        self.rooms
            .read()
            .get(&room_id)
            .map(|entries| entries.iter().map(|t| t.entry.clone()).collect())
            .unwrap_or_default()
    }

    /// Flattened cross-room view for administrative dashboards.
    pub fn snapshot_all(&self) -> Vec<(i64, PresenceEntry)> {
        let rooms = self.rooms.read();
        let mut all: Vec<(i64, PresenceEntry)> = rooms
            .iter()
            .flat_map(|(room_id, entries)| {
                entries.iter().map(|t| (*room_id, t.entry.clone()))
            })
            .collect();
        all.sort_by_key(|(room_id, _)| *room_id);
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(user_id: i64, name: &str) -> PresenceEntry {
        PresenceEntry {
            user_id,
            name: name.to_string(),
            role: UserRole::Member,
            connected_at: Utc::now().to_rfc3339(),
        }
    }

    #[test]
    fn test_snapshot_follows_connections() {
        let tracker = PresenceTracker::new();
        assert!(tracker.snapshot(1).is_empty());

        tracker.on_connect(1, 10, entry(1, "Kim"));
        tracker.on_connect(1, 11, entry(2, "Lee"));

        let snap = tracker.snapshot(1);
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].name, "Kim");
        assert_eq!(snap[1].name, "Lee");

        tracker.on_disconnect(1, 1, 10);
        let snap = tracker.snapshot(1);
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].name, "Lee");
    }

    #[test]
    fn test_reconnect_replaces_entry() {
        let tracker = PresenceTracker::new();
        tracker.on_connect(1, 10, entry(1, "Kim"));
        tracker.on_connect(1, 20, entry(1, "Kim"));

        assert_eq!(tracker.snapshot(1).len(), 1);

        // The superseded connection's cleanup is serial-guarded.
        tracker.on_disconnect(1, 1, 10);
        assert_eq!(tracker.snapshot(1).len(), 1);

        tracker.on_disconnect(1, 1, 20);
        assert!(tracker.snapshot(1).is_empty());
    }

    #[test]
    fn test_disconnect_unknown_is_noop() {
        let tracker = PresenceTracker::new();
        tracker.on_disconnect(9, 1, 1);
        assert!(tracker.snapshot(9).is_empty());
    }

    #[test]
    fn test_snapshot_all_tags_rooms() {
        let tracker = PresenceTracker::new();
        tracker.on_connect(2, 10, entry(1, "Kim"));
        tracker.on_connect(1, 11, entry(2, "Lee"));
        tracker.on_connect(2, 12, entry(3, "Park"));

        let all = tracker.snapshot_all();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].0, 1);
        assert_eq!(all[1].0, 2);
        assert_eq!(all[2].0, 2);
    }
}
