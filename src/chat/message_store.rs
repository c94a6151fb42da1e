//! Message Storage
//! Mission: Durable room history with store-assigned ids and timestamps
//!
//! WAL mode so history reads stay cheap while the chat hot path writes.
//! The id/created_at pair is assigned here, exactly once, at insertion;
//! broadcast frames embed these assigned values so every receiver sees
//! the durable state.

use crate::models::{ChatMessage, MessageKind};
use anyhow::{Context, Result};
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, Row};
use std::sync::Arc;

pub struct MessageStore {
    conn: Arc<Mutex<Connection>>,
}

impl MessageStore {
    /// Open the store and initialize the schema.
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open message database at {}", db_path))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                room_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                content TEXT NOT NULL,
                message_type TEXT NOT NULL DEFAULT 'text',
                created_at TEXT NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_messages_room_recent
                ON messages(room_id, id DESC);",
        )
        .context("Failed to initialize messages schema")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Durably insert a message. Assigns the id and timestamp; both are
    /// immutable afterwards.
    pub async fn insert(
        &self,
        room_id: i64,
        user_id: i64,
        content: &str,
        kind: MessageKind,
    ) -> Result<ChatMessage> {
        let created_at = Utc::now().to_rfc3339();

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO messages (room_id, user_id, content, message_type, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![room_id, user_id, content, kind.as_str(), created_at],
        )
        .context("Failed to insert message")?;

        Ok(ChatMessage {
            id: conn.last_insert_rowid(),
            room_id,
            user_id,
            content: content.to_string(),
            message_type: kind,
            created_at,
        })
    }

    pub async fn by_id(&self, id: i64) -> Result<Option<ChatMessage>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, room_id, user_id, content, message_type, created_at
             FROM messages WHERE id = ?1",
        )?;

        match stmt.query_row(params![id], row_to_message) {
            Ok(msg) => Ok(Some(msg)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a message; returns false when it was already absent.
    pub async fn delete_by_id(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn.execute("DELETE FROM messages WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    /// Most recent messages for a room, newest first.
    pub async fn recent_by_room(&self, room_id: i64, limit: usize) -> Result<Vec<ChatMessage>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, room_id, user_id, content, message_type, created_at
             FROM messages WHERE room_id = ?1 ORDER BY id DESC LIMIT ?2",
        )?;

        let messages = stmt
            .query_map(params![room_id, limit as i64], row_to_message)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(messages)
    }

    pub async fn count_by_room(&self, room_id: i64) -> Result<i64> {
        let conn = self.conn.lock();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE room_id = ?1",
            params![room_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<ChatMessage> {
    let kind_str: String = row.get(4)?;
    Ok(ChatMessage {
        id: row.get(0)?,
        room_id: row.get(1)?,
        user_id: row.get(2)?,
        content: row.get(3)?,
        message_type: MessageKind::from_str(&kind_str).unwrap_or(MessageKind::Text),
        created_at: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_test_store() -> (MessageStore, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let store = MessageStore::new(temp_file.path().to_str().unwrap()).unwrap();
        (store, temp_file)
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_timestamp() {
        let (store, _temp) = create_test_store();

        let first = store.insert(1, 2, "hello", MessageKind::Text).await.unwrap();
        let second = store.insert(1, 2, "world", MessageKind::Text).await.unwrap();

        assert!(first.id > 0);
        assert!(second.id > first.id);
        assert!(!first.created_at.is_empty());

        let fetched = store.by_id(first.id).await.unwrap().unwrap();
        assert_eq!(fetched.content, "hello");
        assert_eq!(fetched.created_at, first.created_at);
    }

    #[tokio::test]
    async fn test_recent_by_room_newest_first() {
        let (store, _temp) = create_test_store();
        for i in 0..5 {
            store
                .insert(1, 1, &format!("msg-{i}"), MessageKind::Text)
                .await
                .unwrap();
        }
        store.insert(2, 1, "other room", MessageKind::Text).await.unwrap();

        let recent = store.recent_by_room(1, 3).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].content, "msg-4");
        assert_eq!(recent[2].content, "msg-2");

        assert_eq!(store.count_by_room(1).await.unwrap(), 5);
        assert_eq!(store.count_by_room(2).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_by_id() {
        let (store, _temp) = create_test_store();
        let msg = store.insert(1, 1, "bye", MessageKind::Text).await.unwrap();

        assert!(store.delete_by_id(msg.id).await.unwrap());
        assert!(store.by_id(msg.id).await.unwrap().is_none());
        assert!(!store.delete_by_id(msg.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_kind_round_trip() {
        let (store, _temp) = create_test_store();
        let msg = store
            .insert(1, 1, "BUY EURUSD @ 1.1000", MessageKind::Signal)
            .await
            .unwrap();
        let fetched = store.by_id(msg.id).await.unwrap().unwrap();
        assert_eq!(fetched.message_type, MessageKind::Signal);
    }
}
