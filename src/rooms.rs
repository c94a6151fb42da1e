//! Room Storage
//! Mission: Manage chat room metadata with SQLite

use crate::models::{Room, RoomType};
use anyhow::{Context, Result};
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, Row};
use std::sync::Arc;
use tracing::info;

/// Room metadata storage with SQLite backend
pub struct RoomStore {
    conn: Arc<Mutex<Connection>>,
}

impl RoomStore {
    /// Open the store and initialize the schema.
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open room database at {}", db_path))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             CREATE TABLE IF NOT EXISTS rooms (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                room_type TEXT NOT NULL,
                is_free INTEGER NOT NULL DEFAULT 0,
                description TEXT,
                created_at TEXT NOT NULL
             );",
        )
        .context("Failed to initialize rooms schema")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create the default room set on first start.
    pub fn seed_defaults(&self) -> Result<()> {
        let count: i64 = {
            let conn = self.conn.lock();
            conn.query_row("SELECT COUNT(*) FROM rooms", [], |row| row.get(0))?
        };

        if count > 0 {
            return Ok(());
        }

        let defaults = [
            ("Free Notice Room", RoomType::Notice, true, "Open announcements, visible to everyone"),
            ("Stock Signal Room", RoomType::Stock, false, "Stock trading signals"),
            ("Futures Signal Room", RoomType::Futures, false, "Futures trading signals"),
            ("Crypto Signal Room", RoomType::Crypto, false, "Crypto futures trading signals"),
        ];

        for (name, room_type, is_free, description) in defaults {
            self.create(name, room_type, is_free, Some(description))?;
        }

        info!("🏠 Seeded {} default rooms", defaults.len());
        Ok(())
    }

    pub fn create(
        &self,
        name: &str,
        room_type: RoomType,
        is_free: bool,
        description: Option<&str>,
    ) -> Result<Room> {
        let created_at = Utc::now().to_rfc3339();

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO rooms (name, room_type, is_free, description, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![name, room_type.as_str(), is_free as i64, description, created_at],
        )
        .context("Failed to insert room")?;

        Ok(Room {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
            room_type,
            is_free,
            description: description.map(|d| d.to_string()),
            created_at,
        })
    }

    pub fn by_id(&self, id: i64) -> Result<Option<Room>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, name, room_type, is_free, description, created_at
             FROM rooms WHERE id = ?1",
        )?;

        match stmt.query_row(params![id], row_to_room) {
            Ok(room) => Ok(Some(room)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// First room carrying the given type tag, in creation order.
    pub fn by_type(&self, room_type: RoomType) -> Result<Option<Room>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, name, room_type, is_free, description, created_at
             FROM rooms WHERE room_type = ?1 ORDER BY id LIMIT 1",
        )?;

        match stmt.query_row(params![room_type.as_str()], row_to_room) {
            Ok(room) => Ok(Some(room)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// First room whose name contains the fragment (case-sensitive),
    /// in creation order.
    pub fn by_name_contains(&self, fragment: &str) -> Result<Option<Room>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, name, room_type, is_free, description, created_at
             FROM rooms ORDER BY id",
        )?;

        let rooms = stmt
            .query_map([], row_to_room)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rooms.into_iter().find(|r| r.name.contains(fragment)))
    }

    pub fn list_free(&self) -> Result<Vec<Room>> {
        self.list_by_flag(true)
    }

    pub fn list_paid(&self) -> Result<Vec<Room>> {
        self.list_by_flag(false)
    }

    fn list_by_flag(&self, is_free: bool) -> Result<Vec<Room>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, name, room_type, is_free, description, created_at
             FROM rooms WHERE is_free = ?1 ORDER BY id",
        )?;

        let rooms = stmt
            .query_map(params![is_free as i64], row_to_room)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rooms)
    }
}

fn row_to_room(row: &Row<'_>) -> rusqlite::Result<Room> {
    let type_str: String = row.get(2)?;
    Ok(Room {
        id: row.get(0)?,
        name: row.get(1)?,
        room_type: RoomType::from_str(&type_str).unwrap_or(RoomType::Notice),
        is_free: row.get::<_, i64>(3)? != 0,
        description: row.get(4)?,
        created_at: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_test_store() -> (RoomStore, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let store = RoomStore::new(temp_file.path().to_str().unwrap()).unwrap();
        (store, temp_file)
    }

    #[test]
    fn test_seed_defaults_once() {
        let (store, _temp) = create_test_store();
        store.seed_defaults().unwrap();
        store.seed_defaults().unwrap();

        let free = store.list_free().unwrap();
        let paid = store.list_paid().unwrap();
        assert_eq!(free.len(), 1);
        assert_eq!(paid.len(), 3);
        assert_eq!(free[0].room_type, RoomType::Notice);
    }

    #[test]
    fn test_lookup_by_type_and_name() {
        let (store, _temp) = create_test_store();
        store.seed_defaults().unwrap();

        let futures = store.by_type(RoomType::Futures).unwrap().unwrap();
        assert_eq!(futures.name, "Futures Signal Room");

        let by_name = store.by_name_contains("Futures").unwrap().unwrap();
        assert_eq!(by_name.id, futures.id);

        // Case-sensitive: lowercase fragment does not match.
        assert!(store.by_name_contains("futures signal").unwrap().is_none());
        assert!(store.by_name_contains("No Such Room").unwrap().is_none());
    }

    #[test]
    fn test_by_id_absent() {
        let (store, _temp) = create_test_store();
        assert!(store.by_id(42).unwrap().is_none());
    }

    #[test]
    fn test_create_room() {
        let (store, _temp) = create_test_store();
        let room = store
            .create("VIP Crypto Room", RoomType::Crypto, false, None)
            .unwrap();
        assert!(room.id > 0);

        let fetched = store.by_id(room.id).unwrap().unwrap();
        assert_eq!(fetched.name, "VIP Crypto Room");
        assert!(!fetched.is_free);
        assert!(fetched.description.is_none());
    }
}
