//! User Storage
//! Mission: Securely store and manage member accounts with SQLite

use crate::auth::models::{User, UserRole};
use anyhow::{Context, Result};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, Row};
use std::sync::Arc;
use tracing::{info, warn};

/// User storage with SQLite backend
pub struct UserStore {
    conn: Arc<Mutex<Connection>>,
}

impl UserStore {
    /// Open the store and initialize the schema.
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open user database at {}", db_path))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                phone TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                name TEXT NOT NULL,
                role TEXT NOT NULL,
                is_approved INTEGER NOT NULL DEFAULT 0,
                expiry_date TEXT,
                created_at TEXT NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_users_phone ON users(phone);",
        )
        .context("Failed to initialize users schema")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create the seed admin account if no admin exists yet.
    pub fn seed_admin(&self, phone: &str, password: &str, name: &str) -> Result<()> {
        let count: i64 = {
            let conn = self.conn.lock();
            conn.query_row(
                "SELECT COUNT(*) FROM users WHERE role = 'admin'",
                [],
                |row| row.get(0),
            )
            .context("Failed to check for admin users")?
        };

        if count == 0 {
            self.create_user(phone, password, name, UserRole::Admin, true)?;
            info!("🔐 Seed admin account created ({})", phone);
            warn!("⚠️  CHANGE THE DEFAULT ADMIN PASSWORD IN PRODUCTION!");
        }

        Ok(())
    }

    /// Create a new user account.
    pub fn create_user(
        &self,
        phone: &str,
        password: &str,
        name: &str,
        role: UserRole,
        is_approved: bool,
    ) -> Result<User> {
        let password_hash = hash(password, DEFAULT_COST).context("Failed to hash password")?;
        let created_at = Utc::now().to_rfc3339();

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO users (phone, password_hash, name, role, is_approved, expiry_date, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6)",
            params![
                phone,
                password_hash,
                name,
                role.as_str(),
                is_approved as i64,
                created_at,
            ],
        )
        .context("Failed to insert user")?;

        let id = conn.last_insert_rowid();

        info!("✅ Created user: {} ({})", name, role.as_str());

        Ok(User {
            id,
            phone: phone.to_string(),
            password_hash,
            name: name.to_string(),
            role,
            is_approved,
            expiry_date: None,
            created_at,
        })
    }

    pub fn by_id(&self, id: i64) -> Result<Option<User>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, phone, password_hash, name, role, is_approved, expiry_date, created_at
             FROM users WHERE id = ?1",
        )?;

        match stmt.query_row(params![id], row_to_user) {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn by_phone(&self, phone: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, phone, password_hash, name, role, is_approved, expiry_date, created_at
             FROM users WHERE phone = ?1",
        )?;

        match stmt.query_row(params![phone], row_to_user) {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Verify phone and password.
    pub fn verify_password(&self, phone: &str, password: &str) -> Result<bool> {
        match self.by_phone(phone)? {
            Some(user) => {
                let valid =
                    verify(password, &user.password_hash).context("Failed to verify password")?;
                Ok(valid)
            }
            None => Ok(false),
        }
    }

    /// Flip the approval flag; returns false when the user does not exist.
    pub fn approve(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn.execute("UPDATE users SET is_approved = 1 WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    pub fn set_password(&self, id: i64, new_password: &str) -> Result<bool> {
        let password_hash =
            hash(new_password, DEFAULT_COST).context("Failed to hash password")?;
        let conn = self.conn.lock();
        let rows = conn.execute(
            "UPDATE users SET password_hash = ?1 WHERE id = ?2",
            params![password_hash, id],
        )?;
        Ok(rows > 0)
    }

    pub fn set_expiry(&self, id: i64, expiry: Option<DateTime<Utc>>) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn.execute(
            "UPDATE users SET expiry_date = ?1 WHERE id = ?2",
            params![expiry.map(|e| e.to_rfc3339()), id],
        )?;
        Ok(rows > 0)
    }

    /// Delete a user account; returns false when the user does not exist.
    pub fn delete(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
        if rows > 0 {
            info!("🗑️  Deleted user: {}", id);
        }
        Ok(rows > 0)
    }

    /// List all users (admin only).
    pub fn list(&self) -> Result<Vec<User>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, phone, password_hash, name, role, is_approved, expiry_date, created_at
             FROM users ORDER BY id",
        )?;

        let users = stmt
            .query_map([], row_to_user)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(users)
    }
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    let role_str: String = row.get(4)?;
    let expiry_raw: Option<String> = row.get(6)?;

    Ok(User {
        id: row.get(0)?,
        phone: row.get(1)?,
        password_hash: row.get(2)?,
        name: row.get(3)?,
        role: UserRole::from_str(&role_str).unwrap_or(UserRole::Member),
        is_approved: row.get::<_, i64>(5)? != 0,
        expiry_date: expiry_raw
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|dt| dt.with_timezone(&Utc)),
        created_at: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::NamedTempFile;

    fn create_test_store() -> (UserStore, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let store = UserStore::new(temp_file.path().to_str().unwrap()).unwrap();
        (store, temp_file)
    }

    #[test]
    fn test_seed_admin_once() {
        let (store, _temp) = create_test_store();

        store.seed_admin("010-0000-0000", "admin1234", "Head Trader").unwrap();
        store.seed_admin("010-9999-9999", "other", "Second Admin").unwrap();

        let users = store.list().unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].phone, "010-0000-0000");
        assert_eq!(users[0].role, UserRole::Admin);
        assert!(users[0].is_approved);
    }

    #[test]
    fn test_password_verification() {
        let (store, _temp) = create_test_store();
        store
            .create_user("010-1234-5678", "hunter2", "Member Park", UserRole::Member, true)
            .unwrap();

        assert!(store.verify_password("010-1234-5678", "hunter2").unwrap());
        assert!(!store.verify_password("010-1234-5678", "wrong").unwrap());
        assert!(!store.verify_password("010-0000-1111", "hunter2").unwrap());
    }

    #[test]
    fn test_create_and_retrieve_user() {
        let (store, _temp) = create_test_store();

        let staff = store
            .create_user("010-2222-3333", "pw", "Staff Choi", UserRole::Staff, true)
            .unwrap();

        let by_id = store.by_id(staff.id).unwrap().unwrap();
        assert_eq!(by_id.name, "Staff Choi");
        assert_eq!(by_id.role, UserRole::Staff);

        let by_phone = store.by_phone("010-2222-3333").unwrap().unwrap();
        assert_eq!(by_phone.id, staff.id);
    }

    #[test]
    fn test_duplicate_phone_rejected() {
        let (store, _temp) = create_test_store();
        store
            .create_user("010-2222-3333", "pw", "First", UserRole::Member, false)
            .unwrap();
        let dup = store.create_user("010-2222-3333", "pw", "Second", UserRole::Member, false);
        assert!(dup.is_err());
    }

    #[test]
    fn test_approve_and_expiry_round_trip() {
        let (store, _temp) = create_test_store();
        let user = store
            .create_user("010-2222-3333", "pw", "Pending", UserRole::Member, false)
            .unwrap();
        assert!(!store.by_id(user.id).unwrap().unwrap().is_approved);

        assert!(store.approve(user.id).unwrap());
        assert!(store.by_id(user.id).unwrap().unwrap().is_approved);

        let expiry = Utc::now() + Duration::days(30);
        assert!(store.set_expiry(user.id, Some(expiry)).unwrap());
        let stored = store.by_id(user.id).unwrap().unwrap().expiry_date.unwrap();
        assert_eq!(stored.timestamp(), expiry.timestamp());

        assert!(store.set_expiry(user.id, None).unwrap());
        assert!(store.by_id(user.id).unwrap().unwrap().expiry_date.is_none());

        // Unknown ids report absence instead of erroring.
        assert!(!store.approve(9999).unwrap());
    }

    #[test]
    fn test_delete_user() {
        let (store, _temp) = create_test_store();
        let user = store
            .create_user("010-2222-3333", "pw", "Temp", UserRole::Member, true)
            .unwrap();

        assert!(store.delete(user.id).unwrap());
        assert!(store.by_id(user.id).unwrap().is_none());
        assert!(!store.delete(user.id).unwrap());
    }
}
