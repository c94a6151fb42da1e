//! Runtime Configuration
//! Mission: Collect every tunable in one place, sourced from the environment

use std::env;
use std::path::PathBuf;

/// Application configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Address the HTTP/WebSocket server binds to.
    pub bind_addr: String,
    /// SQLite database file backing users, rooms, and messages.
    pub db_path: String,
    /// HS256 secret for session tokens.
    pub jwt_secret: String,
    /// Shared secret the external signal bridge must present. Empty means
    /// the bridge is unconfigured and every ingest call fails closed.
    pub signal_api_key: String,
    /// Explicit target room for injected signals; tried before the
    /// type-tag and name-based lookups.
    pub signal_room_id: Option<i64>,
    /// Phone number of the account that authors injected signals.
    pub signal_sender_phone: String,
    /// Seed admin account, created on first start if missing.
    pub admin_phone: String,
    pub admin_password: String,
    pub admin_name: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let admin_phone =
            env::var("ADMIN_PHONE").unwrap_or_else(|_| "010-0000-0000".to_string());

        Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string()),
            db_path: resolve_data_path(env::var("DB_PATH").ok(), "signalroom.db"),
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| "dev-secret-change-in-production".to_string()),
            signal_api_key: env::var("SIGNAL_API_KEY")
                .or_else(|_| env::var("MT4_API_KEY"))
                .unwrap_or_default(),
            signal_room_id: env::var("SIGNAL_ROOM_ID")
                .ok()
                .and_then(|v| v.parse::<i64>().ok()),
            signal_sender_phone: env::var("SIGNAL_SENDER_PHONE")
                .unwrap_or_else(|_| admin_phone.clone()),
            admin_password: env::var("ADMIN_PASSWORD")
                .unwrap_or_else(|_| "admin1234".to_string()),
            admin_name: env::var("ADMIN_NAME").unwrap_or_else(|_| "Head Trader".to_string()),
            admin_phone,
        }
    }
}

fn default_data_path(filename: &str) -> String {
    // Anchor defaults to the crate directory so running from elsewhere
    // doesn't create a second empty database.
    let base = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    base.join(filename).to_string_lossy().to_string()
}

/// Resolve a data path from the environment, treating relative paths as
/// relative to the crate directory rather than the caller's cwd.
pub fn resolve_data_path(env_value: Option<String>, default_filename: &str) -> String {
    let base = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let Some(raw) = env_value.filter(|v| !v.trim().is_empty()) else {
        return default_data_path(default_filename);
    };

    let p = PathBuf::from(raw);
    if p.is_absolute() {
        return p.to_string_lossy().to_string();
    }

    base.join(p).to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_data_path_absolute_passthrough() {
        let resolved = resolve_data_path(Some("/tmp/test.db".to_string()), "fallback.db");
        assert_eq!(resolved, "/tmp/test.db");
    }

    #[test]
    fn test_resolve_data_path_default_is_anchored() {
        let resolved = resolve_data_path(None, "fallback.db");
        assert!(resolved.ends_with("fallback.db"));
        assert!(PathBuf::from(&resolved).is_absolute());
    }

    #[test]
    fn test_resolve_data_path_blank_env_falls_back() {
        let resolved = resolve_data_path(Some("   ".to_string()), "fallback.db");
        assert!(resolved.ends_with("fallback.db"));
    }
}
