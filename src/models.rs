//! Domain Models
//! Mission: Define the room, message, and signal data structures

use serde::{Deserialize, Serialize};

/// Room category tag
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RoomType {
    #[serde(rename = "notice")]
    Notice,
    #[serde(rename = "stock")]
    Stock,
    #[serde(rename = "futures")]
    Futures,
    #[serde(rename = "crypto")]
    Crypto,
}

impl RoomType {
    pub fn as_str(&self) -> &str {
        match self {
            RoomType::Notice => "notice",
            RoomType::Stock => "stock",
            RoomType::Futures => "futures",
            RoomType::Crypto => "crypto",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "notice" => Some(RoomType::Notice),
            "stock" => Some(RoomType::Stock),
            "futures" => Some(RoomType::Futures),
            "crypto" => Some(RoomType::Crypto),
            _ => None,
        }
    }
}

/// Chat room metadata
///
/// The free/paid flag gates read access to history; it does not gate
/// live-joining for authenticated accounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: i64,
    pub name: String,
    pub room_type: RoomType,
    pub is_free: bool,
    pub description: Option<String>,
    pub created_at: String,
}

/// Message payload kind
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MessageKind {
    #[serde(rename = "text")]
    Text,
    #[serde(rename = "signal")]
    Signal,
    #[serde(rename = "image")]
    Image,
    #[serde(rename = "file")]
    File,
}

impl MessageKind {
    pub fn as_str(&self) -> &str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Signal => "signal",
            MessageKind::Image => "image",
            MessageKind::File => "file",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "text" => Some(MessageKind::Text),
            "signal" => Some(MessageKind::Signal),
            "image" => Some(MessageKind::Image),
            "file" => Some(MessageKind::File),
            _ => None,
        }
    }
}

impl Default for MessageKind {
    fn default() -> Self {
        MessageKind::Text
    }
}

/// A durably stored chat message.
///
/// `id` and `created_at` are assigned exactly once by the message store at
/// insertion and are immutable afterwards (short of full deletion).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub room_id: i64,
    pub user_id: i64,
    pub content: String,
    pub message_type: MessageKind,
    pub created_at: String,
}

/// Inbound trading event from the external bridge.
///
/// Transient: consumed once to render a chat message, never stored as its
/// own entity. `action` stays a raw string because unknown actions still
/// render through the generic template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalEvent {
    pub symbol: String,
    pub action: String,
    pub price: f64,
    #[serde(default)]
    pub sl: Option<f64>,
    #[serde(default)]
    pub tp: Option<f64>,
    #[serde(default)]
    pub lots: Option<f64>,
    #[serde(default)]
    pub ticket: Option<i64>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub direction: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_type_round_trip() {
        assert_eq!(RoomType::Futures.as_str(), "futures");
        assert_eq!(RoomType::from_str("FUTURES"), Some(RoomType::Futures));
        assert_eq!(RoomType::from_str("unknown"), None);

        let json = serde_json::to_string(&RoomType::Crypto).unwrap();
        assert_eq!(json, r#""crypto""#);
    }

    #[test]
    fn test_message_kind_serialization() {
        let kind: MessageKind = serde_json::from_str(r#""signal""#).unwrap();
        assert_eq!(kind, MessageKind::Signal);
        assert_eq!(MessageKind::default(), MessageKind::Text);
    }

    #[test]
    fn test_signal_event_optional_fields() {
        let event: SignalEvent = serde_json::from_str(
            r#"{"symbol":"EURUSD","action":"BUY","price":1.1}"#,
        )
        .unwrap();
        assert_eq!(event.symbol, "EURUSD");
        assert!(event.sl.is_none());
        assert!(event.comment.is_none());
    }
}
