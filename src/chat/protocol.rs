//! Chat Wire Protocol
//! Mission: Typed frames for everything that crosses a room socket

use crate::auth::models::UserRole;
use crate::models::{ChatMessage, MessageKind};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Inbound frame (client → server), discriminated by `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientFrame {
    Chat {
        message: String,
        #[serde(rename = "messageType", default)]
        message_type: MessageKind,
    },
}

/// Delivered chat content, shared by the `message` and `signal` frames.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageFrame {
    pub id: i64,
    pub user_id: i64,
    pub user_name: String,
    pub user_role: UserRole,
    pub content: String,
    pub message_type: MessageKind,
    pub timestamp: String,
}

/// Outbound frames (server → client), discriminated by `type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerFrame {
    /// Join/leave notices.
    System { message: String, timestamp: String },
    /// Delivered chat content; id/timestamp are the store-assigned values.
    Message(MessageFrame),
    /// Same shape as `Message`, for injected trading signals.
    Signal(MessageFrame),
    /// Rejection, delivered only to the offending sender.
    Error { message: String },
    /// Moderation delete; carries only the message id.
    Delete { id: i64 },
}

impl ServerFrame {
    pub fn system(message: impl Into<String>) -> Self {
        ServerFrame::System {
            message: message.into(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerFrame::Error {
            message: message.into(),
        }
    }

    /// Frame for a durably stored message; picks `signal` or `message`
    /// by the stored kind so receivers see exactly the durable state.
    pub fn delivered(msg: &ChatMessage, user_name: &str, user_role: UserRole) -> Self {
        let frame = MessageFrame {
            id: msg.id,
            user_id: msg.user_id,
            user_name: user_name.to_string(),
            user_role,
            content: msg.content.clone(),
            message_type: msg.message_type,
            timestamp: msg.created_at.clone(),
        };

        match msg.message_type {
            MessageKind::Signal => ServerFrame::Signal(frame),
            _ => ServerFrame::Message(frame),
        }
    }
}
