//! Message Pipeline
//! Mission: One persist-then-broadcast contract for posts, deletes, and signals
//!
//! Ordering is strict: the message is durable before any client hears
//! about it, and the broadcast frame embeds the store-assigned id and
//! timestamp. Persistence never happens under a registry lock.

use crate::auth::models::User;
use crate::auth::{AuthError, AuthGate};
use crate::chat::message_store::MessageStore;
use crate::chat::protocol::ServerFrame;
use crate::chat::registry::{Connection, ConnectionRegistry};
use crate::models::{ChatMessage, MessageKind, Room};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Failures raised while driving the pipeline.
#[derive(Debug)]
pub enum ChatError {
    /// Re-resolving the acting principal failed; the caller must tear
    /// down the offending session, nothing else.
    Auth(AuthError),
    /// The actor lacks the role (or authorship) the operation needs.
    Forbidden(&'static str),
    MessageNotFound(i64),
    Storage(anyhow::Error),
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatError::Auth(e) => write!(f, "{}", e),
            ChatError::Forbidden(msg) => write!(f, "{}", msg),
            ChatError::MessageNotFound(id) => write!(f, "Message {} not found", id),
            ChatError::Storage(e) => write!(f, "Storage error: {}", e),
        }
    }
}

impl std::error::Error for ChatError {}

impl From<anyhow::Error> for ChatError {
    fn from(err: anyhow::Error) -> Self {
        ChatError::Storage(err)
    }
}

/// Persist-then-broadcast pipeline shared by chat posts, moderation
/// deletes, and external signal injection.
pub struct MessagePipeline {
    gate: Arc<AuthGate>,
    messages: Arc<MessageStore>,
    registry: Arc<ConnectionRegistry>,
}

impl MessagePipeline {
    pub fn new(
        gate: Arc<AuthGate>,
        messages: Arc<MessageStore>,
        registry: Arc<ConnectionRegistry>,
    ) -> Self {
        Self {
            gate,
            messages,
            registry,
        }
    }

    /// Publish a chat post from a live connection.
    ///
    /// The acting principal is re-resolved on every call, so revoked or
    /// expired accounts lose publish rights immediately. A role rejection
    /// goes back to the originating connection only - never persisted,
    /// never broadcast - and yields `Ok(None)`.
    pub async fn publish(
        &self,
        room_id: i64,
        origin: &Connection,
        content: String,
        kind: MessageKind,
    ) -> Result<Option<ChatMessage>, ChatError> {
        let user = self.gate.resolve(origin.user_id).map_err(ChatError::Auth)?;

        if !self.gate.authorize_publish(&user) {
            origin.send(ServerFrame::error(
                "Only admins and staff can send messages.",
            ));
            return Ok(None);
        }

        if content.trim().is_empty() {
            origin.send(ServerFrame::error("Message must not be empty."));
            return Ok(None);
        }

        // Persist first (no registry lock held), then fan out the
        // store-assigned state.
        let msg = self
            .messages
            .insert(room_id, user.id, &content, kind)
            .await?;

        let frame = ServerFrame::delivered(&msg, &user.name, user.role);
        let delivered = self.registry.broadcast(room_id, &frame);
        debug!(
            message_id = msg.id,
            room_id, delivered, "Published chat message"
        );

        Ok(Some(msg))
    }

    /// Moderation delete: elevated roles or the original author.
    ///
    /// An absent message is reported without side effects; otherwise the
    /// store row goes first and the delete notice (id only) follows.
    pub async fn delete(&self, actor: &User, message_id: i64) -> Result<(), ChatError> {
        let msg = self
            .messages
            .by_id(message_id)
            .await?
            .ok_or(ChatError::MessageNotFound(message_id))?;

        if !(actor.role.is_elevated() || actor.id == msg.user_id) {
            return Err(ChatError::Forbidden(
                "Only admins, staff, or the author can delete a message",
            ));
        }

        self.messages.delete_by_id(message_id).await?;
        self.registry
            .broadcast(msg.room_id, &ServerFrame::Delete { id: message_id });
        debug!(message_id, room_id = msg.room_id, "Deleted chat message");

        Ok(())
    }

    /// Inject a message under a pre-authorized system identity.
    ///
    /// Same persist+broadcast contract as `publish`, minus the role gate;
    /// only the signal ingestor calls this.
    pub async fn ingest_external(
        &self,
        system_user: &User,
        room: &Room,
        content: String,
        kind: MessageKind,
    ) -> Result<ChatMessage, ChatError> {
        let msg = self
            .messages
            .insert(room.id, system_user.id, &content, kind)
            .await?;

        let frame = ServerFrame::delivered(&msg, &system_user.name, system_user.role);
        let delivered = self.registry.broadcast(room.id, &frame);
        debug!(
            message_id = msg.id,
            room_id = room.id,
            delivered,
            "Ingested external message"
        );

        Ok(msg)
    }
}
