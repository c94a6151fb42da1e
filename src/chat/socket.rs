//! WebSocket Chat Sessions
//! Mission: One task per live connection, from handshake to cleanup

use crate::api::AppState;
use crate::chat::pipeline::ChatError;
use crate::chat::presence::PresenceEntry;
use crate::chat::protocol::{ClientFrame, ServerFrame};
use crate::chat::registry::{Connection, Outbound};
use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    response::Response,
};
use serde::Deserialize;
use std::borrow::Cow;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// Why a session loop ended. Expected closures and faults get their own
/// cleanup paths instead of one catch-all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// Client closed the socket or the stream ended.
    ClientClosed,
    /// The underlying transport failed mid-send or mid-receive.
    Transport,
    /// A newer connection for the same user took over this slot.
    Superseded,
    /// The client sent a frame outside the protocol.
    ProtocolViolation,
    /// Per-event re-authentication failed (approval revoked, membership
    /// expired, account deleted).
    AuthRevoked,
}

/// WebSocket entry point - GET /ws/chat/{room_id}?token=...
pub async fn chat_handler(
    ws: WebSocketUpgrade,
    Path(room_id): Path<i64>,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| chat_session(socket, state, room_id, query.token))
}

async fn chat_session(mut socket: WebSocket, state: AppState, room_id: i64, token: Option<String>) {
    // Handshake admission: credential first, then the room.
    let user = match token.as_deref() {
        Some(token) => match state.gate.authenticate(token) {
            Ok(user) => user,
            Err(e) => {
                info!(room_id, "Rejected chat handshake: {}", e);
                close_policy_violation(&mut socket, e.to_string()).await;
                return;
            }
        },
        None => {
            close_policy_violation(&mut socket, "Missing token".to_string()).await;
            return;
        }
    };

    match state.rooms.by_id(room_id) {
        Ok(Some(_)) => {}
        Ok(None) => {
            info!(
                room_id,
                user_id = user.id,
                "Rejected chat handshake: unknown room"
            );
            close_policy_violation(&mut socket, "Room not found".to_string()).await;
            return;
        }
        Err(e) => {
            error!(room_id, "Room lookup failed during handshake: {}", e);
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::ERROR,
                    reason: Cow::from("Internal error"),
                })))
                .await;
            return;
        }
    }

    let serial = state.registry.next_serial();
    let (conn, mut rx) = Connection::open(user.id, user.name.clone(), user.role, serial);
    let entry = PresenceEntry {
        user_id: user.id,
        name: user.name.clone(),
        role: user.role,
        connected_at: conn.connected_at.to_rfc3339(),
    };

    state.registry.connect(room_id, conn.clone());
    state.presence.on_connect(room_id, serial, entry);
    state.registry.broadcast(
        room_id,
        &ServerFrame::system(format!("{} joined the room.", user.name)),
    );
    info!(
        room_id,
        user_id = user.id,
        role = user.role.as_str(),
        "Chat connection established"
    );

    let end = session_loop(&mut socket, &state, room_id, &conn, &mut rx).await;

    match end {
        SessionEnd::ClientClosed => {
            debug!(room_id, user_id = user.id, "Chat connection closed by client")
        }
        SessionEnd::Transport => {
            debug!(room_id, user_id = user.id, "Chat connection lost (transport)")
        }
        SessionEnd::Superseded => {
            info!(
                room_id,
                user_id = user.id,
                "Chat connection superseded by a newer one"
            )
        }
        SessionEnd::ProtocolViolation => {
            warn!(
                room_id,
                user_id = user.id,
                "Closing chat connection: protocol violation"
            );
            close_policy_violation(&mut socket, "Protocol violation".to_string()).await;
        }
        SessionEnd::AuthRevoked => {
            info!(
                room_id,
                user_id = user.id,
                "Closing chat connection: no longer eligible"
            );
            close_policy_violation(&mut socket, "No longer eligible".to_string()).await;
        }
    }

    // Cleanup runs exactly once per connection: the serial guard makes a
    // superseded session's teardown a no-op for its replacement.
    if state.registry.disconnect(room_id, user.id, serial) {
        state.presence.on_disconnect(room_id, user.id, serial);
        state.registry.broadcast(
            room_id,
            &ServerFrame::system(format!("{} left the room.", user.name)),
        );
    }
}

/// Suspend on the outbound channel and the socket simultaneously until
/// something ends the session.
async fn session_loop(
    socket: &mut WebSocket,
    state: &AppState,
    room_id: i64,
    conn: &Connection,
    rx: &mut mpsc::UnboundedReceiver<Outbound>,
) -> SessionEnd {
    loop {
        tokio::select! {
            outbound = rx.recv() => match outbound {
                Some(Outbound::Frame(frame)) => {
                    let text = match serde_json::to_string(&frame) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("Failed to serialize outbound frame: {}", e);
                            continue;
                        }
                    };
                    if socket.send(Message::Text(text)).await.is_err() {
                        return SessionEnd::Transport;
                    }
                }
                Some(Outbound::Shutdown) => return SessionEnd::Superseded,
                None => return SessionEnd::ClientClosed,
            },
            inbound = socket.recv() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    let frame = match serde_json::from_str::<ClientFrame>(&text) {
                        Ok(frame) => frame,
                        Err(e) => {
                            debug!(
                                room_id,
                                user_id = conn.user_id,
                                "Unparseable inbound frame: {}",
                                e
                            );
                            return SessionEnd::ProtocolViolation;
                        }
                    };
                    let ClientFrame::Chat { message, message_type } = frame;
                    match state.pipeline.publish(room_id, conn, message, message_type).await {
                        Ok(_) => {}
                        Err(ChatError::Auth(e)) => {
                            debug!(room_id, user_id = conn.user_id, "Re-authentication failed: {}", e);
                            return SessionEnd::AuthRevoked;
                        }
                        Err(e) => {
                            // Isolated to this event: report to the sender
                            // and keep the session alive.
                            error!(room_id, user_id = conn.user_id, "Publish failed: {}", e);
                            conn.send(ServerFrame::error("Message could not be delivered."));
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => return SessionEnd::ClientClosed,
                Some(Ok(_)) => {} // pings/pongs are answered by axum; binary is ignored
                Some(Err(e)) => {
                    debug!(room_id, user_id = conn.user_id, "Socket receive error: {}", e);
                    return SessionEnd::Transport;
                }
            },
        }
    }
}

async fn close_policy_violation(socket: &mut WebSocket, reason: String) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code: close_code::POLICY,
            reason: Cow::from(reason),
        })))
        .await;
}
