//! WebSocket connection lifecycle: one seated client from upgrade through
//! disconnect.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures::{Sink, SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use ttt_game::{ServerMessage, encode_message};

use super::connection::ClientConnection;
use super::handler::handle_text;
use super::heartbeat::{HeartbeatResult, run_heartbeat};
use crate::config::ServerConfig;
use crate::metrics::{WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL};
use crate::registry::{JoinedSession, Registry};
use crate::session::{Joined, Session};

/// Query parameters of `GET /ws`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct JoinParams {
    /// Session to join or create. Absent or blank creates a fresh session.
    pub token: Option<String>,
    /// Display name. Absent or blank uses the default name.
    pub name: Option<String>,
}

/// Why a connection loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Exit {
    ClientClosed,
    StreamEnded,
    ReadFailed,
    WriteFailed,
    InvalidFrame,
    HeartbeatTimeout,
    QueueClosed,
    Shutdown,
}

/// Leaves the seat on every exit path, including panics and task aborts.
struct SeatGuard {
    registry: Arc<Registry>,
    session: Arc<Session>,
    connection: Arc<ClientConnection>,
}

impl Drop for SeatGuard {
    fn drop(&mut self) {
        let player = self.connection.player_id();
        match self.session.leave(player) {
            Ok(0) => self.registry.notify_empty(self.session.id()),
            Ok(_) => {}
            Err(e) => debug!(player_id = %player, error = %e, "seat already released"),
        }
        gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
        histogram!(WS_CONNECTION_DURATION_SECONDS).record(self.connection.age().as_secs_f64());
        info!(
            conn_id = %self.connection.id,
            session_id = self.connection.session_id(),
            player_id = %player,
            "client disconnected"
        );
    }
}

/// Run a WebSocket connection for one client.
///
/// 1. Joins (or creates) the requested session; on refusal sends an `Error`
///    envelope and closes
/// 2. Sends `JoinedGame` with the session token, player id and state
/// 3. Forwards pushed snapshots as `GameState`, dispatches inbound text as
///    commands, and pings on the heartbeat interval
/// 4. Ends on close, transport error, heartbeat timeout or `cancel`, and
///    releases the seat
#[instrument(skip_all, fields(conn_id, session_id))]
pub async fn run_ws_session(
    mut socket: WebSocket,
    params: JoinParams,
    registry: Arc<Registry>,
    config: Arc<ServerConfig>,
    cancel: CancellationToken,
) {
    let name = params.name.unwrap_or_default();
    let result = match params.token.as_deref().map(str::trim) {
        Some(token) if !token.is_empty() => registry.join_or_create(token, &name),
        _ => registry.create(&name),
    };
    let JoinedSession {
        session,
        joined: Joined {
            player,
            state,
            mut updates,
        },
        created,
    } = match result {
        Ok(joined) => joined,
        Err(e) => {
            warn!(code = e.code(), error = %e, "join refused");
            let _ = send_message(&mut socket, &ServerMessage::Error(e.to_string())).await;
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };

    let connection = Arc::new(ClientConnection::new(session.id(), player.id));
    let span = tracing::Span::current();
    let _ = span.record("conn_id", connection.id.as_str());
    let _ = span.record("session_id", connection.session_id());

    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);
    info!(player_id = %player.id, team = %player.team, created, "client connected");

    let _guard = SeatGuard {
        registry,
        session: Arc::clone(&session),
        connection: Arc::clone(&connection),
    };

    let (mut ws_tx, mut ws_rx) = socket.split();

    let joined = ServerMessage::JoinedGame {
        token: session.id().to_owned(),
        player_id: player.id,
        state,
    };
    if send_message(&mut ws_tx, &joined).await.is_err() {
        return;
    }

    let mut ping = tokio::time::interval(config.heartbeat_interval());
    // Skip the immediate first tick
    let _ = ping.tick().await;

    let heartbeat = run_heartbeat(
        Arc::clone(&connection),
        config.heartbeat_interval(),
        config.heartbeat_timeout(),
        cancel.child_token(),
    );
    tokio::pin!(heartbeat);

    let exit = loop {
        tokio::select! {
            () = cancel.cancelled() => {
                let _ = ws_tx.send(Message::Close(None)).await;
                break Exit::Shutdown;
            }
            result = &mut heartbeat => {
                if result == HeartbeatResult::Cancelled {
                    break Exit::Shutdown;
                }
                warn!(
                    silent_secs = connection.last_pong_elapsed().as_secs(),
                    "client unresponsive, disconnecting"
                );
                break Exit::HeartbeatTimeout;
            }
            _ = ping.tick() => {
                if ws_tx.send(Message::Ping(Bytes::new())).await.is_err() {
                    break Exit::WriteFailed;
                }
            }
            update = updates.recv() => {
                let Some(state) = update else {
                    break Exit::QueueClosed;
                };
                if send_message(&mut ws_tx, &ServerMessage::GameState(state)).await.is_err() {
                    break Exit::WriteFailed;
                }
            }
            frame = ws_rx.next() => {
                let msg = match frame {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        warn!(error = %e, "websocket read failed");
                        break Exit::ReadFailed;
                    }
                    None => break Exit::StreamEnded,
                };
                connection.mark_alive();

                let reply = match msg {
                    Message::Text(text) => handle_text(text.as_str(), &session, player.id),
                    Message::Binary(data) => match std::str::from_utf8(&data) {
                        Ok(text) => handle_text(text, &session, player.id),
                        Err(_) => {
                            warn!(len = data.len(), "received non-UTF8 binary frame");
                            break Exit::InvalidFrame;
                        }
                    },
                    Message::Close(_) => break Exit::ClientClosed,
                    Message::Ping(_) | Message::Pong(_) => None,
                };

                if let Some(reply) = reply {
                    if send_message(&mut ws_tx, &reply).await.is_err() {
                        break Exit::WriteFailed;
                    }
                }
            }
        }
    };

    debug!(?exit, "connection loop ended");
}

/// Encode and send one envelope.
async fn send_message<S>(sink: &mut S, message: &ServerMessage) -> Result<(), axum::Error>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    let json = encode_message(message).map_err(|e| {
        error!(error = %e, "failed to serialize outbound message");
        axum::Error::new(e)
    })?;
    sink.send(Message::Text(json.into())).await
}
