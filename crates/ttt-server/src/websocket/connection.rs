//! WebSocket client connection state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use ttt_game::PlayerId;
use uuid::Uuid;

/// A connected, seated client.
pub struct ClientConnection {
    /// Unique connection ID (UUID v7, sortable by creation time).
    pub id: String,
    /// Session the client is seated in.
    session_id: String,
    /// Seat held by this connection.
    player_id: PlayerId,
    /// When this connection was established.
    pub connected_at: Instant,
    /// Whether the client has shown activity since the last heartbeat check.
    pub is_alive: AtomicBool,
    /// When the last pong (or any inbound frame) was received.
    last_pong: Mutex<Instant>,
}

impl ClientConnection {
    /// Create a connection bound to a seat.
    pub fn new(session_id: impl Into<String>, player_id: PlayerId) -> Self {
        let now = Instant::now();
        Self {
            id: Uuid::now_v7().to_string(),
            session_id: session_id.into(),
            player_id,
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_pong: Mutex::new(now),
        }
    }

    /// Bound session ID.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Bound player.
    pub fn player_id(&self) -> PlayerId {
        self.player_id
    }

    /// Record client activity.
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_pong.lock() = Instant::now();
    }

    /// Time since the last recorded activity.
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Read and clear the alive flag.
    ///
    /// Returns `true` if the client was active since the previous check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl std::fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConnection")
            .field("id", &self.id)
            .field("session_id", &self.session_id)
            .field("player_id", &self.player_id)
            .finish_non_exhaustive()
    }
}
