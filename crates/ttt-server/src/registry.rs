//! Session registry: id → session, with delayed cleanup of empty sessions.
//!
//! The registry lock covers lookup, insert and removal only. Joins take the
//! session lock after the registry lock is released, so a busy session never
//! stalls joins elsewhere. The one nesting, the emptiness check on expiry, is
//! registry then session; session operations never call back into the
//! registry.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use metrics::{counter, gauge};
use parking_lot::Mutex;
use rand::Rng;
use rand::distr::Alphanumeric;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use ttt_game::GameError;
use ttt_game::types::{DEFAULT_PLAYER_NAME, MAX_NAME_CHARS};

use crate::config::ServerConfig;
use crate::metrics::{SESSIONS_ACTIVE, SESSIONS_CREATED_TOTAL, SESSIONS_REMOVED_TOTAL};
use crate::session::{Joined, Session};

/// Attempts at finding an unused generated id before giving up.
const MAX_TOKEN_ATTEMPTS: usize = 16;

/// Errors from registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Session id is blank or too long.
    #[error("invalid session id")]
    InvalidSessionId,
    /// No session is registered under the id.
    #[error("session not found")]
    SessionNotFound,
    /// Every generated id collided with a live session.
    #[error("could not allocate a session id")]
    TokenSpaceExhausted,
    /// The match refused the join.
    #[error(transparent)]
    Game(#[from] GameError),
}

impl RegistryError {
    /// Stable machine-readable code, used for log fields and metric labels.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidSessionId => "INVALID_SESSION_ID",
            Self::SessionNotFound => "SESSION_NOT_FOUND",
            Self::TokenSpaceExhausted => "TOKEN_SPACE_EXHAUSTED",
            Self::Game(e) => e.code(),
        }
    }
}

/// Source of fresh session ids.
pub trait TokenSource: Send + Sync {
    /// Produce a candidate id of `len` characters.
    fn generate(&self, len: usize) -> String;
}

/// Random ASCII alphanumerics from the thread-local RNG.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomTokens;

impl TokenSource for RandomTokens {
    fn generate(&self, len: usize) -> String {
        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(len)
            .map(char::from)
            .collect()
    }
}

/// A successful join through the registry.
pub struct JoinedSession {
    /// The session joined.
    pub session: Arc<Session>,
    /// Seat, initial state and update queue.
    pub joined: Joined,
    /// Whether the session was created by this join.
    pub created: bool,
}

struct Entry {
    session: Arc<Session>,
    cleanup: Option<CancellationToken>,
}

impl Entry {
    fn cancel_cleanup(&mut self) {
        if let Some(token) = self.cleanup.take() {
            token.cancel();
        }
    }
}

/// All live sessions.
pub struct Registry {
    sessions: Mutex<HashMap<String, Entry>>,
    tokens: Box<dyn TokenSource>,
    token_length: usize,
    max_token_length: usize,
    queue_capacity: usize,
    cleanup_grace: Duration,
}

impl Registry {
    /// Registry generating random ids.
    pub fn new(config: &ServerConfig) -> Self {
        Self::with_token_source(config, Box::new(RandomTokens))
    }

    /// Registry with a custom id generator.
    pub fn with_token_source(config: &ServerConfig, tokens: Box<dyn TokenSource>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            tokens,
            token_length: config.token_length,
            max_token_length: config.max_token_length,
            queue_capacity: config.snapshot_queue_capacity,
            cleanup_grace: config.cleanup_grace(),
        }
    }

    /// Join the session named `session_id`, creating it if absent.
    ///
    /// Cancels any pending cleanup of that session.
    pub fn join_or_create(
        &self,
        session_id: &str,
        display_name: &str,
    ) -> Result<JoinedSession, RegistryError> {
        let id = session_id.trim();
        if id.is_empty() || id.chars().count() > self.max_token_length {
            return Err(RegistryError::InvalidSessionId);
        }

        let name = normalize_name(display_name);
        loop {
            let (session, created) = self.lookup_or_insert(id);
            if let Some(joined) = self.seat(id, &session, &name)? {
                return Ok(JoinedSession {
                    session,
                    joined,
                    created,
                });
            }
        }
    }

    /// Create a session under a fresh id and join it.
    pub fn create(&self, display_name: &str) -> Result<JoinedSession, RegistryError> {
        let name = normalize_name(display_name);
        loop {
            let session = self.insert_fresh()?;
            if let Some(joined) = self.seat(session.id(), &session, &name)? {
                return Ok(JoinedSession {
                    session,
                    joined,
                    created: true,
                });
            }
        }
    }

    fn lookup_or_insert(&self, id: &str) -> (Arc<Session>, bool) {
        let mut sessions = self.sessions.lock();
        let created = !sessions.contains_key(id);
        let entry = sessions.entry(id.to_owned()).or_insert_with(|| Entry {
            session: Arc::new(Session::new(id, self.queue_capacity)),
            cleanup: None,
        });
        entry.cancel_cleanup();
        let session = Arc::clone(&entry.session);
        if created {
            self.record_created(id, sessions.len());
        }
        (session, created)
    }

    fn insert_fresh(&self) -> Result<Arc<Session>, RegistryError> {
        let mut sessions = self.sessions.lock();
        let id = (0..MAX_TOKEN_ATTEMPTS)
            .map(|_| self.tokens.generate(self.token_length))
            .find(|candidate| {
                let taken = sessions.contains_key(candidate);
                if taken {
                    debug!(session_id = %candidate, "generated session id collided, retrying");
                }
                !taken
            })
            .ok_or(RegistryError::TokenSpaceExhausted)?;

        let session = Arc::new(Session::new(id.clone(), self.queue_capacity));
        let _ = sessions.insert(
            id.clone(),
            Entry {
                session: Arc::clone(&session),
                cleanup: None,
            },
        );
        self.record_created(&id, sessions.len());
        Ok(session)
    }

    /// Join `session` with the registry unlocked, then check it is still the
    /// one registered under `id`.
    ///
    /// Returns `None` when it was removed in between. The seat has then been
    /// given back and the caller looks the id up again.
    fn seat(
        &self,
        id: &str,
        session: &Arc<Session>,
        name: &str,
    ) -> Result<Option<Joined>, RegistryError> {
        let joined = session.join(name)?;

        let registered = {
            let mut sessions = self.sessions.lock();
            match sessions.get_mut(id) {
                Some(entry) if Arc::ptr_eq(&entry.session, session) => {
                    // A timer armed between lookup and join is stale now.
                    entry.cancel_cleanup();
                    true
                }
                _ => false,
            }
        };
        if registered {
            return Ok(Some(joined));
        }

        debug!(session_id = id, "session removed during join, retrying");
        let _ = session.leave(joined.player.id);
        Ok(None)
    }

    /// Remove a session immediately.
    pub fn remove(&self, session_id: &str) -> Result<(), RegistryError> {
        let mut sessions = self.sessions.lock();
        let mut entry = sessions
            .remove(session_id)
            .ok_or(RegistryError::SessionNotFound)?;
        entry.cancel_cleanup();
        Self::record_removed(session_id, sessions.len());
        Ok(())
    }

    /// Schedule removal of `session_id` after the grace period.
    ///
    /// A later call replaces the pending timer and a join cancels it. When
    /// the timer fires, the session is removed only if it is still empty.
    /// Without a Tokio runtime the call is a no-op.
    pub fn notify_empty(self: &Arc<Self>, session_id: &str) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(session_id, "no runtime available, skipping session cleanup");
            return;
        };

        let token = CancellationToken::new();
        {
            let mut sessions = self.sessions.lock();
            let Some(entry) = sessions.get_mut(session_id) else {
                return;
            };
            entry.cancel_cleanup();
            entry.cleanup = Some(token.clone());
        }
        debug!(session_id, grace_secs = self.cleanup_grace.as_secs(), "session cleanup scheduled");

        let registry = Arc::downgrade(self);
        let id = session_id.to_owned();
        let grace = self.cleanup_grace;
        let _ = runtime.spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                () = tokio::time::sleep(grace) => expire(&registry, &id, &token),
            }
        });
    }

    /// Look up a live session.
    pub fn get(&self, session_id: &str) -> Option<Arc<Session>> {
        self.sessions
            .lock()
            .get(session_id)
            .map(|entry| Arc::clone(&entry.session))
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    #[allow(clippy::cast_precision_loss)]
    fn record_created(&self, session_id: &str, live: usize) {
        counter!(SESSIONS_CREATED_TOTAL).increment(1);
        gauge!(SESSIONS_ACTIVE).set(live as f64);
        info!(session_id, live, queue_capacity = self.queue_capacity, "session created");
    }

    #[allow(clippy::cast_precision_loss)]
    fn record_removed(session_id: &str, live: usize) {
        counter!(SESSIONS_REMOVED_TOTAL).increment(1);
        gauge!(SESSIONS_ACTIVE).set(live as f64);
        info!(session_id, live, "session removed");
    }
}

fn expire(registry: &Weak<Registry>, session_id: &str, token: &CancellationToken) {
    let Some(registry) = registry.upgrade() else {
        return;
    };
    let mut sessions = registry.sessions.lock();
    let Some(entry) = sessions.get(session_id) else {
        return;
    };
    // A join or a newer timer cancels this token under the same lock.
    if token.is_cancelled() || !entry.session.is_empty() {
        return;
    }
    let _ = sessions.remove(session_id);
    Registry::record_removed(session_id, sessions.len());
}

fn normalize_name(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        DEFAULT_PLAYER_NAME.to_owned()
    } else {
        trimmed.chars().take(MAX_NAME_CHARS).collect()
    }
}
