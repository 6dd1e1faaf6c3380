//! A lockable match: the rules engine and its snapshot fan-out behind one
//! mutex.
//!
//! Every operation holds the lock for its whole body, so a mutation and the
//! broadcast it triggers are observed by players as one step.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;
use ttt_game::{ClientCommand, Game, GameError, Player, PlayerId, State};

use crate::broadcast::{Delivery, SnapshotFanout, SnapshotReceiver};

/// What a successful [`Session::join`] hands back.
pub struct Joined {
    /// The newly seated player.
    pub player: Player,
    /// State right after the join, taken under the same lock.
    pub state: State,
    /// Queue of future snapshots for this player.
    pub updates: SnapshotReceiver,
}

struct Inner {
    game: Game,
    fanout: SnapshotFanout,
}

impl Inner {
    fn broadcast(&mut self) -> Delivery {
        if self.game.is_empty() {
            return Delivery::default();
        }
        let snapshot = Arc::new(self.game.snapshot());
        self.fanout.publish(&snapshot)
    }
}

/// One match and the players watching it.
pub struct Session {
    id: String,
    inner: Mutex<Inner>,
}

impl Session {
    /// Create an empty session whose player queues hold `queue_capacity`
    /// snapshots.
    pub fn new(id: impl Into<String>, queue_capacity: usize) -> Self {
        Self {
            id: id.into(),
            inner: Mutex::new(Inner {
                game: Game::new(),
                fanout: SnapshotFanout::new(queue_capacity),
            }),
        }
    }

    /// Session id (the join token).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Seat a player, open their queue and broadcast the new state.
    pub fn join(&self, name: &str) -> Result<Joined, GameError> {
        let mut inner = self.inner.lock();
        let player = inner.game.add_player(name)?;
        let updates = inner.fanout.subscribe(player.id);
        let state = inner.game.snapshot();
        let delivery = inner.broadcast();
        debug!(
            session_id = %self.id,
            player_id = %player.id,
            subscribers = inner.fanout.subscriber_count(),
            ?delivery,
            "player joined"
        );
        Ok(Joined {
            player,
            state,
            updates,
        })
    }

    /// Unseat a player, close their queue and broadcast. Returns how many
    /// players remain.
    pub fn leave(&self, player: PlayerId) -> Result<usize, GameError> {
        let mut inner = self.inner.lock();
        let _ = inner.game.remove_player(player)?;
        let _ = inner.fanout.unsubscribe(player);
        let _ = inner.broadcast();
        let remaining = inner.game.player_count();
        debug!(
            session_id = %self.id,
            player_id = %player,
            remaining,
            subscribers = inner.fanout.subscriber_count(),
            "player left"
        );
        Ok(remaining)
    }

    /// Apply a command and broadcast on success. Refusals do not broadcast.
    pub fn apply(&self, player: PlayerId, command: ClientCommand) -> Result<(), GameError> {
        let mut inner = self.inner.lock();
        inner.game.handle_command(player, command)?;
        let _ = inner.broadcast();
        Ok(())
    }

    /// Push the current state to every player. No-op with nobody seated.
    pub fn broadcast_state(&self) -> Delivery {
        self.inner.lock().broadcast()
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> State {
        self.inner.lock().game.snapshot()
    }

    /// Seated player count.
    pub fn player_count(&self) -> usize {
        self.inner.lock().game.player_count()
    }

    /// Whether nobody is seated.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().game.is_empty()
    }

    /// Run `f` while holding the session lock.
    #[cfg(test)]
    pub(crate) fn with_locked<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.inner.lock();
        f()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("id", &self.id).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use ttt_game::{ChatSource, Side};

    #[tokio::test]
    async fn join_broadcasts_to_everyone_seated() {
        let session = Session::new("abc", 2);
        let mut alice = session.join("Alice").unwrap();
        assert_eq!(alice.player.team, Side::X);
        assert_eq!(alice.state.players.len(), 1);

        // Alice's own join is queued for her too.
        let first = alice.updates.recv().await.unwrap();
        assert_eq!(first.players.len(), 1);

        let mut bob = session.join("Bob").unwrap();
        let seen_by_alice = alice.updates.recv().await.unwrap();
        let seen_by_bob = bob.updates.recv().await.unwrap();
        assert_eq!(seen_by_alice.players.len(), 2);
        assert_eq!(*seen_by_alice, *seen_by_bob);
        assert_eq!(bob.state, *seen_by_bob);
    }

    #[test]
    fn third_join_fails() {
        let session = Session::new("abc", 2);
        let _a = session.join("A").unwrap();
        let _b = session.join("B").unwrap();
        assert!(matches!(session.join("C"), Err(GameError::SessionFull)));
        assert_eq!(session.player_count(), 2);
    }

    #[tokio::test]
    async fn apply_broadcasts_only_on_success() {
        let session = Session::new("abc", 4);
        let mut alice = session.join("Alice").unwrap();
        let bob = session.join("Bob").unwrap();
        while alice.updates.try_recv().is_ok() {}

        let err = session
            .apply(bob.player.id, ClientCommand::Move { space: 0 })
            .unwrap_err();
        assert_eq!(err, GameError::NotYourTurn);
        assert!(alice.updates.try_recv().is_err());

        session
            .apply(alice.player.id, ClientCommand::Move { space: 0 })
            .unwrap();
        let update = alice.updates.recv().await.unwrap();
        assert_eq!(update.board.get(0), Some(Some(Side::X)));
    }

    #[tokio::test]
    async fn leave_closes_queue_and_reports_remaining() {
        let session = Session::new("abc", 2);
        let mut alice = session.join("Alice").unwrap();
        let mut bob = session.join("Bob").unwrap();
        while bob.updates.try_recv().is_ok() {}

        assert_eq!(session.leave(alice.player.id).unwrap(), 1);
        let update = bob.updates.recv().await.unwrap();
        assert_eq!(update.players.len(), 1);
        assert!(update.chat.last().unwrap().text.ends_with("has left the game!"));

        // Alice's queue is closed once drained.
        while alice.updates.try_recv().is_ok() {}
        assert!(alice.updates.recv().await.is_none());

        assert_eq!(session.leave(bob.player.id).unwrap(), 0);
        assert!(session.is_empty());
    }

    #[test]
    fn leave_unknown_player_fails() {
        let session = Session::new("abc", 2);
        assert_eq!(session.leave(PlayerId(5)), Err(GameError::PlayerNotFound));
    }

    #[test]
    fn broadcast_with_nobody_seated_is_a_no_op() {
        let session = Session::new("abc", 2);
        assert_eq!(session.broadcast_state(), Delivery::default());
    }

    #[test]
    fn snapshot_is_a_copy() {
        let session = Session::new("abc", 2);
        let _a = session.join("A").unwrap();
        let mut snap = session.snapshot();
        snap.players.clear();
        assert_eq!(session.player_count(), 1);
    }

    #[test]
    fn concurrent_commands_reach_every_player_in_one_order() {
        const WORKERS: usize = 4;
        const PER_WORKER: usize = 25;

        let session = Arc::new(Session::new("abc", 256));
        let mut alice = session.join("Alice").unwrap();
        let mut bob = session.join("Bob").unwrap();
        let seats = [alice.player.id, bob.player.id];

        let workers: Vec<_> = (0..WORKERS)
            .map(|w| {
                let session = Arc::clone(&session);
                let player = seats[w % seats.len()];
                thread::spawn(move || {
                    for i in 0..PER_WORKER {
                        session
                            .apply(player, ClientCommand::ChatMsg { text: format!("{w}:{i}") })
                            .unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let expected = 2 + WORKERS * PER_WORKER;
        let last = session.snapshot();
        assert_eq!(last.chat.len(), expected);

        // Each worker's messages keep their submission order.
        for w in 0..WORKERS {
            let sent: Vec<_> = last
                .chat
                .iter()
                .filter(|m| m.source != ChatSource::System && m.text.starts_with(&format!("{w}:")))
                .map(|m| m.text.clone())
                .collect();
            let want: Vec<_> = (0..PER_WORKER).map(|i| format!("{w}:{i}")).collect();
            assert_eq!(sent, want);
        }

        for updates in [&mut alice.updates, &mut bob.updates] {
            let mut seen = 0;
            while let Ok(state) = updates.try_recv() {
                assert!(state.chat.len() > seen);
                assert!(state.chat.iter().enumerate().all(|(i, m)| m.id == i));
                seen = state.chat.len();
            }
            assert_eq!(seen, expected);
        }
    }
}
