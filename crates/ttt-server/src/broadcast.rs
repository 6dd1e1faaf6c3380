//! Snapshot fan-out to the players of one session.
//!
//! Each subscribed player owns a small bounded queue. Publishing never
//! blocks: a full queue drops the new snapshot for that player only, and a
//! queue whose receiver is gone is pruned.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::counter;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};
use ttt_game::{PlayerId, State};

use crate::metrics::BROADCAST_DROPS_TOTAL;

/// Receiving half handed to a connection loop.
pub type SnapshotReceiver = mpsc::Receiver<Arc<State>>;

/// Outcome of one [`SnapshotFanout::publish`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Subscribers that received the snapshot.
    pub delivered: usize,
    /// Subscribers whose queue was full.
    pub dropped: usize,
}

/// Per-player bounded snapshot queues.
pub struct SnapshotFanout {
    capacity: usize,
    subscribers: HashMap<PlayerId, mpsc::Sender<Arc<State>>>,
}

impl SnapshotFanout {
    /// Create a fan-out whose queues hold `capacity` snapshots.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            subscribers: HashMap::new(),
        }
    }

    /// Open a queue for `player`, replacing any previous one.
    pub fn subscribe(&mut self, player: PlayerId) -> SnapshotReceiver {
        let (tx, rx) = mpsc::channel(self.capacity);
        if self.subscribers.insert(player, tx).is_some() {
            debug!(player_id = %player, "replaced existing snapshot queue");
        }
        rx
    }

    /// Close the queue for `player`. Returns whether one existed.
    pub fn unsubscribe(&mut self, player: PlayerId) -> bool {
        self.subscribers.remove(&player).is_some()
    }

    /// Offer `state` to every subscriber without waiting.
    pub fn publish(&mut self, state: &Arc<State>) -> Delivery {
        let mut delivery = Delivery::default();
        self.subscribers
            .retain(|player, tx| match tx.try_send(Arc::clone(state)) {
                Ok(()) => {
                    delivery.delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    delivery.dropped += 1;
                    counter!(BROADCAST_DROPS_TOTAL).increment(1);
                    warn!(player_id = %player, "snapshot queue full, dropping update");
                    true
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(player_id = %player, "pruning closed snapshot queue");
                    false
                }
            });
        delivery
    }

    /// Number of open queues.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Whether `player` has an open queue.
    #[cfg(test)]
    pub(crate) fn is_subscribed(&self, player: PlayerId) -> bool {
        self.subscribers.contains_key(&player)
    }
}
