//! Heartbeat liveness monitoring.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::connection::ClientConnection;

/// Outcome of the heartbeat loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatResult {
    /// The client stopped responding within the timeout window.
    TimedOut,
    /// The heartbeat was cancelled externally.
    Cancelled,
}

/// Watch a connection's alive flag until it goes quiet or `cancel` fires.
///
/// Every `interval` the flag is read and cleared. A client that shows no
/// activity for `timeout / interval` consecutive checks (at least one) is
/// reported as [`HeartbeatResult::TimedOut`]. Pings are sent by the
/// connection loop; this only observes the answers.
pub async fn run_heartbeat(
    connection: Arc<ClientConnection>,
    interval: Duration,
    timeout: Duration,
    cancel: CancellationToken,
) -> HeartbeatResult {
    let mut check = time::interval(interval);
    check.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let max_missed = max_missed(interval, timeout);
    let mut missed: u32 = 0;

    loop {
        tokio::select! {
            _ = check.tick() => {
                if connection.check_alive() {
                    missed = 0;
                    continue;
                }
                missed += 1;
                debug!(conn_id = %connection.id, missed, max_missed, "heartbeat missed");
                if missed >= max_missed {
                    return HeartbeatResult::TimedOut;
                }
            }
            () = cancel.cancelled() => return HeartbeatResult::Cancelled,
        }
    }
}

fn max_missed(interval: Duration, timeout: Duration) -> u32 {
    let interval_ms = interval.as_millis().max(1);
    u32::try_from(timeout.as_millis() / interval_ms)
        .unwrap_or(u32::MAX)
        .max(1)
}
