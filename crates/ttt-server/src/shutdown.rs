//! Server-wide stop signal.
//!
//! One root `CancellationToken` is shared by the listener and every
//! connection loop. Firing it stops accepting, sends `Close` to every seated
//! client and lets each `SeatGuard` release its seat.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How long [`ShutdownCoordinator::graceful_shutdown`] waits by default.
const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// How a drain ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every task finished inside the timeout.
    Drained,
    /// The timeout elapsed; this many tasks were aborted.
    Aborted(usize),
}

/// Owner of the stop signal.
#[derive(Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Coordinator that has not fired yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Token observed by the listener and connection loops.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Fire the stop signal. Idempotent.
    pub fn shutdown(&self) {
        if !self.token.is_cancelled() {
            info!("shutdown requested");
        }
        self.token.cancel();
    }

    /// Whether the stop signal has fired.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fire the stop signal and wait for `handles` to finish.
    ///
    /// Waits at most `timeout` (10 s when `None`). Tasks still running
    /// after that are aborted.
    pub async fn graceful_shutdown(
        &self,
        handles: Vec<JoinHandle<()>>,
        timeout: Option<Duration>,
    ) -> DrainOutcome {
        let timeout = timeout.unwrap_or(DEFAULT_DRAIN_TIMEOUT);
        self.shutdown();

        let aborters: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();
        info!(tasks = aborters.len(), ?timeout, "draining server tasks");

        if tokio::time::timeout(timeout, futures::future::join_all(handles))
            .await
            .is_ok()
        {
            return DrainOutcome::Drained;
        }

        let stuck: Vec<_> = aborters.into_iter().filter(|h| !h.is_finished()).collect();
        warn!(stuck = stuck.len(), ?timeout, "drain timed out, aborting");
        for handle in &stuck {
            handle.abort();
        }
        DrainOutcome::Aborted(stuck.len())
    }
}
