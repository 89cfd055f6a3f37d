//! Single-flight coordination of token refreshes.
//!
//! At most one refresh runs at a time. Callers that hit an authentication
//! failure while a refresh is outstanding park a one-shot waiter here and are
//! released, in enqueue order, when the refresh settles.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Why a refresh did not produce a credential.
///
/// Cloned to every queued waiter, so it carries strings rather than sources.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    #[error("{}", .message.as_deref().unwrap_or("Session refresh rejected"))]
    Rejected { status: u16, message: Option<String> },
    #[error("Session refresh failed: {0}")]
    Transport(String),
    #[error("Session refresh response did not contain an access token")]
    MissingToken,
    #[error("Session refresh timed out after {0:?}")]
    TimedOut(Duration),
    #[error("Failed to store refreshed credential: {0}")]
    Storage(String),
    #[error("Session refresh was abandoned before it completed")]
    Abandoned,
}

impl RefreshError {
    /// The backend's message, when the refresh endpoint sent one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Rejected { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

pub(crate) type RefreshOutcome = Result<String, RefreshError>;

/// What a caller must do after reporting an authentication failure.
pub(crate) enum RefreshTicket<'a> {
    /// Run the refresh, then call [`LeaderGuard::settle`].
    Leader(LeaderGuard<'a>),
    /// Wait for the leader's outcome.
    Waiter(oneshot::Receiver<RefreshOutcome>),
}

#[derive(Default)]
struct RefreshState {
    in_flight: bool,
    waiters: VecDeque<oneshot::Sender<RefreshOutcome>>,
}

/// In-flight flag plus waiter queue, owned by one client.
#[derive(Default)]
pub(crate) struct RefreshCoordinator {
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Become the refresh leader, or join the queue behind the current one.
    pub(crate) fn join(&self) -> RefreshTicket<'_> {
        let mut state = self.state();
        if state.in_flight {
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            debug!(waiters = state.waiters.len(), "Refresh in flight, queued request");
            RefreshTicket::Waiter(rx)
        } else {
            state.in_flight = true;
            debug!("Starting refresh");
            RefreshTicket::Leader(LeaderGuard {
                coordinator: self,
                settled: false,
            })
        }
    }

    pub(crate) fn is_refreshing(&self) -> bool {
        self.state().in_flight
    }

    pub(crate) fn pending_waiters(&self) -> usize {
        self.state().waiters.len()
    }

    /// Clear the flag and take the queue in one step, so no waiter can be
    /// enqueued after the drain and left behind.
    fn finish(&self) -> VecDeque<oneshot::Sender<RefreshOutcome>> {
        let mut state = self.state();
        state.in_flight = false;
        std::mem::take(&mut state.waiters)
    }
}

/// Held by the caller running the refresh.
///
/// Dropping it without settling (the caller's future was cancelled) resets
/// the coordinator; queued waiters then observe [`RefreshError::Abandoned`].
pub(crate) struct LeaderGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl LeaderGuard<'_> {
    /// Release every waiter, in enqueue order, with the outcome.
    pub(crate) fn settle(mut self, outcome: &RefreshOutcome) {
        self.settled = true;
        let waiters = self.coordinator.finish();
        let count = waiters.len();
        for waiter in waiters {
            // A waiter whose caller went away has dropped its receiver
            let _ = waiter.send(outcome.clone());
        }
        debug!(waiters = count, success = outcome.is_ok(), "Refresh settled");
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            let waiters = self.coordinator.finish();
            warn!(waiters = waiters.len(), "Refresh abandoned");
            for waiter in waiters {
                let _ = waiter.send(Err(RefreshError::Abandoned));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expect_leader(ticket: RefreshTicket<'_>) -> LeaderGuard<'_> {
        match ticket {
            RefreshTicket::Leader(guard) => guard,
            RefreshTicket::Waiter(_) => panic!("expected to lead the refresh"),
        }
    }

    fn expect_waiter(ticket: RefreshTicket<'_>) -> oneshot::Receiver<RefreshOutcome> {
        match ticket {
            RefreshTicket::Waiter(rx) => rx,
            RefreshTicket::Leader(_) => panic!("expected to wait behind the refresh"),
        }
    }

    #[tokio::test]
    async fn test_only_first_caller_leads() {
        let coordinator = RefreshCoordinator::new();

        let leader = expect_leader(coordinator.join());
        let first = expect_waiter(coordinator.join());
        let second = expect_waiter(coordinator.join());

        assert!(coordinator.is_refreshing());
        assert_eq!(coordinator.pending_waiters(), 2);

        leader.settle(&Ok("T2".to_string()));

        assert!(!coordinator.is_refreshing());
        assert_eq!(coordinator.pending_waiters(), 0);
        assert_eq!(first.await.unwrap(), Ok("T2".to_string()));
        assert_eq!(second.await.unwrap(), Ok("T2".to_string()));
    }

    #[tokio::test]
    async fn test_failure_is_fanned_out() {
        let coordinator = RefreshCoordinator::new();
        let leader = expect_leader(coordinator.join());
        let waiter = expect_waiter(coordinator.join());

        let error = RefreshError::Rejected {
            status: 401,
            message: Some("Refresh token expired".to_string()),
        };
        leader.settle(&Err(error.clone()));

        assert_eq!(waiter.await.unwrap(), Err(error));
    }

    #[tokio::test]
    async fn test_next_cycle_gets_a_new_leader() {
        let coordinator = RefreshCoordinator::new();
        expect_leader(coordinator.join()).settle(&Ok("T2".to_string()));

        let leader = expect_leader(coordinator.join());
        leader.settle(&Ok("T3".to_string()));
    }

    #[tokio::test]
    async fn test_dropped_leader_releases_waiters() {
        let coordinator = RefreshCoordinator::new();
        let leader = expect_leader(coordinator.join());
        let waiter = expect_waiter(coordinator.join());

        drop(leader);

        assert!(!coordinator.is_refreshing());
        assert_eq!(waiter.await.unwrap(), Err(RefreshError::Abandoned));
    }

    #[tokio::test]
    async fn test_all_waiters_hold_outcome_once_settled() {
        let coordinator = RefreshCoordinator::new();
        let leader = expect_leader(coordinator.join());
        let mut receivers: Vec<_> = (0..5).map(|_| expect_waiter(coordinator.join())).collect();

        leader.settle(&Ok("T2".to_string()));

        // Every receiver already holds its value once settle returns
        for rx in receivers.iter_mut() {
            assert_eq!(rx.try_recv().unwrap(), Ok("T2".to_string()));
        }
    }

    #[tokio::test]
    async fn test_waiters_drain_in_arrival_order() {
        let coordinator = RefreshCoordinator::new();
        let leader = expect_leader(coordinator.join());
        let receivers: Vec<_> = (0..4).map(|_| expect_waiter(coordinator.join())).collect();

        // Tag each drained sender with its drain position
        for (position, tx) in coordinator.finish().into_iter().enumerate() {
            tx.send(Ok(position.to_string())).unwrap();
        }

        for (arrival, rx) in receivers.into_iter().enumerate() {
            assert_eq!(rx.await.unwrap(), Ok(arrival.to_string()));
        }
        // Queue already drained, nothing left for the guard to release
        drop(leader);
        assert!(!coordinator.is_refreshing());
    }

    #[test]
    fn test_rejected_display_uses_server_message() {
        let error = RefreshError::Rejected {
            status: 401,
            message: Some("Invalid refresh token".to_string()),
        };
        assert_eq!(error.to_string(), "Invalid refresh token");
        assert_eq!(error.server_message(), Some("Invalid refresh token"));

        let bare = RefreshError::Rejected { status: 403, message: None };
        assert_eq!(bare.to_string(), "Session refresh rejected");
    }
}
