//! Shared consumer state
//!
//! The state lives in a `watch` channel: transitions are compare-and-set
//! under the channel lock, and the consumer task waits on it for stop
//! requests.

use std::sync::Arc;

use siftstream_domain::{ConsumerState, StreamHashes};
use tokio::sync::watch;
use tracing::debug;

use crate::{Error, Result};

/// Lock-protected consumer state with change notification
#[derive(Debug)]
pub(crate) struct StateCell {
    tx: watch::Sender<ConsumerState>,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(ConsumerState::Stopped);
        Self { tx }
    }

    pub(crate) fn get(&self) -> ConsumerState {
        *self.tx.borrow()
    }

    /// Move to `to` if the current state is one of `from`
    ///
    /// Returns the previous state on success and the actual state on
    /// failure.
    pub(crate) fn compare_and_set(
        &self,
        from: &[ConsumerState],
        to: ConsumerState,
    ) -> std::result::Result<ConsumerState, ConsumerState> {
        let mut outcome = Err(ConsumerState::Stopped);
        self.tx.send_if_modified(|state| {
            if from.contains(state) && state.can_transition_to(to) {
                outcome = Ok(*state);
                *state = to;
                true
            } else {
                outcome = Err(*state);
                false
            }
        });
        if let Ok(prev) = outcome {
            debug!(from = %prev, to = %to, "consumer state changed");
        }
        outcome
    }

    /// Set the state unconditionally
    pub(crate) fn force(&self, to: ConsumerState) -> ConsumerState {
        self.tx.send_replace(to)
    }

    /// Resolve once a stop has been requested or completed
    pub(crate) async fn stop_requested(&self) {
        let mut rx = self.tx.subscribe();
        // the sender lives in `self`, so the channel cannot close here
        let _ = rx.wait_for(|s| s.is_stopping_or_stopped()).await;
    }
}

/// Cheap, cloneable view of a consumer
///
/// Passed to every callback so a handler can inspect or stop the consumer
/// that invoked it.
#[derive(Debug, Clone)]
pub struct ConsumerHandle {
    state: Arc<StateCell>,
    hashes: Arc<StreamHashes>,
}

impl ConsumerHandle {
    pub(crate) fn new(hashes: StreamHashes) -> Self {
        Self {
            state: Arc::new(StateCell::new()),
            hashes: Arc::new(hashes),
        }
    }

    pub(crate) fn cell(&self) -> &StateCell {
        &self.state
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConsumerState {
        self.state.get()
    }

    /// Hashes this consumer subscribes to
    pub fn hashes(&self) -> &StreamHashes {
        &self.hashes
    }

    /// True while connected
    pub fn is_running(&self) -> bool {
        self.state().is_running(false)
    }

    /// Ask the consumer to stop
    ///
    /// Only valid while starting or running. The consumer finishes the
    /// current dispatch, closes its connection and settles in `Stopped`.
    pub fn stop(&self) -> Result<()> {
        self.state
            .compare_and_set(
                &[ConsumerState::Running, ConsumerState::Starting],
                ConsumerState::Stopping,
            )
            .map(|_| ())
            .map_err(|_| {
                Error::invalid_usage("Consumer state must be RUNNING before it can be stopped")
            })
    }

    /// Stop after a fatal stream message; a no-op unless running
    pub(crate) fn request_stop(&self) -> bool {
        self.state
            .compare_and_set(&[ConsumerState::Running], ConsumerState::Stopping)
            .is_ok()
    }
}
