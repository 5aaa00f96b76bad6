use serde::{Deserialize, Serialize};

use crate::{DomainError, DomainResult};

/// Lifecycle state of a stream consumer
///
/// ```text
/// Stopped --consume--> Starting --connected--> Running
///    ^                   |  ^                    |
///    |                   |  +----reconnect-------+
///    |                   v                       v
///    +-------------- Stopping <-----stop/error---+
/// ```
///
/// `Starting` and `Running` may also settle straight into `Stopped` when the
/// loop tears down without a stop request (connect failure, end of stream).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsumerState {
    /// Not consuming; the only state `consume` accepts
    #[default]
    Stopped,
    /// Connection attempt (or reconnect) in progress
    Starting,
    /// Connected and dispatching frames
    Running,
    /// Stop requested; the read loop exits at its next safe point
    Stopping,
}

impl ConsumerState {
    /// Check whether moving to `next` is a legal transition
    pub fn can_transition_to(self, next: ConsumerState) -> bool {
        use ConsumerState::*;
        matches!(
            (self, next),
            (Stopped, Starting)
                | (Starting, Running)
                | (Starting, Stopping)
                | (Starting, Stopped)
                | (Running, Stopping)
                | (Running, Starting)
                | (Running, Stopped)
                | (Stopping, Stopped)
        )
    }

    /// Validate a transition, returning the new state
    pub fn transition_to(self, next: ConsumerState) -> DomainResult<ConsumerState> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(DomainError::invalid_transition(self, next))
        }
    }

    /// True while the consumer is connected, or also while connecting when
    /// `allow_starting` is set
    pub fn is_running(self, allow_starting: bool) -> bool {
        self == ConsumerState::Running || (allow_starting && self == ConsumerState::Starting)
    }

    /// True once a stop has been requested or completed
    pub fn is_stopping_or_stopped(self) -> bool {
        matches!(self, ConsumerState::Stopping | ConsumerState::Stopped)
    }
}

impl std::fmt::Display for ConsumerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsumerState::Stopped => write!(f, "STOPPED"),
            ConsumerState::Starting => write!(f, "STARTING"),
            ConsumerState::Running => write!(f, "RUNNING"),
            ConsumerState::Stopping => write!(f, "STOPPING"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_stopped() {
        assert_eq!(ConsumerState::default(), ConsumerState::Stopped);
    }

    #[test]
    fn test_stopped_only_leaves_via_starting() {
        let from = ConsumerState::Stopped;
        assert!(from.can_transition_to(ConsumerState::Starting));
        assert!(!from.can_transition_to(ConsumerState::Running));
        assert!(!from.can_transition_to(ConsumerState::Stopping));
        assert!(!from.can_transition_to(ConsumerState::Stopped));
    }

    #[test]
    fn test_stopping_only_settles() {
        let from = ConsumerState::Stopping;
        assert!(from.can_transition_to(ConsumerState::Stopped));
        assert!(from.transition_to(ConsumerState::Running).is_err());
        assert!(from.transition_to(ConsumerState::Starting).is_err());
    }

    #[test]
    fn test_is_running() {
        assert!(ConsumerState::Running.is_running(false));
        assert!(!ConsumerState::Starting.is_running(false));
        assert!(ConsumerState::Starting.is_running(true));
        assert!(!ConsumerState::Stopping.is_running(true));
    }
}
