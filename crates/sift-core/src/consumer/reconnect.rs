//! Reconnect backoff
//!
//! Transport failures grow linearly, HTTP rejections double. A successful
//! connection resets both.

use std::time::Duration;

use crate::{config::ReconnectConfig, error::ConnectError};

/// Why a connection attempt failed, for backoff purposes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Refused, reset, timed out or dropped
    Transport,
    /// The server answered with a non-2xx status
    Http,
}

impl From<&ConnectError> for FailureKind {
    fn from(err: &ConnectError) -> Self {
        if err.is_http() {
            FailureKind::Http
        } else {
            FailureKind::Transport
        }
    }
}

/// Backoff state for one consumer
#[derive(Debug, Clone)]
pub struct Backoff {
    config: ReconnectConfig,
    attempts: u32,
    transport_delay: Duration,
    http_delay: Duration,
}

impl Backoff {
    /// Start a fresh schedule
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            attempts: 0,
            transport_delay: Duration::ZERO,
            http_delay: Duration::ZERO,
        }
    }

    /// Delay before the next attempt, or `None` when attempts are exhausted
    pub fn next_delay(&mut self, kind: FailureKind) -> Option<Duration> {
        if let Some(max) = self.config.max_attempts
            && self.attempts >= max
        {
            return None;
        }
        self.attempts += 1;

        let delay = match kind {
            FailureKind::Transport => {
                self.transport_delay = (self.transport_delay + self.config.transport_step)
                    .min(self.config.transport_max);
                self.transport_delay
            }
            FailureKind::Http => {
                self.http_delay = if self.http_delay.is_zero() {
                    self.config.http_initial
                } else {
                    self.http_delay.saturating_mul(2)
                }
                .min(self.config.http_max);
                self.http_delay
            }
        };
        Some(delay)
    }

    /// Consecutive failed attempts since the last reset
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Forget past failures after a successful connection
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.transport_delay = Duration::ZERO;
        self.http_delay = Duration::ZERO;
    }
}
