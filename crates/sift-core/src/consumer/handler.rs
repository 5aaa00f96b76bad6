//! Event handler trait
//!
//! Callbacks run sequentially on the consumer task and never overlap. Every
//! method has a no-op default, so a handler only implements what it needs.

use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::state::ConsumerHandle;
use crate::error::HandlerError;

/// Result returned by every callback
///
/// An `Err` stops the consumer and is returned from `wait()`.
pub type HandlerResult = std::result::Result<(), HandlerError>;

/// Receives stream events
#[allow(unused_variables)]
pub trait EventHandler: Send + 'static {
    /// A connection was established
    fn on_connect(&mut self, consumer: &ConsumerHandle) -> HandlerResult {
        Ok(())
    }

    /// Response headers of the connection just established
    fn on_header(
        &mut self,
        consumer: &ConsumerHandle,
        headers: &HashMap<String, String>,
    ) -> HandlerResult {
        Ok(())
    }

    /// An interaction matched one of the consumer's streams
    fn on_interaction(
        &mut self,
        consumer: &ConsumerHandle,
        interaction: Value,
        hash: &str,
    ) -> HandlerResult {
        Ok(())
    }

    /// A previously delivered interaction must be deleted
    fn on_deleted(
        &mut self,
        consumer: &ConsumerHandle,
        interaction: Value,
        hash: &str,
    ) -> HandlerResult {
        Ok(())
    }

    /// The server sent a non-fatal warning
    fn on_warning(&mut self, consumer: &ConsumerHandle, message: &str) -> HandlerResult {
        Ok(())
    }

    /// A connection, protocol or server error occurred
    fn on_error(&mut self, consumer: &ConsumerHandle, message: &str) -> HandlerResult {
        Ok(())
    }

    /// The server sent an informational status message
    fn on_status(
        &mut self,
        consumer: &ConsumerHandle,
        status: &str,
        data: Map<String, Value>,
    ) -> HandlerResult {
        Ok(())
    }

    /// The connection closed
    fn on_disconnect(&mut self, consumer: &ConsumerHandle) -> HandlerResult {
        Ok(())
    }
}

/// Handler that only logs events
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_connect(&mut self, consumer: &ConsumerHandle) -> HandlerResult {
        info!(hashes = %consumer.hashes(), "connected");
        Ok(())
    }

    fn on_interaction(
        &mut self,
        _consumer: &ConsumerHandle,
        _interaction: Value,
        hash: &str,
    ) -> HandlerResult {
        debug!(hash, "interaction");
        Ok(())
    }

    fn on_deleted(
        &mut self,
        _consumer: &ConsumerHandle,
        _interaction: Value,
        hash: &str,
    ) -> HandlerResult {
        debug!(hash, "deletion");
        Ok(())
    }

    fn on_warning(&mut self, _consumer: &ConsumerHandle, message: &str) -> HandlerResult {
        warn!(message, "stream warning");
        Ok(())
    }

    fn on_error(&mut self, _consumer: &ConsumerHandle, message: &str) -> HandlerResult {
        warn!(message, "stream error");
        Ok(())
    }

    fn on_status(
        &mut self,
        _consumer: &ConsumerHandle,
        status: &str,
        _data: Map<String, Value>,
    ) -> HandlerResult {
        debug!(status, "stream status");
        Ok(())
    }

    fn on_disconnect(&mut self, consumer: &ConsumerHandle) -> HandlerResult {
        info!(state = %consumer.state(), "disconnected");
        Ok(())
    }
}
