//! # siftstream
//!
//! Streaming consumer for a hosted social-data filtering service.
//!
//! A [`StreamConsumer`] holds one long-lived HTTP connection to the stream
//! endpoint, cuts the chunked body into newline-delimited JSON frames,
//! classifies each frame and dispatches it to a caller-supplied
//! [`EventHandler`]. Dropped connections are retried with backoff when
//! auto-reconnect is on.
//!
//! ```no_run
//! use siftstream::{EventHandler, HandlerResult, ConsumerHandle, User};
//! use serde_json::Value;
//!
//! struct Printer;
//!
//! impl EventHandler for Printer {
//!     fn on_interaction(
//!         &mut self,
//!         _consumer: &ConsumerHandle,
//!         interaction: Value,
//!         hash: &str,
//!     ) -> HandlerResult {
//!         println!("{hash}: {interaction}");
//!         Ok(())
//!     }
//! }
//!
//! # async fn demo() -> siftstream::Result<()> {
//! let user = User::new("username", "api-key")?;
//! let consumer = user.get_consumer("947b690ec9dca525fb8724645e088d79", Printer, "http")?;
//! consumer.run(true).await
//! # }
//! ```

#![warn(rust_2018_idioms)]
#![warn(missing_docs)]

pub mod api;
pub mod config;
pub mod connection;
pub mod consumer;
pub mod error;
pub mod framing;

/// User agent sent with every request unless the credentials override it
pub const USER_AGENT: &str = concat!("siftstream-rust/", env!("CARGO_PKG_VERSION"));

pub use api::{ApiClient, ApiResponse, CompiledDefinition, HttpApiClient, User};
pub use config::{ClientConfig, ReconnectConfig};
pub use connection::{Connection, Connector, HttpConnector, StreamRequest};
pub use consumer::{
    ConsumerHandle, ConsumerType, EventHandler, HandlerResult, LoggingHandler, StreamConsumer,
};
pub use error::{ConnectError, Error, HandlerError, ReadError, Result};
pub use framing::{FrameReader, FrameStats};

// Domain re-exports
pub use siftstream_domain::{
    ClassifiedMessage, ConsumerState, Credentials, DomainError, Frame, StreamHashes,
    StreamTarget, classify,
};
