//! siftstream Domain Layer - Pure Stream Logic
//!
//! This crate contains the transport-free part of the siftstream consumer:
//! what a stream target is, which lifecycle transitions a consumer may take,
//! what a decoded frame looks like and how a frame is classified.
//!
//! Nothing here performs I/O. The `siftstream` crate wires these types to an
//! HTTP connection and a tokio task.
//!
//! ## Architecture
//!
//! - **Value Objects**: validated, immutable concepts (`StreamHashes`,
//!   `Credentials`, `ConsumerState`)
//! - **Entities**: `Frame`, one decoded message from the wire
//! - **Message**: `ClassifiedMessage` and the `classify` rules

#![warn(missing_docs)]

pub mod entities;
pub mod message;
pub mod value_objects;

pub use entities::Frame;
pub use message::{ClassifiedMessage, classify};
pub use value_objects::{ConsumerState, Credentials, StreamHashes, StreamTarget};

/// Domain Result type
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-specific errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum DomainError {
    /// A stream target resolved to zero hashes
    #[error("No valid hashes found when creating the consumer")]
    NoHashes,

    /// A hash is empty or contains characters that cannot appear in a stream path
    #[error("Invalid stream hash: {0:?}")]
    InvalidHash(String),

    /// Invalid state transition attempted
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),
}

impl DomainError {
    /// Create an invalid state transition error
    pub fn invalid_transition(from: ConsumerState, to: ConsumerState) -> Self {
        Self::InvalidStateTransition(format!("{from} -> {to}"))
    }
}
