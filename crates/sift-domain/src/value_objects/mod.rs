//! Domain Value Objects
//!
//! Immutable objects that represent concepts in the domain
//! with no conceptual identity, only defined by their attributes.

mod credentials;
mod hashes;
mod state;

pub use credentials::Credentials;
pub use hashes::{MULTI_STREAM_PATH, StreamHashes, StreamTarget};
pub use state::ConsumerState;
