//! # siftstream demo
//!
//! Command-line clients built on the siftstream consumer. `sift-track`
//! compiles a definition matching the given words and prints matching
//! interactions as they arrive.

pub mod track;

pub use track::{PrintingHandler, describe_deletion, describe_interaction, track_csdl};
