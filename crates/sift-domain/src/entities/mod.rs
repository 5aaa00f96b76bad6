//! Domain Entities
//!
//! Objects that exist for the duration of a single dispatch.

mod frame;

pub use frame::Frame;
