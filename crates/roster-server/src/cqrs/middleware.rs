//! CQRS marker traits
//!
//! Commands mutate state; queries only read it. The markers let shared
//! infrastructure distinguish the two without inspecting handler bodies.

/// Marker for write operations
pub trait Command {}

/// Marker for read operations
pub trait Query {}
