//! WebSocket fan-out
//!
//! Each connected client owns an independent writer task fed by a bounded
//! channel; the registry holds the sending ends and broadcasts to all of
//! them with per-channel isolation.

pub mod registry;

pub use registry::{BroadcastOutcome, SubscriberRegistry, SUBSCRIBER_BUFFER};
