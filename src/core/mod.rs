//! Core types shared across the service
//!
//! This module contains the fundamental types used throughout the system:
//! - PricePoint / PriceSnapshot: immutable price observations
//! - AlertRule / AlertEvent: threshold conditions and their firings
//! - OutboundMessage: the typed messages pushed to subscribers

pub mod alert;
pub mod market_data;

pub use alert::{AlertEvent, AlertOp, AlertRule};
pub use market_data::{OutboundMessage, PricePoint, PriceSnapshot};
