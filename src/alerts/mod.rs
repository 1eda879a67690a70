//! Rule-based alerting
//!
//! The engine evaluates threshold rules against each snapshot and applies
//! per-rule cooldown suppression. Called from exactly one place, the
//! distribution tick, so rule state needs no internal locking.

pub mod engine;

pub use engine::{AlertEngine, MAX_RECENT_EVENTS};
