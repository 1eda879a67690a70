//! Infrastructure - everything around the distribution loop
//!
//! This module contains non-domain code:
//! - API server (REST + WebSocket endpoint)
//! - Logging and metrics
//! - Configuration management

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;

pub use api::{start_server, AppState};
pub use logging::init_logging;
pub use metrics::{MetricsCollector, MetricsSnapshot};
