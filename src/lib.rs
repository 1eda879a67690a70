//! Real-time stock price distribution and alerting service
//!
//! Core library for the live distribution loop.
//!
//! # Architecture
//! - **core**: Shared types (PricePoint, PriceSnapshot, AlertRule, AlertEvent)
//! - **source**: Upstream quote API client with deterministic mock fallback
//! - **cache**: Freshness-gated snapshot cache with optional blob backend
//! - **alerts**: Rule engine with per-rule cooldown and bounded history
//! - **ws**: Subscriber registry and best-effort fan-out
//! - **notify**: Webex notification sink
//! - **engine**: The periodic distribution tick loop
//! - **infrastructure**: API server, logging, metrics, config

pub mod alerts;
pub mod cache;
pub mod core;
pub mod engine;
pub mod infrastructure;
pub mod notify;
pub mod source;
pub mod ws;

// Re-export commonly used types
pub use infrastructure::config::{ApiConfig, Config, ServiceConfig, SourceConfig, WebexConfig};

use thiserror::Error;

/// Main error type for the service
#[derive(Error, Debug)]
pub enum PricecastError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, PricecastError>;
