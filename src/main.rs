//! Real-time stock price distribution and alerting service
//!
//! # Architecture
//! - **core**: Shared types (snapshots, rules, events)
//! - **source**: Quote API client with deterministic mock fallback
//! - **cache**: Freshness-gated snapshot cache
//! - **alerts**: Rule engine with cooldown suppression
//! - **ws**: Subscriber registry and fan-out
//! - **engine**: Periodic distribution loop
//! - **infrastructure**: API server, logging, metrics, config

use pricecast::alerts::AlertEngine;
use pricecast::cache::backend::MemoryBackend;
use pricecast::cache::SnapshotCache;
use pricecast::core::{AlertOp, AlertRule};
use pricecast::engine::DistributionEngine;
use pricecast::infrastructure::{init_logging, start_server, AppState, MetricsCollector};
use pricecast::notify::WebexNotifier;
use pricecast::source::PriceSource;
use pricecast::ws::SubscriberRegistry;
use pricecast::{Config, PricecastError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};

/// Main application state
pub struct PricecastApp {
    config: Config,
}

impl PricecastApp {
    /// Create new application instance
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run the service: API server plus the distribution loop
    pub async fn run(&self) -> Result<()> {
        tracing::info!(
            "Starting pricecast for {} symbol(s)...",
            self.config.service.symbols.len()
        );

        // 1. Shared components
        let cache = Arc::new(SnapshotCache::with_backend(Box::new(MemoryBackend::new())));
        let source = Arc::new(PriceSource::new(
            &self.config.source,
            self.config.service.symbols.clone(),
        ));
        let alerts = Arc::new(RwLock::new(AlertEngine::with_rules(default_rules())));
        let registry = Arc::new(SubscriberRegistry::new());
        let metrics = Arc::new(MetricsCollector::new());
        let notifier = Arc::new(WebexNotifier::new(&self.config.webex, metrics.clone()));

        let tick_period = Duration::from_secs(self.config.service.tick_period_secs);
        let freshness_window = Duration::from_secs(self.config.service.freshness_window_secs);

        // 2. Start API server
        let state = AppState {
            cache: cache.clone(),
            source: source.clone(),
            alerts: alerts.clone(),
            registry: registry.clone(),
            metrics: metrics.clone(),
            freshness_window,
        };
        let port = self.config.api.port;
        tokio::spawn(async move {
            if let Err(e) = start_server(state, port).await {
                tracing::error!("API server failed: {}", e);
            }
        });

        // 3. Shutdown signal: interrupt the engine between ticks
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown signal received");
                let _ = shutdown_tx.send(true);
            }
        });

        // 4. Run the distribution loop (this blocks until shutdown)
        let engine = DistributionEngine::new(
            cache,
            source,
            alerts,
            registry,
            notifier,
            metrics,
            tick_period,
            freshness_window,
            shutdown_rx,
        );
        engine.run().await;

        Ok(())
    }
}

/// Demo rules registered at startup; replace over POST /alerts/rules
fn default_rules() -> Vec<AlertRule> {
    vec![
        AlertRule::new(1, "AAPL", AlertOp::GreaterThan, 200.0, "AAPL > 200 (notify Webex)"),
        AlertRule::new(2, "TSLA", AlertOp::GreaterThan, 180.0, "TSLA > 180 (notify Webex)"),
        AlertRule::new(3, "NVDA", AlertOp::GreaterThan, 1000.0, "NVDA > 1000 (high priority)"),
    ]
}

#[tokio::main]
async fn main() -> Result<()> {
    // Keep the appender guards alive for the life of the process
    let _guards = init_logging();

    let config = Config::load().map_err(|e| PricecastError::Config(e.to_string()))?;

    let app = PricecastApp::new(config);
    app.run().await?;

    Ok(())
}
