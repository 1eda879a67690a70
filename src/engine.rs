//! Distribution engine
//!
//! Owns the periodic refresh cycle: obtain a snapshot (cache or source),
//! fan it out to subscribers, evaluate alert rules, dispatch fired events
//! to subscribers and the notification sink. All rule-state mutation
//! happens inside this task's tick body; other tasks only add rules
//! through the engine lock, which becomes visible on the next tick.

use crate::alerts::AlertEngine;
use crate::cache::SnapshotCache;
use crate::core::{OutboundMessage, PriceSnapshot};
use crate::infrastructure::metrics::MetricsCollector;
use crate::notify::WebexNotifier;
use crate::source::PriceSource;
use crate::ws::SubscriberRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::time::MissedTickBehavior;

/// The orchestrator tick loop
pub struct DistributionEngine {
    cache: Arc<SnapshotCache>,
    source: Arc<PriceSource>,
    alerts: Arc<RwLock<AlertEngine>>,
    registry: Arc<SubscriberRegistry>,
    notifier: Arc<WebexNotifier>,
    metrics: Arc<MetricsCollector>,
    tick_period: Duration,
    freshness_window: Duration,
    shutdown: watch::Receiver<bool>,
}

impl DistributionEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cache: Arc<SnapshotCache>,
        source: Arc<PriceSource>,
        alerts: Arc<RwLock<AlertEngine>>,
        registry: Arc<SubscriberRegistry>,
        notifier: Arc<WebexNotifier>,
        metrics: Arc<MetricsCollector>,
        tick_period: Duration,
        freshness_window: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            cache,
            source,
            alerts,
            registry,
            notifier,
            metrics,
            tick_period,
            freshness_window,
            shutdown,
        }
    }

    /// Run the tick loop until shutdown
    ///
    /// Ticks never overlap: if one overruns the period, the next starts
    /// after it completes instead of running concurrently. Shutdown
    /// interrupts the inter-tick wait promptly.
    pub async fn run(self) {
        tracing::info!(
            "Distribution engine started (period {:?}, freshness window {:?})",
            self.tick_period,
            self.freshness_window
        );

        let mut interval = tokio::time::interval(self.tick_period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut shutdown = self.shutdown.clone();

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Distribution engine stopped");
    }

    /// One execution of the distribution cycle
    async fn tick(&self) {
        let snapshot = self.obtain_snapshot().await;

        let outcome = self
            .registry
            .broadcast(&OutboundMessage::price_update(&snapshot));
        self.metrics.record_delivered(outcome.delivered as u64);
        self.metrics.record_dropped_subscribers(outcome.dropped as u64);

        let events = {
            let mut alerts = self.alerts.write().await;
            alerts.evaluate(&snapshot)
        };

        for event in &events {
            self.metrics.record_alert();
            // Sink failures are logged inside the notifier, never abort the tick.
            self.notifier.send_alert(event).await;

            let outcome = self.registry.broadcast(&OutboundMessage::alert(event));
            self.metrics.record_delivered(outcome.delivered as u64);
            self.metrics.record_dropped_subscribers(outcome.dropped as u64);
        }

        self.metrics.record_tick();
        tracing::debug!(
            "Tick complete: {} point(s), {} alert(s), {} subscriber(s)",
            snapshot.len(),
            events.len(),
            self.registry.len()
        );
    }

    /// Cache-or-fetch: use a fresh cached snapshot, otherwise go upstream
    async fn obtain_snapshot(&self) -> PriceSnapshot {
        if let Some(snapshot) = self.cache.get(self.freshness_window) {
            self.metrics.record_cache_hit();
            return snapshot;
        }

        let snapshot = self.source.fetch_snapshot().await;
        self.metrics.record_fetch();
        self.cache.set(&snapshot);
        snapshot
    }
}
