//! Metrics collection for system monitoring
//!
//! Lock-free counters using atomic operations, updated from the tick loop
//! and connection tasks, exported as a snapshot via the API.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// System metrics collector
///
/// Thread-safe counters; snapshots taken for API export.
pub struct MetricsCollector {
    /// Completed distribution ticks
    ticks_completed: AtomicU64,
    /// Snapshots fetched from the upstream source
    snapshots_fetched: AtomicU64,
    /// Ticks served from the cache
    cache_hits: AtomicU64,
    /// Alert events fired
    alerts_fired: AtomicU64,
    /// Failed notification deliveries
    notify_failures: AtomicU64,
    /// Messages handed to subscriber channels
    messages_delivered: AtomicU64,
    /// Subscribers dropped for failed delivery
    subscribers_dropped: AtomicU64,
    /// Currently connected subscribers
    subscribers_connected: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

/// Metrics snapshot for API export
#[derive(Debug, Clone, Copy)]
pub struct MetricsSnapshot {
    pub ticks_completed: u64,
    pub snapshots_fetched: u64,
    pub cache_hits: u64,
    pub alerts_fired: u64,
    pub notify_failures: u64,
    pub messages_delivered: u64,
    pub subscribers_dropped: u64,
    pub subscribers_connected: u64,
    pub uptime_seconds: u64,
}

impl MetricsCollector {
    /// Create new metrics collector
    pub fn new() -> Self {
        Self {
            ticks_completed: AtomicU64::new(0),
            snapshots_fetched: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            alerts_fired: AtomicU64::new(0),
            notify_failures: AtomicU64::new(0),
            messages_delivered: AtomicU64::new(0),
            subscribers_dropped: AtomicU64::new(0),
            subscribers_connected: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    #[inline]
    pub fn record_tick(&self) {
        self.ticks_completed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_fetch(&self) {
        self.snapshots_fetched.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_alert(&self) {
        self.alerts_fired.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_notify_failure(&self) {
        self.notify_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_delivered(&self, count: u64) {
        self.messages_delivered.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_dropped_subscribers(&self, count: u64) {
        self.subscribers_dropped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn client_connected(&self) {
        self.subscribers_connected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn client_disconnected(&self) {
        // saturating: a drop recorded by the broadcast path may race the
        // connection task's own cleanup
        let _ = self
            .subscribers_connected
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
    }

    /// Get current snapshot of metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            ticks_completed: self.ticks_completed.load(Ordering::Relaxed),
            snapshots_fetched: self.snapshots_fetched.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            alerts_fired: self.alerts_fired.load(Ordering::Relaxed),
            notify_failures: self.notify_failures.load(Ordering::Relaxed),
            messages_delivered: self.messages_delivered.load(Ordering::Relaxed),
            subscribers_dropped: self.subscribers_dropped.load(Ordering::Relaxed),
            subscribers_connected: self.subscribers_connected.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
