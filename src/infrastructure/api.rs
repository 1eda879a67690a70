//! API server
//!
//! Serves the REST surface (prices, rule management, recent events,
//! stats) and the /ws/prices subscription endpoint. Each WebSocket
//! client gets an independent writer task fed from its registry channel,
//! so one slow client never blocks the tick loop or its peers.

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;

use crate::alerts::AlertEngine;
use crate::cache::SnapshotCache;
use crate::core::{AlertEvent, AlertRule, OutboundMessage, PricePoint};
use crate::infrastructure::metrics::MetricsCollector;
use crate::source::PriceSource;
use crate::ws::SubscriberRegistry;
use crate::{PricecastError, Result};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<SnapshotCache>,
    pub source: Arc<PriceSource>,
    pub alerts: Arc<RwLock<AlertEngine>>,
    pub registry: Arc<SubscriberRegistry>,
    pub metrics: Arc<MetricsCollector>,
    pub freshness_window: Duration,
}

/// DTO for /api/stats
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsDto {
    pub uptime_seconds: u64,
    pub ticks_completed: u64,
    pub snapshots_fetched: u64,
    pub cache_hits: u64,
    pub alerts_fired: u64,
    pub notify_failures: u64,
    pub messages_delivered: u64,
    pub subscribers_dropped: u64,
    pub subscribers_connected: u64,
}

/// Start the API server
pub async fn start_server(state: AppState, port: u16) -> Result<()> {
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(PricecastError::Io)?;

    axum::serve(listener, app).await.map_err(PricecastError::Io)?;

    Ok(())
}

/// Build the router; separate from `start_server` for tests
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/prices", get(get_prices))
        .route("/api/stats", get(get_stats))
        .route("/alerts/rules", get(list_rules).post(add_rule))
        .route("/alerts/events", get(recent_events))
        .route("/ws/prices", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Handler for /api/prices
///
/// REST read path mainly for debugging; the UI uses the WebSocket. Same
/// cache-or-fetch semantics as the distribution tick.
async fn get_prices(State(state): State<AppState>) -> Json<Vec<PricePoint>> {
    if let Some(snapshot) = state.cache.get(state.freshness_window) {
        state.metrics.record_cache_hit();
        return Json(snapshot.points().to_vec());
    }

    let snapshot = state.source.fetch_snapshot().await;
    state.metrics.record_fetch();
    state.cache.set(&snapshot);
    Json(snapshot.points().to_vec())
}

async fn get_stats(State(state): State<AppState>) -> Json<StatsDto> {
    let snapshot = state.metrics.snapshot();
    Json(StatsDto {
        uptime_seconds: snapshot.uptime_seconds,
        ticks_completed: snapshot.ticks_completed,
        snapshots_fetched: snapshot.snapshots_fetched,
        cache_hits: snapshot.cache_hits,
        alerts_fired: snapshot.alerts_fired,
        notify_failures: snapshot.notify_failures,
        messages_delivered: snapshot.messages_delivered,
        subscribers_dropped: snapshot.subscribers_dropped,
        subscribers_connected: snapshot.subscribers_connected,
    })
}

async fn list_rules(State(state): State<AppState>) -> Json<Vec<AlertRule>> {
    let alerts = state.alerts.read().await;
    Json(alerts.rules())
}

/// Insert or replace a rule; visible to the evaluator on the next tick
async fn add_rule(
    State(state): State<AppState>,
    Json(rule): Json<AlertRule>,
) -> Json<AlertRule> {
    let mut alerts = state.alerts.write().await;
    alerts.add_rule(rule.clone());
    tracing::info!("Alert rule registered: id={} {}", rule.id, rule.description);
    Json(rule)
}

async fn recent_events(State(state): State<AppState>) -> Json<Vec<AlertEvent>> {
    let alerts = state.alerts.read().await;
    Json(alerts.recent_events())
}

/// Handler for /ws/prices
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    // Push the cached snapshot immediately so a fresh client does not wait
    // up to a full period for its first update. This happens before the
    // client joins the broadcast set.
    if let Some(snapshot) = state.cache.get(state.freshness_window) {
        let msg = OutboundMessage::price_update(&snapshot);
        if let Ok(payload) = serde_json::to_string(&msg) {
            if sender.send(Message::Text(payload)).await.is_err() {
                return;
            }
        }
    }

    let (id, mut rx) = state.registry.register();
    state.metrics.client_connected();
    tracing::info!("WebSocket client connected, total={}", state.registry.len());

    // Writer: drain this subscriber's channel into the socket
    let mut send_task = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if sender.send(Message::Text(payload)).await.is_err() {
                break;
            }
        }
    });

    // Reader: we only care about disconnection
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    state.registry.unregister(id);
    state.metrics.client_disconnected();
    tracing::info!("WebSocket client disconnected, total={}", state.registry.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::SourceConfig;

    fn make_state() -> AppState {
        let source_config = SourceConfig {
            mock_only: true,
            ..SourceConfig::default()
        };
        AppState {
            cache: Arc::new(SnapshotCache::new()),
            source: Arc::new(PriceSource::new(&source_config, vec!["AAPL".to_string()])),
            alerts: Arc::new(RwLock::new(AlertEngine::new())),
            registry: Arc::new(SubscriberRegistry::new()),
            metrics: Arc::new(MetricsCollector::new()),
            freshness_window: Duration::from_secs(15),
        }
    }

    #[tokio::test]
    async fn test_get_prices_fetches_then_caches() {
        let state = make_state();

        let Json(points) = get_prices(State(state.clone())).await;
        assert_eq!(points.len(), 1);
        assert_eq!(state.metrics.snapshot().snapshots_fetched, 1);

        // second call is served from the cache
        let Json(points) = get_prices(State(state.clone())).await;
        assert_eq!(points.len(), 1);
        assert_eq!(state.metrics.snapshot().snapshots_fetched, 1);
        assert_eq!(state.metrics.snapshot().cache_hits, 1);
    }

    #[tokio::test]
    async fn test_rule_management_roundtrip() {
        use crate::core::AlertOp;
        let state = make_state();

        let rule = AlertRule::new(1, "AAPL", AlertOp::GreaterThan, 200.0, "AAPL > 200");
        let Json(returned) = add_rule(State(state.clone()), Json(rule)).await;
        assert_eq!(returned.id, 1);

        let Json(rules) = list_rules(State(state.clone())).await;
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].symbol, "AAPL");

        let Json(events) = recent_events(State(state)).await;
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_router_builds() {
        // Routing conflicts panic at construction; catch them here.
        let _router = create_router(make_state());
    }
}
