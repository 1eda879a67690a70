//! Market data types
//!
//! PricePoint and PriceSnapshot are the core structures for price data.
//! A snapshot is captured at one instant and never mutated afterwards;
//! each refresh cycle supersedes it with a new one.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// One observed price for a single symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Ticker symbol (upper case)
    pub symbol: String,
    /// Current price
    pub price: f64,
    /// Absolute change versus previous close
    pub change: f64,
    /// Change as a percentage of previous close
    #[serde(rename = "percentChange")]
    pub percent_change: f64,
    /// Observation time
    #[serde(with = "time::serde::rfc3339")]
    pub ts: OffsetDateTime,
}

/// Point-in-time set of price observations, one per tracked symbol
///
/// Immutable once constructed. Ordering follows the configured symbol list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceSnapshot {
    points: Vec<PricePoint>,
}

impl PriceSnapshot {
    /// Create a snapshot from already-captured points
    pub fn new(points: Vec<PricePoint>) -> Self {
        Self { points }
    }

    /// All points in capture order
    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    /// Look up a symbol, case-insensitively
    pub fn find(&self, symbol: &str) -> Option<&PricePoint> {
        self.points
            .iter()
            .find(|p| p.symbol.eq_ignore_ascii_case(symbol))
    }

    /// Number of points in the snapshot
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True when the snapshot carries no points
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Message pushed to subscribers over the WebSocket channel
///
/// Two shapes exist on the wire:
/// `{"type":"price_update","data":[...]}` and
/// `{"type":"alert","rule_id":...,"symbol":...,...}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum OutboundMessage {
    #[serde(rename = "price_update")]
    PriceUpdate { data: Vec<PricePoint> },
    #[serde(rename = "alert")]
    Alert {
        rule_id: i64,
        symbol: String,
        price: f64,
        #[serde(with = "time::serde::rfc3339")]
        triggered_at: OffsetDateTime,
        message: String,
    },
}

impl OutboundMessage {
    /// Build a price_update message from a snapshot
    pub fn price_update(snapshot: &PriceSnapshot) -> Self {
        Self::PriceUpdate {
            data: snapshot.points().to_vec(),
        }
    }

    /// Build an alert message from a fired event
    pub fn alert(event: &super::alert::AlertEvent) -> Self {
        Self::Alert {
            rule_id: event.rule_id,
            symbol: event.symbol.clone(),
            price: event.price,
            triggered_at: event.triggered_at,
            message: event.message.clone(),
        }
    }
}
