//! Alert rule and event types
//!
//! An AlertRule is a threshold condition such as "AAPL > 200". Rules are
//! owned by the alert engine; only `enabled` and `last_triggered` change
//! after registration. An AlertEvent is one concrete firing.

use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

/// Comparison operator for a rule
///
/// Intake is permissive: any operator other than ">" or "<" deserializes
/// to `Unknown`, which never fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AlertOp {
    GreaterThan,
    LessThan,
    Unknown,
}

impl From<String> for AlertOp {
    fn from(op: String) -> Self {
        match op.trim() {
            ">" => AlertOp::GreaterThan,
            "<" => AlertOp::LessThan,
            _ => AlertOp::Unknown,
        }
    }
}

impl From<AlertOp> for String {
    fn from(op: AlertOp) -> Self {
        op.to_string()
    }
}

impl AlertOp {
    /// Apply the comparison. `Unknown` is a defined no-fire condition.
    pub fn matches(&self, price: f64, threshold: f64) -> bool {
        match self {
            AlertOp::GreaterThan => price > threshold,
            AlertOp::LessThan => price < threshold,
            AlertOp::Unknown => false,
        }
    }
}

impl fmt::Display for AlertOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertOp::GreaterThan => write!(f, ">"),
            AlertOp::LessThan => write!(f, "<"),
            AlertOp::Unknown => write!(f, "?"),
        }
    }
}

/// A single alert rule such as "AAPL > 200"
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRule {
    pub id: i64,
    pub symbol: String,
    pub operator: AlertOp,
    pub threshold: f64,
    pub description: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: i64,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_triggered: Option<OffsetDateTime>,
}

fn default_enabled() -> bool {
    true
}

fn default_cooldown_seconds() -> i64 {
    60
}

impl AlertRule {
    /// Create an enabled rule with the default 60 s cooldown
    pub fn new(id: i64, symbol: &str, operator: AlertOp, threshold: f64, description: &str) -> Self {
        Self {
            id,
            symbol: symbol.to_string(),
            operator,
            threshold,
            description: description.to_string(),
            enabled: default_enabled(),
            cooldown_seconds: default_cooldown_seconds(),
            last_triggered: None,
        }
    }

    /// True when the cooldown window has elapsed (or the rule never fired)
    ///
    /// Fires when elapsed >= cooldown_seconds, so the boundary instant
    /// itself is eligible.
    pub fn can_trigger(&self, now: OffsetDateTime) -> bool {
        match self.last_triggered {
            None => true,
            Some(last) => now - last >= time::Duration::seconds(self.cooldown_seconds),
        }
    }
}

/// A concrete alert firing at a specific time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub rule_id: i64,
    pub symbol: String,
    pub price: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub triggered_at: OffsetDateTime,
    pub message: String,
}
