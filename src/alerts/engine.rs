//! Alert engine
//!
//! Owns the rule set and evaluates it against each price snapshot.
//! Applies per-rule cooldown so one threshold crossing does not spam
//! notifications on every tick. Keeps a bounded history of recent firings.

use crate::core::{AlertEvent, AlertRule, PriceSnapshot};
use std::collections::{BTreeMap, HashMap, VecDeque};
use time::OffsetDateTime;

/// Maximum number of events retained in the history (oldest evicted first)
pub const MAX_RECENT_EVENTS: usize = 50;

/// In-memory alert rule engine
///
/// Rules live in a BTreeMap keyed by id, which also gives `evaluate` a
/// deterministic per-call ordering. All rule mutation goes through this
/// type; callers never hold references into the map.
pub struct AlertEngine {
    rules: BTreeMap<i64, AlertRule>,
    events: VecDeque<AlertEvent>,
}

impl AlertEngine {
    /// Create an engine with no rules
    pub fn new() -> Self {
        Self {
            rules: BTreeMap::new(),
            events: VecDeque::new(),
        }
    }

    /// Create an engine pre-loaded with rules
    pub fn with_rules(rules: impl IntoIterator<Item = AlertRule>) -> Self {
        let mut engine = Self::new();
        for rule in rules {
            engine.add_rule(rule);
        }
        engine
    }

    /// Insert or replace the rule at `rule.id`. Idempotent by id.
    pub fn add_rule(&mut self, rule: AlertRule) {
        self.rules.insert(rule.id, rule);
    }

    /// Remove all rules
    pub fn clear_rules(&mut self) {
        self.rules.clear();
    }

    /// Current rules, ordered by id
    pub fn rules(&self) -> Vec<AlertRule> {
        self.rules.values().cloned().collect()
    }

    /// Evaluate all rules against a snapshot, returning newly-fired events
    ///
    /// Safe to call repeatedly on a timer; one instant is captured at entry
    /// and shared by every rule in the call.
    pub fn evaluate(&mut self, snapshot: &PriceSnapshot) -> Vec<AlertEvent> {
        self.evaluate_at(snapshot, OffsetDateTime::now_utc())
    }

    /// Evaluate against an explicit instant
    pub fn evaluate_at(&mut self, snapshot: &PriceSnapshot, now: OffsetDateTime) -> Vec<AlertEvent> {
        if snapshot.is_empty() {
            return Vec::new();
        }

        let price_by_symbol: HashMap<String, f64> = snapshot
            .points()
            .iter()
            .map(|p| (p.symbol.to_uppercase(), p.price))
            .collect();

        let mut fired = Vec::new();

        for rule in self.rules.values_mut() {
            if !rule.enabled {
                continue;
            }

            let Some(&price) = price_by_symbol.get(&rule.symbol.to_uppercase()) else {
                continue;
            };

            if !rule.operator.matches(price, rule.threshold) {
                continue;
            }

            if !rule.can_trigger(now) {
                continue;
            }

            let message = format!(
                "{} {} {} (now {:.2})",
                rule.symbol, rule.operator, rule.threshold, price
            );

            rule.last_triggered = Some(now);

            let event = AlertEvent {
                rule_id: rule.id,
                symbol: rule.symbol.clone(),
                price,
                triggered_at: now,
                message,
            };

            tracing::info!("Alert fired: {}", event.message);
            self.events.push_back(event.clone());
            fired.push(event);
        }

        while self.events.len() > MAX_RECENT_EVENTS {
            self.events.pop_front();
        }

        fired
    }

    /// Retained history, oldest first
    pub fn recent_events(&self) -> Vec<AlertEvent> {
        self.events.iter().cloned().collect()
    }
}

impl Default for AlertEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AlertOp, PricePoint};
    use proptest::prelude::*;
    use time::macros::datetime;

    fn make_snapshot(prices: &[(&str, f64)], ts: OffsetDateTime) -> PriceSnapshot {
        let points = prices
            .iter()
            .map(|(symbol, price)| PricePoint {
                symbol: symbol.to_string(),
                price: *price,
                change: 0.0,
                percent_change: 0.0,
                ts,
            })
            .collect();
        PriceSnapshot::new(points)
    }

    fn make_rule(id: i64, symbol: &str, op: AlertOp, threshold: f64) -> AlertRule {
        AlertRule::new(id, symbol, op, threshold, "test rule")
    }

    #[test]
    fn test_greater_than_fires_strictly_above() {
        let mut engine = AlertEngine::with_rules([make_rule(1, "AAPL", AlertOp::GreaterThan, 200.0)]);
        let now = datetime!(2024-06-01 12:00:00 UTC);

        // equal to threshold never fires
        let events = engine.evaluate_at(&make_snapshot(&[("AAPL", 200.0)], now), now);
        assert!(events.is_empty());

        let events = engine.evaluate_at(&make_snapshot(&[("AAPL", 200.01)], now), now);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_cooldown_suppresses_then_refires() {
        let mut engine = AlertEngine::with_rules([make_rule(1, "AAPL", AlertOp::GreaterThan, 200.0)]);
        let t0 = datetime!(2024-06-01 12:00:00 UTC);

        let events = engine.evaluate_at(&make_snapshot(&[("AAPL", 205.0)], t0), t0);
        assert_eq!(events.len(), 1);
        assert!(events[0].message.contains("AAPL > 200"));
        assert!(events[0].message.contains("205.00"));

        // 10 s later, still inside the 60 s cooldown
        let t1 = t0 + time::Duration::seconds(10);
        let events = engine.evaluate_at(&make_snapshot(&[("AAPL", 210.0)], t1), t1);
        assert!(events.is_empty());

        // 61 s later, cooldown elapsed
        let t2 = t0 + time::Duration::seconds(61);
        let events = engine.evaluate_at(&make_snapshot(&[("AAPL", 210.0)], t2), t2);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_disabled_rule_never_fires() {
        let mut rule = make_rule(1, "AAPL", AlertOp::GreaterThan, 200.0);
        rule.enabled = false;
        let mut engine = AlertEngine::with_rules([rule]);
        let now = datetime!(2024-06-01 12:00:00 UTC);

        let events = engine.evaluate_at(&make_snapshot(&[("AAPL", 10_000.0)], now), now);
        assert!(events.is_empty());
    }

    #[test]
    fn test_absent_symbol_is_skipped() {
        let mut engine = AlertEngine::with_rules([make_rule(1, "NVDA", AlertOp::GreaterThan, 0.0)]);
        let now = datetime!(2024-06-01 12:00:00 UTC);

        let events = engine.evaluate_at(&make_snapshot(&[("AAPL", 205.0)], now), now);
        assert!(events.is_empty());
        assert!(engine.rules()[0].last_triggered.is_none());
    }

    #[test]
    fn test_symbol_match_is_case_insensitive() {
        let mut engine = AlertEngine::with_rules([make_rule(1, "aapl", AlertOp::GreaterThan, 200.0)]);
        let now = datetime!(2024-06-01 12:00:00 UTC);

        let events = engine.evaluate_at(&make_snapshot(&[("AAPL", 205.0)], now), now);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_unknown_operator_is_silent_no_fire() {
        let mut engine = AlertEngine::with_rules([make_rule(1, "AAPL", AlertOp::Unknown, 200.0)]);
        let now = datetime!(2024-06-01 12:00:00 UTC);

        let events = engine.evaluate_at(&make_snapshot(&[("AAPL", 205.0)], now), now);
        assert!(events.is_empty());
    }

    #[test]
    fn test_empty_snapshot_has_no_side_effects() {
        let mut engine = AlertEngine::with_rules([make_rule(1, "AAPL", AlertOp::GreaterThan, 0.0)]);
        let now = datetime!(2024-06-01 12:00:00 UTC);

        let events = engine.evaluate_at(&PriceSnapshot::new(Vec::new()), now);
        assert!(events.is_empty());
        assert!(engine.rules()[0].last_triggered.is_none());
        assert!(engine.recent_events().is_empty());
    }

    #[test]
    fn test_history_capped_at_50_oldest_evicted() {
        let mut engine = AlertEngine::new();
        // 60 rules with zero cooldown so every evaluation fires them all
        for id in 0..60 {
            let mut rule = make_rule(id, "AAPL", AlertOp::GreaterThan, 0.0);
            rule.cooldown_seconds = 0;
            engine.add_rule(rule);
        }
        let now = datetime!(2024-06-01 12:00:00 UTC);

        let events = engine.evaluate_at(&make_snapshot(&[("AAPL", 1.0)], now), now);
        assert_eq!(events.len(), 60);

        let recent = engine.recent_events();
        assert_eq!(recent.len(), MAX_RECENT_EVENTS);
        // rules evaluate in id order, so the 10 oldest firings (ids 0-9) are gone
        assert_eq!(recent[0].rule_id, 10);
        assert_eq!(recent[MAX_RECENT_EVENTS - 1].rule_id, 59);
    }

    #[test]
    fn test_add_rule_replaces_by_id() {
        let mut engine = AlertEngine::with_rules([make_rule(1, "AAPL", AlertOp::GreaterThan, 200.0)]);
        engine.add_rule(make_rule(1, "TSLA", AlertOp::LessThan, 100.0));

        let rules = engine.rules();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].symbol, "TSLA");
    }

    #[test]
    fn test_clear_rules_empties_the_set() {
        let mut engine = AlertEngine::with_rules([
            make_rule(1, "AAPL", AlertOp::GreaterThan, 200.0),
            make_rule(2, "TSLA", AlertOp::LessThan, 100.0),
        ]);
        engine.clear_rules();
        assert!(engine.rules().is_empty());

        let now = datetime!(2024-06-01 12:00:00 UTC);
        let events = engine.evaluate_at(&make_snapshot(&[("AAPL", 500.0)], now), now);
        assert!(events.is_empty());
    }

    #[test]
    fn test_evaluation_order_is_deterministic() {
        let mut engine = AlertEngine::new();
        for id in [5, 1, 3] {
            let mut rule = make_rule(id, "AAPL", AlertOp::GreaterThan, 0.0);
            rule.cooldown_seconds = 0;
            engine.add_rule(rule);
        }
        let now = datetime!(2024-06-01 12:00:00 UTC);

        let events = engine.evaluate_at(&make_snapshot(&[("AAPL", 1.0)], now), now);
        let ids: Vec<i64> = events.iter().map(|e| e.rule_id).collect();
        assert_eq!(ids, vec![1, 3, 5]);
    }

    proptest! {
        #[test]
        fn prop_gt_never_fires_at_or_below_threshold(
            threshold in -1_000.0f64..1_000.0,
            delta in 0.0f64..500.0,
        ) {
            let mut engine = AlertEngine::with_rules([make_rule(1, "AAPL", AlertOp::GreaterThan, threshold)]);
            let now = datetime!(2024-06-01 12:00:00 UTC);
            let price = threshold - delta;

            let events = engine.evaluate_at(&make_snapshot(&[("AAPL", price)], now), now);
            prop_assert!(events.is_empty());
        }
    }
}
