//! Webex notification sink
//!
//! Posts fired alerts into a Webex room using a bot token. Delivery is
//! best-effort: transport failures are logged and counted, never raised
//! to the caller. When the token or room id is missing the notifier runs
//! in dry-run mode and only logs what it would have sent.

use crate::core::AlertEvent;
use crate::infrastructure::config::WebexConfig;
use crate::infrastructure::metrics::MetricsCollector;
use std::sync::Arc;
use std::time::Duration;
use time::format_description::well_known::Rfc3339;

/// Best-effort alert sink for a Webex room
pub struct WebexNotifier {
    client: reqwest::Client,
    api_url: String,
    bot_token: Option<String>,
    room_id: Option<String>,
    metrics: Arc<MetricsCollector>,
}

impl WebexNotifier {
    pub fn new(config: &WebexConfig, metrics: Arc<MetricsCollector>) -> Self {
        if config.bot_token.is_none() || config.room_id.is_none() {
            tracing::warn!("Webex not fully configured; alerts will be logged only");
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .user_agent("pricecast/0.1")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            api_url: config.api_url.clone(),
            bot_token: config.bot_token.clone(),
            room_id: config.room_id.clone(),
            metrics,
        }
    }

    /// True when both the bot token and room id are present
    pub fn is_configured(&self) -> bool {
        self.bot_token.is_some() && self.room_id.is_some()
    }

    /// Post one alert into the configured room
    ///
    /// Never fails: transport and API errors are logged and recorded in
    /// the failure counter, and the tick goes on.
    pub async fn send_alert(&self, event: &AlertEvent) {
        let (Some(token), Some(room_id)) = (self.bot_token.as_deref(), self.room_id.as_deref())
        else {
            tracing::info!("(dry-run) Would send alert to Webex: {}", event.message);
            return;
        };

        let triggered_at = event
            .triggered_at
            .format(&Rfc3339)
            .unwrap_or_else(|_| event.triggered_at.to_string());
        let text = format!(
            "🚨 Stock Alert: {}\n{}\nTriggered at {}",
            event.symbol, event.message, triggered_at
        );
        let body = serde_json::json!({
            "roomId": room_id,
            "text": text,
        });

        match self
            .client
            .post(&self.api_url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                tracing::info!(
                    "Alert sent to Webex for rule {} ({})",
                    event.rule_id,
                    event.symbol
                );
            }
            Ok(response) => {
                self.metrics.record_notify_failure();
                tracing::warn!(
                    "Webex rejected alert for rule {}: HTTP {}",
                    event.rule_id,
                    response.status()
                );
            }
            Err(e) => {
                self.metrics.record_notify_failure();
                tracing::warn!("Webex send failed for rule {}: {}", event.rule_id, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn make_event() -> AlertEvent {
        AlertEvent {
            rule_id: 1,
            symbol: "AAPL".to_string(),
            price: 205.0,
            triggered_at: datetime!(2024-06-01 12:00:00 UTC),
            message: "AAPL > 200 (now 205.00)".to_string(),
        }
    }

    #[tokio::test]
    async fn test_unconfigured_notifier_is_a_noop() {
        let metrics = Arc::new(MetricsCollector::new());
        let notifier = WebexNotifier::new(&WebexConfig::default(), metrics.clone());

        assert!(!notifier.is_configured());
        // Dry-run: no transport attempt, so no failure recorded.
        notifier.send_alert(&make_event()).await;
        assert_eq!(metrics.snapshot().notify_failures, 0);
    }

    #[tokio::test]
    async fn test_unreachable_sink_is_logged_not_raised() {
        let metrics = Arc::new(MetricsCollector::new());
        let config = WebexConfig {
            api_url: "http://127.0.0.1:1/v1/messages".to_string(),
            bot_token: Some("token".to_string()),
            room_id: Some("room".to_string()),
        };
        let notifier = WebexNotifier::new(&config, metrics.clone());

        assert!(notifier.is_configured());
        // Connection refused; send_alert must swallow it and count it.
        notifier.send_alert(&make_event()).await;
        assert_eq!(metrics.snapshot().notify_failures, 1);
    }
}
