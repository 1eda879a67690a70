//! Price source
//!
//! Fetches current prices for the configured symbols from an HTTP quote
//! API (Finnhub /quote shape). Fetching a snapshot never fails outright:
//! any per-symbol error degrades to a deterministic fallback value for
//! that symbol, so the returned snapshot always has one entry per symbol.

use crate::core::{PricePoint, PriceSnapshot};
use crate::infrastructure::config::SourceConfig;
use futures_util::future::join_all;
use serde::Deserialize;
use std::time::Duration;
use time::OffsetDateTime;

/// Per-symbol fetch errors; always recovered via the fallback value
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error: {0}")]
    Http(u16),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("API token not configured")]
    MissingToken,
}

/// Quote API response (Finnhub /quote fields: c = current, pc = previous close)
#[derive(Debug, Deserialize)]
struct QuoteResponse {
    #[serde(default)]
    c: f64,
    #[serde(default)]
    pc: f64,
}

impl QuoteResponse {
    fn into_point(self, symbol: &str, now: OffsetDateTime) -> PricePoint {
        let current = self.c;
        let prev_close = if self.pc != 0.0 { self.pc } else { current };
        let change = current - prev_close;
        let percent_change = if prev_close != 0.0 {
            change / prev_close * 100.0
        } else {
            0.0
        };

        PricePoint {
            symbol: symbol.to_uppercase(),
            price: current,
            change,
            percent_change,
            ts: now,
        }
    }
}

/// Upstream price collaborator
///
/// Mock-only mode is decided once at construction (config flag, or a
/// missing API token) rather than toggled at runtime.
pub struct PriceSource {
    client: reqwest::Client,
    symbols: Vec<String>,
    quote_url: String,
    api_token: Option<String>,
    mock_only: bool,
}

impl PriceSource {
    /// Create a source for the given symbols
    pub fn new(config: &SourceConfig, symbols: Vec<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .user_agent("pricecast/0.1")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let mock_only = config.mock_only || config.api_token.is_none();
        if mock_only && !config.mock_only {
            tracing::info!("No quote API token configured; serving mock prices only");
        }

        Self {
            client,
            symbols,
            quote_url: config.quote_url.clone(),
            api_token: config.api_token.clone(),
            mock_only,
        }
    }

    /// Fetch a snapshot with one entry per configured symbol
    ///
    /// All symbols are fetched concurrently; per-symbol failures fall back
    /// to the deterministic mock value and are logged, never propagated.
    pub async fn fetch_snapshot(&self) -> PriceSnapshot {
        let now = OffsetDateTime::now_utc();

        if self.mock_only {
            return self.fallback_snapshot(now);
        }

        let fetches = self.symbols.iter().map(|s| self.fetch_symbol(s, now));
        let results = join_all(fetches).await;

        let points = self
            .symbols
            .iter()
            .zip(results)
            .map(|(symbol, result)| match result {
                Ok(point) => point,
                Err(e) => {
                    tracing::warn!("Quote fetch failed for {}, fallback used: {}", symbol, e);
                    fallback_point(symbol, now)
                }
            })
            .collect();

        PriceSnapshot::new(points)
    }

    async fn fetch_symbol(&self, symbol: &str, now: OffsetDateTime) -> Result<PricePoint, SourceError> {
        let token = self.api_token.as_deref().ok_or(SourceError::MissingToken)?;
        let url = format!("{}?symbol={}&token={}", self.quote_url, symbol, token);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SourceError::Http(response.status().as_u16()));
        }

        let quote: QuoteResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(e.to_string()))?;

        Ok(quote.into_point(symbol, now))
    }

    fn fallback_snapshot(&self, now: OffsetDateTime) -> PriceSnapshot {
        let points = self
            .symbols
            .iter()
            .map(|symbol| fallback_point(symbol, now))
            .collect();
        PriceSnapshot::new(points)
    }
}

/// Reference price per symbol for fallback values
fn base_price(symbol: &str) -> f64 {
    match symbol.to_uppercase().as_str() {
        "AAPL" => 190.0,
        "TSLA" => 180.0,
        "NVDA" => 1100.0,
        "MSFT" => 420.0,
        _ => 100.0,
    }
}

/// Deterministic fallback value for one symbol
///
/// The jitter derives from the symbol name and the current minute, so the
/// value is reproducible for a given (symbol, minute) while still moving
/// between refresh cycles.
fn fallback_point(symbol: &str, now: OffsetDateTime) -> PricePoint {
    let minute = now.unix_timestamp().div_euclid(60) as u64;
    let seed = symbol_seed(symbol).wrapping_add(minute);

    let jitter = (seed % 601) as f64 / 100.0 - 3.0; // [-3.00, +3.00]
    let price = round2((base_price(symbol) + jitter).max(1.0));
    let change = round2((seed.wrapping_mul(7) % 401) as f64 / 100.0 - 2.0); // [-2.00, +2.00]
    let percent_change = if price != 0.0 {
        round2(change / price * 100.0)
    } else {
        0.0
    };

    PricePoint {
        symbol: symbol.to_uppercase(),
        price,
        change,
        percent_change,
        ts: now,
    }
}

fn symbol_seed(symbol: &str) -> u64 {
    symbol
        .to_uppercase()
        .bytes()
        .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
