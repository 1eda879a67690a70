//! Configuration management
//!
//! Loads configuration from config.toml at startup. All values are
//! configurable to avoid hardcoded constants; secrets (quote API token,
//! Webex credentials) come from the environment, never from the file.

use serde::{Deserialize, Serialize};

/// Service configuration
///
/// Loaded from config.toml at startup. Every section and field has a
/// default, so a missing file yields a working mock-mode service.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Distribution loop settings
    #[serde(default)]
    pub service: ServiceConfig,

    /// Upstream quote source settings
    #[serde(default)]
    pub source: SourceConfig,

    /// Webex notification settings
    #[serde(default)]
    pub webex: WebexConfig,

    /// API server settings
    #[serde(default)]
    pub api: ApiConfig,
}

/// Distribution loop configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Symbols tracked by the service
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,

    /// Seconds between distribution ticks
    #[serde(default = "default_tick_period")]
    pub tick_period_secs: u64,

    /// Maximum cached-snapshot age before a refetch
    #[serde(default = "default_freshness_window")]
    pub freshness_window_secs: u64,
}

/// Upstream quote source configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    /// Quote endpoint (Finnhub /quote shape)
    #[serde(default = "default_quote_url")]
    pub quote_url: String,

    /// Per-request timeout for quote fetches
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Serve deterministic mock prices without calling the quote API
    #[serde(default)]
    pub mock_only: bool,

    /// Quote API token; read from FINNHUB_TOKEN, never from the file
    #[serde(skip)]
    pub api_token: Option<String>,
}

/// Webex notification configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebexConfig {
    /// Message-posting endpoint
    #[serde(default = "default_webex_url")]
    pub api_url: String,

    /// Bot token; read from WEBEX_BOT_TOKEN, never from the file
    #[serde(skip)]
    pub bot_token: Option<String>,

    /// Target room; read from WEBEX_ROOM_ID, never from the file
    #[serde(skip)]
    pub room_id: Option<String>,
}

/// API server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Port for the HTTP/WebSocket server
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            tick_period_secs: default_tick_period(),
            freshness_window_secs: default_freshness_window(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            quote_url: default_quote_url(),
            fetch_timeout_secs: default_fetch_timeout(),
            mock_only: false,
            api_token: None,
        }
    }
}

impl Default for WebexConfig {
    fn default() -> Self {
        Self {
            api_url: default_webex_url(),
            bot_token: None,
            room_id: None,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_api_port(),
        }
    }
}

fn default_symbols() -> Vec<String> {
    ["AAPL", "TSLA", "NVDA", "MSFT"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_tick_period() -> u64 {
    10
}

fn default_freshness_window() -> u64 {
    15
}

fn default_quote_url() -> String {
    "https://finnhub.io/api/v1/quote".to_string()
}

fn default_fetch_timeout() -> u64 {
    5
}

fn default_webex_url() -> String {
    "https://webexapis.com/v1/messages".to_string()
}

fn default_api_port() -> u16 {
    8000
}

impl Config {
    /// Load configuration from config.toml file
    ///
    /// If the file doesn't exist, returns default configuration. Secrets
    /// are read from the environment in both cases.
    /// # Errors
    /// Returns error if file exists but cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());

        let mut config = match std::fs::read_to_string(&config_path) {
            Ok(contents) => toml::from_str::<Config>(&contents)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
            Err(e) => return Err(ConfigError::IoError(e)),
        };

        config.source.api_token = std::env::var("FINNHUB_TOKEN").ok();
        config.webex.bot_token = std::env::var("WEBEX_BOT_TOKEN").ok();
        config.webex.room_id = std::env::var("WEBEX_ROOM_ID").ok();

        Ok(config)
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading file
    IoError(std::io::Error),
    /// Parse error (invalid TOML)
    ParseError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "Failed to read config file: {}", e),
            ConfigError::ParseError(e) => write!(f, "Failed to parse config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::IoError(e) => Some(e),
            ConfigError::ParseError(_) => None,
        }
    }
}
