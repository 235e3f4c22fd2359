use crate::{Error, Result};

/// Prioritized default feeds: global Binance first, Binance.US as fallback.
pub const DEFAULT_PRICE_FEED_URLS: &[&str] = &[
    "wss://stream.binance.com:9443/ws/btcusdt@trade",
    "wss://stream.binance.us:9443/ws/btcusd@trade",
];

pub const DEFAULT_DATABASE_URL: &str = "sqlite://paper_trades.db";
pub const DEFAULT_STRATEGY_CONFIG_PATH: &str = "config/window.toml";

/// Process-level configuration loaded from environment variables at startup.
/// Strategy parameters live in the TOML file at `strategy_config_path`.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,

    /// Feed endpoints in priority order.
    pub price_feed_urls: Vec<String>,

    pub strategy_config_path: String,
}

impl Config {
    /// Load configuration from the environment, reading `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        let price_feed_urls = match optional_env("PRICE_FEED_URLS") {
            Some(raw) => parse_feed_urls(&raw)?,
            None => DEFAULT_PRICE_FEED_URLS.iter().map(|s| s.to_string()).collect(),
        };

        Ok(Config {
            database_url: optional_env("DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            price_feed_urls,
            strategy_config_path: optional_env("STRATEGY_CONFIG_PATH")
                .unwrap_or_else(|| DEFAULT_STRATEGY_CONFIG_PATH.to_string()),
        })
    }
}

/// Split a comma-separated endpoint list, keeping order and dropping blanks.
pub fn parse_feed_urls(raw: &str) -> Result<Vec<String>> {
    let urls: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();

    if urls.is_empty() {
        return Err(Error::Config(
            "PRICE_FEED_URLS is set but contains no endpoints".into(),
        ));
    }
    if let Some(bad) = urls
        .iter()
        .find(|u| !(u.starts_with("ws://") || u.starts_with("wss://")))
    {
        return Err(Error::Config(format!(
            "PRICE_FEED_URLS entry '{bad}' is not a ws:// or wss:// URL"
        )));
    }
    Ok(urls)
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
