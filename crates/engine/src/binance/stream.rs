use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};
use url::Url;

use common::{Error, PriceSource, PriceTick, PriceWriter, Result};

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);
/// Silence after which the connection is pinged. A second silent interval
/// with no pong drops the connection.
const IDLE_TIMEOUT: Duration = Duration::from_secs(20);

/// Binance trade WebSocket stream with endpoint failover.
///
/// Endpoints are tried in priority order. When one fails or closes, the next
/// is tried immediately. Once the whole list has failed without delivering a
/// price, the stream sleeps with exponential backoff and starts over from the
/// first endpoint.
///
/// A connection that stays open but goes silent counts as failed: after
/// `idle_timeout` without a frame it is pinged, and after a second silent
/// interval it is dropped and the next endpoint is tried.
pub struct BinanceTradeStream {
    endpoints: Vec<String>,
    idle_timeout: Duration,
}

impl BinanceTradeStream {
    pub fn new(endpoints: Vec<String>) -> Self {
        Self {
            endpoints,
            idle_timeout: IDLE_TIMEOUT,
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Connect to one endpoint and publish trades until it closes or fails.
    /// Returns the number of prices published.
    async fn connect_once(&self, endpoint: &str, writer: &PriceWriter) -> Result<u64> {
        let url = Url::parse(endpoint).map_err(|e| Error::WebSocket(e.to_string()))?;

        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| Error::WebSocket(e.to_string()))?;
        info!(%endpoint, "Connected to price feed");

        let (mut write, mut read) = ws_stream.split();
        let mut published = 0u64;
        let mut awaiting_pong = false;

        loop {
            let msg = match tokio::time::timeout(self.idle_timeout, read.next()).await {
                Ok(Some(msg)) => msg.map_err(|e| Error::WebSocket(e.to_string()))?,
                Ok(None) => break,
                Err(_) if !awaiting_pong => {
                    warn!(%endpoint, idle = ?self.idle_timeout, "Price feed idle, sending ping");
                    write
                        .send(Message::Ping(Vec::new()))
                        .await
                        .map_err(|e| Error::WebSocket(e.to_string()))?;
                    awaiting_pong = true;
                    continue;
                }
                Err(_) => {
                    return Err(Error::WebSocket(format!(
                        "no data for {:?} after ping",
                        self.idle_timeout
                    )));
                }
            };
            // Any frame, pong included, proves the connection is alive.
            awaiting_pong = false;

            if let Message::Text(text) = msg {
                match parse_trade_event(&text) {
                    Ok(Some(tick)) => {
                        writer.publish(tick);
                        published += 1;
                    }
                    Ok(None) => {} // non-trade message, skip
                    Err(e) => {
                        warn!(error = %e, "Failed to parse trade event");
                    }
                }
            }
        }

        Ok(published)
    }
}

#[async_trait]
impl PriceSource for BinanceTradeStream {
    /// Run forever, failing over between endpoints.
    async fn run(self, writer: PriceWriter) {
        if self.endpoints.is_empty() {
            warn!("No price feed endpoints configured; price stream not started");
            return;
        }

        let mut backoff = INITIAL_BACKOFF;

        loop {
            let mut delivered = false;

            for endpoint in &self.endpoints {
                info!(%endpoint, "Connecting to price feed");
                match self.connect_once(endpoint, &writer).await {
                    Ok(count) => {
                        info!(%endpoint, prices = count, "Price feed closed, failing over");
                        delivered |= count > 0;
                    }
                    Err(e) => {
                        warn!(%endpoint, error = %e, "Price feed error, failing over");
                    }
                }
            }

            if delivered {
                backoff = INITIAL_BACKOFF;
            }
            warn!(backoff = ?backoff, "All price feed endpoints exhausted, retrying");
            tokio::time::sleep(backoff).await;
            if !delivered {
                backoff = next_backoff(backoff);
            }
        }
    }
}

fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_BACKOFF)
}

// ─── Binance trade JSON parsing ──────────────────────────────────────────────

#[derive(Deserialize)]
struct TradeEvent {
    #[serde(rename = "p")]
    price: String,
    #[serde(rename = "T")]
    trade_time_ms: Option<i64>,
}

fn parse_trade_event(text: &str) -> Result<Option<PriceTick>> {
    // Trade messages have an "e" field set to "trade"
    let wrapper: serde_json::Value = serde_json::from_str(text)?;
    if wrapper.get("e").and_then(|v| v.as_str()) != Some("trade") {
        return Ok(None);
    }

    let event: TradeEvent = serde_json::from_value(wrapper)?;
    let price: Decimal = event
        .price
        .parse()
        .map_err(|e| Error::PriceFeed(format!("bad price '{}': {e}", event.price)))?;
    if price <= Decimal::ZERO {
        return Err(Error::PriceFeed(format!("non-positive price {price}")));
    }

    let observed_at: DateTime<Utc> = event
        .trade_time_ms
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or_else(Utc::now);

    Ok(Some(PriceTick { price, observed_at }))
}
