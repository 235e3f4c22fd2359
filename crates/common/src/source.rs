use async_trait::async_trait;

use crate::PriceWriter;

/// Abstraction over the live price transport.
///
/// `BinanceTradeStream` implements this against Binance trade streams. Tests
/// implement it with scripted ticks. Implementations own reconnection and
/// failover; they publish every parsed trade price through `writer` and only
/// return when the source is permanently exhausted.
#[async_trait]
pub trait PriceSource: Send + 'static {
    async fn run(self, writer: PriceWriter);
}
