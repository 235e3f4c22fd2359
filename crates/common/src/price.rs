use tokio::sync::watch;

use crate::{Error, PriceTick, Result};

/// Create the shared latest-price cell.
///
/// The `PriceWriter` goes to the feed task (single writer); `LatestPrice`
/// handles are cloned into every reader. Reads never observe a torn value and
/// no lock is held across an `.await`.
pub fn latest_price() -> (PriceWriter, LatestPrice) {
    let (tx, rx) = watch::channel(None);
    (PriceWriter { tx }, LatestPrice { rx })
}

/// Write side of the latest-price cell. Owned by the ingestion task.
pub struct PriceWriter {
    tx: watch::Sender<Option<PriceTick>>,
}

impl PriceWriter {
    /// Replace the latest price. Succeeds even when no reader is attached.
    pub fn publish(&self, tick: PriceTick) {
        self.tx.send_replace(Some(tick));
    }
}

/// Read side of the latest-price cell.
#[derive(Clone)]
pub struct LatestPrice {
    rx: watch::Receiver<Option<PriceTick>>,
}

impl LatestPrice {
    /// Most recent tick, or `None` if the feed has not delivered one yet.
    pub fn current(&self) -> Option<PriceTick> {
        *self.rx.borrow()
    }

    /// Suspend until the feed has delivered at least one tick.
    /// Fails only if the writer was dropped before any price arrived.
    pub async fn wait_first(&mut self) -> Result<PriceTick> {
        let tick = self
            .rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| Error::PriceFeed("price feed closed before first tick".into()))?;
        (*tick).ok_or_else(|| Error::PriceFeed("price feed delivered an empty tick".into()))
    }
}
