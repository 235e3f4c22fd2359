use std::future::Future;
use std::sync::Arc;

use tracing::{info, warn};

use common::{latest_price, Clock, LatestPrice, PriceSource, PriceWriter, Result};
use ledger::Ledger;
use strategy::WindowConfig;

use crate::scheduler::WindowScheduler;

/// Runs price ingestion and the window scheduler side by side for the life
/// of the process, wired through one shared latest-price cell.
pub struct Engine<S, L, C> {
    source: S,
    writer: PriceWriter,
    price: LatestPrice,
    scheduler: WindowScheduler<L, C>,
}

impl<S, L, C> Engine<S, L, C>
where
    S: PriceSource,
    L: Ledger + 'static,
    C: Clock + 'static,
{
    /// Validates `config` up front, before any task is spawned.
    pub fn new(source: S, config: WindowConfig, ledger: Arc<L>, clock: Arc<C>) -> Result<Self> {
        let (writer, price) = latest_price();
        let scheduler = WindowScheduler::new(config, price.clone(), ledger, clock)?;
        Ok(Self {
            source,
            writer,
            price,
            scheduler,
        })
    }

    /// Read handle on the latest price, for observers.
    pub fn latest_price(&self) -> LatestPrice {
        self.price.clone()
    }

    /// Run until `shutdown` resolves or the scheduler stops with an error.
    ///
    /// On shutdown the in-flight window is dropped. Any ledger transaction it
    /// had open is rolled back, so the window is simply absent and will be
    /// rebuilt from wall-clock boundaries on restart.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let Engine {
            source,
            writer,
            scheduler,
            ..
        } = self;

        info!("Starting price feed");
        let feed = tokio::spawn(source.run(writer));

        let result = tokio::select! {
            result = scheduler.run() => result,
            _ = shutdown => {
                info!("Shutdown requested, discarding in-flight window");
                Ok(())
            }
        };

        feed.abort();
        if let Err(e) = &result {
            warn!(error = %e, "Engine stopped");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use common::{Error, Outcome};
    use rust_decimal_macros::dec;
    use tokio::sync::oneshot;

    use crate::testing::{memory_ledger, ConstantSource, FailingLedger, ScriptedClock};

    #[tokio::test]
    async fn feed_prices_reach_the_scheduler_until_shutdown() {
        let ledger = memory_ledger(dec!(100)).await;
        let clock = Arc::new(ScriptedClock::new(250, None, |_| None));
        let engine = Engine::new(
            ConstantSource(dec!(50000)),
            WindowConfig::default(),
            ledger.clone(),
            clock,
        )
        .unwrap();
        let price = engine.latest_price();

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(engine.run(async {
            let _ = stop_rx.await;
        }));

        let mut windows = 0;
        for _ in 0..200 {
            windows = ledger.records().await.unwrap().len();
            if windows >= 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(windows >= 3, "expected at least 3 windows, got {windows}");
        assert_eq!(price.current().map(|t| t.price), Some(dec!(50000)));

        stop_tx.send(()).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("timeout")
            .expect("join");
        assert!(result.is_ok());

        // A constant price never moves, so every window is a skip.
        let records = ledger.records().await.unwrap();
        assert!(records.iter().all(|r| r.window.outcome == Outcome::Skip));
        assert_eq!(ledger.read_balance().await.unwrap(), dec!(100));
    }

    #[tokio::test]
    async fn ledger_failure_ends_the_engine_with_an_error() {
        let ledger = FailingLedger::new(dec!(100)).await;
        let clock = Arc::new(ScriptedClock::new(250, None, |_| None));
        let engine = Engine::new(
            ConstantSource(dec!(50000)),
            WindowConfig::default(),
            ledger.clone(),
            clock,
        )
        .unwrap();

        let result = tokio::time::timeout(
            Duration::from_secs(1),
            engine.run(std::future::pending::<()>()),
        )
        .await
        .expect("engine must stop on its own");
        assert!(matches!(result, Err(Error::LedgerWrite(_))));
    }

    #[tokio::test]
    async fn invalid_config_fails_before_spawning() {
        let ledger = memory_ledger(dec!(100)).await;
        let clock = Arc::new(ScriptedClock::new(0, None, |_| None));
        let config = WindowConfig {
            window_seconds: 10,
            signal_offset_seconds: 15,
            ..WindowConfig::default()
        };
        let result = Engine::new(ConstantSource(dec!(1)), config, ledger, clock);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
