use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};

use common::{
    epoch_to_utc, format_epoch, Clock, Error, LatestPrice, Result, TradeRecord, WindowBounds,
};
use ledger::Ledger;
use strategy::{decide, Decision, WindowConfig};

use crate::settler::{Settler, WindowObservation};

/// A sampled price older than this is logged as stale. It is still used.
const STALE_PRICE_AFTER_SECS: i64 = 30;

/// A wake this close after the previous window's end still runs the
/// adjacent window.
const LATE_WAKE_TOLERANCE_MS: i64 = 1_000;

/// Start of the first window at or after `now` (epoch seconds).
///
/// An instant exactly on a boundary is that boundary; anything else, even a
/// fraction of a second past one, gets the next multiple of `window_seconds`.
pub fn next_window_start(now: DateTime<Utc>, window_seconds: u32) -> i64 {
    let len = i64::from(window_seconds);
    let secs = now.timestamp();
    let into_window = secs.rem_euclid(len);
    if into_window == 0 && now.timestamp_subsec_nanos() == 0 {
        secs
    } else {
        secs - into_window + len
    }
}

/// Drives the open → signal → close cycle of consecutive windows.
///
/// Every wait targets an absolute wall-clock boundary, so late wake-ups never
/// accumulate drift and missed windows are not replayed. Prices are sampled
/// in real-time order: open, then signal, then close.
pub struct WindowScheduler<L, C> {
    config: WindowConfig,
    price: LatestPrice,
    clock: Arc<C>,
    settler: Settler<L>,
    primed: bool,
    /// End of the last completed window, the next start if we wake on time.
    carried_start: Option<i64>,
}

impl<L: Ledger, C: Clock> WindowScheduler<L, C> {
    /// Fails with `Error::Config` on an invalid window configuration.
    pub fn new(
        config: WindowConfig,
        price: LatestPrice,
        ledger: Arc<L>,
        clock: Arc<C>,
    ) -> Result<Self> {
        config.validate()?;
        let settler = Settler::new(ledger, &config);
        Ok(Self {
            config,
            price,
            clock,
            settler,
            primed: false,
            carried_start: None,
        })
    }

    /// Run windows until a ledger or feed error stops the loop.
    pub async fn run(mut self) -> Result<()> {
        info!(
            window_seconds = self.config.window_seconds,
            signal_offset = self.config.signal_offset_seconds,
            min_move = %self.config.min_move,
            entry_price = %self.config.entry_price,
            "WindowScheduler running"
        );
        loop {
            self.run_cycle().await?;
        }
    }

    /// Run exactly one window from scheduling to its ledger record.
    pub async fn run_cycle(&mut self) -> Result<TradeRecord> {
        if !self.primed {
            info!("Waiting for first price from feed");
            let first = self.price.wait_first().await?;
            info!(price = %first.price, "First price received");
            self.primed = true;
        }

        let now = self.clock.now();
        let start = match self.carried_start.take() {
            Some(start)
                if now - epoch_to_utc(start) < Duration::milliseconds(LATE_WAKE_TOLERANCE_MS) =>
            {
                start
            }
            _ => next_window_start(now, self.config.window_seconds),
        };
        let bounds = WindowBounds::new(start, self.config.window_seconds);
        let wait = bounds.start_time() - now;
        if wait > Duration::zero() {
            info!(
                window_start = %format_epoch(bounds.start),
                wait_secs = wait.num_seconds(),
                "Next window scheduled"
            );
        }

        self.clock.sleep_until(bounds.start_time()).await;
        let open_price = self.sample()?;
        info!(
            window_start = %format_epoch(bounds.start),
            open = %open_price,
            "Window open"
        );

        let signal_at = bounds.signal_at(self.config.signal_offset_seconds);
        self.clock.sleep_until(epoch_to_utc(signal_at)).await;
        let signal_price = self.sample()?;

        let observed = WindowObservation {
            bounds,
            open_price,
            signal_price,
        };
        let delta = signal_price - open_price;

        match decide(
            open_price,
            signal_price,
            self.config.min_move,
            self.config.entry_price,
        ) {
            Decision::Skip => {
                info!(delta = %delta, min_move = %self.config.min_move, "SKIP: move below threshold");
                let record = self
                    .settler
                    .record_skip(&observed, self.clock.now())
                    .await?;
                self.clock.sleep_until(bounds.end_time()).await;
                self.carried_start = Some(bounds.end);
                Ok(record)
            }
            Decision::Bet {
                direction,
                entry_price,
            } => {
                let shares = self.config.order_size / entry_price;
                info!(
                    %direction,
                    delta = %delta,
                    entry = %entry_price,
                    shares = %shares.round_dp(2),
                    "BET placed"
                );

                self.clock.sleep_until(bounds.end_time()).await;
                let close_price = self.sample()?;
                let record = self
                    .settler
                    .settle_bet(
                        &observed,
                        direction,
                        entry_price,
                        close_price,
                        self.clock.now(),
                    )
                    .await?;
                self.carried_start = Some(bounds.end);
                Ok(record)
            }
        }
    }

    fn sample(&self) -> Result<Decimal> {
        let tick = self
            .price
            .current()
            .ok_or_else(|| Error::PriceFeed("no price observed yet".into()))?;

        let age = self.clock.now() - tick.observed_at;
        if age > Duration::seconds(STALE_PRICE_AFTER_SECS) {
            warn!(age_secs = age.num_seconds(), price = %tick.price, "Sampling stale price");
        }
        Ok(tick.price)
    }
}
