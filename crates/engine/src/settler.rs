use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{error, info};

use common::{Direction, Result, TradeRecord, Window, WindowBounds};
use ledger::Ledger;
use strategy::{apply_pnl, settle, WindowConfig};

/// Prices sampled for a window up to and including the signal instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowObservation {
    pub bounds: WindowBounds,
    pub open_price: Decimal,
    pub signal_price: Decimal,
}

/// Turns resolved windows into ledger writes.
///
/// This is the only component that calls `Ledger::apply_settlement`. A failed
/// write is logged as a ledger consistency problem and returned; it is never
/// retried, since a retry after an ambiguous failure could settle twice.
pub struct Settler<L> {
    ledger: Arc<L>,
    order_size: Decimal,
    rebate: Decimal,
}

impl<L: Ledger> Settler<L> {
    pub fn new(ledger: Arc<L>, config: &WindowConfig) -> Self {
        Self {
            ledger,
            order_size: config.order_size,
            rebate: config.rebate,
        }
    }

    /// Record a window where no bet was placed. The balance is unchanged.
    pub async fn record_skip(
        &self,
        observed: &WindowObservation,
        settled_at: DateTime<Utc>,
    ) -> Result<TradeRecord> {
        let window = Window::skipped(observed.bounds, observed.open_price, observed.signal_price);
        self.commit(window, settled_at).await
    }

    /// Resolve a bet against `close_price` and apply the pnl.
    pub async fn settle_bet(
        &self,
        observed: &WindowObservation,
        direction: Direction,
        entry_price: Decimal,
        close_price: Decimal,
        settled_at: DateTime<Utc>,
    ) -> Result<TradeRecord> {
        let settlement = settle(
            direction,
            observed.open_price,
            close_price,
            self.order_size,
            entry_price,
            self.rebate,
        );

        let window = Window {
            bounds: observed.bounds,
            open_price: observed.open_price,
            signal_price: observed.signal_price,
            close_price,
            direction: Some(direction),
            entry_price,
            outcome: settlement.outcome,
            pnl: settlement.pnl,
        };
        let record = self.commit(window, settled_at).await?;

        info!(
            outcome = %settlement.outcome,
            close = %close_price,
            actual = %settlement.actual,
            pnl = %settlement.pnl,
            balance = %record.balance_after,
            "Window settled"
        );
        Ok(record)
    }

    async fn commit(&self, window: Window, settled_at: DateTime<Utc>) -> Result<TradeRecord> {
        let window_start = window.bounds.start;

        let before = self.ledger.read_balance().await.map_err(|e| {
            error!(window_start, error = %e, "Ledger read failed before settlement");
            e
        })?;

        let record = TradeRecord {
            timestamp: settled_at,
            balance_after: apply_pnl(before, window.pnl),
            window,
        };

        if let Err(e) = self.ledger.apply_settlement(&record).await {
            error!(
                window_start,
                outcome = %record.window.outcome,
                pnl = %record.window.pnl,
                error = %e,
                "LEDGER CONSISTENCY: settlement write rolled back; window will not be retried"
            );
            return Err(e);
        }
        Ok(record)
    }
}
