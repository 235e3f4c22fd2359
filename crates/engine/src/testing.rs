//! Deterministic clock, price source and failing ledger for engine tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use common::{
    epoch_to_utc, Clock, Error, PriceSource, PriceTick, PriceWriter, Result, TradeRecord,
};
use ledger::{Ledger, LedgerSummary, SqliteLedger};

type PriceScript = Box<dyn Fn(i64) -> Option<Decimal> + Send + Sync>;

/// Clock that jumps straight to each requested deadline (plus an optional
/// lag) and, if a writer is attached, publishes the scripted price for that
/// instant before returning.
pub struct ScriptedClock {
    now: Mutex<DateTime<Utc>>,
    lag: chrono::Duration,
    writer: Option<PriceWriter>,
    script: PriceScript,
    deadlines: Mutex<Vec<i64>>,
}

impl ScriptedClock {
    pub fn new(
        start_epoch: i64,
        writer: Option<PriceWriter>,
        script: impl Fn(i64) -> Option<Decimal> + Send + Sync + 'static,
    ) -> Self {
        Self {
            now: Mutex::new(epoch_to_utc(start_epoch)),
            lag: chrono::Duration::zero(),
            writer,
            script: Box::new(script),
            deadlines: Mutex::new(Vec::new()),
        }
    }

    pub fn starting_at(self, now: DateTime<Utc>) -> Self {
        *self.now.lock().unwrap() = now;
        self
    }

    pub fn with_lag(mut self, lag: chrono::Duration) -> Self {
        self.lag = lag;
        self
    }

    pub fn publish(&self, price: Decimal) {
        if let Some(writer) = &self.writer {
            writer.publish(PriceTick {
                price,
                observed_at: self.now(),
            });
        }
    }

    /// Every deadline passed to `sleep_until`, in call order (epoch seconds).
    pub fn deadlines(&self) -> Vec<i64> {
        self.deadlines.lock().unwrap().clone()
    }
}

#[async_trait]
impl Clock for ScriptedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    async fn sleep_until(&self, deadline: DateTime<Utc>) {
        self.deadlines.lock().unwrap().push(deadline.timestamp());
        {
            let mut now = self.now.lock().unwrap();
            if deadline > *now {
                *now = deadline + self.lag;
            }
        }
        if let Some(price) = (self.script)(deadline.timestamp()) {
            self.publish(price);
        }
        tokio::task::yield_now().await;
    }
}

/// Publishes one fixed price and then stays connected forever.
pub struct ConstantSource(pub Decimal);

#[async_trait]
impl PriceSource for ConstantSource {
    async fn run(self, writer: PriceWriter) {
        writer.publish(PriceTick {
            price: self.0,
            observed_at: Utc::now(),
        });
        std::future::pending::<()>().await;
    }
}

/// Ledger whose writes always fail. Counts write attempts.
pub struct FailingLedger {
    inner: SqliteLedger,
    pub writes: AtomicUsize,
}

impl FailingLedger {
    pub async fn new(initial_balance: Decimal) -> Arc<Self> {
        let inner = SqliteLedger::in_memory().await.unwrap();
        inner.initialize(initial_balance).await.unwrap();
        Arc::new(Self {
            inner,
            writes: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Ledger for FailingLedger {
    async fn initialize(&self, initial_balance: Decimal) -> Result<()> {
        self.inner.initialize(initial_balance).await
    }

    async fn read_balance(&self) -> Result<Decimal> {
        self.inner.read_balance().await
    }

    async fn apply_settlement(&self, _record: &TradeRecord) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Err(Error::LedgerWrite("disk I/O error".into()))
    }

    async fn records(&self) -> Result<Vec<TradeRecord>> {
        self.inner.records().await
    }

    async fn summary(&self) -> Result<LedgerSummary> {
        self.inner.summary().await
    }
}

pub async fn memory_ledger(initial_balance: Decimal) -> Arc<SqliteLedger> {
    let ledger = SqliteLedger::in_memory().await.unwrap();
    ledger.initialize(initial_balance).await.unwrap();
    Arc::new(ledger)
}
