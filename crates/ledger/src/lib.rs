pub mod sqlite;

pub use sqlite::SqliteLedger;

use async_trait::async_trait;
use rust_decimal::Decimal;

use common::{Outcome, Result, TradeRecord};

/// Durable balance plus append-only window history.
///
/// The scheduler is the only writer. Reporting tools read the same store and
/// never write to it.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Create the schema and the balance entry. The balance is written only
    /// if absent, so restarting never resets it.
    async fn initialize(&self, initial_balance: Decimal) -> Result<()>;

    /// Current balance. Fails with `Error::StorageUnavailable` if the store
    /// cannot be read or the entry is missing.
    async fn read_balance(&self) -> Result<Decimal>;

    /// Set the balance to `record.balance_after` and append `record`, as one
    /// transaction. On error neither change is visible. A window can be
    /// applied at most once.
    async fn apply_settlement(&self, record: &TradeRecord) -> Result<()>;

    /// All records, oldest first.
    async fn records(&self) -> Result<Vec<TradeRecord>>;

    async fn summary(&self) -> Result<LedgerSummary>;
}

/// Aggregate view of the ledger, logged at startup.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LedgerSummary {
    pub balance: Decimal,
    pub windows: u64,
    pub wins: u64,
    pub losses: u64,
    pub skips: u64,
    pub total_pnl: Decimal,
}

impl LedgerSummary {
    pub fn from_records(balance: Decimal, records: &[TradeRecord]) -> Self {
        let mut summary = LedgerSummary {
            balance,
            ..Default::default()
        };
        for r in records {
            summary.windows += 1;
            match r.window.outcome {
                Outcome::Win => summary.wins += 1,
                Outcome::Loss => summary.losses += 1,
                Outcome::Skip => summary.skips += 1,
            }
            summary.total_pnl += r.window.pnl;
        }
        summary
    }

    pub fn bets(&self) -> u64 {
        self.wins + self.losses
    }

    /// Percentage of bets won; zero before the first bet.
    pub fn win_rate_pct(&self) -> Decimal {
        if self.bets() == 0 {
            return Decimal::ZERO;
        }
        (Decimal::from(self.wins) * Decimal::ONE_HUNDRED / Decimal::from(self.bets())).round_dp(2)
    }
}
