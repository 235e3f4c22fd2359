use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use common::{
    epoch_to_utc, format_epoch, parse_epoch, Direction, Error, Outcome, Result, TradeRecord,
    Window, WindowBounds, TIMESTAMP_FORMAT,
};

use crate::{Ledger, LedgerSummary};

/// Key of the balance row in the `state` table.
pub const BALANCE_KEY: &str = "balance";

/// SQLite-backed ledger. Schema lives in `migrations/` and is applied by
/// `initialize`.
#[derive(Clone)]
pub struct SqliteLedger {
    pool: SqlitePool,
}

impl SqliteLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database at `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| Error::StorageUnavailable(format!("cannot open '{database_url}': {e}")))?;
        Ok(Self::new(pool))
    }

    /// Private in-memory database. Pinned to one connection that is never
    /// recycled, since every SQLite memory connection is its own database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Ledger for SqliteLedger {
    async fn initialize(&self, initial_balance: Decimal) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;

        let inserted = sqlx::query(
            "INSERT INTO state (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO NOTHING",
        )
        .bind(BALANCE_KEY)
        .bind(initial_balance.to_string())
        .execute(&self.pool)
        .await?;

        if inserted.rows_affected() == 1 {
            info!(balance = %initial_balance, "Ledger created with initial balance");
        } else {
            debug!("Ledger already initialized, keeping stored balance");
        }
        Ok(())
    }

    async fn read_balance(&self) -> Result<Decimal> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM state WHERE key = ?1")
            .bind(BALANCE_KEY)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;

        let (value,) =
            row.ok_or_else(|| Error::StorageUnavailable("balance entry is missing".into()))?;
        value
            .parse::<Decimal>()
            .map_err(|e| Error::StorageUnavailable(format!("stored balance '{value}' is corrupt: {e}")))
    }

    async fn apply_settlement(&self, record: &TradeRecord) -> Result<()> {
        let w = &record.window;

        // Dropping `tx` on any early return rolls back both statements.
        let mut tx = self.pool.begin().await.map_err(write_failed)?;

        let updated = sqlx::query("UPDATE state SET value = ?1 WHERE key = ?2")
            .bind(record.balance_after.to_string())
            .bind(BALANCE_KEY)
            .execute(&mut *tx)
            .await
            .map_err(write_failed)?;
        if updated.rows_affected() != 1 {
            return Err(Error::LedgerWrite(
                "balance entry is missing; ledger was not initialized".into(),
            ));
        }

        sqlx::query(
            r#"
            INSERT INTO trades (timestamp, window_start, window_end, open_price, signal_price,
                                close_price, direction_bet, entry_price, outcome, pnl, balance_after)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(record.timestamp.format(TIMESTAMP_FORMAT).to_string())
        .bind(format_epoch(w.bounds.start))
        .bind(format_epoch(w.bounds.end))
        .bind(w.open_price.to_string())
        .bind(w.signal_price.to_string())
        .bind(w.close_price.to_string())
        .bind(Direction::label(w.direction))
        .bind(w.entry_price.to_string())
        .bind(w.outcome)
        .bind(w.pnl.to_string())
        .bind(record.balance_after.to_string())
        .execute(&mut *tx)
        .await
        .map_err(write_failed)?;

        tx.commit().await.map_err(write_failed)?;

        debug!(
            window_start = w.bounds.start,
            outcome = %w.outcome,
            pnl = %w.pnl,
            balance = %record.balance_after,
            "Settlement committed"
        );
        Ok(())
    }

    async fn records(&self) -> Result<Vec<TradeRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT timestamp, window_start, window_end, open_price, signal_price, close_price,
                   direction_bet, entry_price, outcome, pnl, balance_after
            FROM trades ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::StorageUnavailable(e.to_string()))?;

        rows.iter().map(record_from_row).collect()
    }

    async fn summary(&self) -> Result<LedgerSummary> {
        let balance = self.read_balance().await?;
        let records = self.records().await?;
        Ok(LedgerSummary::from_records(balance, &records))
    }
}

fn write_failed(e: sqlx::Error) -> Error {
    Error::LedgerWrite(e.to_string())
}

fn record_from_row(row: &SqliteRow) -> Result<TradeRecord> {
    let corrupt = |col: &str, detail: String| {
        Error::StorageUnavailable(format!("trades.{col} is corrupt: {detail}"))
    };
    let text = |col: &str| -> Result<String> {
        row.try_get::<String, _>(col)
            .map_err(|e| corrupt(col, e.to_string()))
    };
    let decimal = |col: &str| -> Result<Decimal> {
        let value = text(col)?;
        value.parse::<Decimal>().map_err(|e| corrupt(col, format!("'{value}': {e}")))
    };
    let epoch = |col: &str| -> Result<i64> {
        let value = text(col)?;
        parse_epoch(&value).ok_or_else(|| corrupt(col, format!("'{value}' is not a timestamp")))
    };

    let direction = match text("direction_bet")?.as_str() {
        "NONE" => None,
        other => Some(
            other
                .parse::<Direction>()
                .map_err(|e| corrupt("direction_bet", e))?,
        ),
    };
    let outcome: Outcome = row
        .try_get("outcome")
        .map_err(|e| corrupt("outcome", e.to_string()))?;

    let start = epoch("window_start")?;
    let end = epoch("window_end")?;

    Ok(TradeRecord {
        timestamp: epoch_to_utc(epoch("timestamp")?),
        window: Window {
            bounds: WindowBounds { start, end },
            open_price: decimal("open_price")?,
            signal_price: decimal("signal_price")?,
            close_price: decimal("close_price")?,
            direction,
            entry_price: decimal("entry_price")?,
            outcome,
            pnl: decimal("pnl")?,
        },
        balance_after: decimal("balance_after")?,
    })
}
