use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Price feed error: {0}")]
    PriceFeed(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The ledger could not be read. Fatal at startup: the balance is never
    /// silently reset to a default.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A settlement write was rolled back. Neither the balance nor the
    /// record changed, and the window must not be re-applied.
    #[error("Ledger write failed: {0}")]
    LedgerWrite(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
