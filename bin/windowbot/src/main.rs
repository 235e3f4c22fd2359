use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use common::{Config, Result, SystemClock};
use engine::{BinanceTradeStream, Engine};
use ledger::{Ledger, SqliteLedger};
use strategy::WindowConfig;

#[tokio::main]
async fn main() {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        error!(error = %e, "WindowBot stopped");
        std::process::exit(1);
    }
    info!("Shutdown complete");
}

async fn run() -> Result<()> {
    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env()?;
    let window_cfg = WindowConfig::load(&cfg.strategy_config_path)?;
    info!(
        window_seconds = window_cfg.window_seconds,
        signal_offset_seconds = window_cfg.signal_offset_seconds,
        min_move = %window_cfg.min_move,
        entry_price = %window_cfg.entry_price,
        order_size = %window_cfg.order_size,
        feeds = cfg.price_feed_urls.len(),
        "WindowBot starting"
    );

    // ── Ledger ────────────────────────────────────────────────────────────────
    let ledger = SqliteLedger::connect(&cfg.database_url).await?;
    ledger.initialize(window_cfg.initial_balance).await?;
    let summary = ledger.summary().await?;
    info!(
        balance = %summary.balance,
        windows = summary.windows,
        wins = summary.wins,
        losses = summary.losses,
        skips = summary.skips,
        win_rate_pct = %summary.win_rate_pct(),
        total_pnl = %summary.total_pnl,
        "Ledger ready"
    );

    // ── Engine ────────────────────────────────────────────────────────────────
    let engine = Engine::new(
        BinanceTradeStream::new(cfg.price_feed_urls),
        window_cfg,
        Arc::new(ledger),
        Arc::new(SystemClock),
    )?;

    info!("All subsystems started. Waiting for shutdown signal.");
    engine
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("Shutdown signal received");
        })
        .await
}
