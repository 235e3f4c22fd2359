pub mod config;
pub mod decision;
pub mod settlement;

pub use config::WindowConfig;
pub use decision::{decide, Decision};
pub use settlement::{apply_pnl, settle, Settlement, MONEY_DP};
