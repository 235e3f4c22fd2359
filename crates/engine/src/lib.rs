pub mod binance;
pub mod lifecycle;
pub mod scheduler;
pub mod settler;

#[cfg(test)]
mod testing;

pub use binance::BinanceTradeStream;
pub use lifecycle::Engine;
pub use scheduler::{next_window_start, WindowScheduler};
pub use settler::{Settler, WindowObservation};
