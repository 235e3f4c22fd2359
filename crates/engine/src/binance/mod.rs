pub mod stream;

pub use stream::BinanceTradeStream;
