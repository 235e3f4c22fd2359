pub mod clock;
pub mod config;
pub mod error;
pub mod price;
pub mod source;
pub mod types;

pub use clock::{Clock, SystemClock};
pub use config::Config;
pub use error::{Error, Result};
pub use price::{latest_price, LatestPrice, PriceWriter};
pub use source::PriceSource;
pub use types::*;
