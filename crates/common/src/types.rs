use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Text format used for every timestamp column in the ledger (UTC).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Convert epoch seconds to a UTC timestamp.
pub fn epoch_to_utc(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
}

pub fn format_epoch(secs: i64) -> String {
    epoch_to_utc(secs).format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_epoch(text: &str) -> Option<i64> {
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc().timestamp())
}

/// One trade observed on the price feed. Only the price matters to the
/// window logic; the timestamp is kept for staleness diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceTick {
    pub price: Decimal,
    pub observed_at: DateTime<Utc>,
}

/// Predicted or realized price direction over a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "UP",
            Direction::Down => "DOWN",
        }
    }

    /// Column value for an optional bet; `NONE` when the window was skipped.
    pub fn label(direction: Option<Direction>) -> &'static str {
        direction.map(|d| d.as_str()).unwrap_or("NONE")
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UP" => Ok(Direction::Up),
            "DOWN" => Ok(Direction::Down),
            other => Err(format!("unknown direction '{other}'")),
        }
    }
}

/// Result of a window from the bettor's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum Outcome {
    Win,
    Loss,
    Skip,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Win => write!(f, "WIN"),
            Outcome::Loss => write!(f, "LOSS"),
            Outcome::Skip => write!(f, "SKIP"),
        }
    }
}

impl FromStr for Outcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WIN" => Ok(Outcome::Win),
            "LOSS" => Ok(Outcome::Loss),
            "SKIP" => Ok(Outcome::Skip),
            other => Err(format!("unknown outcome '{other}'")),
        }
    }
}

/// Wall-clock boundaries of one window, in epoch seconds.
/// `start` is always a multiple of the window length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowBounds {
    pub start: i64,
    pub end: i64,
}

impl WindowBounds {
    pub fn new(start: i64, window_seconds: u32) -> Self {
        Self {
            start,
            end: start + i64::from(window_seconds),
        }
    }

    /// Instant at which the move is evaluated: `offset` seconds before close.
    pub fn signal_at(&self, offset_seconds: u32) -> i64 {
        self.end - i64::from(offset_seconds)
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        epoch_to_utc(self.start)
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        epoch_to_utc(self.end)
    }
}

/// A fully resolved window. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub bounds: WindowBounds,
    pub open_price: Decimal,
    pub signal_price: Decimal,
    /// Equal to `signal_price` for skipped windows.
    pub close_price: Decimal,
    pub direction: Option<Direction>,
    /// Zero when no bet was placed.
    pub entry_price: Decimal,
    pub outcome: Outcome,
    pub pnl: Decimal,
}

impl Window {
    /// A window where the move never reached the threshold.
    pub fn skipped(bounds: WindowBounds, open_price: Decimal, signal_price: Decimal) -> Self {
        Self {
            bounds,
            open_price,
            signal_price,
            close_price: signal_price,
            direction: None,
            entry_price: Decimal::ZERO,
            outcome: Outcome::Skip,
            pnl: Decimal::ZERO,
        }
    }
}

/// Durable, append-only row written once per window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeRecord {
    /// When the record was written.
    pub timestamp: DateTime<Utc>,
    pub window: Window,
    pub balance_after: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_text_round_trips_through_ledger_format() {
        let text = format_epoch(1_700_000_100);
        assert_eq!(text, "2023-11-14 22:15:00");
        assert_eq!(parse_epoch(&text), Some(1_700_000_100));
    }

    #[test]
    fn parse_epoch_rejects_garbage() {
        assert_eq!(parse_epoch("yesterday"), None);
    }

    #[test]
    fn bounds_signal_instant_precedes_close() {
        let bounds = WindowBounds::new(600, 300);
        assert_eq!(bounds.end, 900);
        assert_eq!(bounds.signal_at(10), 890);
    }

    #[test]
    fn skipped_window_closes_at_signal_price() {
        let bounds = WindowBounds::new(0, 300);
        let w = Window::skipped(bounds, Decimal::new(50000, 0), Decimal::new(50002, 0));
        assert_eq!(w.close_price, w.signal_price);
        assert_eq!(w.outcome, Outcome::Skip);
        assert_eq!(w.pnl, Decimal::ZERO);
        assert_eq!(Direction::label(w.direction), "NONE");
    }

    #[test]
    fn enum_labels_parse_back() {
        for d in [Direction::Up, Direction::Down] {
            assert_eq!(d.as_str().parse::<Direction>().unwrap(), d);
        }
        for o in [Outcome::Win, Outcome::Loss, Outcome::Skip] {
            assert_eq!(o.to_string().parse::<Outcome>().unwrap(), o);
        }
        assert!("NONE".parse::<Direction>().is_err());
    }
}
