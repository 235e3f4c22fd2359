use std::path::Path;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::info;

use common::{Error, Result};

/// Window strategy parameters (TOML). Every field is optional.
///
/// Example `config/window.toml`:
/// ```toml
/// window_seconds = 300
/// signal_offset_seconds = 10
/// min_move = 5.0
/// entry_price = 0.92
/// order_size = 10.0
/// rebate = 0.005
/// initial_balance = 100.0
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowConfig {
    /// Window length. Window starts are aligned to multiples of this.
    pub window_seconds: u32,
    /// How long before the close the move is evaluated.
    pub signal_offset_seconds: u32,
    /// Minimum absolute price move (quote currency) required to bet.
    pub min_move: Decimal,
    /// Price paid per share, in (0, 1).
    pub entry_price: Decimal,
    /// Notional spent per bet.
    pub order_size: Decimal,
    /// Credit applied to every filled bet, win or lose.
    pub rebate: Decimal,
    /// Balance written on first start only.
    pub initial_balance: Decimal,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            window_seconds: 300,
            signal_offset_seconds: 10,
            min_move: dec!(5.0),
            entry_price: dec!(0.92),
            order_size: dec!(10.0),
            rebate: dec!(0.005),
            initial_balance: dec!(100.0),
        }
    }
}

impl WindowConfig {
    /// Load from a TOML file and validate. A missing file yields defaults;
    /// an unreadable or malformed one is a configuration error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "No window config file, using defaults");
            let cfg = Self::default();
            cfg.validate()?;
            return Ok(cfg);
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
            .map_err(|e| Error::Config(format!("'{}': {e}", path.display())))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let cfg: Self =
            toml::from_str(content).map_err(|e| Error::Config(format!("parse error: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject parameter combinations that would make windows degenerate or
    /// payoffs undefined. Called once at startup, never at a window boundary.
    pub fn validate(&self) -> Result<()> {
        if self.window_seconds == 0 {
            return Err(Error::Config("window_seconds must be > 0".into()));
        }
        if self.signal_offset_seconds == 0 {
            return Err(Error::Config("signal_offset_seconds must be > 0".into()));
        }
        if self.signal_offset_seconds >= self.window_seconds {
            return Err(Error::Config(format!(
                "signal_offset_seconds ({}) must be less than window_seconds ({})",
                self.signal_offset_seconds, self.window_seconds
            )));
        }
        if self.entry_price <= Decimal::ZERO || self.entry_price >= Decimal::ONE {
            return Err(Error::Config(format!(
                "entry_price must be in (0, 1), got {}",
                self.entry_price
            )));
        }
        if self.order_size <= Decimal::ZERO {
            return Err(Error::Config("order_size must be > 0".into()));
        }
        if self.min_move.is_sign_negative() {
            return Err(Error::Config("min_move must be >= 0".into()));
        }
        if self.rebate.is_sign_negative() {
            return Err(Error::Config("rebate must be >= 0".into()));
        }
        if self.initial_balance.is_sign_negative() {
            return Err(Error::Config("initial_balance must be >= 0".into()));
        }

        // Settlement divides and multiplies these; make sure the largest
        // payoff and the balance after it fit in a Decimal.
        let max_payoff = self
            .order_size
            .checked_div(self.entry_price)
            .and_then(|shares| shares.checked_mul(Decimal::ONE - self.entry_price))
            .and_then(|win| win.max(self.order_size).checked_add(self.rebate))
            .and_then(|payoff| payoff.checked_add(self.initial_balance));
        if max_payoff.is_none() {
            return Err(Error::Config(format!(
                "order_size {} at entry_price {} overflows payoff arithmetic",
                self.order_size, self.entry_price
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        WindowConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let cfg = WindowConfig::from_toml("window_seconds = 60\nsignal_offset_seconds = 5\n")
            .unwrap();
        assert_eq!(cfg.window_seconds, 60);
        assert_eq!(cfg.signal_offset_seconds, 5);
        assert_eq!(cfg.entry_price, dec!(0.92));
    }

    #[test]
    fn decimal_fields_parse_from_toml_numbers() {
        let cfg = WindowConfig::from_toml("min_move = 2.5\norder_size = 20\nrebate = 0.01\n")
            .unwrap();
        assert_eq!(cfg.min_move, dec!(2.5));
        assert_eq!(cfg.order_size, dec!(20));
        assert_eq!(cfg.rebate, dec!(0.01));
    }

    #[test]
    fn signal_offset_not_below_window_is_rejected() {
        let err = WindowConfig::from_toml("window_seconds = 10\nsignal_offset_seconds = 10\n")
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let cfg = WindowConfig {
            signal_offset_seconds: 400,
            ..WindowConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn entry_price_outside_unit_interval_is_rejected() {
        for entry in [dec!(0), dec!(1), dec!(1.5), dec!(-0.2)] {
            let cfg = WindowConfig {
                entry_price: entry,
                ..WindowConfig::default()
            };
            assert!(cfg.validate().is_err(), "entry_price {entry} accepted");
        }
    }

    #[test]
    fn payoff_overflow_is_rejected() {
        let cfg = WindowConfig {
            order_size: dec!(10000000000000000000000),
            entry_price: dec!(0.0000000001),
            ..WindowConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let cfg = WindowConfig {
            order_size: Decimal::MAX,
            ..WindowConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unknown_key_is_rejected() {
        assert!(WindowConfig::from_toml("windw_seconds = 60\n").is_err());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = WindowConfig::load("/nonexistent/window-config.toml").unwrap();
        assert_eq!(cfg, WindowConfig::default());
    }
}
