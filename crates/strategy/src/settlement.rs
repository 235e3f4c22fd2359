use rust_decimal::Decimal;

use common::{Direction, Outcome};

/// Decimal places kept for pnl and balance.
pub const MONEY_DP: u32 = 4;

/// Resolution of a bet at window close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub outcome: Outcome,
    /// Realized direction. A flat close counts as `Down`.
    pub actual: Direction,
    /// Signed pnl, rounded to `MONEY_DP` places.
    pub pnl: Decimal,
}

/// Resolve a bet against the close price.
///
/// A flat close (`close == open`) is a loss whichever side was bet.
/// Shares bought are `order_size / entry_price`; a win pays `1 - entry_price`
/// per share, a loss forfeits the full `order_size`. The rebate is credited
/// either way. Inputs come from a `WindowConfig` that passed `validate`,
/// which rules out overflow in the payoff arithmetic.
pub fn settle(
    direction: Direction,
    open_price: Decimal,
    close_price: Decimal,
    order_size: Decimal,
    entry_price: Decimal,
    rebate: Decimal,
) -> Settlement {
    let actual = if close_price > open_price {
        Direction::Up
    } else {
        Direction::Down
    };

    let outcome = if close_price == open_price {
        Outcome::Loss
    } else if actual == direction {
        Outcome::Win
    } else {
        Outcome::Loss
    };

    let pnl = match outcome {
        Outcome::Win => {
            let shares = order_size / entry_price;
            shares * (Decimal::ONE - entry_price) + rebate
        }
        _ => -order_size + rebate,
    };

    Settlement {
        outcome,
        actual,
        pnl: pnl.round_dp(MONEY_DP),
    }
}

/// Balance after applying `pnl`, at ledger precision.
pub fn apply_pnl(balance: Decimal, pnl: Decimal) -> Decimal {
    (balance + pnl).round_dp(MONEY_DP)
}
