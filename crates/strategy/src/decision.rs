use rust_decimal::Decimal;

use common::Direction;

/// What to do at the signal instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Buy the `direction` side at `entry_price` per share.
    Bet {
        direction: Direction,
        entry_price: Decimal,
    },
    Skip,
}

/// Decide whether the move between window open and the signal instant is
/// large enough to bet on, and in which direction.
///
/// A move of exactly `min_move` bets. A zero move always skips, which also
/// covers `min_move == 0`.
pub fn decide(
    open_price: Decimal,
    signal_price: Decimal,
    min_move: Decimal,
    entry_price: Decimal,
) -> Decision {
    let delta = signal_price - open_price;

    if delta.abs() < min_move || delta.is_zero() {
        return Decision::Skip;
    }

    let direction = if delta > Decimal::ZERO {
        Direction::Up
    } else {
        Direction::Down
    };
    Decision::Bet {
        direction,
        entry_price,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const ENTRY: Decimal = dec!(0.92);

    fn bet(direction: Direction) -> Decision {
        Decision::Bet {
            direction,
            entry_price: ENTRY,
        }
    }

    #[test]
    fn upward_move_above_threshold_bets_up() {
        assert_eq!(decide(dec!(50000), dec!(50010), dec!(5), ENTRY), bet(Direction::Up));
    }

    #[test]
    fn downward_move_above_threshold_bets_down() {
        assert_eq!(decide(dec!(50000), dec!(49990), dec!(5), ENTRY), bet(Direction::Down));
    }

    #[test]
    fn small_move_skips() {
        assert_eq!(decide(dec!(50000), dec!(50002), dec!(5), ENTRY), Decision::Skip);
        assert_eq!(decide(dec!(50000), dec!(49995.01), dec!(5), ENTRY), Decision::Skip);
    }

    #[test]
    fn move_exactly_at_threshold_bets() {
        assert_eq!(decide(dec!(100), dec!(105), dec!(5), ENTRY), bet(Direction::Up));
        assert_eq!(decide(dec!(100), dec!(95), dec!(5), ENTRY), bet(Direction::Down));
    }

    #[test]
    fn zero_threshold_still_skips_flat_move() {
        assert_eq!(decide(dec!(100), dec!(100), dec!(0), ENTRY), Decision::Skip);
        assert_eq!(decide(dec!(100), dec!(100.01), dec!(0), ENTRY), bet(Direction::Up));
    }
}
