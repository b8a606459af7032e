// Pure bid validation: minimum increments and bid acceptance rules.

use crate::auction::model::Money;
use crate::error::AuctionError;

/// Minimum raise over the standing bid for a lot with the given base price.
///
/// `max(1, base_price / 20)`, rounded down to the nearest multiple of 10
/// once it reaches 100. A base price of 0 yields an increment of 1.
pub fn min_increment(base_price: Money) -> Money {
    let mut inc = std::cmp::max(1, base_price / 20);
    if inc >= 100 {
        inc = (inc / 10) * 10;
    }
    inc
}

/// The lowest acceptable bid: the base price when no bid stands, otherwise
/// the standing amount plus the increment.
pub fn min_required(base_price: Money, current_amount: Option<Money>) -> Money {
    match current_amount {
        None => base_price,
        Some(amount) => amount.saturating_add(min_increment(base_price)),
    }
}

/// Validate a proposed bid against the standing amount and the team's purse.
/// Returns the accepted amount, or the rejection without side effects.
pub fn check_bid(
    base_price: Money,
    current_amount: Option<Money>,
    purse: Money,
    amount: Money,
) -> Result<Money, AuctionError> {
    let min_required = min_required(base_price, current_amount);
    if amount < min_required {
        return Err(AuctionError::BidTooLow { min_required });
    }
    if amount > purse {
        return Err(AuctionError::InsufficientFunds);
    }
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increment_has_floor_of_one() {
        assert_eq!(min_increment(0), 1);
        assert_eq!(min_increment(1), 1);
        assert_eq!(min_increment(19), 1);
        assert_eq!(min_increment(20), 1);
        assert_eq!(min_increment(40), 2);
    }

    #[test]
    fn increment_is_five_percent() {
        assert_eq!(min_increment(100), 5);
        assert_eq!(min_increment(1000), 50);
        assert_eq!(min_increment(1900), 95);
    }

    #[test]
    fn increment_rounds_down_past_one_hundred() {
        assert_eq!(min_increment(2000), 100);
        assert_eq!(min_increment(2100), 100); // raw 105 -> 100
        assert_eq!(min_increment(2500), 120); // raw 125 -> 120
        assert_eq!(min_increment(3000), 150);
        assert_eq!(min_increment(5100), 250); // raw 255 -> 250
    }

    #[test]
    fn first_bid_requires_base_price() {
        assert_eq!(min_required(1000, None), 1000);
        assert_eq!(min_required(0, None), 0);
    }

    #[test]
    fn subsequent_bid_requires_increment() {
        assert_eq!(min_required(1000, Some(1000)), 1050);
        assert_eq!(min_required(2500, Some(2500)), 2620);
        assert_eq!(min_required(0, Some(3)), 4);
    }

    #[test]
    fn minimum_saturates_instead_of_overflowing() {
        assert_eq!(min_required(1000, Some(Money::MAX - 10)), Money::MAX);
        match check_bid(1000, Some(Money::MAX - 10), Money::MAX, Money::MAX - 1) {
            Err(AuctionError::BidTooLow { min_required }) => {
                assert_eq!(min_required, Money::MAX);
            }
            other => panic!("expected BidTooLow, got {other:?}"),
        }
    }

    #[test]
    fn check_bid_accepts_exact_minimum() {
        assert_eq!(check_bid(1000, None, 10_000, 1000).unwrap(), 1000);
        assert_eq!(check_bid(1000, Some(1000), 10_000, 1050).unwrap(), 1050);
    }

    #[test]
    fn check_bid_rejects_below_minimum() {
        match check_bid(1000, Some(1000), 10_000, 1040) {
            Err(AuctionError::BidTooLow { min_required }) => assert_eq!(min_required, 1050),
            other => panic!("expected BidTooLow, got {other:?}"),
        }
    }

    #[test]
    fn check_bid_rejects_over_purse() {
        match check_bid(1000, None, 900, 1000) {
            Err(AuctionError::InsufficientFunds) => {}
            other => panic!("expected InsufficientFunds, got {other:?}"),
        }
    }

    #[test]
    fn check_bid_allows_full_purse() {
        assert_eq!(check_bid(1000, None, 1000, 1000).unwrap(), 1000);
    }
}
