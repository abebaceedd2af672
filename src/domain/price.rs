//! Price types and the venue's price-range arithmetic.
//!
//! The venue quotes every outcome token in (0, 1]; orders are only accepted
//! inside [0.01, 0.99]. Feed prices and computed limit prices pass through
//! the clamps here before anything else sees them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::id::TokenId;

/// Price represented as a Decimal for precision.
pub type Price = Decimal;

/// Lowest price the venue accepts on an order.
#[must_use]
pub fn min_order_price() -> Price {
    Decimal::new(1, 2)
}

/// Highest price the venue accepts on an order.
#[must_use]
pub fn max_order_price() -> Price {
    Decimal::new(99, 2)
}

/// Clamp a trigger or limit price into the venue's orderable range [0.01, 0.99].
#[must_use]
pub fn clamp_order_price(price: Price) -> Price {
    price.clamp(min_order_price(), max_order_price())
}

/// Normalize a price derived from the feed into (0, 1].
///
/// Values above 1 clamp to 1. Values at or below 0 have no valid
/// representation in the open-bottom range and are dropped.
#[must_use]
pub fn normalize_feed_price(price: Price) -> Option<Price> {
    if price <= Decimal::ZERO {
        return None;
    }
    Some(price.min(Decimal::ONE))
}

/// A single price observation for one token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceUpdate {
    pub token_id: TokenId,
    pub price: Price,
    pub timestamp: DateTime<Utc>,
}

impl PriceUpdate {
    pub fn new(token_id: impl Into<TokenId>, price: Price, timestamp: DateTime<Utc>) -> Self {
        Self {
            token_id: token_id.into(),
            price,
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn clamp_order_price_bounds() {
        assert_eq!(clamp_order_price(dec!(0.005)), dec!(0.01));
        assert_eq!(clamp_order_price(dec!(0.50)), dec!(0.50));
        assert_eq!(clamp_order_price(dec!(1.20)), dec!(0.99));
    }

    #[test]
    fn normalize_drops_non_positive() {
        assert_eq!(normalize_feed_price(dec!(0)), None);
        assert_eq!(normalize_feed_price(dec!(-0.2)), None);
    }

    #[test]
    fn normalize_clamps_above_one() {
        assert_eq!(normalize_feed_price(dec!(1.5)), Some(dec!(1)));
        assert_eq!(normalize_feed_price(dec!(0.42)), Some(dec!(0.42)));
        assert_eq!(normalize_feed_price(dec!(1)), Some(dec!(1)));
    }
}
