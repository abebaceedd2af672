//! Cached broker projections: positions and holdings.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{MarketId, TokenId};
use super::price::Price;
use super::rule::Side;

/// A position as reported by the broker, cached locally.
///
/// Used for display and for venue-closed detection before executing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub market_id: MarketId,
    pub token_id: TokenId,
    pub side: Side,
    pub quantity: Decimal,
    pub avg_entry_price: Option<Price>,
    pub current_price: Price,
    pub end_date: Option<DateTime<Utc>>,
    /// The market has resolved; holdings can only be redeemed, not traded.
    pub redeemable: bool,
    pub last_updated_at: DateTime<Utc>,
}

impl Position {
    /// True when the venue will no longer accept orders for this position.
    #[must_use]
    pub fn is_closed(&self, now: DateTime<Utc>) -> bool {
        self.redeemable || self.end_date.is_some_and(|end| end < now)
    }
}

/// A holding as reported by the broker's wallet view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub token_id: TokenId,
    pub shares: Decimal,
    pub outcome: String,
    pub market_title: String,
    pub redeemable: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn position(redeemable: bool, end_date: Option<DateTime<Utc>>) -> Position {
        Position {
            market_id: MarketId::new("m-1"),
            token_id: TokenId::new("t-1"),
            side: Side::Buy,
            quantity: dec!(100),
            avg_entry_price: Some(dec!(0.55)),
            current_price: dec!(0.60),
            end_date,
            redeemable,
            last_updated_at: Utc::now(),
        }
    }

    #[test]
    fn redeemable_position_is_closed() {
        assert!(position(true, None).is_closed(Utc::now()));
    }

    #[test]
    fn expired_position_is_closed() {
        let past = Utc::now() - Duration::hours(1);
        assert!(position(false, Some(past)).is_closed(Utc::now()));
    }

    #[test]
    fn live_position_is_open() {
        let future = Utc::now() + Duration::hours(1);
        assert!(!position(false, Some(future)).is_closed(Utc::now()));
        assert!(!position(false, None).is_closed(Utc::now()));
    }
}
