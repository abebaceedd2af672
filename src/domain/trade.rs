//! Trade records: append-only log of acknowledged executions.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{MarketId, OrderId, RuleId, TokenId};
use super::price::Price;
use super::rule::{RuleType, Side};

/// One acknowledged order resulting from a rule execution.
///
/// Written exactly once, inside the same transaction that moves the rule to
/// TRIGGERED.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub rule_id: RuleId,
    pub rule_type: RuleType,
    pub market_id: MarketId,
    pub token_id: TokenId,
    pub trade_side: Side,
    /// The rule's trigger price at the moment it fired.
    pub trigger_price: Price,
    /// Limit price sent with the order; `None` for market orders.
    pub price: Option<Price>,
    pub amount: Decimal,
    pub order_id: Option<OrderId>,
    pub tx_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Trade {
    /// Build a trade record for a just-acknowledged order.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        rule_id: RuleId,
        rule_type: RuleType,
        market_id: MarketId,
        token_id: TokenId,
        trade_side: Side,
        trigger_price: Price,
        price: Option<Price>,
        amount: Decimal,
        order_id: Option<OrderId>,
        tx_id: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            rule_id,
            rule_type,
            market_id,
            token_id,
            trade_side,
            trigger_price,
            price,
            amount,
            order_id,
            tx_id,
            created_at: Utc::now(),
        }
    }
}
