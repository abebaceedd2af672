//! Domain fixture constructors shared across tests.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;

use crate::domain::{
    Holding, MarketId, Position, PriceUpdate, Rule, RuleAction, RuleId, RuleType, Side, TokenId,
};

#[must_use]
pub fn token(id: &str) -> TokenId {
    TokenId::new(id)
}

#[must_use]
pub fn stop_loss_rule(id: &str, token_id: &str, trigger: Decimal) -> Rule {
    Rule::new(
        RuleId::new(id),
        RuleType::StopLoss,
        "market-1",
        token_id,
        Side::Buy,
        trigger,
        None,
        RuleAction::SellAll,
    )
}

#[must_use]
pub fn take_profit_rule(id: &str, token_id: &str, trigger: Decimal) -> Rule {
    Rule::new(
        RuleId::new(id),
        RuleType::TakeProfit,
        "market-1",
        token_id,
        Side::Buy,
        trigger,
        None,
        RuleAction::SellAll,
    )
}

#[must_use]
pub fn trailing_stop_rule(
    id: &str,
    token_id: &str,
    trigger: Decimal,
    percent: Decimal,
    high_water: Decimal,
) -> Rule {
    let mut rule = Rule::new(
        RuleId::new(id),
        RuleType::TrailingStop,
        "market-1",
        token_id,
        Side::Buy,
        trigger,
        Some(percent),
        RuleAction::SellAll,
    );
    rule.high_water_price = Some(high_water);
    rule
}

#[must_use]
pub fn holding(token_id: &str, shares: Decimal) -> Holding {
    Holding {
        token_id: TokenId::new(token_id),
        shares,
        outcome: "Yes".into(),
        market_title: "Test market".into(),
        redeemable: false,
    }
}

#[must_use]
pub fn open_position(market_id: &str, token_id: &str) -> Position {
    Position {
        market_id: MarketId::new(market_id),
        token_id: TokenId::new(token_id),
        side: Side::Buy,
        quantity: Decimal::ONE_HUNDRED,
        avg_entry_price: Some(Decimal::new(55, 2)),
        current_price: Decimal::new(60, 2),
        end_date: Some(Utc::now() + Duration::days(30)),
        redeemable: false,
        last_updated_at: Utc::now(),
    }
}

#[must_use]
pub fn resolved_position(market_id: &str, token_id: &str) -> Position {
    Position {
        redeemable: true,
        ..open_position(market_id, token_id)
    }
}

#[must_use]
pub fn price_update(token_id: &str, price: Decimal) -> PriceUpdate {
    PriceUpdate::new(token_id, price, Utc::now())
}
