//! Database model types for Diesel ORM.
//!
//! Decimals and timestamps are stored as text (exact decimal strings and
//! RFC 3339); enums as their wire names; the rule action as its JSON form.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;

use super::schema::{events, rules, trades};
use crate::domain::{
    Event, EventType, MarketId, OrderId, Rule, RuleAction, RuleId, RuleStatus, RuleType, Side,
    TokenId, Trade,
};
use crate::error::{Error, Result};

/// Database row for a rule.
#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = rules)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct RuleRow {
    pub id: String,
    pub rule_type: String,
    pub market_id: String,
    pub token_id: String,
    pub side: String,
    pub trigger_price: String,
    pub trailing_percent: Option<String>,
    pub high_water_price: Option<String>,
    pub action: String,
    pub status: String,
    pub triggered_at: Option<String>,
    pub triggered_by_tx_id: Option<String>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Database row for a trade.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = trades)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct TradeRow {
    pub id: String,
    pub rule_id: String,
    pub rule_type: String,
    pub market_id: String,
    pub token_id: String,
    pub trade_side: String,
    pub trigger_price: String,
    pub price: Option<String>,
    pub amount: String,
    pub order_id: Option<String>,
    pub tx_id: Option<String>,
    pub created_at: String,
}

/// Database row for an event (insertable).
#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = events)]
pub struct NewEventRow {
    pub rule_id: String,
    pub event_type: String,
    pub data: String,
    pub created_at: String,
}

/// Database row for an event (queryable).
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = events)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct EventRow {
    pub id: Option<i32>,
    pub rule_id: String,
    pub event_type: String,
    pub data: String,
    pub created_at: String,
}

fn parse_decimal(raw: &str, column: &str) -> Result<Decimal> {
    raw.parse()
        .map_err(|e| Error::Parse(format!("bad decimal in {column}: {e}")))
}

fn parse_timestamp(raw: &str, column: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Parse(format!("bad timestamp in {column}: {e}")))
}

fn parse_rule_type(raw: &str) -> Result<RuleType> {
    match raw {
        "STOP_LOSS" => Ok(RuleType::StopLoss),
        "TAKE_PROFIT" => Ok(RuleType::TakeProfit),
        "TRAILING_STOP" => Ok(RuleType::TrailingStop),
        other => Err(Error::Parse(format!("unknown rule type {other:?}"))),
    }
}

fn parse_side(raw: &str) -> Result<Side> {
    match raw {
        "BUY" => Ok(Side::Buy),
        "SELL" => Ok(Side::Sell),
        other => Err(Error::Parse(format!("unknown side {other:?}"))),
    }
}

pub(crate) fn parse_status(raw: &str) -> Result<RuleStatus> {
    match raw {
        "ACTIVE" => Ok(RuleStatus::Active),
        "TRIGGERED" => Ok(RuleStatus::Triggered),
        "FAILED" => Ok(RuleStatus::Failed),
        "CANCELED" => Ok(RuleStatus::Canceled),
        other => Err(Error::Parse(format!("unknown rule status {other:?}"))),
    }
}

fn parse_event_type(raw: &str) -> Result<EventType> {
    match raw {
        "RULE_EVALUATED" => Ok(EventType::RuleEvaluated),
        "RULE_TRAILING_UPDATED" => Ok(EventType::RuleTrailingUpdated),
        "ACTION_ATTEMPT" => Ok(EventType::ActionAttempt),
        "ACTION_EXECUTED" => Ok(EventType::ActionExecuted),
        "ACTION_FAILED" => Ok(EventType::ActionFailed),
        "RULE_FAILED" => Ok(EventType::RuleFailed),
        other => Err(Error::Parse(format!("unknown event type {other:?}"))),
    }
}

impl RuleRow {
    pub fn from_domain(rule: &Rule) -> Self {
        Self {
            id: rule.id.to_string(),
            rule_type: rule.rule_type.as_str().to_string(),
            market_id: rule.market_id.to_string(),
            token_id: rule.token_id.to_string(),
            side: rule.side.as_str().to_string(),
            trigger_price: rule.trigger_price.to_string(),
            trailing_percent: rule.trailing_percent.map(|p| p.to_string()),
            high_water_price: rule.high_water_price.map(|p| p.to_string()),
            action: rule.action.encode(),
            status: rule.status.as_str().to_string(),
            triggered_at: rule.triggered_at.map(|t| t.to_rfc3339()),
            triggered_by_tx_id: rule.triggered_by_tx_id.clone(),
            error_message: rule.error_message.clone(),
            created_at: rule.created_at.to_rfc3339(),
            updated_at: rule.updated_at.to_rfc3339(),
        }
    }

    pub fn into_domain(self) -> Result<Rule> {
        Ok(Rule {
            id: RuleId::from(self.id),
            rule_type: parse_rule_type(&self.rule_type)?,
            market_id: MarketId::from(self.market_id),
            token_id: TokenId::from(self.token_id),
            side: parse_side(&self.side)?,
            trigger_price: parse_decimal(&self.trigger_price, "rules.trigger_price")?,
            trailing_percent: self
                .trailing_percent
                .as_deref()
                .map(|raw| parse_decimal(raw, "rules.trailing_percent"))
                .transpose()?,
            high_water_price: self
                .high_water_price
                .as_deref()
                .map(|raw| parse_decimal(raw, "rules.high_water_price"))
                .transpose()?,
            action: RuleAction::parse(&self.action)?,
            status: parse_status(&self.status)?,
            triggered_at: self
                .triggered_at
                .as_deref()
                .map(|raw| parse_timestamp(raw, "rules.triggered_at"))
                .transpose()?,
            triggered_by_tx_id: self.triggered_by_tx_id,
            error_message: self.error_message,
            created_at: parse_timestamp(&self.created_at, "rules.created_at")?,
            updated_at: parse_timestamp(&self.updated_at, "rules.updated_at")?,
        })
    }
}

impl TradeRow {
    pub fn from_domain(trade: &Trade) -> Self {
        Self {
            id: trade.id.clone(),
            rule_id: trade.rule_id.to_string(),
            rule_type: trade.rule_type.as_str().to_string(),
            market_id: trade.market_id.to_string(),
            token_id: trade.token_id.to_string(),
            trade_side: trade.trade_side.as_str().to_string(),
            trigger_price: trade.trigger_price.to_string(),
            price: trade.price.map(|p| p.to_string()),
            amount: trade.amount.to_string(),
            order_id: trade.order_id.as_ref().map(ToString::to_string),
            tx_id: trade.tx_id.clone(),
            created_at: trade.created_at.to_rfc3339(),
        }
    }

    pub fn into_domain(self) -> Result<Trade> {
        Ok(Trade {
            id: self.id,
            rule_id: RuleId::from(self.rule_id),
            rule_type: parse_rule_type(&self.rule_type)?,
            market_id: MarketId::from(self.market_id),
            token_id: TokenId::from(self.token_id),
            trade_side: parse_side(&self.trade_side)?,
            trigger_price: parse_decimal(&self.trigger_price, "trades.trigger_price")?,
            price: self
                .price
                .as_deref()
                .map(|raw| parse_decimal(raw, "trades.price"))
                .transpose()?,
            amount: parse_decimal(&self.amount, "trades.amount")?,
            order_id: self.order_id.map(OrderId::from),
            tx_id: self.tx_id,
            created_at: parse_timestamp(&self.created_at, "trades.created_at")?,
        })
    }
}

impl NewEventRow {
    pub fn from_domain(event: &Event) -> Self {
        Self {
            rule_id: event.rule_id.to_string(),
            event_type: event.event_type.as_str().to_string(),
            data: event.data.to_string(),
            created_at: event.created_at.to_rfc3339(),
        }
    }
}

impl EventRow {
    pub fn into_domain(self) -> Result<Event> {
        Ok(Event {
            rule_id: RuleId::from(self.rule_id),
            event_type: parse_event_type(&self.event_type)?,
            data: serde_json::from_str(&self.data)
                .map_err(|e| Error::Parse(format!("bad event data: {e}")))?,
            created_at: parse_timestamp(&self.created_at, "events.created_at")?,
        })
    }
}
