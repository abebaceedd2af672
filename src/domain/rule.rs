//! Trading rules: the unit of automation.
//!
//! A rule watches one token and describes the exit to perform when its
//! trigger condition is met. Rules move linearly through
//! `ACTIVE -> (TRIGGERED | FAILED | CANCELED)`; terminal states never
//! transition again.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{MarketId, RuleId, TokenId};
use super::price::{clamp_order_price, Price};
use crate::error::{Error, Result};

/// Direction of the position a rule guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The trigger discipline a rule follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleType {
    StopLoss,
    TakeProfit,
    TrailingStop,
}

impl RuleType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StopLoss => "STOP_LOSS",
            Self::TakeProfit => "TAKE_PROFIT",
            Self::TrailingStop => "TRAILING_STOP",
        }
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleStatus {
    Active,
    Triggered,
    Failed,
    Canceled,
}

impl RuleStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Triggered => "TRIGGERED",
            Self::Failed => "FAILED",
            Self::Canceled => "CANCELED",
        }
    }

    /// Terminal states never transition again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl fmt::Display for RuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do when the rule fires.
///
/// Stored as a JSON string in the rule store and parsed into this tagged
/// union on read; unrecognized variants are rejected at load time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RuleAction {
    #[serde(rename = "SELL_ALL")]
    SellAll,
    #[serde(rename = "SELL_PARTIAL")]
    SellPartial { amount: Decimal },
}

impl RuleAction {
    /// Parse an action from its stored JSON form.
    ///
    /// # Errors
    /// Returns a parse error for malformed JSON or unrecognized variants.
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::Parse(format!("unrecognized rule action {json:?}: {e}")))
    }

    /// Encode the action into its stored JSON form.
    #[must_use]
    pub fn encode(&self) -> String {
        serde_json::to_string(self).expect("rule action serializes")
    }
}

/// The unit of automation: one price-triggered exit on one token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub rule_type: RuleType,
    pub market_id: MarketId,
    pub token_id: TokenId,
    /// Side of the guarded position.
    pub side: Side,
    /// Always within [0.01, 0.99].
    pub trigger_price: Price,
    /// Present only for trailing stops: percent distance in (0, 100].
    pub trailing_percent: Option<Decimal>,
    /// Trailing-stop state: favourable high-water mark, non-decreasing
    /// while the rule is active.
    pub high_water_price: Option<Price>,
    pub action: RuleAction,
    pub status: RuleStatus,
    pub triggered_at: Option<DateTime<Utc>>,
    pub triggered_by_tx_id: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Rule {
    /// Create a new ACTIVE rule. The trigger price is clamped into the
    /// venue's orderable range.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: RuleId,
        rule_type: RuleType,
        market_id: impl Into<MarketId>,
        token_id: impl Into<TokenId>,
        side: Side,
        trigger_price: Price,
        trailing_percent: Option<Decimal>,
        action: RuleAction,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            rule_type,
            market_id: market_id.into(),
            token_id: token_id.into(),
            side,
            trigger_price: clamp_order_price(trigger_price),
            trailing_percent,
            high_water_price: None,
            action,
            status: RuleStatus::Active,
            triggered_at: None,
            triggered_by_tx_id: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Only ACTIVE rules participate in evaluation or subscription.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self.status, RuleStatus::Active)
    }
}
