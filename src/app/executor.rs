//! Rule execution: gates, tiered order placement, failure classification.
//!
//! A triggered rule is executed at most once concurrently (per-rule
//! single-flight). The first attempt is a limit order priced below the
//! current market by the configured slippage; a "no match" answer earns one
//! market-order retry; every other failure is classified permanent or
//! transient. Permanent failures move the rule to FAILED, transient ones
//! leave it ACTIVE for the next matching price.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use super::events::EventLog;
use super::positions::PositionCache;
use super::single_flight::SingleFlight;
use crate::config::ExecutionConfig;
use crate::domain::price::clamp_order_price;
use crate::domain::{Price, Rule, RuleAction, RuleStatus, RuleType, Side, Trade};
use crate::error::Error;
use crate::port::broker::{Broker, BrokerError, OrderAck};
use crate::port::store::RuleStore;

/// Whether a broker failure can succeed on retry under unchanged inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Permanent,
    Transient,
}

/// Message fragments the venue uses for failures that will never succeed
/// on retry.
const PERMANENT_MARKERS: [&str; 7] = [
    "insufficient funds",
    "invalid token",
    "invalid price",
    "market closed",
    "market resolved",
    "position not found",
    "no orderbook data",
];

/// Classify a broker failure.
#[must_use]
pub fn classify(error: &BrokerError) -> FailureKind {
    match error {
        BrokerError::Rejected { status, message } => {
            if matches!(status, 400 | 403 | 404) {
                return FailureKind::Permanent;
            }
            let message = message.to_lowercase();
            if PERMANENT_MARKERS.iter().any(|m| message.contains(m)) {
                return FailureKind::Permanent;
            }
            if (500..600).contains(status)
                && (message.contains("orderbook") || message.contains("no match"))
            {
                return FailureKind::Permanent;
            }
            FailureKind::Transient
        }
        BrokerError::Transport(_) => FailureKind::Transient,
    }
}

/// True for the order rejections that mean "no resting liquidity crossed".
#[must_use]
pub fn is_no_match(error: &BrokerError) -> bool {
    match error {
        BrokerError::Rejected { message, .. } => {
            let message = message.to_lowercase();
            message.contains("no match") || message.contains("no liquidity")
        }
        BrokerError::Transport(_) => false,
    }
}

pub struct Executor {
    broker: Arc<dyn Broker>,
    store: Arc<dyn RuleStore>,
    events: Arc<EventLog>,
    positions: Arc<PositionCache>,
    config: ExecutionConfig,
    single_flight: SingleFlight,
}

impl Executor {
    #[must_use]
    pub fn new(
        broker: Arc<dyn Broker>,
        store: Arc<dyn RuleStore>,
        events: Arc<EventLog>,
        positions: Arc<PositionCache>,
        config: ExecutionConfig,
    ) -> Self {
        Self {
            broker,
            store,
            events,
            positions,
            config,
            single_flight: SingleFlight::new(),
        }
    }

    /// Non-blocking handoff from the worker. Drops the trigger when an
    /// execution for this rule is already in flight.
    pub fn dispatch(self: &Arc<Self>, rule: Rule) {
        let Some(guard) = self.single_flight.begin(&rule.id) else {
            debug!(rule_id = %rule.id, "Execution already in flight, dropping trigger");
            return;
        };
        let executor = Arc::clone(self);
        tokio::spawn(async move {
            let _guard = guard;
            executor.execute(rule).await;
        });
    }

    /// Execute a triggered rule once and record the outcome.
    pub async fn execute(&self, rule: Rule) {
        info!(
            rule_id = %rule.id,
            rule_type = rule.rule_type.as_str(),
            token = %rule.token_id,
            trigger_price = %rule.trigger_price,
            "Executing triggered rule"
        );

        // Gate 1: the venue must still be open for this position.
        if let Some(position) = self.positions.position(&rule.market_id, &rule.token_id) {
            if position.is_closed(chrono::Utc::now()) {
                self.fail_permanent(&rule, "market resolved").await;
                return;
            }
        }

        // Gate 2: there must be something to sell.
        let amount = match self.sellable_amount(&rule).await {
            Ok(amount) => amount,
            Err(Gate::Permanent(reason)) => {
                self.fail_permanent(&rule, &reason).await;
                return;
            }
            Err(Gate::Transient(reason)) => {
                self.fail_transient(&rule, &reason).await;
                return;
            }
        };

        // Gate 3: the venue must be quoting the token.
        let current = match self
            .broker
            .get_current_price(&rule.market_id, &rule.token_id)
            .await
        {
            Ok(price) if price > Decimal::ZERO => price,
            Ok(_) => {
                self.fail_permanent(&rule, "no orderbook data").await;
                return;
            }
            Err(e) => {
                self.settle_failure(&rule, &e).await;
                return;
            }
        };

        // Attempt 1: limit order with slippage allowance.
        let limit_price = clamp_order_price(current * (Decimal::ONE - self.slippage(&rule)));
        self.events.limit_attempt(&rule.id, limit_price).await;

        match self
            .broker
            .place_order(&rule.token_id, Side::Sell, amount, Some(limit_price))
            .await
        {
            Ok(ack) => {
                self.commit(&rule, amount, Some(limit_price), ack).await;
            }
            Err(e) if is_no_match(&e) => {
                // Attempt 2: market order.
                info!(rule_id = %rule.id, "Limit order found no match, retrying as market order");
                self.events.market_attempt(&rule.id).await;
                match self
                    .broker
                    .place_order(&rule.token_id, Side::Sell, amount, None)
                    .await
                {
                    Ok(ack) => self.commit(&rule, amount, None, ack).await,
                    Err(e2) if is_no_match(&e2) => {
                        // A second no-match is permanent.
                        self.fail_permanent(&rule, e2.message()).await;
                    }
                    Err(e2) => self.settle_failure(&rule, &e2).await,
                }
            }
            Err(e) => self.settle_failure(&rule, &e).await,
        }
    }

    fn slippage(&self, rule: &Rule) -> Decimal {
        match rule.rule_type {
            RuleType::StopLoss | RuleType::TrailingStop => self.config.slippage_stop_loss,
            RuleType::TakeProfit => self.config.slippage_take_profit,
        }
    }

    /// Resolve the order amount from the rule's action and the live holding.
    async fn sellable_amount(&self, rule: &Rule) -> std::result::Result<Decimal, Gate> {
        let holdings = self
            .broker
            .get_holdings()
            .await
            .map_err(|e| match classify(&e) {
                FailureKind::Permanent => Gate::Permanent(e.message().to_string()),
                FailureKind::Transient => Gate::Transient(e.message().to_string()),
            })?;

        let holding = holdings
            .into_iter()
            .find(|h| h.token_id == rule.token_id)
            .filter(|h| h.shares > Decimal::ZERO)
            .ok_or_else(|| Gate::Permanent("position not found".into()))?;

        if holding.redeemable {
            return Err(Gate::Permanent("market resolved".into()));
        }

        Ok(match &rule.action {
            RuleAction::SellAll => holding.shares,
            // Partial sells cap at what is actually held.
            RuleAction::SellPartial { amount } => (*amount).min(holding.shares),
        })
    }

    /// Commit the acknowledged order: rule transition + trade in one
    /// transaction, then the executed event.
    async fn commit(&self, rule: &Rule, amount: Decimal, price: Option<Price>, ack: OrderAck) {
        let trade = Trade::new(
            rule.id.clone(),
            rule.rule_type,
            rule.market_id.clone(),
            rule.token_id.clone(),
            Side::Sell,
            rule.trigger_price,
            price,
            amount,
            ack.order_id.clone(),
            ack.tx_id.clone(),
        );

        match self.store.mark_triggered(&rule.id, &trade).await {
            Ok(()) => {
                info!(
                    rule_id = %rule.id,
                    order_id = ?ack.order_id,
                    amount = %amount,
                    "Rule executed"
                );
                self.events.action_executed(&rule.id, &ack).await;
            }
            Err(Error::Conflict { status, .. }) => {
                let reason = if status == RuleStatus::Canceled {
                    "canceled_during_execution"
                } else {
                    "concurrent_modification"
                };
                warn!(rule_id = %rule.id, status = %status, "Order filled but rule left ACTIVE; recording conflict");
                self.events.action_conflicted(&rule.id, reason).await;
            }
            Err(e) => {
                error!(rule_id = %rule.id, error = %e, "Failed to commit triggered rule");
                self.events
                    .action_failed(&rule.id, &e.to_string(), false)
                    .await;
            }
        }
    }

    /// Classify a broker failure and settle the rule accordingly.
    async fn settle_failure(&self, rule: &Rule, error: &BrokerError) {
        match classify(error) {
            FailureKind::Permanent => self.fail_permanent(rule, error.message()).await,
            FailureKind::Transient => self.fail_transient(rule, error.message()).await,
        }
    }

    async fn fail_permanent(&self, rule: &Rule, message: &str) {
        warn!(rule_id = %rule.id, message = %message, "Rule failed permanently");
        match self.store.mark_failed(&rule.id, message).await {
            Ok(()) => {
                self.events.action_failed(&rule.id, message, true).await;
                self.events.rule_failed(&rule.id, message).await;
            }
            Err(Error::Conflict { .. }) => {
                self.events
                    .action_conflicted(&rule.id, "concurrent_modification")
                    .await;
            }
            Err(e) => {
                error!(rule_id = %rule.id, error = %e, "Failed to mark rule failed");
            }
        }
    }

    /// Transient failures leave the rule ACTIVE; the worker re-evaluates on
    /// the next matching price.
    async fn fail_transient(&self, rule: &Rule, message: &str) {
        debug!(rule_id = %rule.id, message = %message, "Transient execution failure, rule stays active");
        self.events.action_failed(&rule.id, message, false).await;
    }
}

enum Gate {
    Permanent(String),
    Transient(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected(status: u16, message: &str) -> BrokerError {
        BrokerError::Rejected {
            status,
            message: message.into(),
        }
    }

    #[test]
    fn client_errors_are_permanent() {
        assert_eq!(classify(&rejected(400, "bad request")), FailureKind::Permanent);
        assert_eq!(classify(&rejected(403, "forbidden")), FailureKind::Permanent);
        assert_eq!(classify(&rejected(404, "not found")), FailureKind::Permanent);
    }

    #[test]
    fn permanent_message_markers() {
        for message in [
            "Insufficient funds for order",
            "invalid token id",
            "Invalid price: out of range",
            "market closed",
            "Market resolved, redeem instead",
            "position not found",
            "no orderbook data available",
        ] {
            assert_eq!(
                classify(&rejected(200, message)),
                FailureKind::Permanent,
                "{message}"
            );
        }
    }

    #[test]
    fn server_errors_with_orderbook_hint_are_permanent() {
        assert_eq!(
            classify(&rejected(500, "orderbook unavailable")),
            FailureKind::Permanent
        );
        assert_eq!(
            classify(&rejected(503, "no match for order")),
            FailureKind::Permanent
        );
    }

    #[test]
    fn plain_server_errors_are_transient() {
        assert_eq!(classify(&rejected(500, "internal error")), FailureKind::Transient);
        assert_eq!(classify(&rejected(502, "bad gateway")), FailureKind::Transient);
    }

    #[test]
    fn transport_errors_are_transient() {
        assert_eq!(
            classify(&BrokerError::Transport("operation timed out".into())),
            FailureKind::Transient
        );
    }

    #[test]
    fn no_match_detection() {
        assert!(is_no_match(&rejected(200, "no match")));
        assert!(is_no_match(&rejected(200, "No liquidity at this price")));
        assert!(!is_no_match(&rejected(200, "invalid price")));
        assert!(!is_no_match(&BrokerError::Transport("no match".into())));
    }
}
