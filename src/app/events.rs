//! Rule event log with per-rule evaluation coalescing.
//!
//! Writes are best-effort: a failed append is logged and never fails the
//! caller. `RULE_EVALUATED` is coalesced to at most one per rule per
//! configured interval so a busy feed cannot grow the log unbounded.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::json;
use tracing::warn;

use crate::domain::{Event, EventType, Price, Rule, RuleId};
use crate::port::broker::OrderAck;
use crate::port::store::RuleStore;

pub struct EventLog {
    store: Arc<dyn RuleStore>,
    evaluation_interval: Duration,
    last_evaluated: Mutex<HashMap<RuleId, Instant>>,
}

impl EventLog {
    #[must_use]
    pub fn new(store: Arc<dyn RuleStore>, evaluation_interval: Duration) -> Self {
        Self {
            store,
            evaluation_interval,
            last_evaluated: Mutex::new(HashMap::new()),
        }
    }

    async fn append(&self, rule_id: &RuleId, event_type: EventType, data: serde_json::Value) {
        let event = Event::new(rule_id.clone(), event_type, data);
        if let Err(e) = self.store.append_event(&event).await {
            warn!(rule_id = %rule_id, event = %event_type, error = %e, "Failed to append event");
        }
    }

    /// Coalesced evaluation trace.
    pub async fn rule_evaluated(&self, rule: &Rule, current_price: Price, triggered: bool) {
        {
            let mut last = self.last_evaluated.lock();
            let now = Instant::now();
            if let Some(previous) = last.get(&rule.id) {
                if now.duration_since(*previous) < self.evaluation_interval {
                    return;
                }
            }
            last.insert(rule.id.clone(), now);
        }
        self.append(
            &rule.id,
            EventType::RuleEvaluated,
            json!({
                "currentPrice": current_price,
                "triggerPrice": rule.trigger_price,
                "triggered": triggered,
            }),
        )
        .await;
    }

    pub async fn trailing_updated(
        &self,
        rule: &Rule,
        high_water: Price,
        old_trigger: Price,
        new_trigger: Price,
    ) {
        self.append(
            &rule.id,
            EventType::RuleTrailingUpdated,
            json!({
                "highWaterPrice": high_water,
                "oldTriggerPrice": old_trigger,
                "newTriggerPrice": new_trigger,
            }),
        )
        .await;
    }

    pub async fn limit_attempt(&self, rule_id: &RuleId, price: Price) {
        self.append(
            rule_id,
            EventType::ActionAttempt,
            json!({"type": "limit_order", "price": price}),
        )
        .await;
    }

    pub async fn market_attempt(&self, rule_id: &RuleId) {
        self.append(
            rule_id,
            EventType::ActionAttempt,
            json!({"type": "market_order"}),
        )
        .await;
    }

    pub async fn action_executed(&self, rule_id: &RuleId, ack: &OrderAck) {
        self.append(
            rule_id,
            EventType::ActionExecuted,
            json!({
                "orderId": ack.order_id.as_ref().map(ToString::to_string),
                "txId": ack.tx_id,
            }),
        )
        .await;
    }

    pub async fn action_failed(&self, rule_id: &RuleId, message: &str, is_permanent: bool) {
        self.append(
            rule_id,
            EventType::ActionFailed,
            json!({"message": message, "isPermanent": is_permanent}),
        )
        .await;
    }

    /// Conflict outcomes carry a reason instead of a permanence flag.
    pub async fn action_conflicted(&self, rule_id: &RuleId, reason: &str) {
        self.append(
            rule_id,
            EventType::ActionFailed,
            json!({"reason": reason}),
        )
        .await;
    }

    pub async fn rule_failed(&self, rule_id: &RuleId, message: &str) {
        self.append(rule_id, EventType::RuleFailed, json!({"message": message}))
            .await;
    }
}
