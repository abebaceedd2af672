//! Structured diagnostic events keyed by rule.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::id::RuleId;

/// Kinds of diagnostic events the worker and executor emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    RuleEvaluated,
    RuleTrailingUpdated,
    ActionAttempt,
    ActionExecuted,
    ActionFailed,
    RuleFailed,
}

impl EventType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RuleEvaluated => "RULE_EVALUATED",
            Self::RuleTrailingUpdated => "RULE_TRAILING_UPDATED",
            Self::ActionAttempt => "ACTION_ATTEMPT",
            Self::ActionExecuted => "ACTION_EXECUTED",
            Self::ActionFailed => "ACTION_FAILED",
            Self::RuleFailed => "RULE_FAILED",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One diagnostic record. `data` is a free-form mapping; the dashboard
/// renders a few known shapes and ignores the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub rule_id: RuleId,
    pub event_type: EventType,
    pub data: Value,
    pub created_at: DateTime<Utc>,
}

impl Event {
    pub fn new(rule_id: RuleId, event_type: EventType, data: Value) -> Self {
        Self {
            rule_id,
            event_type,
            data,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&EventType::ActionFailed).unwrap(),
            "\"ACTION_FAILED\""
        );
        assert_eq!(EventType::RuleTrailingUpdated.as_str(), "RULE_TRAILING_UPDATED");
    }

    #[test]
    fn event_carries_free_form_data() {
        let event = Event::new(
            RuleId::new("r-1"),
            EventType::RuleEvaluated,
            json!({"currentPrice": "0.42", "triggered": false}),
        );
        assert_eq!(event.data["triggered"], json!(false));
    }
}
