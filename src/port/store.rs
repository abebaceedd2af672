//! Rule store port: typed persistence for rules, trades, and events.
//!
//! The store is the single source of truth for rule state. Terminal
//! transitions are compare-and-set: they require the rule to still be
//! ACTIVE and fail with [`crate::error::Error::Conflict`] otherwise, which
//! is how an in-flight execution learns that a rule was canceled under it.

use async_trait::async_trait;
use tokio::sync::watch;

use crate::domain::{Event, Price, Rule, RuleId, Trade};
use crate::error::Result;

#[async_trait]
pub trait RuleStore: Send + Sync {
    /// All rules currently in ACTIVE status.
    async fn list_active_rules(&self) -> Result<Vec<Rule>>;

    /// Fetch one rule by id.
    async fn rule(&self, id: &RuleId) -> Result<Option<Rule>>;

    /// Insert a new rule (written by the enclosing platform and by tests).
    async fn insert_rule(&self, rule: &Rule) -> Result<()>;

    /// Persist a trailing-stop advance. CAS: the rule must still be ACTIVE.
    async fn update_trailing(&self, id: &RuleId, high_water: Price, trigger: Price) -> Result<()>;

    /// Move an ACTIVE rule to TRIGGERED and append its trade in a single
    /// transaction. CAS: conflicts when the rule already left ACTIVE, in
    /// which case no trade is written.
    async fn mark_triggered(&self, id: &RuleId, trade: &Trade) -> Result<()>;

    /// Move an ACTIVE rule to FAILED with the broker's message. CAS.
    async fn mark_failed(&self, id: &RuleId, error_message: &str) -> Result<()>;

    /// Move an ACTIVE rule to CANCELED. CAS.
    async fn cancel_rule(&self, id: &RuleId) -> Result<()>;

    /// Append a diagnostic event, pruning past the retention bound.
    async fn append_event(&self, event: &Event) -> Result<()>;

    /// Latest trades, newest first.
    async fn recent_trades(&self, limit: usize) -> Result<Vec<Trade>>;

    /// Latest events, newest first.
    async fn recent_events(&self, limit: usize) -> Result<Vec<Event>>;

    /// Active plus recently updated rules, newest first.
    async fn recent_rules(&self, limit: usize) -> Result<Vec<Rule>>;

    /// Change signal bumped on every rule mutation. Drives the worker's
    /// index rebuild and the subscription reconciler.
    fn changes(&self) -> watch::Receiver<u64>;
}
