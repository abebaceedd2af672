//! In-memory [`RuleStore`] implementation for testing.
//!
//! Mirrors the SQLite adapter's semantics: CAS transitions that conflict
//! once a rule leaves ACTIVE, a transactional triggered+trade commit, and
//! bounded event retention.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::domain::{Event, Price, Rule, RuleId, RuleStatus, Trade};
use crate::error::{Error, Result};
use crate::port::store::RuleStore;

struct Inner {
    rules: Vec<Rule>,
    trades: Vec<Trade>,
    events: Vec<Event>,
    event_retention: usize,
}

pub struct MemoryRuleStore {
    inner: Mutex<Inner>,
    changes_tx: watch::Sender<u64>,
}

impl MemoryRuleStore {
    #[must_use]
    pub fn new() -> Self {
        let (changes_tx, _) = watch::channel(0);
        Self {
            inner: Mutex::new(Inner {
                rules: Vec::new(),
                trades: Vec::new(),
                events: Vec::new(),
                event_retention: 1000,
            }),
            changes_tx,
        }
    }

    #[must_use]
    pub fn with_event_retention(self, retention: usize) -> Self {
        self.inner.lock().event_retention = retention;
        self
    }

    fn bump(&self) {
        self.changes_tx.send_modify(|version| *version += 1);
    }

    /// Apply a mutation to an ACTIVE rule or conflict.
    fn transition(&self, id: &RuleId, apply: impl FnOnce(&mut Rule)) -> Result<()> {
        let mut inner = self.inner.lock();
        let rule = inner
            .rules
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| Error::Database(format!("rule {id} not found")))?;
        if rule.status != RuleStatus::Active {
            return Err(Error::Conflict {
                rule_id: id.to_string(),
                status: rule.status,
            });
        }
        apply(rule);
        rule.updated_at = Utc::now();
        drop(inner);
        self.bump();
        Ok(())
    }
}

impl Default for MemoryRuleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RuleStore for MemoryRuleStore {
    async fn list_active_rules(&self) -> Result<Vec<Rule>> {
        Ok(self
            .inner
            .lock()
            .rules
            .iter()
            .filter(|r| r.is_active())
            .cloned()
            .collect())
    }

    async fn rule(&self, id: &RuleId) -> Result<Option<Rule>> {
        Ok(self.inner.lock().rules.iter().find(|r| &r.id == id).cloned())
    }

    async fn insert_rule(&self, rule: &Rule) -> Result<()> {
        self.inner.lock().rules.push(rule.clone());
        self.bump();
        Ok(())
    }

    async fn update_trailing(&self, id: &RuleId, high_water: Price, trigger: Price) -> Result<()> {
        self.transition(id, |rule| {
            rule.high_water_price = Some(high_water);
            rule.trigger_price = trigger;
        })
    }

    async fn mark_triggered(&self, id: &RuleId, trade: &Trade) -> Result<()> {
        let mut inner = self.inner.lock();
        let rule = inner
            .rules
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| Error::Database(format!("rule {id} not found")))?;
        if rule.status != RuleStatus::Active {
            return Err(Error::Conflict {
                rule_id: id.to_string(),
                status: rule.status,
            });
        }
        rule.status = RuleStatus::Triggered;
        rule.triggered_at = Some(Utc::now());
        rule.triggered_by_tx_id = trade.tx_id.clone();
        rule.updated_at = Utc::now();
        inner.trades.push(trade.clone());
        drop(inner);
        self.bump();
        Ok(())
    }

    async fn mark_failed(&self, id: &RuleId, error_message: &str) -> Result<()> {
        self.transition(id, |rule| {
            rule.status = RuleStatus::Failed;
            rule.error_message = Some(error_message.to_string());
        })
    }

    async fn cancel_rule(&self, id: &RuleId) -> Result<()> {
        self.transition(id, |rule| {
            rule.status = RuleStatus::Canceled;
        })
    }

    async fn append_event(&self, event: &Event) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.events.push(event.clone());
        let retention = inner.event_retention;
        let len = inner.events.len();
        if len > retention {
            inner.events.drain(..len - retention);
        }
        Ok(())
    }

    async fn recent_trades(&self, limit: usize) -> Result<Vec<Trade>> {
        Ok(self
            .inner
            .lock()
            .trades
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn recent_events(&self, limit: usize) -> Result<Vec<Event>> {
        Ok(self
            .inner
            .lock()
            .events
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn recent_rules(&self, limit: usize) -> Result<Vec<Rule>> {
        let mut rules = self.inner.lock().rules.clone();
        rules.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        rules.truncate(limit);
        Ok(rules)
    }

    fn changes(&self) -> watch::Receiver<u64> {
        self.changes_tx.subscribe()
    }
}
