//! The worker core loop (Activity B).
//!
//! Consumes the price sequence, evaluates matching rules through the pure
//! evaluator, persists trailing advances, and hands triggers to the
//! executor without blocking. The in-memory rule index is rebuilt from the
//! store on every change notification; prices for unknown tokens fall
//! through cheaply.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::events::EventLog;
use super::executor::Executor;
use super::status::SharedStatus;
use crate::domain::{evaluate, Decision, PriceUpdate, Rule, TokenId};
use crate::error::Error;
use crate::port::store::RuleStore;

pub struct Worker {
    store: Arc<dyn RuleStore>,
    executor: Arc<Executor>,
    events: Arc<EventLog>,
    status: Arc<SharedStatus>,
    prices: mpsc::UnboundedReceiver<PriceUpdate>,
    shutdown: watch::Receiver<bool>,
    index: HashMap<TokenId, Vec<Rule>>,
}

impl Worker {
    #[must_use]
    pub fn new(
        store: Arc<dyn RuleStore>,
        executor: Arc<Executor>,
        events: Arc<EventLog>,
        status: Arc<SharedStatus>,
        prices: mpsc::UnboundedReceiver<PriceUpdate>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            store,
            executor,
            events,
            status,
            prices,
            shutdown,
            index: HashMap::new(),
        }
    }

    pub async fn run(mut self) {
        let mut changes = self.store.changes();
        self.rebuild_index().await;
        info!(tokens = self.index.len(), "Worker started");

        loop {
            tokio::select! {
                res = self.shutdown.changed() => {
                    if res.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
                res = changes.changed() => {
                    if res.is_err() {
                        break;
                    }
                    changes.borrow_and_update();
                    self.rebuild_index().await;
                }
                update = self.prices.recv() => {
                    match update {
                        Some(update) => self.handle_price(update).await,
                        None => {
                            warn!("Price channel closed, worker stopping");
                            break;
                        }
                    }
                }
            }
        }
        info!("Worker stopped");
    }

    /// Rebuild the token -> active rules index from the store.
    async fn rebuild_index(&mut self) {
        match self.store.list_active_rules().await {
            Ok(rules) => {
                let mut index: HashMap<TokenId, Vec<Rule>> = HashMap::new();
                for rule in rules {
                    index.entry(rule.token_id.clone()).or_default().push(rule);
                }
                self.index = index;
            }
            Err(e) => {
                warn!(error = %e, "Index rebuild failed, keeping previous index");
            }
        }
    }

    /// Evaluate every active rule watching the updated token.
    async fn handle_price(&mut self, update: PriceUpdate) {
        self.status.mark_sync();

        let Some(rules) = self.index.get(&update.token_id) else {
            return;
        };

        for rule in rules.clone() {
            match evaluate(&rule, update.price) {
                Decision::NoAction => {
                    self.events.rule_evaluated(&rule, update.price, false).await;
                }
                Decision::UpdateTrailing { high_water, trigger } => {
                    match self.store.update_trailing(&rule.id, high_water, trigger).await {
                        Ok(()) => {
                            self.events
                                .trailing_updated(&rule, high_water, rule.trigger_price, trigger)
                                .await;
                            self.apply_trailing_locally(&rule.id, &update.token_id, high_water, trigger);
                        }
                        Err(Error::Conflict { .. }) => {
                            // The rule left ACTIVE under us; the pending
                            // index rebuild will drop it.
                            debug!(rule_id = %rule.id, "Trailing update lost to a concurrent transition");
                        }
                        Err(e) => {
                            warn!(rule_id = %rule.id, error = %e, "Failed to persist trailing update");
                        }
                    }
                    self.events.rule_evaluated(&rule, update.price, false).await;
                }
                Decision::Trigger => {
                    info!(
                        rule_id = %rule.id,
                        token = %update.token_id,
                        price = %update.price,
                        trigger_price = %rule.trigger_price,
                        "Rule triggered"
                    );
                    self.events.rule_evaluated(&rule, update.price, true).await;
                    self.executor.dispatch(rule);
                }
            }
        }
    }

    /// Keep the in-memory copy consistent until the next rebuild so
    /// back-to-back prices evaluate against the advanced trigger.
    fn apply_trailing_locally(
        &mut self,
        rule_id: &crate::domain::RuleId,
        token_id: &TokenId,
        high_water: crate::domain::Price,
        trigger: crate::domain::Price,
    ) {
        if let Some(rules) = self.index.get_mut(token_id) {
            if let Some(rule) = rules.iter_mut().find(|r| &r.id == rule_id) {
                rule.high_water_price = Some(high_water);
                rule.trigger_price = trigger;
            }
        }
    }
}
