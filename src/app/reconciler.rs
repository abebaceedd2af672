//! Subscription reconciler (Activity D).
//!
//! Sole caller of the feed's subscribe/unsubscribe. On a timer and on every
//! rule-store change it diffs the desired token set (tokens of ACTIVE
//! rules) against the feed's current set and issues the delta.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::adapter::feed::MarketFeed;
use crate::domain::TokenId;
use crate::port::store::RuleStore;

/// Compute the subscribe/unsubscribe deltas.
#[must_use]
pub fn diff(
    desired: &BTreeSet<TokenId>,
    current: &BTreeSet<TokenId>,
) -> (Vec<TokenId>, Vec<TokenId>) {
    let to_subscribe = desired.difference(current).cloned().collect();
    let to_unsubscribe = current.difference(desired).cloned().collect();
    (to_subscribe, to_unsubscribe)
}

pub struct SubscriptionReconciler {
    store: Arc<dyn RuleStore>,
    feed: MarketFeed,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl SubscriptionReconciler {
    #[must_use]
    pub fn new(
        store: Arc<dyn RuleStore>,
        feed: MarketFeed,
        interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            store,
            feed,
            interval,
            shutdown,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        let mut changes = self.store.changes();
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                res = changes.changed() => {
                    if res.is_err() {
                        break;
                    }
                }
                res = self.shutdown.changed() => {
                    if res.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
            }
            self.reconcile().await;
        }
        debug!("Subscription reconciler stopped");
    }

    /// One reconciliation pass.
    pub async fn reconcile(&self) {
        let desired: BTreeSet<TokenId> = match self.store.list_active_rules().await {
            Ok(rules) => rules.into_iter().map(|rule| rule.token_id).collect(),
            Err(e) => {
                warn!(error = %e, "Reconcile skipped, cannot list active rules");
                return;
            }
        };
        let current: BTreeSet<TokenId> = self.feed.subscribed_tokens().into_iter().collect();

        let (to_subscribe, to_unsubscribe) = diff(&desired, &current);
        if !to_subscribe.is_empty() {
            debug!(count = to_subscribe.len(), "Subscribing new tokens");
            self.feed.subscribe(&to_subscribe);
        }
        if !to_unsubscribe.is_empty() {
            debug!(count = to_unsubscribe.len(), "Unsubscribing stale tokens");
            self.feed.unsubscribe(&to_unsubscribe);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[&str]) -> BTreeSet<TokenId> {
        ids.iter().map(|id| TokenId::new(*id)).collect()
    }

    #[test]
    fn diff_splits_additions_and_removals() {
        let desired = set(&["a", "b", "c"]);
        let current = set(&["b", "c", "d"]);
        let (subscribe, unsubscribe) = diff(&desired, &current);
        assert_eq!(subscribe, vec![TokenId::new("a")]);
        assert_eq!(unsubscribe, vec![TokenId::new("d")]);
    }

    #[test]
    fn diff_of_equal_sets_is_empty() {
        let tokens = set(&["a", "b"]);
        let (subscribe, unsubscribe) = diff(&tokens, &tokens.clone());
        assert!(subscribe.is_empty());
        assert!(unsubscribe.is_empty());
    }

    #[test]
    fn diff_from_empty_subscribes_everything() {
        let desired = set(&["a", "b"]);
        let (subscribe, unsubscribe) = diff(&desired, &BTreeSet::new());
        assert_eq!(subscribe.len(), 2);
        assert!(unsubscribe.is_empty());
    }
}
