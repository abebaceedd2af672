//! Worker status and the dashboard's read surface.
//!
//! Every read is a snapshot assembled at call time; nothing here blocks on
//! the worker. The five read surfaces back the dashboard's endpoints:
//! worker status, rules, positions, trades, events.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use super::positions::PositionCache;
use crate::adapter::feed::MarketFeed;
use crate::domain::{Event, Position, Rule, Trade};
use crate::error::Result;
use crate::port::store::RuleStore;

/// Most rows any dashboard read returns.
const MAX_READ_LIMIT: usize = 100;

/// Ephemeral, process-local worker health. Re-derived on every read.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerStatus {
    pub running: bool,
    pub feed_connected: bool,
    pub active_rules_count: usize,
    pub subscriptions: Vec<String>,
    pub last_sync_time: Option<DateTime<Utc>>,
}

/// Worker-owned mutable status bits.
#[derive(Default)]
pub struct SharedStatus {
    running: AtomicBool,
    last_sync: RwLock<Option<DateTime<Utc>>>,
}

impl SharedStatus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stamp the moment a price was processed.
    pub fn mark_sync(&self) {
        *self.last_sync.write() = Some(Utc::now());
    }

    #[must_use]
    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        *self.last_sync.read()
    }
}

/// Read-only view over the running trade manager.
#[derive(Clone)]
pub struct DashboardReader {
    status: Arc<SharedStatus>,
    feed: MarketFeed,
    store: Arc<dyn RuleStore>,
    positions: Arc<PositionCache>,
}

impl DashboardReader {
    #[must_use]
    pub fn new(
        status: Arc<SharedStatus>,
        feed: MarketFeed,
        store: Arc<dyn RuleStore>,
        positions: Arc<PositionCache>,
    ) -> Self {
        Self {
            status,
            feed,
            store,
            positions,
        }
    }

    /// Current worker health.
    pub async fn worker_status(&self) -> WorkerStatus {
        let active_rules_count = self
            .store
            .list_active_rules()
            .await
            .map(|rules| rules.len())
            .unwrap_or(0);
        WorkerStatus {
            running: self.status.is_running(),
            feed_connected: self.feed.is_connected(),
            active_rules_count,
            subscriptions: self
                .feed
                .subscribed_tokens()
                .iter()
                .map(ToString::to_string)
                .collect(),
            last_sync_time: self.status.last_sync(),
        }
    }

    /// Active plus recently terminated rules.
    pub async fn rules(&self) -> Result<Vec<Rule>> {
        self.store.recent_rules(MAX_READ_LIMIT).await
    }

    /// Cached positions.
    #[must_use]
    pub fn positions(&self) -> Vec<Position> {
        self.positions.snapshot()
    }

    /// Latest trades, newest first, capped at 100.
    pub async fn trades(&self, limit: usize) -> Result<Vec<Trade>> {
        self.store.recent_trades(limit.min(MAX_READ_LIMIT)).await
    }

    /// Latest events, newest first, capped at 100.
    pub async fn events(&self, limit: usize) -> Result<Vec<Event>> {
        self.store.recent_events(limit.min(MAX_READ_LIMIT)).await
    }
}
