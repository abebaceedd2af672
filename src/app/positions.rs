//! Broker position cache and its periodic refresh activity.
//!
//! The cache feeds two readers: the dashboard's position snapshot and the
//! executor's closed-market gate. A refresh failure keeps the previous
//! snapshot; staleness is preferable to an empty cache.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::{MarketId, Position, TokenId};
use crate::port::broker::Broker;

#[derive(Default)]
pub struct PositionCache {
    by_key: DashMap<(MarketId, TokenId), Position>,
}

impl PositionCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the cached position for one holding.
    #[must_use]
    pub fn position(&self, market_id: &MarketId, token_id: &TokenId) -> Option<Position> {
        self.by_key
            .get(&(market_id.clone(), token_id.clone()))
            .map(|entry| entry.value().clone())
    }

    /// Immutable snapshot of all cached positions.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Position> {
        self.by_key.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Replace the cache contents from a broker read.
    pub fn replace(&self, positions: Vec<Position>) {
        self.by_key.clear();
        for position in positions {
            self.by_key
                .insert((position.market_id.clone(), position.token_id.clone()), position);
        }
    }

    /// Pull fresh positions from the broker, keeping the old snapshot on
    /// failure.
    pub async fn refresh(&self, broker: &dyn Broker) {
        match broker.get_positions().await {
            Ok(positions) => {
                debug!(count = positions.len(), "Refreshed position cache");
                self.replace(positions);
            }
            Err(e) => {
                warn!(error = %e, "Position refresh failed, keeping stale cache");
            }
        }
    }
}

/// Spawn the periodic position refresh (Activity E). Isolated from price
/// handling; the first refresh runs immediately.
pub fn spawn_position_refresh(
    cache: Arc<PositionCache>,
    broker: Arc<dyn Broker>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    cache.refresh(broker.as_ref()).await;
                }
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("Position refresh stopped");
    })
}
