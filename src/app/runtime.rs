//! Trade manager assembly: wires the feed, worker, executor, reconciler,
//! and position refresh into one running unit with a shared shutdown
//! signal.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use super::events::EventLog;
use super::executor::Executor;
use super::positions::{spawn_position_refresh, PositionCache};
use super::reconciler::SubscriptionReconciler;
use super::status::{DashboardReader, SharedStatus};
use super::worker::Worker;
use crate::adapter::feed::MarketFeed;
use crate::config::Config;
use crate::port::broker::Broker;
use crate::port::feed::MarketStream;
use crate::port::store::RuleStore;

/// A running trade manager.
pub struct TradeManager {
    dashboard: DashboardReader,
    status: Arc<SharedStatus>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl TradeManager {
    /// Start every activity. The feed connects lazily; a failed first
    /// connect is reconnect activity, not a startup error.
    pub fn start<S>(
        config: &Config,
        stream: S,
        broker: Arc<dyn Broker>,
        store: Arc<dyn RuleStore>,
    ) -> Self
    where
        S: MarketStream + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let (feed, prices) = MarketFeed::spawn(stream, &config.feed, shutdown_rx.clone());
        let positions = Arc::new(PositionCache::new());
        let status = Arc::new(SharedStatus::new());
        let events = Arc::new(EventLog::new(
            Arc::clone(&store),
            config.worker.evaluation_event_interval(),
        ));
        let executor = Arc::new(Executor::new(
            Arc::clone(&broker),
            Arc::clone(&store),
            Arc::clone(&events),
            Arc::clone(&positions),
            config.execution.clone(),
        ));

        let worker = Worker::new(
            Arc::clone(&store),
            executor,
            events,
            Arc::clone(&status),
            prices,
            shutdown_rx.clone(),
        );
        let reconciler = SubscriptionReconciler::new(
            Arc::clone(&store),
            feed.clone(),
            config.worker.reconcile_interval(),
            shutdown_rx.clone(),
        );
        let refresh = spawn_position_refresh(
            Arc::clone(&positions),
            broker,
            config.worker.position_refresh_interval(),
            shutdown_rx,
        );

        let tasks = vec![tokio::spawn(worker.run()), reconciler.spawn(), refresh];
        status.set_running(true);
        info!("Trade manager started");

        Self {
            dashboard: DashboardReader::new(Arc::clone(&status), feed, store, positions),
            status,
            shutdown_tx,
            tasks,
        }
    }

    /// The read-only view backing the dashboard endpoints.
    #[must_use]
    pub fn dashboard(&self) -> &DashboardReader {
        &self.dashboard
    }

    /// Signal every activity to stop and wait for them to drain.
    pub async fn shutdown(self) {
        info!("Trade manager stopping");
        self.status.set_running(false);
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
        info!("Trade manager stopped");
    }
}
