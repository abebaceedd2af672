//! Reconnecting market feed service.
//!
//! [`MarketFeed`] is the handle; a spawned feed task owns the socket and is
//! the only activity that touches the wire. The task produces prices onto an
//! unbounded channel, reconnects with exponential backoff after losses, and
//! resends the aggregate subscription for the desired token set on every
//! successful connect. Subscription calls made while disconnected only
//! record intent; the wire catches up at the next connect.
//!
//! Wire errors never escape this module: they show up as reconnect activity
//! and as `is_connected() == false`.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::FeedConfig;
use crate::domain::{PriceUpdate, TokenId};
use crate::port::feed::{FeedEvent, MarketStream, SubscriptionOp};

/// Exponential backoff state for reconnect scheduling.
///
/// Adds up to 20% clock-derived jitter to each delay to avoid synchronized
/// reconnection storms. The counter resets on a successful connect.
#[derive(Debug)]
pub(crate) struct Backoff {
    initial_ms: u64,
    max_ms: u64,
    multiplier: f64,
    consecutive_failures: u32,
    current_delay_ms: u64,
}

impl Backoff {
    pub(crate) fn new(initial_ms: u64, max_ms: u64, multiplier: f64) -> Self {
        Self {
            initial_ms,
            max_ms,
            multiplier,
            consecutive_failures: 0,
            current_delay_ms: initial_ms,
        }
    }

    /// Return the current delay and advance the schedule for the next call.
    pub(crate) fn next_delay(&mut self) -> Duration {
        let base = Duration::from_millis(self.current_delay_ms);
        let delay = base + Duration::from_millis(self.jitter_ms(base));

        self.consecutive_failures += 1;
        let next = (self.current_delay_ms as f64 * self.multiplier) as u64;
        self.current_delay_ms = next.min(self.max_ms);

        delay
    }

    /// Up to 20% jitter derived from the clock's sub-second nanos.
    fn jitter_ms(&self, base: Duration) -> u64 {
        let jitter_range_ms = (base.as_millis() as u64) / 5;
        if jitter_range_ms == 0 {
            return 0;
        }
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0);
        (nanos as u64) % (jitter_range_ms + 1)
    }

    pub(crate) fn reset(&mut self) {
        self.consecutive_failures = 0;
        self.current_delay_ms = self.initial_ms;
    }

    pub(crate) const fn failures(&self) -> u32 {
        self.consecutive_failures
    }
}

enum FeedCommand {
    /// Desired set changed; send the aggregate subscription again.
    SyncSubscriptions,
    /// These tokens were removed from the desired set.
    Unsubscribe(Vec<TokenId>),
}

struct FeedShared {
    connected: AtomicBool,
    desired: RwLock<BTreeSet<TokenId>>,
}

/// Handle to the feed task. Cloneable; subscription mutations are expected
/// to come from a single caller (the reconciler).
#[derive(Clone)]
pub struct MarketFeed {
    commands: mpsc::UnboundedSender<FeedCommand>,
    shared: Arc<FeedShared>,
}

impl MarketFeed {
    /// Spawn the feed task over `stream` and return the handle plus the
    /// price sequence. The sequence is infinite and not restartable;
    /// consumers must tolerate missed updates across reconnects.
    pub fn spawn<S>(
        stream: S,
        config: &FeedConfig,
        shutdown: watch::Receiver<bool>,
    ) -> (Self, mpsc::UnboundedReceiver<PriceUpdate>)
    where
        S: MarketStream + 'static,
    {
        let shared = Arc::new(FeedShared {
            connected: AtomicBool::new(false),
            desired: RwLock::new(BTreeSet::new()),
        });
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (price_tx, price_rx) = mpsc::unbounded_channel();

        let task = FeedTask {
            stream,
            shared: Arc::clone(&shared),
            commands: command_rx,
            _commands_keepalive: command_tx.clone(),
            prices: price_tx,
            shutdown,
            backoff: Backoff::new(
                config.reconnect_initial_ms,
                config.reconnect_max_ms,
                config.reconnect_multiplier,
            ),
            first_attempt: true,
        };
        tokio::spawn(task.run());

        (
            Self {
                commands: command_tx,
                shared,
            },
            price_rx,
        )
    }

    /// Add tokens to the desired subscription set. Idempotent; tokens
    /// already subscribed cause no wire traffic.
    pub fn subscribe(&self, token_ids: &[TokenId]) {
        let mut changed = false;
        {
            let mut desired = self.shared.desired.write();
            for token in token_ids {
                changed |= desired.insert(token.clone());
            }
        }
        if changed {
            let _ = self.commands.send(FeedCommand::SyncSubscriptions);
        }
    }

    /// Remove tokens from the desired subscription set. Unknown tokens are
    /// a no-op.
    pub fn unsubscribe(&self, token_ids: &[TokenId]) {
        let mut removed = Vec::new();
        {
            let mut desired = self.shared.desired.write();
            for token in token_ids {
                if desired.remove(token) {
                    removed.push(token.clone());
                }
            }
        }
        if !removed.is_empty() {
            let _ = self.commands.send(FeedCommand::Unsubscribe(removed));
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// The desired token set, which is also the subscribed set once the
    /// connection has caught up.
    #[must_use]
    pub fn subscribed_tokens(&self) -> Vec<TokenId> {
        self.shared.desired.read().iter().cloned().collect()
    }
}

/// The feed task: sole owner of the wire (Activity A).
struct FeedTask<S> {
    stream: S,
    shared: Arc<FeedShared>,
    commands: mpsc::UnboundedReceiver<FeedCommand>,
    /// Keeps the command channel open even when every handle is dropped.
    _commands_keepalive: mpsc::UnboundedSender<FeedCommand>,
    prices: mpsc::UnboundedSender<PriceUpdate>,
    shutdown: watch::Receiver<bool>,
    backoff: Backoff,
    first_attempt: bool,
}

impl<S: MarketStream> FeedTask<S> {
    async fn run(mut self) {
        loop {
            if *self.shutdown.borrow() {
                break;
            }
            if !self.shared.connected.load(Ordering::SeqCst) {
                if !self.first_attempt && !self.backoff_sleep().await {
                    break;
                }
                self.first_attempt = false;
                self.establish().await;
                continue;
            }

            tokio::select! {
                res = self.shutdown.changed() => {
                    if res.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
                cmd = self.commands.recv() => {
                    if let Some(cmd) = cmd {
                        self.apply_command(cmd).await;
                    }
                }
                event = self.stream.next_event() => {
                    self.handle_event(event);
                }
            }
        }

        self.shared.connected.store(false, Ordering::SeqCst);
        if let Err(e) = self.stream.close().await {
            debug!(error = %e, "Error closing feed on shutdown");
        }
        info!("Feed task stopped");
    }

    /// One connect attempt; on success, resend the aggregate subscription.
    async fn establish(&mut self) {
        match self.stream.connect().await {
            Ok(()) => {
                let desired = self.desired_snapshot();
                if !desired.is_empty() {
                    if let Err(e) = self
                        .stream
                        .send_subscription(SubscriptionOp::Subscribe, &desired)
                        .await
                    {
                        warn!(error = %e, "Resubscribe failed after connect");
                        return;
                    }
                }
                self.backoff.reset();
                self.shared.connected.store(true, Ordering::SeqCst);
                info!(subscriptions = desired.len(), "Market feed session established");
            }
            Err(e) => {
                warn!(
                    error = %e,
                    attempt = self.backoff.failures() + 1,
                    "Feed connect failed, will retry"
                );
            }
        }
    }

    /// Wait out the backoff delay. Returns false when shutdown arrived.
    async fn backoff_sleep(&mut self) -> bool {
        let delay = self.backoff.next_delay();
        info!(
            delay_ms = delay.as_millis() as u64,
            attempt = self.backoff.failures(),
            "Reconnecting after delay"
        );
        tokio::select! {
            _ = sleep(delay) => true,
            _ = self.shutdown.changed() => !*self.shutdown.borrow(),
        }
    }

    async fn apply_command(&mut self, cmd: FeedCommand) {
        let result = match cmd {
            FeedCommand::SyncSubscriptions => {
                let desired = self.desired_snapshot();
                if desired.is_empty() {
                    return;
                }
                self.stream
                    .send_subscription(SubscriptionOp::Subscribe, &desired)
                    .await
            }
            FeedCommand::Unsubscribe(removed) => {
                self.stream
                    .send_subscription(SubscriptionOp::Unsubscribe, &removed)
                    .await
            }
        };
        if let Err(e) = result {
            warn!(error = %e, "Subscription write failed, treating as disconnect");
            self.shared.connected.store(false, Ordering::SeqCst);
        }
    }

    fn handle_event(&mut self, event: Option<FeedEvent>) {
        match event {
            Some(FeedEvent::Price(update)) => {
                if self.backoff.failures() > 0 {
                    debug!("Received price after reconnection, resetting failure count");
                    self.backoff.reset();
                }
                let _ = self.prices.send(update);
            }
            Some(FeedEvent::Disconnected { reason }) => {
                warn!(reason = %reason, "Feed connection lost, will reconnect");
                self.shared.connected.store(false, Ordering::SeqCst);
            }
            None => {
                warn!("Feed stream ended unexpectedly, will reconnect");
                self.shared.connected.store(false, Ordering::SeqCst);
            }
        }
    }

    fn desired_snapshot(&self) -> Vec<TokenId> {
        self.shared.desired.read().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::feed::ScriptedSocket;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use tokio::time::{timeout, Duration};

    fn fast_config() -> FeedConfig {
        FeedConfig {
            url: "wss://feed.example.com/ws/market".into(),
            reconnect_initial_ms: 5,
            reconnect_max_ms: 50,
            reconnect_multiplier: 2.0,
            ping_interval_secs: 30,
            allow_one_sided_books: true,
        }
    }

    fn price(token: &str, value: rust_decimal::Decimal) -> FeedEvent {
        FeedEvent::Price(PriceUpdate::new(token, value, Utc::now()))
    }

    #[test]
    fn backoff_schedule_doubles_to_cap() {
        let mut backoff = Backoff::new(1000, 60000, 2.0);

        let assert_delay_in_range = |delay: Duration, base_ms: u64| {
            let max_ms = base_ms + base_ms / 5;
            assert!(
                (base_ms..=max_ms).contains(&(delay.as_millis() as u64)),
                "delay {delay:?} not within {base_ms}..={max_ms} ms"
            );
        };

        assert_delay_in_range(backoff.next_delay(), 1000);
        assert_delay_in_range(backoff.next_delay(), 2000);
        assert_delay_in_range(backoff.next_delay(), 4000);
        assert_delay_in_range(backoff.next_delay(), 8000);
        assert_delay_in_range(backoff.next_delay(), 16000);
        assert_delay_in_range(backoff.next_delay(), 32000);
        assert_delay_in_range(backoff.next_delay(), 60000);
        assert_delay_in_range(backoff.next_delay(), 60000); // Capped
    }

    #[test]
    fn backoff_reset_restores_initial_delay() {
        let mut backoff = Backoff::new(1000, 60000, 2.0);
        backoff.next_delay();
        backoff.next_delay();
        assert_eq!(backoff.failures(), 2);

        backoff.reset();
        assert_eq!(backoff.failures(), 0);
        let delay = backoff.next_delay();
        assert!(delay >= Duration::from_millis(1000));
        assert!(delay <= Duration::from_millis(1200));
    }

    #[test]
    fn backoff_zero_base_has_zero_jitter() {
        let backoff = Backoff::new(0, 0, 2.0);
        assert_eq!(backoff.jitter_ms(Duration::from_millis(0)), 0);
    }

    #[tokio::test]
    async fn prices_flow_to_the_channel() {
        let socket = ScriptedSocket::new().with_events(vec![
            Some(price("t-1", dec!(0.46))),
            Some(price("t-1", dec!(0.40))),
        ]);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (_feed, mut prices) = MarketFeed::spawn(socket, &fast_config(), shutdown_rx);

        let first = timeout(Duration::from_secs(1), prices.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.price, dec!(0.46));
        let second = timeout(Duration::from_secs(1), prices.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.price, dec!(0.40));
    }

    #[tokio::test]
    async fn subscribe_before_connect_records_desired_set() {
        let socket = ScriptedSocket::new()
            .with_connect_results(vec![Err(crate::error::Error::Connection("down".into()))]);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (feed, _prices) = MarketFeed::spawn(socket, &fast_config(), shutdown_rx);

        feed.subscribe(&[TokenId::new("t-1"), TokenId::new("t-2")]);
        feed.subscribe(&[TokenId::new("t-1")]);

        let tokens = feed.subscribed_tokens();
        assert_eq!(tokens.len(), 2);
    }

    #[tokio::test]
    async fn unsubscribe_unknown_token_is_a_noop() {
        let socket = ScriptedSocket::new();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (feed, _prices) = MarketFeed::spawn(socket, &fast_config(), shutdown_rx);

        feed.unsubscribe(&[TokenId::new("missing")]);
        assert!(feed.subscribed_tokens().is_empty());
    }

    #[tokio::test]
    async fn reconnect_resends_aggregate_subscription() {
        let socket = ScriptedSocket::new().with_events(vec![
            Some(FeedEvent::Disconnected {
                reason: "connection lost".into(),
            }),
            Some(price("t-1", dec!(0.5))),
        ]);
        let subscriptions = socket.subscriptions();
        let connects = socket.connect_count();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (feed, mut prices) = MarketFeed::spawn(socket, &fast_config(), shutdown_rx);

        feed.subscribe(&[TokenId::new("t-1"), TokenId::new("t-2")]);

        // A price after the disconnect proves the reconnect happened.
        let update = timeout(Duration::from_secs(2), prices.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(update.price, dec!(0.5));
        assert!(connects.load(std::sync::atomic::Ordering::SeqCst) >= 2);

        // The reconnect sent one aggregate subscribe naming both tokens,
        // before any further price was processed.
        let sent = subscriptions.lock().clone();
        let aggregate = sent
            .iter()
            .rev()
            .find(|(op, _)| *op == SubscriptionOp::Subscribe)
            .expect("aggregate resubscribe");
        assert_eq!(aggregate.1.len(), 2);
    }

    #[tokio::test]
    async fn shutdown_stops_the_task_and_closes_the_stream() {
        let socket = ScriptedSocket::new();
        let closes = socket.close_count();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (feed, _prices) = MarketFeed::spawn(socket, &fast_config(), shutdown_rx);

        shutdown_tx.send(true).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(closes.load(std::sync::atomic::Ordering::SeqCst), 1);
        drop(feed);
    }
}
