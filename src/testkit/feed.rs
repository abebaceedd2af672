//! Mock [`MarketStream`] implementations for testing.
//!
//! Two mock socket types for different testing needs:
//!
//! - [`ScriptedSocket`] — pre-loaded connect results and events.
//!   Best for: error handling, reconnection logic, retry behaviour.
//!
//! - [`ChannelSocket`] — channel-backed socket with an external control
//!   handle. Best for: integration tests needing precise, on-demand event
//!   delivery.
//!
//! Both record every subscription written to the "wire", which is how
//! tests observe resubscription behaviour without a server.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::domain::{PriceUpdate, TokenId};
use crate::error::Result;
use crate::port::feed::{FeedEvent, MarketStream, SubscriptionOp};

/// A scripted market stream.
///
/// Each `connect()` / `send_subscription()` call pops the next result from
/// the corresponding queue (defaults to `Ok(())` when exhausted). Events
/// are replayed in order; an explicit `None` entry ends the stream, while
/// an exhausted queue pends forever like a quiet live connection.
pub struct ScriptedSocket {
    connect_results: Mutex<VecDeque<Result<()>>>,
    subscription_results: Mutex<VecDeque<Result<()>>>,
    events: Mutex<VecDeque<Option<FeedEvent>>>,
    connect_count: Arc<AtomicU32>,
    close_count: Arc<AtomicU32>,
    subscriptions: Arc<Mutex<Vec<(SubscriptionOp, Vec<TokenId>)>>>,
}

impl ScriptedSocket {
    #[must_use]
    pub fn new() -> Self {
        Self {
            connect_results: Mutex::new(VecDeque::new()),
            subscription_results: Mutex::new(VecDeque::new()),
            events: Mutex::new(VecDeque::new()),
            connect_count: Arc::new(AtomicU32::new(0)),
            close_count: Arc::new(AtomicU32::new(0)),
            subscriptions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    #[must_use]
    pub fn with_connect_results(self, results: Vec<Result<()>>) -> Self {
        *self.connect_results.lock() = results.into();
        self
    }

    #[must_use]
    pub fn with_subscription_results(self, results: Vec<Result<()>>) -> Self {
        *self.subscription_results.lock() = results.into();
        self
    }

    #[must_use]
    pub fn with_events(self, events: Vec<Option<FeedEvent>>) -> Self {
        *self.events.lock() = events.into();
        self
    }

    /// Shared counter of `connect()` calls.
    #[must_use]
    pub fn connect_count(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.connect_count)
    }

    /// Shared counter of `close()` calls.
    #[must_use]
    pub fn close_count(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.close_count)
    }

    /// Shared record of every subscription written to the wire.
    #[must_use]
    pub fn subscriptions(&self) -> Arc<Mutex<Vec<(SubscriptionOp, Vec<TokenId>)>>> {
        Arc::clone(&self.subscriptions)
    }
}

impl Default for ScriptedSocket {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketStream for ScriptedSocket {
    async fn connect(&mut self) -> Result<()> {
        self.connect_count.fetch_add(1, Ordering::SeqCst);
        self.connect_results.lock().pop_front().unwrap_or(Ok(()))
    }

    async fn send_subscription(&mut self, op: SubscriptionOp, token_ids: &[TokenId]) -> Result<()> {
        self.subscriptions.lock().push((op, token_ids.to_vec()));
        self.subscription_results.lock().pop_front().unwrap_or(Ok(()))
    }

    async fn next_event(&mut self) -> Option<FeedEvent> {
        let next = self.events.lock().pop_front();
        match next {
            Some(event) => event,
            // No more scripted events: behave like a quiet open connection.
            None => futures_util::future::pending().await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.close_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ChannelSocket
// ---------------------------------------------------------------------------

/// External control handle for a [`ChannelSocket`].
#[derive(Clone)]
pub struct SocketControl {
    events: mpsc::UnboundedSender<Option<FeedEvent>>,
    connect_count: Arc<AtomicU32>,
    subscriptions: Arc<Mutex<Vec<(SubscriptionOp, Vec<TokenId>)>>>,
}

impl SocketControl {
    /// Deliver a price update.
    pub fn push_price(&self, update: PriceUpdate) {
        let _ = self.events.send(Some(FeedEvent::Price(update)));
    }

    /// Deliver a connection loss.
    pub fn push_disconnect(&self, reason: &str) {
        let _ = self.events.send(Some(FeedEvent::Disconnected {
            reason: reason.to_string(),
        }));
    }

    /// End the stream (the socket reports `None`).
    pub fn end_stream(&self) {
        let _ = self.events.send(None);
    }

    #[must_use]
    pub fn connect_count(&self) -> u32 {
        self.connect_count.load(Ordering::SeqCst)
    }

    /// Every subscription written to the wire so far.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<(SubscriptionOp, Vec<TokenId>)> {
        self.subscriptions.lock().clone()
    }
}

/// A socket whose events are driven on demand through a [`SocketControl`].
pub struct ChannelSocket {
    events: mpsc::UnboundedReceiver<Option<FeedEvent>>,
    connect_count: Arc<AtomicU32>,
    subscriptions: Arc<Mutex<Vec<(SubscriptionOp, Vec<TokenId>)>>>,
}

impl ChannelSocket {
    #[must_use]
    pub fn new() -> (Self, SocketControl) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connect_count = Arc::new(AtomicU32::new(0));
        let subscriptions = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                events: rx,
                connect_count: Arc::clone(&connect_count),
                subscriptions: Arc::clone(&subscriptions),
            },
            SocketControl {
                events: tx,
                connect_count,
                subscriptions,
            },
        )
    }
}

#[async_trait]
impl MarketStream for ChannelSocket {
    async fn connect(&mut self) -> Result<()> {
        self.connect_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn send_subscription(&mut self, op: SubscriptionOp, token_ids: &[TokenId]) -> Result<()> {
        self.subscriptions.lock().push((op, token_ids.to_vec()));
        Ok(())
    }

    async fn next_event(&mut self) -> Option<FeedEvent> {
        self.events.recv().await.flatten()
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
