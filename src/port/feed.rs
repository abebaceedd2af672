//! Market feed port: the socket-level seam for real-time price data.
//!
//! [`MarketStream`] is one websocket connection's worth of behaviour:
//! connect, send subscription operations, read events. Reconnection,
//! keepalive scheduling, and the desired-subscription bookkeeping live a
//! level up in [`crate::adapter::feed::MarketFeed`], which drives any
//! implementation of this trait. Tests substitute a scripted stream.

use async_trait::async_trait;

use crate::domain::{PriceUpdate, TokenId};
use crate::error::Result;

/// Discriminator carried on outbound subscription messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionOp {
    Subscribe,
    Unsubscribe,
}

impl SubscriptionOp {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Subscribe => "subscribe",
            Self::Unsubscribe => "unsubscribe",
        }
    }
}

/// Event surfaced by a [`MarketStream`].
///
/// Connection state is a separate signal from the price sequence: wire
/// errors appear only as `Disconnected` and never inside price handling.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// A usable price derived from an inbound frame, already normalized
    /// into (0, 1].
    Price(PriceUpdate),
    /// The connection was lost or closed by the server.
    Disconnected { reason: String },
}

/// One persistent duplex connection to the venue's market channel.
///
/// # Lifecycle
///
/// 1. [`connect`](Self::connect) establishes the socket.
/// 2. [`send_subscription`](Self::send_subscription) registers interest.
/// 3. [`next_event`](Self::next_event) is polled in a loop; `None` or
///    `Disconnected` means the connection is gone and a fresh `connect`
///    is required.
#[async_trait]
pub trait MarketStream: Send {
    /// Establish the connection.
    ///
    /// # Errors
    /// Returns an error when the endpoint is unreachable or the handshake
    /// fails.
    async fn connect(&mut self) -> Result<()>;

    /// Send one subscription message naming `token_ids` with the given
    /// operation discriminator.
    ///
    /// # Errors
    /// Returns an error when the socket is not connected or the write fails.
    async fn send_subscription(&mut self, op: SubscriptionOp, token_ids: &[TokenId]) -> Result<()>;

    /// Read the next event. Returns `None` when the stream has ended.
    async fn next_event(&mut self) -> Option<FeedEvent>;

    /// Send a close frame and drop the connection. Used on shutdown;
    /// a close initiated here must not be treated as a reconnectable loss.
    async fn close(&mut self) -> Result<()>;
}
