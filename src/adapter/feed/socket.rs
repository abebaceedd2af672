//! Websocket implementation of [`MarketStream`].
//!
//! Owns exactly one connection to the venue's market channel. Parses
//! inbound frames, derives usable prices, answers pings, and emits a
//! keepalive ping on a timer. Reconnection is not handled here; the feed
//! service drives a fresh [`connect`](MarketStream::connect) when this
//! stream reports a disconnect.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::{interval_at, Instant, Interval};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, trace, warn};

use super::message::{FeedFrame, FeedPayload, SubscriptionMessage};
use crate::domain::{PriceUpdate, TokenId};
use crate::error::Result;
use crate::port::feed::{FeedEvent, MarketStream, SubscriptionOp};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Market-channel websocket client.
pub struct ClobSocket {
    url: String,
    ping_interval: Duration,
    allow_one_sided: bool,
    ws: Option<Socket>,
    ping: Option<Interval>,
    /// Buffer for extra prices when one payload carries a batch of frames.
    pending: VecDeque<PriceUpdate>,
}

impl ClobSocket {
    #[must_use]
    pub fn new(url: String, ping_interval: Duration, allow_one_sided: bool) -> Self {
        Self {
            url,
            ping_interval,
            allow_one_sided,
            ws: None,
            ping: None,
            pending: VecDeque::new(),
        }
    }

    /// Turn one inbound frame into a price, if it carries one.
    fn price_from_frame(&self, frame: FeedFrame) -> Option<PriceUpdate> {
        match frame {
            FeedFrame::Book(book) => {
                let price = book.mid_price(self.allow_one_sided)?;
                let timestamp = parse_wire_timestamp(book.timestamp.as_deref());
                Some(PriceUpdate::new(TokenId::new(book.asset_id), price, timestamp))
            }
            FeedFrame::LastTradePrice(trade) => {
                let price = trade.usable_price()?;
                let timestamp = parse_wire_timestamp(trade.timestamp.as_deref());
                Some(PriceUpdate::new(TokenId::new(trade.asset_id), price, timestamp))
            }
            FeedFrame::PriceChange(_) => {
                trace!("Dropping price_change frame");
                None
            }
            FeedFrame::BestBidAsk(_) => {
                trace!("Dropping best_bid_ask frame");
                None
            }
            FeedFrame::Unknown => {
                debug!("Ignoring frame with unrecognized event_type");
                None
            }
        }
    }

    /// Parse a text payload and queue every derived price.
    fn ingest_text(&mut self, text: &str) {
        match serde_json::from_str::<FeedPayload>(text) {
            Ok(payload) => {
                for frame in payload.into_frames() {
                    if let Some(update) = self.price_from_frame(frame) {
                        self.pending.push_back(update);
                    }
                }
            }
            Err(e) => {
                // The server sends plain-text diagnostics on protocol errors.
                error!(error = %e, payload = %truncate(text, 120), "Non-JSON feed payload");
            }
        }
    }
}

#[async_trait]
impl MarketStream for ClobSocket {
    async fn connect(&mut self) -> Result<()> {
        info!(url = %self.url, "Connecting to market feed");
        let (ws, response) = connect_async(&self.url).await?;
        info!(status = %response.status(), "Market feed connected");
        self.ws = Some(ws);
        self.ping = Some(interval_at(
            Instant::now() + self.ping_interval,
            self.ping_interval,
        ));
        self.pending.clear();
        Ok(())
    }

    async fn send_subscription(&mut self, op: SubscriptionOp, token_ids: &[TokenId]) -> Result<()> {
        let ws = self
            .ws
            .as_mut()
            .ok_or_else(|| crate::error::Error::Connection("Not connected".into()))?;

        let asset_ids: Vec<String> = token_ids.iter().map(|t| t.as_str().to_string()).collect();
        let json = serde_json::to_string(&SubscriptionMessage::new(op, asset_ids.clone()))?;

        // Log a truncated view of assets to avoid spam
        let total = asset_ids.len();
        if total <= 5 {
            info!(operation = op.as_str(), assets = ?asset_ids, "Sending subscription");
        } else {
            let preview: Vec<_> = asset_ids.iter().take(5).collect();
            info!(
                operation = op.as_str(),
                assets = ?preview,
                more = total - 5,
                "Sending subscription"
            );
        }
        ws.send(Message::Text(json)).await?;
        Ok(())
    }

    async fn next_event(&mut self) -> Option<FeedEvent> {
        loop {
            if let Some(update) = self.pending.pop_front() {
                return Some(FeedEvent::Price(update));
            }

            let ws = self.ws.as_mut()?;
            let ping = self.ping.as_mut()?;

            let msg = tokio::select! {
                _ = ping.tick() => {
                    trace!("Sending keepalive ping");
                    if let Err(e) = ws.send(Message::Ping(Vec::new())).await {
                        return Some(FeedEvent::Disconnected { reason: e.to_string() });
                    }
                    continue;
                }
                msg = ws.next() => msg?,
            };

            match msg {
                Ok(Message::Text(text)) => {
                    trace!(bytes = text.len(), "Received feed text frame");
                    self.ingest_text(&text);
                }
                Ok(Message::Ping(data)) => {
                    trace!("Answering feed ping");
                    let ws = self.ws.as_mut()?;
                    if ws.send(Message::Pong(data)).await.is_err() {
                        return Some(FeedEvent::Disconnected {
                            reason: "Failed to send pong".into(),
                        });
                    }
                }
                Ok(Message::Close(frame)) => {
                    info!(frame = ?frame, "Feed closed by server");
                    return Some(FeedEvent::Disconnected {
                        reason: frame.map(|f| f.reason.to_string()).unwrap_or_default(),
                    });
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "Feed websocket error");
                    return Some(FeedEvent::Disconnected { reason: e.to_string() });
                }
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut ws) = self.ws.take() {
            info!("Closing market feed");
            ws.close(None).await?;
        }
        self.ping = None;
        Ok(())
    }
}

fn parse_wire_timestamp(raw: Option<&str>) -> DateTime<Utc> {
    raw.and_then(|s| s.parse::<i64>().ok())
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or_else(Utc::now)
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
