//! Market feed wire messages.
//!
//! Frames are JSON. Inbound frames carry an `event_type` discriminator;
//! outbound subscription messages name the full desired token set plus a
//! `subscribe`/`unsubscribe` operation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::price::normalize_feed_price;
use crate::port::feed::SubscriptionOp;

/// Outbound subscription request for the market channel.
#[derive(Debug, Serialize)]
pub struct SubscriptionMessage {
    pub auth: EmptyAuth,
    #[serde(rename = "type")]
    pub channel: String,
    pub assets_ids: Vec<String>,
    pub operation: String,
}

/// The market channel needs no credentials; the venue still expects the key.
#[derive(Debug, Default, Serialize)]
pub struct EmptyAuth {}

impl SubscriptionMessage {
    pub fn new(op: SubscriptionOp, asset_ids: Vec<String>) -> Self {
        Self {
            auth: EmptyAuth {},
            channel: "market".into(),
            assets_ids: asset_ids,
            operation: op.as_str().into(),
        }
    }
}

/// Inbound frames, tagged by `event_type`.
///
/// `price_change` and `best_bid_ask` are recognized but yield no price;
/// anything else is logged and ignored by the socket.
#[derive(Debug, Deserialize)]
#[serde(tag = "event_type")]
pub enum FeedFrame {
    #[serde(rename = "book")]
    Book(BookFrame),

    #[serde(rename = "price_change")]
    PriceChange(serde_json::Value),

    #[serde(rename = "last_trade_price")]
    LastTradePrice(LastTradeFrame),

    #[serde(rename = "best_bid_ask")]
    BestBidAsk(serde_json::Value),

    #[serde(other)]
    Unknown,
}

/// A text payload may carry one frame or a batch.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum FeedPayload {
    Many(Vec<FeedFrame>),
    One(FeedFrame),
}

impl FeedPayload {
    /// Flatten into individual frames.
    #[must_use]
    pub fn into_frames(self) -> Vec<FeedFrame> {
        match self {
            Self::Many(frames) => frames,
            Self::One(frame) => vec![frame],
        }
    }
}

/// Order book snapshot for one token.
#[derive(Debug, Deserialize)]
pub struct BookFrame {
    pub asset_id: String,
    pub market: Option<String>,
    #[serde(default)]
    pub buys: Vec<WireLevel>,
    #[serde(default)]
    pub sells: Vec<WireLevel>,
    pub timestamp: Option<String>,
    pub hash: Option<String>,
}

/// Price level as received from the feed (strings, not decimals).
#[derive(Debug, Clone, Deserialize)]
pub struct WireLevel {
    pub price: String,
    pub size: String,
}

impl WireLevel {
    pub fn price_decimal(&self) -> Option<Decimal> {
        self.price.parse().ok()
    }

    pub fn size_decimal(&self) -> Option<Decimal> {
        self.size.parse().ok()
    }
}

impl BookFrame {
    /// Best bid is the highest buy; the arrays are not trusted to be sorted.
    fn best_bid(&self) -> Option<Decimal> {
        self.buys.iter().filter_map(WireLevel::price_decimal).max()
    }

    /// Best ask is the lowest sell.
    fn best_ask(&self) -> Option<Decimal> {
        self.sells.iter().filter_map(WireLevel::price_decimal).min()
    }

    /// Derive a usable price from the book.
    ///
    /// Mean of best bid and best ask when both sides are present. With
    /// `allow_one_sided`, a book with a single populated side yields that
    /// side's best price. An empty book yields nothing. The result is
    /// normalized into (0, 1].
    #[must_use]
    pub fn mid_price(&self, allow_one_sided: bool) -> Option<Decimal> {
        let raw = match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => (bid + ask) / Decimal::TWO,
            (Some(single), None) | (None, Some(single)) if allow_one_sided => single,
            _ => return None,
        };
        normalize_feed_price(raw)
    }
}

/// Last traded price for one token.
#[derive(Debug, Deserialize)]
pub struct LastTradeFrame {
    pub asset_id: String,
    pub market: Option<String>,
    pub price: Option<String>,
    pub timestamp: Option<String>,
}

impl LastTradeFrame {
    /// The traded price, discarded unless it falls in (0, 1].
    #[must_use]
    pub fn usable_price(&self) -> Option<Decimal> {
        let price: Decimal = self.price.as_deref()?.parse().ok()?;
        if price <= Decimal::ZERO || price > Decimal::ONE {
            return None;
        }
        Some(price)
    }
}
