//! Broker port: the trading venue's REST surface, abstracted.
//!
//! Broker failures are never propagated as process errors; the executor
//! classifies them into permanent/transient rule outcomes. The error type
//! therefore keeps the raw HTTP status and message for classification.

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::{Holding, MarketId, OrderId, Position, Price, Side, TokenId};

/// Failure talking to the broker.
#[derive(Debug, Clone, Error)]
pub enum BrokerError {
    /// The venue answered and did not accept the request. Carries the HTTP
    /// status (200 when the rejection rode in a success envelope) and the
    /// venue's message.
    #[error("broker rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The request never completed: connection failures, timeouts,
    /// malformed responses.
    #[error("broker transport error: {0}")]
    Transport(String),
}

impl BrokerError {
    /// The venue's message when one was received.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Rejected { message, .. } => message,
            Self::Transport(message) => message,
        }
    }

    /// The HTTP status when the venue answered.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            Self::Transport(_) => None,
        }
    }
}

pub type BrokerResult<T> = std::result::Result<T, BrokerError>;

/// Acknowledgement of a placed order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderAck {
    pub order_id: Option<OrderId>,
    pub tx_id: Option<String>,
}

/// The trading venue, reduced to the four operations the trade manager needs.
///
/// Implementations must be thread-safe (`Send + Sync`); executor tasks call
/// concurrently for different rules.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Current wallet holdings.
    async fn get_holdings(&self) -> BrokerResult<Vec<Holding>>;

    /// Current open positions.
    async fn get_positions(&self) -> BrokerResult<Vec<Position>>;

    /// Latest tradeable price for a token, `0` when the venue has no
    /// order-book data.
    async fn get_current_price(&self, market_id: &MarketId, token_id: &TokenId)
        -> BrokerResult<Price>;

    /// Place an order. `limit_price = None` places a market order.
    async fn place_order(
        &self,
        token_id: &TokenId,
        side: Side,
        amount: Decimal,
        limit_price: Option<Price>,
    ) -> BrokerResult<OrderAck>;
}
