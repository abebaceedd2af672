//! Mock [`Broker`] implementation for testing.
//!
//! [`ScriptedBroker`] serves fixture holdings/positions/prices and replays
//! scripted order outcomes while recording every placed order.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::domain::{Holding, MarketId, OrderId, Position, Price, Side, TokenId};
use crate::port::broker::{Broker, BrokerError, BrokerResult, OrderAck};

/// A recorded `place_order` call.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub token_id: TokenId,
    pub side: Side,
    pub amount: Decimal,
    pub limit_price: Option<Price>,
}

/// A scripted broker.
///
/// Fixture state answers the read calls; `order_results` answers
/// `place_order` in order and defaults to a generated acknowledgement when
/// exhausted. Read calls can be failed on demand via the `*_results`
/// override queues.
pub struct ScriptedBroker {
    holdings: Mutex<Vec<Holding>>,
    positions: Mutex<Vec<Position>>,
    prices: Mutex<HashMap<TokenId, Price>>,
    holdings_results: Mutex<VecDeque<BrokerResult<Vec<Holding>>>>,
    price_results: Mutex<VecDeque<BrokerResult<Price>>>,
    order_results: Mutex<VecDeque<BrokerResult<OrderAck>>>,
    placed_orders: Mutex<Vec<PlacedOrder>>,
}

impl ScriptedBroker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            holdings: Mutex::new(Vec::new()),
            positions: Mutex::new(Vec::new()),
            prices: Mutex::new(HashMap::new()),
            holdings_results: Mutex::new(VecDeque::new()),
            price_results: Mutex::new(VecDeque::new()),
            order_results: Mutex::new(VecDeque::new()),
            placed_orders: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_holdings(self, holdings: Vec<Holding>) -> Self {
        *self.holdings.lock() = holdings;
        self
    }

    #[must_use]
    pub fn with_positions(self, positions: Vec<Position>) -> Self {
        *self.positions.lock() = positions;
        self
    }

    #[must_use]
    pub fn with_price(self, token_id: impl Into<TokenId>, price: Price) -> Self {
        self.prices.lock().insert(token_id.into(), price);
        self
    }

    #[must_use]
    pub fn with_order_results(self, results: Vec<BrokerResult<OrderAck>>) -> Self {
        *self.order_results.lock() = results.into();
        self
    }

    #[must_use]
    pub fn with_holdings_results(self, results: Vec<BrokerResult<Vec<Holding>>>) -> Self {
        *self.holdings_results.lock() = results.into();
        self
    }

    #[must_use]
    pub fn with_price_results(self, results: Vec<BrokerResult<Price>>) -> Self {
        *self.price_results.lock() = results.into();
        self
    }

    /// Every order placed so far, in call order.
    #[must_use]
    pub fn placed_orders(&self) -> Vec<PlacedOrder> {
        self.placed_orders.lock().clone()
    }
}

impl Default for ScriptedBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broker for ScriptedBroker {
    async fn get_holdings(&self) -> BrokerResult<Vec<Holding>> {
        if let Some(result) = self.holdings_results.lock().pop_front() {
            return result;
        }
        Ok(self.holdings.lock().clone())
    }

    async fn get_positions(&self) -> BrokerResult<Vec<Position>> {
        Ok(self.positions.lock().clone())
    }

    async fn get_current_price(
        &self,
        _market_id: &MarketId,
        token_id: &TokenId,
    ) -> BrokerResult<Price> {
        if let Some(result) = self.price_results.lock().pop_front() {
            return result;
        }
        Ok(self
            .prices
            .lock()
            .get(token_id)
            .copied()
            .unwrap_or(Decimal::ZERO))
    }

    async fn place_order(
        &self,
        token_id: &TokenId,
        side: Side,
        amount: Decimal,
        limit_price: Option<Price>,
    ) -> BrokerResult<OrderAck> {
        self.placed_orders.lock().push(PlacedOrder {
            token_id: token_id.clone(),
            side,
            amount,
            limit_price,
        });
        if let Some(result) = self.order_results.lock().pop_front() {
            return result;
        }
        let count = self.placed_orders.lock().len();
        Ok(OrderAck {
            order_id: Some(OrderId::new(format!("scripted-{count}"))),
            tx_id: None,
        })
    }
}

/// Shorthand for a venue rejection.
#[must_use]
pub fn rejection(status: u16, message: &str) -> BrokerError {
    BrokerError::Rejected {
        status,
        message: message.to_string(),
    }
}
