//! HTTP implementation of the [`Broker`] port.
//!
//! Thin REST client. Transport failures (including the per-call timeout)
//! surface as [`BrokerError::Transport`]; any answered non-acceptance keeps
//! its HTTP status and message for the executor's classification.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use tracing::{debug, info};

use super::dto::{
    error_message, parse_body, HoldingDto, OrderRequestDto, OrderResponseDto, PositionDto,
    PriceResponse,
};
use crate::config::BrokerConfig;
use crate::domain::{Holding, MarketId, Position, Price, Side, TokenId};
use crate::error::{Error, Result};
use crate::port::broker::{Broker, BrokerError, BrokerResult, OrderAck};

pub struct HttpBroker {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpBroker {
    /// Build a client with the configured per-call timeout.
    ///
    /// # Errors
    /// Returns a configuration error when the HTTP client cannot be built.
    pub fn new(config: &BrokerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::Config(format!("cannot build broker client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> BrokerResult<T> {
        let url = format!("{}{path}", self.base_url);
        debug!(url = %url, "Broker GET");

        let mut request = self.client.get(&url);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| BrokerError::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BrokerError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(BrokerError::Rejected {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        parse_body(&body).map_err(|e| BrokerError::Transport(e.to_string()))
    }
}

#[async_trait]
impl Broker for HttpBroker {
    async fn get_holdings(&self) -> BrokerResult<Vec<Holding>> {
        let holdings: Vec<HoldingDto> = self.get_json("/holdings").await?;
        Ok(holdings.into_iter().map(HoldingDto::into_domain).collect())
    }

    async fn get_positions(&self) -> BrokerResult<Vec<Position>> {
        let positions: Vec<PositionDto> = self.get_json("/positions").await?;
        let fetched_at = Utc::now();
        Ok(positions
            .into_iter()
            .map(|dto| dto.into_domain(fetched_at))
            .collect())
    }

    async fn get_current_price(
        &self,
        market_id: &MarketId,
        token_id: &TokenId,
    ) -> BrokerResult<Price> {
        let path = format!("/price?market={market_id}&token={token_id}");
        let response: PriceResponse = self.get_json(&path).await?;
        Ok(response.price.unwrap_or(Decimal::ZERO))
    }

    async fn place_order(
        &self,
        token_id: &TokenId,
        side: Side,
        amount: Decimal,
        limit_price: Option<Price>,
    ) -> BrokerResult<OrderAck> {
        let url = format!("{}/orders", self.base_url);
        let request_body = OrderRequestDto {
            token_id: token_id.to_string(),
            side,
            amount,
            limit_price,
        };
        info!(
            token = %token_id,
            side = side.as_str(),
            amount = %amount,
            limit_price = ?limit_price,
            "Placing order"
        );

        let mut request = self.client.post(&url).json(&request_body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| BrokerError::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BrokerError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(BrokerError::Rejected {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let ack: OrderResponseDto =
            parse_body(&body).map_err(|e| BrokerError::Transport(e.to_string()))?;
        if !ack.is_accepted() {
            // A 200 can still carry a rejection (e.g. "no match").
            return Err(BrokerError::Rejected {
                status: StatusCode::OK.as_u16(),
                message: ack.message.unwrap_or_else(|| "order rejected".into()),
            });
        }

        Ok(OrderAck {
            order_id: ack.order_id.map(Into::into),
            tx_id: ack.tx_id,
        })
    }
}
