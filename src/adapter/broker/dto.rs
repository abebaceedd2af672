//! Broker REST wire types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{Holding, MarketId, Position, Side, TokenId};
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingDto {
    pub token_id: String,
    pub shares: Decimal,
    #[serde(default)]
    pub outcome: String,
    #[serde(default)]
    pub market_title: String,
    #[serde(default)]
    pub redeemable: bool,
}

impl HoldingDto {
    pub fn into_domain(self) -> Holding {
        Holding {
            token_id: TokenId::new(self.token_id),
            shares: self.shares,
            outcome: self.outcome,
            market_title: self.market_title,
            redeemable: self.redeemable,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionDto {
    pub market_id: String,
    pub token_id: String,
    pub side: Side,
    pub quantity: Decimal,
    pub avg_entry_price: Option<Decimal>,
    pub current_price: Decimal,
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub redeemable: bool,
}

impl PositionDto {
    pub fn into_domain(self, fetched_at: DateTime<Utc>) -> Position {
        Position {
            market_id: MarketId::new(self.market_id),
            token_id: TokenId::new(self.token_id),
            side: self.side,
            quantity: self.quantity,
            avg_entry_price: self.avg_entry_price,
            current_price: self.current_price,
            end_date: self.end_date,
            redeemable: self.redeemable,
            last_updated_at: fetched_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PriceResponse {
    pub price: Option<Decimal>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequestDto {
    pub token_id: String,
    pub side: Side,
    pub amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<Decimal>,
}

/// Order placement response envelope.
///
/// The venue acknowledges with identifiers, or answers 200 with a bare
/// `message` when the order did not cross (e.g. "no match").
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponseDto {
    pub success: Option<bool>,
    pub order_id: Option<String>,
    pub tx_id: Option<String>,
    pub message: Option<String>,
}

impl OrderResponseDto {
    /// True when the envelope represents an accepted order.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        if self.success == Some(false) {
            return false;
        }
        self.order_id.is_some() || self.tx_id.is_some()
    }
}

/// Error body the broker attaches to non-2xx answers.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub message: Option<String>,
    pub error: Option<String>,
}

/// Pull a human-readable message out of an error payload, falling back to
/// the raw body.
#[must_use]
pub fn error_message(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(message) = parsed.message.or(parsed.error) {
            return message;
        }
    }
    body.trim().to_string()
}

/// Parse a JSON response body into a DTO.
pub fn parse_body<T: serde::de::DeserializeOwned>(body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| Error::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn position_dto_parses_camel_case() {
        let raw = r#"{
            "marketId": "m-1",
            "tokenId": "t-1",
            "side": "BUY",
            "quantity": "100",
            "avgEntryPrice": "0.55",
            "currentPrice": "0.60",
            "redeemable": false
        }"#;
        let dto: PositionDto = serde_json::from_str(raw).unwrap();
        let position = dto.into_domain(Utc::now());
        assert_eq!(position.quantity, dec!(100));
        assert_eq!(position.avg_entry_price, Some(dec!(0.55)));
        assert!(position.end_date.is_none());
    }

    #[test]
    fn order_response_acceptance() {
        let accepted: OrderResponseDto =
            serde_json::from_str(r#"{"orderId": "O-7", "success": true}"#).unwrap();
        assert!(accepted.is_accepted());

        let no_match: OrderResponseDto =
            serde_json::from_str(r#"{"success": false, "message": "no match"}"#).unwrap();
        assert!(!no_match.is_accepted());

        let bare_message: OrderResponseDto =
            serde_json::from_str(r#"{"message": "no match"}"#).unwrap();
        assert!(!bare_message.is_accepted());
    }

    #[test]
    fn error_message_prefers_structured_body() {
        assert_eq!(error_message(r#"{"message": "invalid price"}"#), "invalid price");
        assert_eq!(error_message(r#"{"error": "market closed"}"#), "market closed");
        assert_eq!(error_message("plain text failure"), "plain text failure");
    }
}
