//! Venue-agnostic domain types and pure rule logic.

pub mod evaluate;
pub mod event;
pub mod id;
pub mod position;
pub mod price;
pub mod rule;
pub mod trade;

pub use evaluate::{evaluate, Decision};
pub use event::{Event, EventType};
pub use id::{MarketId, OrderId, RuleId, TokenId};
pub use position::{Holding, Position};
pub use price::{Price, PriceUpdate};
pub use rule::{Rule, RuleAction, RuleStatus, RuleType, Side};
pub use trade::Trade;
