//! Market feed adapter: wire messages, the websocket client, and the
//! reconnecting feed service.

pub mod message;
pub mod service;
pub mod socket;

pub use service::MarketFeed;
pub use socket::ClobSocket;
