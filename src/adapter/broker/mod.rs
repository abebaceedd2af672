//! Broker REST adapter.

pub mod dto;
pub mod http;

pub use http::HttpBroker;
