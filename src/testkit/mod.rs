//! Test doubles and fixtures.
//!
//! Compiled for unit tests and, behind the `testkit` feature, for
//! integration tests and downstream consumers that want scripted fakes:
//!
//! - [`feed::ScriptedSocket`] — scripted market stream with a recorded wire.
//! - [`broker::ScriptedBroker`] — fixture holdings/prices, scripted orders.
//! - [`store::MemoryRuleStore`] — in-memory store with CAS semantics.
//! - [`domain`] — fixture constructors.

pub mod broker;
pub mod domain;
pub mod feed;
pub mod store;
