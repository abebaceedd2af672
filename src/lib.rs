//! Tripwire - price-triggered trade automation for prediction markets.
//!
//! A long-running trade manager that subscribes to a venue's real-time
//! market feed, evaluates stop-loss / take-profit / trailing-stop rules
//! against the live price stream, and executes triggered rules with tiered
//! retry and permanent/transient failure classification.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── domain/    # Pure types and the rule evaluator
//! ├── port/      # Traits at the process boundary (feed, broker, store)
//! ├── adapter/   # Websocket feed, broker REST client, SQLite store
//! ├── app/       # Worker loop, executor, reconciler, status reads
//! └── cli/       # run / status / check commands
//! ```
//!
//! Data flow: feed task -> price channel -> worker -> evaluator -> (on
//! trigger) executor -> broker + store + event log. The subscription
//! reconciler independently keeps the feed's token set aligned with the
//! active rules.

pub mod adapter;
pub mod app;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
