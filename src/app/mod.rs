//! Application layer: the worker loop and its collaborators.

pub mod events;
pub mod executor;
pub mod positions;
pub mod reconciler;
pub mod runtime;
pub mod single_flight;
pub mod status;
pub mod worker;

pub use events::EventLog;
pub use executor::{classify, Executor, FailureKind};
pub use positions::PositionCache;
pub use reconciler::SubscriptionReconciler;
pub use runtime::TradeManager;
pub use single_flight::SingleFlight;
pub use status::{DashboardReader, SharedStatus, WorkerStatus};
pub use worker::Worker;
