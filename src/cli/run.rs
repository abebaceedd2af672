//! Handler for the `run` command.

use std::sync::Arc;

use tokio::signal;
use tracing::{error, info};

use crate::adapter::broker::HttpBroker;
use crate::adapter::feed::ClobSocket;
use crate::adapter::sqlite::{create_pool, run_migrations, SqliteRuleStore};
use crate::app::TradeManager;
use crate::cli::RunArgs;
use crate::config::Config;
use crate::error::Result;

/// Execute the run command: assemble the real adapters, start every
/// activity, and wait for ctrl-c.
pub async fn execute(config: Config, args: &RunArgs) -> Result<()> {
    let mut config = config;
    if args.json_logs {
        config.logging.format = "json".to_string();
    }
    config.logging.init();

    info!(version = env!("CARGO_PKG_VERSION"), "tripwire starting");

    let pool = create_pool(&config.store.database_path)?;
    run_migrations(&pool)?;
    let store = Arc::new(SqliteRuleStore::new(pool, config.store.event_retention));

    let broker = Arc::new(HttpBroker::new(&config.broker)?);
    let socket = ClobSocket::new(
        config.feed.url.clone(),
        config.feed.ping_interval(),
        config.feed.allow_one_sided_books,
    );

    let manager = TradeManager::start(&config, socket, broker, store);

    match signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(e) => error!(error = %e, "Cannot listen for shutdown signal"),
    }

    manager.shutdown().await;
    Ok(())
}
