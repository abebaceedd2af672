//! Handler for the `check` command: validate and print the effective
//! configuration.

use owo_colors::OwoColorize;

use crate::config::Config;
use crate::error::Result;

/// Execute the check command. The config was already loaded and validated;
/// reaching this point means it is usable.
pub fn execute(config: &Config) -> Result<()> {
    println!("{}", "Configuration OK".green().bold());
    println!("  feed.url                  {}", config.feed.url);
    println!(
        "  feed.reconnect            {} ms -> {} ms (x{})",
        config.feed.reconnect_initial_ms,
        config.feed.reconnect_max_ms,
        config.feed.reconnect_multiplier
    );
    println!("  feed.ping_interval        {} s", config.feed.ping_interval_secs);
    println!(
        "  feed.allow_one_sided      {}",
        config.feed.allow_one_sided_books
    );
    println!("  broker.api_url            {}", config.broker.api_url);
    println!(
        "  broker.api_key            {}",
        if config.broker.api_key.is_empty() {
            "(unset)".to_string()
        } else {
            "(set)".to_string()
        }
    );
    println!("  broker.timeout            {} s", config.broker.timeout_secs);
    println!("  store.database_path       {}", config.store.database_path);
    println!("  store.event_retention     {}", config.store.event_retention);
    println!(
        "  worker.reconcile          {} s",
        config.worker.reconcile_interval_secs
    );
    println!(
        "  worker.position_refresh   {} s",
        config.worker.position_refresh_interval_secs
    );
    println!(
        "  worker.evaluation_events  one per rule per {} s",
        config.worker.evaluation_event_secs
    );
    println!(
        "  execution.slippage        stop-loss {}, take-profit {}",
        config.execution.slippage_stop_loss, config.execution.slippage_take_profit
    );
    Ok(())
}
