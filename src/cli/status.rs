//! Handler for the `status` command: read-only tables over the local store.

use std::sync::Arc;

use owo_colors::OwoColorize;
use tabled::{Table, Tabled};

use crate::adapter::sqlite::{create_pool, run_migrations, SqliteRuleStore};
use crate::cli::StatusArgs;
use crate::config::Config;
use crate::domain::{Event, Rule, RuleStatus, Trade};
use crate::error::Result;
use crate::port::store::RuleStore;

#[derive(Tabled)]
struct RuleLine {
    #[tabled(rename = "Rule")]
    id: String,
    #[tabled(rename = "Type")]
    rule_type: String,
    #[tabled(rename = "Token")]
    token: String,
    #[tabled(rename = "Trigger")]
    trigger: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

impl RuleLine {
    fn from_rule(rule: &Rule) -> Self {
        let detail = match rule.status {
            RuleStatus::Failed => rule.error_message.clone().unwrap_or_default(),
            RuleStatus::Triggered => rule
                .triggered_at
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default(),
            _ => String::new(),
        };
        Self {
            id: short(rule.id.as_str()),
            rule_type: rule.rule_type.to_string(),
            token: short(rule.token_id.as_str()),
            trigger: rule.trigger_price.to_string(),
            status: rule.status.to_string(),
            detail,
        }
    }
}

#[derive(Tabled)]
struct TradeLine {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Rule")]
    rule: String,
    #[tabled(rename = "Side")]
    side: String,
    #[tabled(rename = "Amount")]
    amount: String,
    #[tabled(rename = "Price")]
    price: String,
    #[tabled(rename = "Order")]
    order: String,
}

impl TradeLine {
    fn from_trade(trade: &Trade) -> Self {
        Self {
            time: trade.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            rule: short(trade.rule_id.as_str()),
            side: trade.trade_side.to_string(),
            amount: trade.amount.to_string(),
            price: trade
                .price
                .map(|p| p.to_string())
                .unwrap_or_else(|| "market".into()),
            order: trade
                .order_id
                .as_ref()
                .map(|id| short(id.as_str()))
                .unwrap_or_default(),
        }
    }
}

#[derive(Tabled)]
struct EventLine {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Rule")]
    rule: String,
    #[tabled(rename = "Event")]
    event: String,
    #[tabled(rename = "Data")]
    data: String,
}

impl EventLine {
    fn from_event(event: &Event) -> Self {
        let mut data = event.data.to_string();
        if data.len() > 60 {
            data.truncate(57);
            data.push_str("...");
        }
        Self {
            time: event.created_at.format("%H:%M:%S").to_string(),
            rule: short(event.rule_id.as_str()),
            event: event.event_type.to_string(),
            data,
        }
    }
}

fn short(id: &str) -> String {
    if id.len() > 12 {
        format!("{}…", &id[..11])
    } else {
        id.to_string()
    }
}

/// Execute the status command.
pub async fn execute(config: Config, args: &StatusArgs) -> Result<()> {
    let pool = create_pool(&config.store.database_path)?;
    run_migrations(&pool)?;
    let store: Arc<dyn RuleStore> =
        Arc::new(SqliteRuleStore::new(pool, config.store.event_retention));

    let rules = store.recent_rules(args.limit.max(10)).await?;
    let active = rules.iter().filter(|r| r.is_active()).count();

    println!("{}", "Rules".bold());
    if rules.is_empty() {
        println!("  (none)");
    } else {
        println!("{}", Table::new(rules.iter().map(RuleLine::from_rule)));
    }
    println!(
        "  {} active / {} shown\n",
        active.to_string().green(),
        rules.len()
    );

    let trades = store.recent_trades(args.limit).await?;
    println!("{}", "Recent trades".bold());
    if trades.is_empty() {
        println!("  (none)\n");
    } else {
        println!("{}\n", Table::new(trades.iter().map(TradeLine::from_trade)));
    }

    let events = store.recent_events(args.limit).await?;
    println!("{}", "Recent events".bold());
    if events.is_empty() {
        println!("  (none)");
    } else {
        println!("{}", Table::new(events.iter().map(EventLine::from_event)));
    }

    Ok(())
}
