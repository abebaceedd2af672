//! SQLite rule store: CAS transitions, transactional trade commits, and
//! bounded event retention against a real database file.

use rust_decimal_macros::dec;
use serde_json::json;
use tempfile::TempDir;

use tripwire::adapter::sqlite::{create_pool, run_migrations, SqliteRuleStore};
use tripwire::domain::{Event, EventType, OrderId, RuleId, RuleStatus, Side, Trade};
use tripwire::error::Error;
use tripwire::port::store::RuleStore;
use tripwire::testkit::domain::{stop_loss_rule, trailing_stop_rule};

struct TempStore {
    store: SqliteRuleStore,
    _dir: TempDir,
}

fn temp_store(event_retention: u32) -> TempStore {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tripwire.db");
    let pool = create_pool(path.to_str().unwrap()).unwrap();
    run_migrations(&pool).unwrap();
    TempStore {
        store: SqliteRuleStore::new(pool, event_retention),
        _dir: dir,
    }
}

fn trade_for(rule: &tripwire::domain::Rule, order_id: &str) -> Trade {
    Trade::new(
        rule.id.clone(),
        rule.rule_type,
        rule.market_id.clone(),
        rule.token_id.clone(),
        Side::Sell,
        rule.trigger_price,
        Some(dec!(0.3920)),
        dec!(100),
        Some(OrderId::new(order_id)),
        None,
    )
}

#[tokio::test]
async fn insert_and_list_active() {
    let t = temp_store(100);
    t.store
        .insert_rule(&stop_loss_rule("r-1", "t-1", dec!(0.40)))
        .await
        .unwrap();
    t.store
        .insert_rule(&stop_loss_rule("r-2", "t-2", dec!(0.30)))
        .await
        .unwrap();
    t.store.cancel_rule(&RuleId::new("r-2")).await.unwrap();

    let active = t.store.list_active_rules().await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, RuleId::new("r-1"));
}

#[tokio::test]
async fn rule_roundtrips_through_sqlite() {
    let t = temp_store(100);
    let rule = trailing_stop_rule("r-1", "t-1", dec!(0.50), dec!(10), dec!(0.60));
    t.store.insert_rule(&rule).await.unwrap();

    let loaded = t.store.rule(&rule.id).await.unwrap().unwrap();
    assert_eq!(loaded, rule);
}

#[tokio::test]
async fn mark_triggered_writes_rule_and_trade_atomically() {
    let t = temp_store(100);
    let rule = stop_loss_rule("r-1", "t-1", dec!(0.40));
    t.store.insert_rule(&rule).await.unwrap();

    t.store
        .mark_triggered(&rule.id, &trade_for(&rule, "O-7"))
        .await
        .unwrap();

    let loaded = t.store.rule(&rule.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, RuleStatus::Triggered);
    assert!(loaded.triggered_at.is_some());

    let trades = t.store.recent_trades(10).await.unwrap();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].order_id, Some(OrderId::new("O-7")));
}

#[tokio::test]
async fn mark_triggered_conflicts_once_terminal_and_writes_no_trade() {
    let t = temp_store(100);
    let rule = stop_loss_rule("r-1", "t-1", dec!(0.40));
    t.store.insert_rule(&rule).await.unwrap();
    t.store.cancel_rule(&rule.id).await.unwrap();

    let err = t
        .store
        .mark_triggered(&rule.id, &trade_for(&rule, "O-8"))
        .await
        .unwrap_err();
    assert!(
        matches!(err, Error::Conflict { status: RuleStatus::Canceled, .. }),
        "unexpected error: {err}"
    );

    // The transaction rolled back: still canceled, no trade row.
    let loaded = t.store.rule(&rule.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, RuleStatus::Canceled);
    assert!(t.store.recent_trades(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn terminal_states_never_transition() {
    let t = temp_store(100);
    let rule = stop_loss_rule("r-1", "t-1", dec!(0.40));
    t.store.insert_rule(&rule).await.unwrap();
    t.store.mark_failed(&rule.id, "invalid price").await.unwrap();

    assert!(t.store.mark_failed(&rule.id, "again").await.is_err());
    assert!(t.store.cancel_rule(&rule.id).await.is_err());
    assert!(t
        .store
        .update_trailing(&rule.id, dec!(0.70), dec!(0.63))
        .await
        .is_err());

    let loaded = t.store.rule(&rule.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, RuleStatus::Failed);
    assert_eq!(loaded.error_message.as_deref(), Some("invalid price"));
}

#[tokio::test]
async fn update_trailing_persists_new_state() {
    let t = temp_store(100);
    let rule = trailing_stop_rule("r-1", "t-1", dec!(0.50), dec!(10), dec!(0.60));
    t.store.insert_rule(&rule).await.unwrap();

    t.store
        .update_trailing(&rule.id, dec!(0.65), dec!(0.585))
        .await
        .unwrap();

    let loaded = t.store.rule(&rule.id).await.unwrap().unwrap();
    assert_eq!(loaded.high_water_price, Some(dec!(0.65)));
    assert_eq!(loaded.trigger_price, dec!(0.585));
}

#[tokio::test]
async fn event_retention_is_bounded() {
    let t = temp_store(5);
    for i in 0..12 {
        t.store
            .append_event(&Event::new(
                RuleId::new("r-1"),
                EventType::RuleEvaluated,
                json!({"sequence": i}),
            ))
            .await
            .unwrap();
    }

    let events = t.store.recent_events(100).await.unwrap();
    assert_eq!(events.len(), 5);
    // Newest first; the oldest retained entry is sequence 7.
    assert_eq!(events[0].data["sequence"], 11);
    assert_eq!(events[4].data["sequence"], 7);
}

#[tokio::test]
async fn recent_reads_are_newest_first_and_capped() {
    let t = temp_store(100);
    for i in 0..5 {
        let rule = stop_loss_rule(&format!("r-{i}"), "t-1", dec!(0.40));
        t.store.insert_rule(&rule).await.unwrap();
    }

    let rules = t.store.recent_rules(3).await.unwrap();
    assert_eq!(rules.len(), 3);

    let trades = t.store.recent_trades(3).await.unwrap();
    assert!(trades.is_empty());
}

#[tokio::test]
async fn changes_signal_bumps_on_rule_mutations() {
    let t = temp_store(100);
    let mut changes = t.store.changes();
    let initial = *changes.borrow_and_update();

    t.store
        .insert_rule(&stop_loss_rule("r-1", "t-1", dec!(0.40)))
        .await
        .unwrap();
    assert!(changes.has_changed().unwrap());
    changes.borrow_and_update();

    t.store.cancel_rule(&RuleId::new("r-1")).await.unwrap();
    assert!(changes.has_changed().unwrap());
    assert!(*changes.borrow_and_update() > initial);
}

#[tokio::test]
async fn append_event_does_not_bump_rule_changes() {
    let t = temp_store(100);
    let mut changes = t.store.changes();
    changes.borrow_and_update();

    t.store
        .append_event(&Event::new(
            RuleId::new("r-1"),
            EventType::RuleEvaluated,
            json!({}),
        ))
        .await
        .unwrap();

    assert!(!changes.has_changed().unwrap());
}
