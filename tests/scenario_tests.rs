//! End-to-end scenarios through the assembled trade manager: a scripted
//! socket drives the feed task, the worker evaluates real rules, and the
//! executor settles them against a scripted broker.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use tripwire::adapter::feed::message::BookFrame;
use tripwire::app::TradeManager;
use tripwire::config::Config;
use tripwire::domain::{EventType, PriceUpdate, RuleId, RuleStatus, Side, TokenId};
use tripwire::port::feed::SubscriptionOp;
use tripwire::port::store::RuleStore;
use tripwire::testkit::broker::ScriptedBroker;
use tripwire::testkit::domain::{holding, stop_loss_rule, trailing_stop_rule};
use tripwire::testkit::feed::{ChannelSocket, SocketControl};
use tripwire::testkit::store::MemoryRuleStore;

fn fast_config() -> Config {
    Config::parse_toml(
        r#"
        [feed]
        url = "wss://feed.example.com/ws/market"
        reconnect_initial_ms = 5
        reconnect_max_ms = 50

        [broker]
        api_url = "https://broker.example.com"

        [worker]
        reconcile_interval_secs = 1
        position_refresh_interval_secs = 1
        evaluation_event_secs = 10
    "#,
    )
    .unwrap()
}

/// Derive the price a book frame would produce, the way the socket does.
fn mid_of(book_json: &str) -> Decimal {
    let frame: BookFrame = serde_json::from_str(book_json).unwrap();
    frame.mid_price(true).unwrap()
}

fn push_mid(control: &SocketControl, token: &str, book_json: &str) {
    control.push_price(PriceUpdate::new(token, mid_of(book_json), Utc::now()));
}

async fn wait_until<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..400 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {what}");
}

struct Scenario {
    manager: TradeManager,
    control: SocketControl,
    store: Arc<MemoryRuleStore>,
    broker: Arc<ScriptedBroker>,
}

async fn start(broker: ScriptedBroker, rules: Vec<tripwire::domain::Rule>) -> Scenario {
    let store = Arc::new(MemoryRuleStore::new());
    for rule in &rules {
        store.insert_rule(rule).await.unwrap();
    }
    let broker = Arc::new(broker);
    let (socket, control) = ChannelSocket::new();
    let manager = TradeManager::start(
        &fast_config(),
        socket,
        broker.clone(),
        store.clone() as Arc<dyn RuleStore>,
    );
    Scenario {
        manager,
        control,
        store,
        broker,
    }
}

async fn wait_for_status(store: &MemoryRuleStore, id: &str, expected: RuleStatus) {
    wait_until(&format!("rule {id} to become {expected}"), || async {
        store
            .rule(&RuleId::new(id))
            .await
            .unwrap()
            .is_some_and(|r| r.status == expected)
    })
    .await;
}

/// Stop-loss fires when the mid-price crosses the trigger, sells the whole
/// holding with a limit order 2% under the current price.
#[tokio::test]
async fn stop_loss_triggers_on_mid_price_crossover() {
    let broker = ScriptedBroker::new()
        .with_holdings(vec![holding("t-1", dec!(100))])
        .with_price("t-1", dec!(0.40));
    let s = start(broker, vec![stop_loss_rule("r-1", "t-1", dec!(0.40))]).await;

    // Reconciler subscribes the active rule's token.
    wait_until("t-1 subscription", || async {
        s.control
            .subscriptions()
            .iter()
            .any(|(op, tokens)| *op == SubscriptionOp::Subscribe && tokens.contains(&TokenId::new("t-1")))
    })
    .await;

    // Mid 0.46: above the trigger, nothing happens.
    push_mid(
        &s.control,
        "t-1",
        r#"{"event_type":"book","asset_id":"t-1",
            "buys":[{"price":"0.45","size":"10"}],
            "sells":[{"price":"0.47","size":"10"}]}"#,
    );

    // Mid 0.40: crossover.
    push_mid(
        &s.control,
        "t-1",
        r#"{"event_type":"book","asset_id":"t-1",
            "buys":[{"price":"0.39","size":"10"}],
            "sells":[{"price":"0.41","size":"10"}]}"#,
    );

    wait_for_status(&s.store, "r-1", RuleStatus::Triggered).await;

    let orders = s.broker.placed_orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].token_id, TokenId::new("t-1"));
    assert_eq!(orders[0].side, Side::Sell);
    assert_eq!(orders[0].amount, dec!(100));
    assert_eq!(orders[0].limit_price, Some(dec!(0.3920)));

    let trades = s.store.recent_trades(10).await.unwrap();
    assert_eq!(trades.len(), 1);

    s.manager.shutdown().await;
}

/// Trailing stop drags its trigger up behind the high-water mark and fires
/// when the price falls back through it.
#[tokio::test]
async fn trailing_stop_raises_trigger_then_fires() {
    let broker = ScriptedBroker::new()
        .with_holdings(vec![holding("t-2", dec!(50))])
        .with_price("t-2", dec!(0.58));
    let s = start(
        broker,
        vec![trailing_stop_rule("r-2", "t-2", dec!(0.50), dec!(10), dec!(0.60))],
    )
    .await;

    for price in [dec!(0.62), dec!(0.65), dec!(0.60), dec!(0.58)] {
        s.control
            .push_price(PriceUpdate::new("t-2", price, Utc::now()));
    }

    wait_for_status(&s.store, "r-2", RuleStatus::Triggered).await;

    let rule = s.store.rule(&RuleId::new("r-2")).await.unwrap().unwrap();
    assert_eq!(rule.trigger_price, dec!(0.585));
    assert_eq!(rule.high_water_price, Some(dec!(0.65)));

    // Two raises: 0.62 -> 0.558, 0.65 -> 0.585; 0.60 and 0.58 raise nothing.
    let raises: Vec<_> = s
        .store
        .recent_events(100)
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.event_type == EventType::RuleTrailingUpdated)
        .collect();
    assert_eq!(raises.len(), 2);

    // The trigger only ever rose.
    let mut new_triggers: Vec<Decimal> = raises
        .iter()
        .map(|e| e.data["newTriggerPrice"].as_str().unwrap().parse().unwrap())
        .collect();
    new_triggers.reverse(); // recent_events is newest first
    assert!(new_triggers.windows(2).all(|w| w[0] <= w[1]));

    assert_eq!(s.store.recent_trades(10).await.unwrap().len(), 1);

    s.manager.shutdown().await;
}

/// After a connection loss the feed reconnects and resends one aggregate
/// subscription for every active token before any new price is processed.
#[tokio::test]
async fn reconnect_resubscribes_all_active_tokens() {
    let broker = ScriptedBroker::new()
        .with_holdings(vec![holding("t-1", dec!(100))])
        .with_price("t-1", dec!(0.40));
    let s = start(
        broker,
        vec![
            stop_loss_rule("r-1", "t-1", dec!(0.10)),
            stop_loss_rule("r-2", "t-2", dec!(0.10)),
        ],
    )
    .await;

    // Both tokens subscribed through the reconciler.
    wait_until("both subscriptions", || async {
        s.manager.dashboard().worker_status().await.subscriptions.len() == 2
    })
    .await;
    let connects_before = s.control.connect_count();

    s.control.push_disconnect("connection reset");

    // Reconnect completes once a price flows again.
    s.control
        .push_price(PriceUpdate::new("t-1", dec!(0.50), Utc::now()));
    wait_until("price processed after reconnect", || async {
        s.manager.dashboard().worker_status().await.last_sync_time.is_some()
    })
    .await;

    assert!(s.control.connect_count() > connects_before);

    // The reconnect resubscription names the full desired set.
    let subscriptions = s.control.subscriptions();
    let aggregate = subscriptions
        .iter()
        .rev()
        .find(|(op, _)| *op == SubscriptionOp::Subscribe)
        .expect("aggregate resubscribe");
    assert_eq!(aggregate.1.len(), 2);
    assert!(aggregate.1.contains(&TokenId::new("t-1")));
    assert!(aggregate.1.contains(&TokenId::new("t-2")));

    s.manager.shutdown().await;
}

/// The dashboard reads are consistent snapshots of the running manager.
#[tokio::test]
async fn dashboard_reads_reflect_worker_state() {
    let broker = ScriptedBroker::new()
        .with_positions(vec![tripwire::testkit::domain::open_position("market-1", "t-1")]);
    let s = start(broker, vec![stop_loss_rule("r-1", "t-1", dec!(0.10))]).await;

    wait_until("feed connected", || async {
        s.manager.dashboard().worker_status().await.feed_connected
    })
    .await;
    wait_until("positions cached", || async {
        !s.manager.dashboard().positions().is_empty()
    })
    .await;

    let status = s.manager.dashboard().worker_status().await;
    assert!(status.running);
    assert_eq!(status.active_rules_count, 1);
    assert_eq!(status.subscriptions, vec!["t-1".to_string()]);

    let rules = s.manager.dashboard().rules().await.unwrap();
    assert_eq!(rules.len(), 1);

    // Shutdown flips the running bit and stops every activity.
    let dashboard = s.manager.dashboard().clone();
    s.manager.shutdown().await;
    assert!(!dashboard.worker_status().await.running);
}

/// Unsubscription follows rule cancellation within a reconcile interval.
#[tokio::test]
async fn canceled_rule_is_unsubscribed() {
    let broker = ScriptedBroker::new();
    let s = start(broker, vec![stop_loss_rule("r-1", "t-1", dec!(0.10))]).await;

    wait_until("subscription", || async {
        !s.manager.dashboard().worker_status().await.subscriptions.is_empty()
    })
    .await;

    s.store.cancel_rule(&RuleId::new("r-1")).await.unwrap();

    wait_until("unsubscription", || async {
        s.manager.dashboard().worker_status().await.subscriptions.is_empty()
    })
    .await;

    let unsubscribes: Vec<_> = s
        .control
        .subscriptions()
        .into_iter()
        .filter(|(op, _)| *op == SubscriptionOp::Unsubscribe)
        .collect();
    assert!(!unsubscribes.is_empty());

    s.manager.shutdown().await;
}
