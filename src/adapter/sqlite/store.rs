//! SQLite rule store implementation.
//!
//! Terminal transitions are compare-and-set on `status = 'ACTIVE'`; the
//! triggered transition and its trade record commit in one transaction.
//! Every rule mutation bumps the change signal that drives the worker
//! index rebuild and the subscription reconciler.

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use tokio::sync::watch;

use super::connection::DbPool;
use super::model::{parse_status, EventRow, NewEventRow, RuleRow, TradeRow};
use super::schema::{events, rules, trades};
use crate::domain::{Event, Price, Rule, RuleId, RuleStatus, Trade};
use crate::error::{Error, Result};
use crate::port::store::RuleStore;

/// SQLite-backed rule store.
pub struct SqliteRuleStore {
    pool: DbPool,
    event_retention: i64,
    changes_tx: watch::Sender<u64>,
}

impl SqliteRuleStore {
    /// Create a store over an initialized connection pool.
    #[must_use]
    pub fn new(pool: DbPool, event_retention: u32) -> Self {
        let (changes_tx, _) = watch::channel(0);
        Self {
            pool,
            event_retention: i64::from(event_retention),
            changes_tx,
        }
    }

    fn conn(
        &self,
    ) -> Result<diesel::r2d2::PooledConnection<diesel::r2d2::ConnectionManager<SqliteConnection>>>
    {
        self.pool.get().map_err(|e| Error::Connection(e.to_string()))
    }

    fn bump(&self) {
        self.changes_tx.send_modify(|version| *version += 1);
    }

    /// Resolve a CAS miss into the precise error: conflict when the rule
    /// exists in a terminal state, not-found otherwise.
    fn cas_miss(conn: &mut SqliteConnection, id: &RuleId) -> Error {
        let status: Option<String> = rules::table
            .find(id.as_str())
            .select(rules::status)
            .first(conn)
            .optional()
            .ok()
            .flatten();
        match status.as_deref().map(parse_status) {
            Some(Ok(status)) => Error::Conflict {
                rule_id: id.to_string(),
                status,
            },
            _ => Error::Database(format!("rule {id} not found")),
        }
    }
}

#[async_trait]
impl RuleStore for SqliteRuleStore {
    async fn list_active_rules(&self) -> Result<Vec<Rule>> {
        let mut conn = self.conn()?;
        let rows: Vec<RuleRow> = rules::table
            .filter(rules::status.eq(RuleStatus::Active.as_str()))
            .load(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        rows.into_iter().map(RuleRow::into_domain).collect()
    }

    async fn rule(&self, id: &RuleId) -> Result<Option<Rule>> {
        let mut conn = self.conn()?;
        let row: Option<RuleRow> = rules::table
            .find(id.as_str())
            .first(&mut conn)
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        row.map(RuleRow::into_domain).transpose()
    }

    async fn insert_rule(&self, rule: &Rule) -> Result<()> {
        let row = RuleRow::from_domain(rule);
        let mut conn = self.conn()?;
        diesel::insert_into(rules::table)
            .values(&row)
            .execute(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        self.bump();
        Ok(())
    }

    async fn update_trailing(&self, id: &RuleId, high_water: Price, trigger: Price) -> Result<()> {
        let mut conn = self.conn()?;
        let affected = diesel::update(
            rules::table
                .find(id.as_str())
                .filter(rules::status.eq(RuleStatus::Active.as_str())),
        )
        .set((
            rules::high_water_price.eq(Some(high_water.to_string())),
            rules::trigger_price.eq(trigger.to_string()),
            rules::updated_at.eq(Utc::now().to_rfc3339()),
        ))
        .execute(&mut conn)
        .map_err(|e| Error::Database(e.to_string()))?;

        if affected == 0 {
            return Err(Self::cas_miss(&mut conn, id));
        }
        self.bump();
        Ok(())
    }

    async fn mark_triggered(&self, id: &RuleId, trade: &Trade) -> Result<()> {
        let trade_row = TradeRow::from_domain(trade);
        let mut conn = self.conn()?;

        conn.transaction::<_, Error, _>(|conn| {
            let affected = diesel::update(
                rules::table
                    .find(id.as_str())
                    .filter(rules::status.eq(RuleStatus::Active.as_str())),
            )
            .set((
                rules::status.eq(RuleStatus::Triggered.as_str()),
                rules::triggered_at.eq(Some(Utc::now().to_rfc3339())),
                rules::triggered_by_tx_id.eq(trade.tx_id.clone()),
                rules::updated_at.eq(Utc::now().to_rfc3339()),
            ))
            .execute(conn)
            .map_err(|e| Error::Database(e.to_string()))?;

            if affected == 0 {
                return Err(Self::cas_miss(conn, id));
            }

            diesel::insert_into(trades::table)
                .values(&trade_row)
                .execute(conn)
                .map_err(|e| Error::Database(e.to_string()))?;
            Ok(())
        })?;

        self.bump();
        Ok(())
    }

    async fn mark_failed(&self, id: &RuleId, error_message: &str) -> Result<()> {
        let mut conn = self.conn()?;
        let affected = diesel::update(
            rules::table
                .find(id.as_str())
                .filter(rules::status.eq(RuleStatus::Active.as_str())),
        )
        .set((
            rules::status.eq(RuleStatus::Failed.as_str()),
            rules::error_message.eq(Some(error_message.to_string())),
            rules::updated_at.eq(Utc::now().to_rfc3339()),
        ))
        .execute(&mut conn)
        .map_err(|e| Error::Database(e.to_string()))?;

        if affected == 0 {
            return Err(Self::cas_miss(&mut conn, id));
        }
        self.bump();
        Ok(())
    }

    async fn cancel_rule(&self, id: &RuleId) -> Result<()> {
        let mut conn = self.conn()?;
        let affected = diesel::update(
            rules::table
                .find(id.as_str())
                .filter(rules::status.eq(RuleStatus::Active.as_str())),
        )
        .set((
            rules::status.eq(RuleStatus::Canceled.as_str()),
            rules::updated_at.eq(Utc::now().to_rfc3339()),
        ))
        .execute(&mut conn)
        .map_err(|e| Error::Database(e.to_string()))?;

        if affected == 0 {
            return Err(Self::cas_miss(&mut conn, id));
        }
        self.bump();
        Ok(())
    }

    async fn append_event(&self, event: &Event) -> Result<()> {
        let row = NewEventRow::from_domain(event);
        let mut conn = self.conn()?;
        diesel::insert_into(events::table)
            .values(&row)
            .execute(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;

        // Bounded retention: drop everything past the newest N rows.
        let cutoff: Option<Option<i32>> = events::table
            .select(events::id)
            .order(events::id.desc())
            .offset(self.event_retention)
            .limit(1)
            .first(&mut conn)
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        if let Some(Some(cutoff)) = cutoff {
            diesel::delete(events::table.filter(events::id.le(cutoff)))
                .execute(&mut conn)
                .map_err(|e| Error::Database(e.to_string()))?;
        }
        Ok(())
    }

    async fn recent_trades(&self, limit: usize) -> Result<Vec<Trade>> {
        let mut conn = self.conn()?;
        let rows: Vec<TradeRow> = trades::table
            .order(trades::created_at.desc())
            .limit(limit as i64)
            .load(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        rows.into_iter().map(TradeRow::into_domain).collect()
    }

    async fn recent_events(&self, limit: usize) -> Result<Vec<Event>> {
        let mut conn = self.conn()?;
        let rows: Vec<EventRow> = events::table
            .order(events::id.desc())
            .limit(limit as i64)
            .load(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        rows.into_iter().map(EventRow::into_domain).collect()
    }

    async fn recent_rules(&self, limit: usize) -> Result<Vec<Rule>> {
        let mut conn = self.conn()?;
        let rows: Vec<RuleRow> = rules::table
            .order(rules::updated_at.desc())
            .limit(limit as i64)
            .load(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        rows.into_iter().map(RuleRow::into_domain).collect()
    }

    fn changes(&self) -> watch::Receiver<u64> {
        self.changes_tx.subscribe()
    }
}
