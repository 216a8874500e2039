//! Change ledgers
//!
//! One append-only table per rule family. Rows are written only through
//! [`ChangeLedger::append`] inside the write transaction of the mutation they
//! describe; no code path updates or deletes them, and the schema rejects
//! attempts to do so.

pub mod bounce_rule_changes;
pub mod throughput_rule_changes;

use crate::db::db_error;
use crate::repository::RuleTable;
use async_trait::async_trait;
use brm_common::types::{ChangeAction, RuleId, Timestamp};
use brm_common::Result;
use chrono::Utc;
use serde::Serialize;
use sqlx::SqliteConnection;

/// Append-only history of one rule family
#[async_trait]
pub trait ChangeLedger: RuleTable {
    /// Stored change record
    type Change: Clone + Serialize + Send + Sync + 'static;

    /// Record `rule` as it stands after `action`
    async fn append(
        &self,
        conn: &mut SqliteConnection,
        action: ChangeAction,
        rule: &Self::Rule,
    ) -> Result<Self::Change>;

    /// Every change of the family in insertion order
    async fn list_all(&self, conn: &mut SqliteConnection) -> Result<Vec<Self::Change>>;

    /// Changes of one rule in insertion order; empty when it has no history
    async fn list_for_rule(
        &self,
        conn: &mut SqliteConnection,
        rule_id: RuleId,
    ) -> Result<Vec<Self::Change>>;
}

/// Timestamp for the next entry of `table`
///
/// Never earlier than the newest entry already in the table, so timestamps
/// stay monotonic in insertion order even if the wall clock steps back.
pub(crate) async fn next_timestamp(
    conn: &mut SqliteConnection,
    table: &'static str,
) -> Result<Timestamp> {
    let last: Option<Timestamp> = sqlx::query_scalar(&format!(
        "SELECT updated_at FROM {} ORDER BY id DESC LIMIT 1",
        table
    ))
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_error)?;

    let now = Utc::now();
    Ok(match last {
        Some(last) if last > now => last,
        _ => now,
    })
}
