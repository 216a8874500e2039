//! Throughput rule change ledger

use super::{next_timestamp, ChangeLedger};
use crate::db::db_error;
use crate::models::{ThroughputRule, ThroughputRuleChange};
use crate::repository::ThroughputRules;
use async_trait::async_trait;
use brm_common::types::{ChangeAction, RuleId};
use brm_common::Result;
use sqlx::SqliteConnection;

const TABLE: &str = "throughput_rule_changes";

const COLUMNS: &str = "id, action, throughput_rule_id, mx_domain, max_connections, \
                       messages_per_connection, connection_ttl_millis, updated_at";

#[async_trait]
impl ChangeLedger for ThroughputRules {
    type Change = ThroughputRuleChange;

    async fn append(
        &self,
        conn: &mut SqliteConnection,
        action: ChangeAction,
        rule: &ThroughputRule,
    ) -> Result<ThroughputRuleChange> {
        let updated_at = next_timestamp(conn, TABLE).await?;

        sqlx::query_as::<_, ThroughputRuleChange>(&format!(
            r#"
            INSERT INTO throughput_rule_changes (
                action, throughput_rule_id, mx_domain, max_connections,
                messages_per_connection, connection_ttl_millis, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(action.as_str())
        .bind(rule.id)
        .bind(&rule.mx_domain)
        .bind(rule.max_connections)
        .bind(rule.messages_per_connection)
        .bind(rule.connection_ttl_millis)
        .bind(updated_at)
        .fetch_one(&mut *conn)
        .await
        .map_err(db_error)
    }

    async fn list_all(&self, conn: &mut SqliteConnection) -> Result<Vec<ThroughputRuleChange>> {
        sqlx::query_as::<_, ThroughputRuleChange>(&format!(
            "SELECT {} FROM throughput_rule_changes ORDER BY id ASC",
            COLUMNS
        ))
        .fetch_all(&mut *conn)
        .await
        .map_err(db_error)
    }

    async fn list_for_rule(
        &self,
        conn: &mut SqliteConnection,
        rule_id: RuleId,
    ) -> Result<Vec<ThroughputRuleChange>> {
        sqlx::query_as::<_, ThroughputRuleChange>(&format!(
            "SELECT {} FROM throughput_rule_changes WHERE throughput_rule_id = $1 ORDER BY id ASC",
            COLUMNS
        ))
        .bind(rule_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(db_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DatabasePool;

    fn rule(id: RuleId, mx_domain: &str) -> ThroughputRule {
        ThroughputRule {
            id,
            mx_domain: mx_domain.to_string(),
            max_connections: 10,
            messages_per_connection: 50,
            connection_ttl_millis: 30_000,
        }
    }

    #[tokio::test]
    async fn test_ledger_accepts_repeated_domains() {
        // The ledger has no uniqueness on mx_domain: a domain can be deleted
        // and recreated under a new id, and both histories are kept.
        let db = DatabasePool::in_memory().await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        ThroughputRules
            .append(&mut conn, ChangeAction::Created, &rule(1, "mx.example.com"))
            .await
            .unwrap();
        ThroughputRules
            .append(&mut conn, ChangeAction::Deleted, &rule(1, "mx.example.com"))
            .await
            .unwrap();
        ThroughputRules
            .append(&mut conn, ChangeAction::Created, &rule(2, "mx.example.com"))
            .await
            .unwrap();

        let all = ThroughputRules.list_all(&mut conn).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(ThroughputRules.list_for_rule(&mut conn, 1).await.unwrap().len(), 2);
        assert_eq!(ThroughputRules.list_for_rule(&mut conn, 2).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_timestamps_are_monotonic() {
        let db = DatabasePool::in_memory().await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        for _ in 0..5 {
            ThroughputRules
                .append(&mut conn, ChangeAction::Updated, &rule(1, "mx.example.com"))
                .await
                .unwrap();
        }

        let all = ThroughputRules.list_all(&mut conn).await.unwrap();
        assert!(all.windows(2).all(|w| w[0].updated_at <= w[1].updated_at));
        assert!(all.windows(2).all(|w| w[0].id < w[1].id));
    }
}
