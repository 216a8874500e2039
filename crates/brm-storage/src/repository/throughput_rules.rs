//! Throughput rule table

use crate::db::db_error;
use crate::models::{CreateThroughputRule, ThroughputRule};
use crate::repository::RuleTable;
use async_trait::async_trait;
use brm_common::types::{RuleId, RuleKind};
use brm_common::Result;
use sqlx::SqliteConnection;

const COLUMNS: &str =
    "id, mx_domain, max_connections, messages_per_connection, connection_ttl_millis";

/// `throughput_rules` table; `mx_domain` is unique
#[derive(Debug, Default, Clone, Copy)]
pub struct ThroughputRules;

impl ThroughputRules {
    /// Find the rule for a destination MX domain
    pub async fn fetch_by_domain(
        &self,
        conn: &mut SqliteConnection,
        mx_domain: &str,
    ) -> Result<Option<ThroughputRule>> {
        sqlx::query_as::<_, ThroughputRule>(&format!(
            "SELECT {} FROM throughput_rules WHERE mx_domain = $1",
            COLUMNS
        ))
        .bind(mx_domain)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error)
    }
}

#[async_trait]
impl RuleTable for ThroughputRules {
    type Rule = ThroughputRule;
    type Input = CreateThroughputRule;

    const KIND: RuleKind = RuleKind::ThroughputRule;

    fn rule_id(rule: &ThroughputRule) -> RuleId {
        rule.id
    }

    async fn fetch(
        &self,
        conn: &mut SqliteConnection,
        id: RuleId,
    ) -> Result<Option<ThroughputRule>> {
        sqlx::query_as::<_, ThroughputRule>(&format!(
            "SELECT {} FROM throughput_rules WHERE id = $1",
            COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error)
    }

    async fn fetch_all(&self, conn: &mut SqliteConnection) -> Result<Vec<ThroughputRule>> {
        sqlx::query_as::<_, ThroughputRule>(&format!(
            "SELECT {} FROM throughput_rules ORDER BY id ASC",
            COLUMNS
        ))
        .fetch_all(&mut *conn)
        .await
        .map_err(db_error)
    }

    async fn insert(
        &self,
        conn: &mut SqliteConnection,
        input: &CreateThroughputRule,
    ) -> Result<ThroughputRule> {
        sqlx::query_as::<_, ThroughputRule>(&format!(
            r#"
            INSERT INTO throughput_rules (
                mx_domain, max_connections, messages_per_connection, connection_ttl_millis
            )
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(&input.mx_domain)
        .bind(input.max_connections)
        .bind(input.messages_per_connection)
        .bind(input.connection_ttl_millis)
        .fetch_one(&mut *conn)
        .await
        .map_err(db_error)
    }

    async fn replace(
        &self,
        conn: &mut SqliteConnection,
        id: RuleId,
        input: &CreateThroughputRule,
    ) -> Result<Option<ThroughputRule>> {
        sqlx::query_as::<_, ThroughputRule>(&format!(
            r#"
            UPDATE throughput_rules SET
                mx_domain = $2,
                max_connections = $3,
                messages_per_connection = $4,
                connection_ttl_millis = $5
            WHERE id = $1
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(id)
        .bind(&input.mx_domain)
        .bind(input.max_connections)
        .bind(input.messages_per_connection)
        .bind(input.connection_ttl_millis)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error)
    }

    async fn remove(
        &self,
        conn: &mut SqliteConnection,
        id: RuleId,
    ) -> Result<Option<ThroughputRule>> {
        sqlx::query_as::<_, ThroughputRule>(&format!(
            "DELETE FROM throughput_rules WHERE id = $1 RETURNING {}",
            COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DatabasePool;
    use brm_common::Error;

    fn input(mx_domain: &str) -> CreateThroughputRule {
        CreateThroughputRule {
            mx_domain: mx_domain.to_string(),
            max_connections: 5,
            messages_per_connection: 100,
            connection_ttl_millis: 60_000,
        }
    }

    #[tokio::test]
    async fn test_duplicate_mx_domain_is_constraint_violation() {
        let db = DatabasePool::in_memory().await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        ThroughputRules
            .insert(&mut conn, &input("gmail-smtp-in.l.google.com"))
            .await
            .unwrap();
        let err = ThroughputRules
            .insert(&mut conn, &input("gmail-smtp-in.l.google.com"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ConstraintViolation(_)), "got {}", err);
    }

    #[tokio::test]
    async fn test_update_onto_existing_domain_is_constraint_violation() {
        let db = DatabasePool::in_memory().await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        ThroughputRules.insert(&mut conn, &input("mx1.example.com")).await.unwrap();
        let second = ThroughputRules.insert(&mut conn, &input("mx2.example.com")).await.unwrap();

        let err = ThroughputRules
            .replace(&mut conn, second.id, &input("mx1.example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConstraintViolation(_)));
    }

    #[tokio::test]
    async fn test_fetch_by_domain() {
        let db = DatabasePool::in_memory().await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        let rule = ThroughputRules.insert(&mut conn, &input("mx.example.org")).await.unwrap();

        let found = ThroughputRules
            .fetch_by_domain(&mut conn, "mx.example.org")
            .await
            .unwrap();
        assert_eq!(found, Some(rule));
        assert_eq!(
            ThroughputRules.fetch_by_domain(&mut conn, "other.example.org").await.unwrap(),
            None
        );
    }
}
