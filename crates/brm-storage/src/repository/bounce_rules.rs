//! Bounce rule table

use crate::db::db_error;
use crate::models::{BounceRule, CreateBounceRule};
use crate::repository::RuleTable;
use async_trait::async_trait;
use brm_common::types::{RuleId, RuleKind};
use brm_common::Result;
use sqlx::SqliteConnection;

const COLUMNS: &str =
    "id, response_code, enhanced_code, regex, priority, description, bounce_action";

/// `bounce_rules` table
#[derive(Debug, Default, Clone, Copy)]
pub struct BounceRules;

#[async_trait]
impl RuleTable for BounceRules {
    type Rule = BounceRule;
    type Input = CreateBounceRule;

    const KIND: RuleKind = RuleKind::BounceRule;

    fn rule_id(rule: &BounceRule) -> RuleId {
        rule.id
    }

    async fn fetch(&self, conn: &mut SqliteConnection, id: RuleId) -> Result<Option<BounceRule>> {
        sqlx::query_as::<_, BounceRule>(&format!(
            "SELECT {} FROM bounce_rules WHERE id = $1",
            COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error)
    }

    async fn fetch_all(&self, conn: &mut SqliteConnection) -> Result<Vec<BounceRule>> {
        sqlx::query_as::<_, BounceRule>(&format!(
            "SELECT {} FROM bounce_rules ORDER BY id ASC",
            COLUMNS
        ))
        .fetch_all(&mut *conn)
        .await
        .map_err(db_error)
    }

    async fn insert(
        &self,
        conn: &mut SqliteConnection,
        input: &CreateBounceRule,
    ) -> Result<BounceRule> {
        sqlx::query_as::<_, BounceRule>(&format!(
            r#"
            INSERT INTO bounce_rules (
                response_code, enhanced_code, regex, priority, description, bounce_action
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(input.response_code)
        .bind(&input.enhanced_code)
        .bind(&input.regex)
        .bind(input.priority)
        .bind(&input.description)
        .bind(&input.bounce_action)
        .fetch_one(&mut *conn)
        .await
        .map_err(db_error)
    }

    async fn replace(
        &self,
        conn: &mut SqliteConnection,
        id: RuleId,
        input: &CreateBounceRule,
    ) -> Result<Option<BounceRule>> {
        sqlx::query_as::<_, BounceRule>(&format!(
            r#"
            UPDATE bounce_rules SET
                response_code = $2,
                enhanced_code = $3,
                regex = $4,
                priority = $5,
                description = $6,
                bounce_action = $7
            WHERE id = $1
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(id)
        .bind(input.response_code)
        .bind(&input.enhanced_code)
        .bind(&input.regex)
        .bind(input.priority)
        .bind(&input.description)
        .bind(&input.bounce_action)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error)
    }

    async fn remove(&self, conn: &mut SqliteConnection, id: RuleId) -> Result<Option<BounceRule>> {
        sqlx::query_as::<_, BounceRule>(&format!(
            "DELETE FROM bounce_rules WHERE id = $1 RETURNING {}",
            COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error)
    }
}
