//! Bounce rule change ledger

use super::{next_timestamp, ChangeLedger};
use crate::db::db_error;
use crate::models::{BounceRule, BounceRuleChange};
use crate::repository::BounceRules;
use async_trait::async_trait;
use brm_common::types::{ChangeAction, RuleId};
use brm_common::Result;
use sqlx::SqliteConnection;

const TABLE: &str = "bounce_rule_changes";

const COLUMNS: &str = "id, action, bounce_rule_id, response_code, enhanced_code, regex, \
                       priority, description, bounce_action, updated_at";

#[async_trait]
impl ChangeLedger for BounceRules {
    type Change = BounceRuleChange;

    async fn append(
        &self,
        conn: &mut SqliteConnection,
        action: ChangeAction,
        rule: &BounceRule,
    ) -> Result<BounceRuleChange> {
        let updated_at = next_timestamp(conn, TABLE).await?;

        sqlx::query_as::<_, BounceRuleChange>(&format!(
            r#"
            INSERT INTO bounce_rule_changes (
                action, bounce_rule_id, response_code, enhanced_code, regex,
                priority, description, bounce_action, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(action.as_str())
        .bind(rule.id)
        .bind(rule.response_code)
        .bind(&rule.enhanced_code)
        .bind(&rule.regex)
        .bind(rule.priority)
        .bind(&rule.description)
        .bind(&rule.bounce_action)
        .bind(updated_at)
        .fetch_one(&mut *conn)
        .await
        .map_err(db_error)
    }

    async fn list_all(&self, conn: &mut SqliteConnection) -> Result<Vec<BounceRuleChange>> {
        sqlx::query_as::<_, BounceRuleChange>(&format!(
            "SELECT {} FROM bounce_rule_changes ORDER BY id ASC",
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
    ) -> Result<Vec<BounceRuleChange>> {
        sqlx::query_as::<_, BounceRuleChange>(&format!(
            "SELECT {} FROM bounce_rule_changes WHERE bounce_rule_id = $1 ORDER BY id ASC",
            COLUMNS
        ))
        .bind(rule_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(db_error)
    }
}
