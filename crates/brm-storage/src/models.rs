//! Database models

use brm_common::types::{ChangeAction, ChangeId, RuleId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Bounce rule model
///
/// Classifies an SMTP response by code, enhanced status code and a regex over
/// the response text. `priority` is stored as given and carries no ordering
/// semantics inside the store.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct BounceRule {
    pub id: RuleId,
    pub response_code: i32,
    /// Enhanced status code, e.g. "4.7.1"
    pub enhanced_code: String,
    pub regex: String,
    pub priority: i32,
    pub description: String,
    /// e.g. "suppress" or "no_action"
    pub bounce_action: String,
}

/// Create or replace bounce rule input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBounceRule {
    pub response_code: i32,
    pub enhanced_code: String,
    pub regex: String,
    #[serde(default)]
    pub priority: i32,
    pub description: String,
    pub bounce_action: String,
}

/// Immutable snapshot of a bounce rule as of one committed write
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct BounceRuleChange {
    pub id: ChangeId,
    #[sqlx(try_from = "String")]
    pub action: ChangeAction,
    pub bounce_rule_id: RuleId,
    pub response_code: i32,
    pub enhanced_code: String,
    pub regex: String,
    pub priority: i32,
    pub description: String,
    pub bounce_action: String,
    pub updated_at: Timestamp,
}

/// Throughput rule model
///
/// Connection limits applied to one destination MX domain.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ThroughputRule {
    pub id: RuleId,
    pub mx_domain: String,
    pub max_connections: i32,
    pub messages_per_connection: i32,
    pub connection_ttl_millis: i64,
}

/// Create or replace throughput rule input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateThroughputRule {
    pub mx_domain: String,
    pub max_connections: i32,
    pub messages_per_connection: i32,
    pub connection_ttl_millis: i64,
}

/// Immutable snapshot of a throughput rule as of one committed write
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ThroughputRuleChange {
    pub id: ChangeId,
    #[sqlx(try_from = "String")]
    pub action: ChangeAction,
    pub throughput_rule_id: RuleId,
    pub mx_domain: String,
    pub max_connections: i32,
    pub messages_per_connection: i32,
    pub connection_ttl_millis: i64,
    pub updated_at: Timestamp,
}
