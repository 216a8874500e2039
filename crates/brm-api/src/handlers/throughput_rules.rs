//! Throughput rule handlers

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use brm_common::types::{ChangeAction, RuleId, RuleKind};
use brm_storage::{CreateThroughputRule, ThroughputRule, ThroughputRuleChange};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::DeleteResponse;
use crate::error::ApiError;
use crate::state::AppState;
use crate::validation::validate_throughput_rule;

const INVALID_ID: &str = "Invalid throughput rule ID";
const INVALID_PAYLOAD: &str = "Invalid throughput rule request payload";

/// Query parameters for listing throughput rules
#[derive(Debug, Default, Deserialize)]
pub struct ListThroughputRulesQuery {
    /// Only the rule for this destination MX domain
    pub mx_domain: Option<String>,
}

fn rule_id(path: Result<Path<RuleId>, PathRejection>) -> Result<RuleId, ApiError> {
    path.map(|Path(id)| id).map_err(|e| {
        warn!("Rejected throughput rule id: {}", e);
        ApiError::bad_request(INVALID_ID)
    })
}

fn payload(
    body: Result<Json<CreateThroughputRule>, JsonRejection>,
) -> Result<CreateThroughputRule, ApiError> {
    let Json(input) = body.map_err(|e| {
        warn!("Rejected throughput rule payload: {}", e);
        ApiError::bad_request(INVALID_PAYLOAD)
    })?;

    validate_throughput_rule(&input).map_err(|e| {
        warn!("Invalid throughput rule: {}", e);
        e
    })?;

    Ok(input)
}

/// List throughput rules, optionally narrowed to one MX domain
pub async fn list_throughput_rules(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListThroughputRulesQuery>,
) -> Result<Json<Vec<ThroughputRule>>, ApiError> {
    let rules = match query.mx_domain {
        Some(mx_domain) => state
            .throughput_rules
            .find_by_domain(&mx_domain)
            .await?
            .into_iter()
            .collect(),
        None => state.throughput_rules.list().await?,
    };

    Ok(Json(rules))
}

/// Create a throughput rule
pub async fn create_throughput_rule(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateThroughputRule>, JsonRejection>,
) -> Result<(StatusCode, Json<ThroughputRule>), ApiError> {
    let input = payload(body)?;

    let rule = state.throughput_rules.create(input).await?;
    state.record_mutation(RuleKind::ThroughputRule, ChangeAction::Created);

    info!("Created throughput rule {} for {}", rule.id, rule.mx_domain);
    Ok((StatusCode::CREATED, Json(rule)))
}

/// Get a throughput rule by ID
pub async fn get_throughput_rule(
    State(state): State<Arc<AppState>>,
    path: Result<Path<RuleId>, PathRejection>,
) -> Result<Json<ThroughputRule>, ApiError> {
    let id = rule_id(path)?;
    let rule = state.throughput_rules.get(id).await?;
    Ok(Json(rule))
}

/// Replace every field of a throughput rule
pub async fn update_throughput_rule(
    State(state): State<Arc<AppState>>,
    path: Result<Path<RuleId>, PathRejection>,
    body: Result<Json<CreateThroughputRule>, JsonRejection>,
) -> Result<Json<ThroughputRule>, ApiError> {
    let id = rule_id(path)?;
    let input = payload(body)?;

    let rule = state.throughput_rules.update(id, input).await?;
    state.record_mutation(RuleKind::ThroughputRule, ChangeAction::Updated);

    info!("Updated throughput rule {}", rule.id);
    Ok(Json(rule))
}

/// Delete a throughput rule; its history is kept
pub async fn delete_throughput_rule(
    State(state): State<Arc<AppState>>,
    path: Result<Path<RuleId>, PathRejection>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let id = rule_id(path)?;

    state.throughput_rules.delete(id).await?;
    state.record_mutation(RuleKind::ThroughputRule, ChangeAction::Deleted);

    info!("Deleted throughput rule {}", id);
    Ok(Json(DeleteResponse::success()))
}

/// The whole throughput rule change ledger
pub async fn list_throughput_rule_changes(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ThroughputRuleChange>>, ApiError> {
    let changes = state.throughput_rules.list_changes().await?;
    Ok(Json(changes))
}

/// History of one throughput rule, oldest first
pub async fn list_throughput_rule_changes_for_rule(
    State(state): State<Arc<AppState>>,
    path: Result<Path<RuleId>, PathRejection>,
) -> Result<Json<Vec<ThroughputRuleChange>>, ApiError> {
    let id = rule_id(path)?;
    let changes = state.throughput_rules.list_changes_for_rule(id).await?;
    Ok(Json(changes))
}
