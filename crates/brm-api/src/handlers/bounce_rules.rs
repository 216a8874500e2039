//! Bounce rule handlers

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    Json,
};
use brm_common::types::{ChangeAction, RuleId, RuleKind};
use brm_storage::{BounceRule, BounceRuleChange, CreateBounceRule};
use std::sync::Arc;
use tracing::{info, warn};

use super::DeleteResponse;
use crate::error::ApiError;
use crate::state::AppState;
use crate::validation::validate_bounce_rule;

const INVALID_ID: &str = "Invalid bounce rule ID";
const INVALID_PAYLOAD: &str = "Invalid bounce rule request payload";

fn rule_id(path: Result<Path<RuleId>, PathRejection>) -> Result<RuleId, ApiError> {
    path.map(|Path(id)| id).map_err(|e| {
        warn!("Rejected bounce rule id: {}", e);
        ApiError::bad_request(INVALID_ID)
    })
}

fn payload(body: Result<Json<CreateBounceRule>, JsonRejection>) -> Result<CreateBounceRule, ApiError> {
    let Json(input) = body.map_err(|e| {
        warn!("Rejected bounce rule payload: {}", e);
        ApiError::bad_request(INVALID_PAYLOAD)
    })?;

    validate_bounce_rule(&input).map_err(|e| {
        warn!("Invalid bounce rule: {}", e);
        e
    })?;

    Ok(input)
}

/// List all bounce rules
pub async fn list_bounce_rules(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<BounceRule>>, ApiError> {
    let rules = state.bounce_rules.list().await?;
    Ok(Json(rules))
}

/// Create a bounce rule
pub async fn create_bounce_rule(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateBounceRule>, JsonRejection>,
) -> Result<(StatusCode, Json<BounceRule>), ApiError> {
    let input = payload(body)?;

    let rule = state.bounce_rules.create(input).await?;
    state.record_mutation(RuleKind::BounceRule, ChangeAction::Created);

    info!("Created bounce rule {}", rule.id);
    Ok((StatusCode::CREATED, Json(rule)))
}

/// Get a bounce rule by ID
pub async fn get_bounce_rule(
    State(state): State<Arc<AppState>>,
    path: Result<Path<RuleId>, PathRejection>,
) -> Result<Json<BounceRule>, ApiError> {
    let id = rule_id(path)?;
    let rule = state.bounce_rules.get(id).await?;
    Ok(Json(rule))
}

/// Replace every field of a bounce rule
pub async fn update_bounce_rule(
    State(state): State<Arc<AppState>>,
    path: Result<Path<RuleId>, PathRejection>,
    body: Result<Json<CreateBounceRule>, JsonRejection>,
) -> Result<Json<BounceRule>, ApiError> {
    let id = rule_id(path)?;
    let input = payload(body)?;

    let rule = state.bounce_rules.update(id, input).await?;
    state.record_mutation(RuleKind::BounceRule, ChangeAction::Updated);

    info!("Updated bounce rule {}", rule.id);
    Ok(Json(rule))
}

/// Delete a bounce rule; its history is kept
pub async fn delete_bounce_rule(
    State(state): State<Arc<AppState>>,
    path: Result<Path<RuleId>, PathRejection>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let id = rule_id(path)?;

    state.bounce_rules.delete(id).await?;
    state.record_mutation(RuleKind::BounceRule, ChangeAction::Deleted);

    info!("Deleted bounce rule {}", id);
    Ok(Json(DeleteResponse::success()))
}

/// The whole bounce rule change ledger
pub async fn list_bounce_rule_changes(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<BounceRuleChange>>, ApiError> {
    let changes = state.bounce_rules.list_changes().await?;
    Ok(Json(changes))
}

/// History of one bounce rule, oldest first
pub async fn list_bounce_rule_changes_for_rule(
    State(state): State<Arc<AppState>>,
    path: Result<Path<RuleId>, PathRejection>,
) -> Result<Json<Vec<BounceRuleChange>>, ApiError> {
    let id = rule_id(path)?;
    let changes = state.bounce_rules.list_changes_for_rule(id).await?;
    Ok(Json(changes))
}
