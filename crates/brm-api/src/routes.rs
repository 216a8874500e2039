//! API routes

use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::handlers::{bounce_rules, health, throughput_rules};
use crate::metrics::{metrics_handler, track_request_duration};
use crate::state::AppState;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let state = Arc::new(state);

    // Health check routes
    let health_routes = Router::new()
        .route("/", get(health::health))
        .route("/live", get(health::liveness))
        .route("/ready", get(health::readiness));

    // Bounce rule routes
    let bounce_rule_routes = Router::new()
        .route(
            "/bounce_rules",
            get(bounce_rules::list_bounce_rules).post(bounce_rules::create_bounce_rule),
        )
        .route(
            "/bounce_rules/:id",
            get(bounce_rules::get_bounce_rule)
                .put(bounce_rules::update_bounce_rule)
                .delete(bounce_rules::delete_bounce_rule),
        )
        .route(
            "/bounce_rule_changes",
            get(bounce_rules::list_bounce_rule_changes),
        )
        .route(
            "/bounce_rule_changes/:id",
            get(bounce_rules::list_bounce_rule_changes_for_rule),
        );

    // Throughput rule routes
    let throughput_rule_routes = Router::new()
        .route(
            "/throughput_rules",
            get(throughput_rules::list_throughput_rules)
                .post(throughput_rules::create_throughput_rule),
        )
        .route(
            "/throughput_rules/:id",
            get(throughput_rules::get_throughput_rule)
                .put(throughput_rules::update_throughput_rule)
                .delete(throughput_rules::delete_throughput_rule),
        )
        .route(
            "/throughput_rule_changes",
            get(throughput_rules::list_throughput_rule_changes),
        )
        .route(
            "/throughput_rule_changes/:id",
            get(throughput_rules::list_throughput_rule_changes_for_rule),
        );

    let mut router = Router::new()
        .nest("/health", health_routes)
        .merge(bounce_rule_routes)
        .merge(throughput_rule_routes);

    if let Some(metrics) = state.metrics.clone() {
        router = router
            .route("/metrics", get(metrics_handler))
            .route_layer(middleware::from_fn_with_state(metrics, track_request_duration));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
