//! Prometheus metrics
//!
//! The registry lives in [`Metrics`] and is owned by the application state,
//! so independent routers (and tests) never share counters.

use axum::{
    extract::{MatchedPath, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use brm_common::types::{ChangeAction, RuleKind};
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;
use tracing::error;

use crate::state::AppState;

/// Application metrics and the registry they are exported from
pub struct Metrics {
    registry: Registry,
    http_request_duration: HistogramVec,
    rule_mutations: IntCounterVec,
}

impl Metrics {
    pub fn new() -> brm_common::Result<Self> {
        let registry = Registry::new();

        let http_request_duration = HistogramVec::new(
            HistogramOpts::new(
                "brm_http_request_duration_seconds",
                "Duration of HTTP requests by route",
            ),
            &["path"],
        )
        .map_err(metrics_error)?;
        registry
            .register(Box::new(http_request_duration.clone()))
            .map_err(metrics_error)?;

        let rule_mutations = IntCounterVec::new(
            Opts::new("brm_rule_mutations_total", "Committed rule mutations"),
            &["kind", "action"],
        )
        .map_err(metrics_error)?;
        registry
            .register(Box::new(rule_mutations.clone()))
            .map_err(metrics_error)?;

        Ok(Self {
            registry,
            http_request_duration,
            rule_mutations,
        })
    }

    pub fn observe_request(&self, path: &str, seconds: f64) {
        self.http_request_duration
            .with_label_values(&[path])
            .observe(seconds);
    }

    pub fn record_mutation(&self, kind: RuleKind, action: ChangeAction) {
        self.rule_mutations
            .with_label_values(&[kind.as_str(), action.as_str()])
            .inc();
    }

    /// Text exposition of every registered metric
    pub fn render(&self) -> brm_common::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metrics_error)?;
        String::from_utf8(buffer)
            .map_err(|e| brm_common::Error::Internal(format!("Metrics are not UTF-8: {}", e)))
    }
}

fn metrics_error(e: prometheus::Error) -> brm_common::Error {
    brm_common::Error::Internal(format!("Metrics error: {}", e))
}

/// Middleware recording request duration per matched route
pub async fn track_request_duration(
    State(metrics): State<Arc<Metrics>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let timer = std::time::Instant::now();
    let response = next.run(request).await;
    metrics.observe_request(&path, timer.elapsed().as_secs_f64());

    response
}

/// `GET /metrics`
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    let Some(metrics) = &state.metrics else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match metrics.render() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to render metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_recorded_series() {
        let metrics = Metrics::new().unwrap();
        metrics.record_mutation(RuleKind::BounceRule, ChangeAction::Created);
        metrics.record_mutation(RuleKind::BounceRule, ChangeAction::Created);
        metrics.observe_request("/bounce_rules", 0.002);

        let text = metrics.render().unwrap();
        let created = text
            .lines()
            .find(|l| l.starts_with("brm_rule_mutations_total{") && l.contains(r#"kind="bounce_rule""#))
            .unwrap();
        assert!(created.contains(r#"action="created""#));
        assert!(created.ends_with(" 2"));
        assert!(text.contains(r#"brm_http_request_duration_seconds_count{path="/bounce_rules"} 1"#));
    }

    #[test]
    fn test_registries_are_independent() {
        let first = Metrics::new().unwrap();
        let second = Metrics::new().unwrap();
        first.record_mutation(RuleKind::ThroughputRule, ChangeAction::Deleted);

        assert!(!second.render().unwrap().contains("throughput_rule"));
    }
}
