//! BRM API - REST API server
//!
//! HTTP facade over the rule stores: request decoding and validation,
//! error mapping, health checks and Prometheus metrics.

pub mod error;
pub mod handlers;
pub mod metrics;
pub mod routes;
pub mod state;
pub mod validation;

pub use error::ApiError;
pub use metrics::Metrics;
pub use routes::create_router;
pub use state::AppState;
