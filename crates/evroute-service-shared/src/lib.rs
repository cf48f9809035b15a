//! Shared infrastructure for the evroute HTTP services.
//!
//! - [`AppState`]: the planning session (catalog, collaborators, tile cache)
//!   shared by every handler
//! - [`health`]: liveness and readiness handlers
//! - [`ProblemDetails`]: RFC 9457 error bodies mapped from library errors
//! - [`metrics`]: Prometheus recorder and plan counters
//! - [`logging`]: JSON or text `tracing` setup
//! - [`middleware`]: request ids and HTTP metrics
//! - [`PlanRequest`]: the wire form of a trip request, with validation
//!
//! Handlers stay thin: parse, validate, call `evroute-lib`, render. Planning
//! logic lives in the library.

#![deny(warnings)]

mod health;
pub mod logging;
pub mod metrics;
pub mod middleware;
mod problem;
mod request;
mod state;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use health::{health_live, health_ready, HealthStatus};
pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use metrics::{
    init_metrics, metrics_handler, record_charge_stops, record_plan_computed, record_plan_failed,
    record_tile_cache, MetricsConfig, MetricsError,
};
pub use middleware::{extract_or_generate_request_id, MetricsLayer, RequestId};
pub use problem::{
    from_lib_error, ProblemDetails, PROBLEM_INTERNAL_ERROR, PROBLEM_INVALID_REQUEST,
    PROBLEM_UNKNOWN_VEHICLE, PROBLEM_UPSTREAM_UNAVAILABLE,
};
pub use request::{PlanRequest, Validate};
pub use state::{AppState, AppStateError};
