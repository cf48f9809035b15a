//! Liveness and readiness handlers.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// "ok" or "not_ready: <reason>".
    pub status: String,

    pub service: String,

    pub version: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicles_loaded: Option<usize>,

    /// Elevation tiles currently cached by the session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_tiles: Option<usize>,
}

impl HealthStatus {
    pub fn alive(service: &str, version: &str) -> Self {
        Self {
            status: "ok".to_string(),
            service: service.to_string(),
            version: version.to_string(),
            vehicles_loaded: None,
            cached_tiles: None,
        }
    }

    pub fn ready(service: &str, version: &str, vehicles: usize, cached_tiles: usize) -> Self {
        Self {
            vehicles_loaded: Some(vehicles),
            cached_tiles: Some(cached_tiles),
            ..Self::alive(service, version)
        }
    }

    pub fn not_ready(service: &str, version: &str, reason: &str) -> Self {
        Self {
            status: format!("not_ready: {}", reason),
            ..Self::alive(service, version)
        }
    }
}

/// `GET /health/live`: 200 while the process runs.
pub async fn health_live() -> impl IntoResponse {
    let status = HealthStatus::alive(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    (StatusCode::OK, Json(status))
}

/// `GET /health/ready`: 200 once a non-empty vehicle catalog is loaded.
///
/// ```text
/// {"status":"ok","service":"evroute-service-shared","version":"0.1.0","vehicles_loaded":9,"cached_tiles":212}
/// ```
pub async fn health_ready(State(state): State<AppState>) -> Response {
    let service = env!("CARGO_PKG_NAME");
    let version = env!("CARGO_PKG_VERSION");

    let vehicles = state.catalog().len();
    if vehicles == 0 {
        let status = HealthStatus::not_ready(service, version, "no vehicles loaded");
        return (StatusCode::SERVICE_UNAVAILABLE, Json(status)).into_response();
    }

    let cached_tiles = state.session().cache().stats().entries;
    let status = HealthStatus::ready(service, version, vehicles, cached_tiles);
    (StatusCode::OK, Json(status)).into_response()
}
