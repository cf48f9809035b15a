//! EV trip planning HTTP microservice.
//!
//! # Endpoints
//!
//! - `POST /api/v1/plan` - Plan charging stops for a trip
//! - `GET /api/v1/vehicles` - List the vehicle catalog
//! - `GET /metrics` - Prometheus metrics endpoint
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//!
//! Infeasible trips are not errors: they come back as `200` with
//! `feasible: false`, the furthest reachable distance and a reason.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use evroute_lib::vehicle::{ConnectorType, VehicleClass};
use evroute_lib::{Error as LibError, RoutePlan};
use evroute_service_shared::{
    from_lib_error, health_live, health_ready, metrics_handler, record_charge_stops,
    record_plan_computed, record_plan_failed, record_tile_cache, AppState, MetricsLayer,
    PlanRequest, ProblemDetails, RequestId, Validate,
};

/// Service label attached to metrics.
pub const SERVICE: &str = "plan";

/// Catalog entry as listed by `GET /api/v1/vehicles`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleSummary<'a> {
    pub id: &'a str,
    pub brand: &'a str,
    pub model: &'a str,
    pub class: VehicleClass,
    pub battery_kwh: f64,
    pub usable_kwh: f64,
    pub max_ac_kw: f64,
    pub max_dc_kw: f64,
    pub connectors: &'a [ConnectorType],
}

#[derive(Debug, Serialize)]
pub struct VehiclesResponse<'a> {
    pub count: usize,
    pub vehicles: Vec<VehicleSummary<'a>>,
}

/// Either a plan or an RFC 9457 problem.
#[derive(Debug)]
pub enum PlanResponse {
    Plan(Box<RoutePlan>),
    Problem(ProblemDetails),
}

impl IntoResponse for PlanResponse {
    fn into_response(self) -> Response {
        match self {
            PlanResponse::Plan(plan) => (StatusCode::OK, Json(plan)).into_response(),
            PlanResponse::Problem(problem) => problem.into_response(),
        }
    }
}

/// Router with every endpoint, the metrics layer and permissive CORS.
pub fn app(state: AppState, metrics_path: &str) -> Router {
    Router::new()
        .route("/api/v1/plan", post(plan_handler))
        .route("/api/v1/vehicles", get(vehicles_handler))
        .route(metrics_path, get(metrics_handler))
        .route("/health/live", get(health_live))
        .route("/health/ready", get(health_ready))
        .layer(MetricsLayer)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Metric label for a request that produced no plan.
fn failure_reason(error: &LibError) -> &'static str {
    match error {
        LibError::UnknownVehicle { .. } => "unknown_vehicle",
        e if e.is_input_error() => "validation_error",
        LibError::ExternalService { .. } | LibError::UnexpectedResponse { .. } | LibError::Http(_) => {
            "upstream_unavailable"
        }
        LibError::Cancelled => "cancelled",
        _ => "internal_error",
    }
}

/// Handle `POST /api/v1/plan`.
pub async fn plan_handler(
    State(state): State<AppState>,
    request_id: RequestId,
    payload: Result<Json<PlanRequest>, JsonRejection>,
) -> PlanResponse {
    let request_id = request_id.as_str();

    // Step 1: Parse the body
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            record_plan_failed("validation_error", SERVICE);
            return PlanResponse::Problem(ProblemDetails::bad_request(
                rejection.body_text(),
                request_id,
            ));
        }
    };

    info!(
        request_id,
        vehicle = %request.vehicle_id,
        start_soc = request.start_soc_percent,
        min_arrival_soc = request.min_arrival_soc_percent,
        strategy = ?request.strategy,
        "handling plan request"
    );

    // Step 2: Validate the wire format
    if let Err(problem) = request.validate(request_id) {
        record_plan_failed("validation_error", SERVICE);
        return PlanResponse::Problem(*problem);
    }

    // Step 3: Plan
    let session = state.session();
    let plan = match session.plan(&request.to_trip_request()).await {
        Ok(plan) => plan,
        Err(e) => {
            warn!(request_id, error = %e, "trip planning failed");
            record_plan_failed(failure_reason(&e), SERVICE);
            return PlanResponse::Problem(from_lib_error(&e, request_id));
        }
    };

    // Step 4: Record business metrics
    let strategy = plan.strategy.as_str();
    record_plan_computed(strategy, plan.feasible, SERVICE);
    if plan.feasible {
        record_charge_stops(plan.stop_count(), strategy);
    }
    record_tile_cache(&session.cache().stats());

    info!(
        request_id,
        feasible = plan.feasible,
        stops = plan.stop_count(),
        distance_km = plan.total_distance_km,
        total_time_min = plan.total_time_min(),
        warnings = plan.warnings.len(),
        "plan computed"
    );

    PlanResponse::Plan(Box::new(plan))
}

/// Handle `GET /api/v1/vehicles`, sorted by id.
pub async fn vehicles_handler(State(state): State<AppState>) -> Response {
    let vehicles: Vec<VehicleSummary<'_>> = state
        .catalog()
        .vehicles_sorted()
        .into_iter()
        .map(|v| VehicleSummary {
            id: &v.id,
            brand: &v.brand,
            model: &v.model,
            class: v.class,
            battery_kwh: v.battery_kwh,
            usable_kwh: v.usable_kwh(),
            max_ac_kw: v.max_ac_kw,
            max_dc_kw: v.max_dc_kw,
            connectors: &v.connectors,
        })
        .collect();
    Json(VehiclesResponse {
        count: vehicles.len(),
        vehicles,
    })
    .into_response()
}
