//! Request types and validation for HTTP endpoints.

use serde::{Deserialize, Serialize};

use evroute_lib::{LatLng, StrategyKind, TripRequest};

use crate::ProblemDetails;

/// Validation trait for request types.
pub trait Validate {
    /// Check every field, returning a problem for the first bad one.
    ///
    /// Boxed to keep the `Err` variant small.
    fn validate(&self, request_id: &str) -> Result<(), Box<ProblemDetails>>;
}

/// Body of `POST /api/v1/plan`. Coordinates are `[lat, lon]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    pub vehicle_id: String,
    pub origin: [f64; 2],
    pub destination: [f64; 2],
    pub start_soc_percent: f64,
    pub min_arrival_soc_percent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<StrategyKind>,
}

impl PlanRequest {
    pub fn to_trip_request(&self) -> TripRequest {
        TripRequest {
            vehicle_id: self.vehicle_id.trim().to_string(),
            origin: LatLng::new(self.origin[0], self.origin[1]),
            destination: LatLng::new(self.destination[0], self.destination[1]),
            start_soc_percent: self.start_soc_percent,
            min_arrival_soc_percent: self.min_arrival_soc_percent,
            strategy: self.strategy,
        }
    }
}

fn check_percent(field: &str, value: f64, request_id: &str) -> Result<(), Box<ProblemDetails>> {
    if value.is_finite() && (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(Box::new(ProblemDetails::bad_request(
            format!("The '{field}' field must be between 0 and 100"),
            request_id,
        )))
    }
}

fn check_point(field: &str, [lat, lon]: [f64; 2], request_id: &str) -> Result<(), Box<ProblemDetails>> {
    let valid = lat.is_finite()
        && lon.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lon);
    if valid {
        Ok(())
    } else {
        Err(Box::new(ProblemDetails::bad_request(
            format!("The '{field}' field must be [lat, lon] within WGS84 bounds"),
            request_id,
        )))
    }
}

impl Validate for PlanRequest {
    fn validate(&self, request_id: &str) -> Result<(), Box<ProblemDetails>> {
        if self.vehicle_id.trim().is_empty() {
            return Err(Box::new(ProblemDetails::bad_request(
                "The 'vehicleId' field is required and cannot be empty",
                request_id,
            )));
        }
        check_point("origin", self.origin, request_id)?;
        check_point("destination", self.destination, request_id)?;
        check_percent("startSocPercent", self.start_soc_percent, request_id)?;
        check_percent("minArrivalSocPercent", self.min_arrival_soc_percent, request_id)?;
        Ok(())
    }
}
