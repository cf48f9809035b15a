use std::path::PathBuf;

use thiserror::Error;

/// Convenient result alias for the evroute library.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level library error type.
///
/// Variants fall into three groups: input errors (surfaced before any work
/// starts), external service failures (after retries are exhausted) and
/// wrappers for lower-level I/O and parsing errors. Degraded samples and
/// infeasible routes are not errors; they are reported on the plan itself.
#[derive(Debug, Error)]
pub enum Error {
    /// Raised when a vehicle id could not be found in the catalog.
    #[error("unknown vehicle: {id}{}", format_suggestions(.suggestions))]
    UnknownVehicle {
        id: String,
        suggestions: Vec<String>,
    },

    /// Raised when a state-of-charge value lies outside [0, 100].
    #[error("{field} must be between 0 and 100 percent (got {value})")]
    InvalidSoc { field: &'static str, value: f64 },

    /// Raised when the requested arrival SoC cannot be honoured.
    #[error("invalid minimum arrival SoC: {message}")]
    InvalidArrivalSoc { message: String },

    /// Raised when origin and destination resolve to the same point.
    #[error("origin and destination are identical")]
    IdenticalEndpoints,

    /// Raised when a latitude/longitude pair is not a valid WGS84 coordinate.
    #[error("invalid {field} coordinate: lat {lat}, lon {lon}")]
    InvalidCoordinate {
        field: &'static str,
        lat: f64,
        lon: f64,
    },

    /// Raised when vehicle data fails validation.
    #[error("invalid vehicle data: {message}")]
    VehicleDataValidation { message: String },

    /// Raised when a charging curve violates its ordering or range rules.
    #[error("invalid charging curve: {message}")]
    InvalidChargingCurve { message: String },

    /// Raised when duplicate vehicle ids are encountered during catalog load.
    #[error("duplicate vehicle id encountered: {id}")]
    DuplicateVehicleId { id: String },

    /// Raised when planner configuration is inconsistent.
    #[error("invalid planner configuration: {message}")]
    InvalidConfig { message: String },

    /// Raised when a route geometry cannot be used for planning.
    #[error("invalid route geometry: {message}")]
    InvalidRoute { message: String },

    /// Raised when a collaborator keeps failing after all retries.
    #[error("{service} unavailable after {attempts} attempt(s): {message}")]
    ExternalService {
        service: &'static str,
        attempts: u32,
        message: String,
    },

    /// Raised when a collaborator answers with a payload we cannot use.
    #[error("{service} returned an unusable response: {message}")]
    UnexpectedResponse {
        service: &'static str,
        message: String,
    },

    /// Raised when the caller cancels an in-flight plan.
    #[error("planning was cancelled")]
    Cancelled,

    /// Raised when a fixture file could not be read or parsed.
    #[error("failed to load fixture {path}: {message}")]
    FixtureLoad { path: PathBuf, message: String },

    /// Wrapper for IO errors.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Wrapper for CSV parsing errors.
    #[error(transparent)]
    Csv(#[from] csv::Error),

    /// Wrapper for JSON errors.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Wrapper for HTTP client errors.
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// True for errors caused by the caller's request rather than by the
    /// planner or its collaborators.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Error::UnknownVehicle { .. }
                | Error::InvalidSoc { .. }
                | Error::InvalidArrivalSoc { .. }
                | Error::IdenticalEndpoints
                | Error::InvalidCoordinate { .. }
        )
    }
}

fn format_suggestions(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else if suggestions.len() == 1 {
        format!(". Did you mean '{}'?", suggestions[0])
    } else {
        format!(
            ". Did you mean one of: {}?",
            suggestions
                .iter()
                .map(|s| format!("'{}'", s))
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_vehicle_lists_suggestions() {
        let err = Error::UnknownVehicle {
            id: "model-e".to_string(),
            suggestions: vec!["model-3".to_string(), "model-y".to_string()],
        };
        let text = err.to_string();
        assert!(text.contains("unknown vehicle: model-e"));
        assert!(text.contains("'model-3', 'model-y'"));
    }

    #[test]
    fn input_errors_are_classified() {
        assert!(Error::IdenticalEndpoints.is_input_error());
        assert!(!Error::Cancelled.is_input_error());
        assert!(!Error::ExternalService {
            service: "routing",
            attempts: 3,
            message: "boom".into()
        }
        .is_input_error());
    }
}
