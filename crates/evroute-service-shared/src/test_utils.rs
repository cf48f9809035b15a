//! Test utilities for handler testing.
//!
//! State is built from the recorded Istanbul to Ankara trip and the fixture
//! vehicle catalog under `docs/fixtures`, so handlers run without network.

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use evroute_lib::{PlanSession, PlannerConfig, Providers, TripFixture, VehicleCatalog};

use crate::state::AppState;
use crate::PlanRequest;

/// Directory holding the shared workspace fixtures.
pub const FIXTURES_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../docs/fixtures");

static TEST_STATE: OnceLock<AppState> = OnceLock::new();

pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(FIXTURES_DIR)
}

/// Planner defaults without real waiting between batches or retries.
pub fn fast_config() -> PlannerConfig {
    let mut config = PlannerConfig::default();
    config.batch_delay = Duration::from_millis(1);
    config.retry.initial_delay = Duration::from_millis(1);
    config
}

/// Fresh state serving `fixture` (a file name under the fixtures dir).
///
/// # Panics
///
/// Panics if the fixtures cannot be loaded.
pub fn state_for_fixture(fixture: &str) -> AppState {
    let catalog = VehicleCatalog::from_path(&fixtures_dir().join("vehicles.csv"))
        .unwrap_or_else(|e| panic!("failed to load fixture vehicles: {e}"));
    let trip = TripFixture::from_path(&fixtures_dir().join(fixture))
        .unwrap_or_else(|e| panic!("failed to load trip fixture {fixture}: {e}"));
    AppState::new(PlanSession::new(
        fast_config(),
        Arc::new(catalog),
        Providers::from_fixture(trip),
    ))
}

/// Shared state over the Istanbul to Ankara fixture, loaded once.
pub fn test_state() -> AppState {
    TEST_STATE
        .get_or_init(|| state_for_fixture("trip_istanbul_ankara.json"))
        .clone()
}

/// Known points and vehicles in the fixtures.
pub mod fixture_trip {
    pub const ISTANBUL: [f64; 2] = [41.01, 28.97];
    pub const ANKARA: [f64; 2] = [39.93, 32.85];
    /// End of `trip_short_no_data.json`.
    pub const SHORT_TRIP_END: [f64; 2] = [41.06, 29.5];
    pub const VEHICLE: &str = "test-ev-60";
}

/// Istanbul to Ankara at 80% start, 10% arrival.
pub fn istanbul_ankara_request() -> PlanRequest {
    PlanRequest {
        vehicle_id: fixture_trip::VEHICLE.to_string(),
        origin: fixture_trip::ISTANBUL,
        destination: fixture_trip::ANKARA,
        start_soc_percent: 80.0,
        min_arrival_soc_percent: 10.0,
        strategy: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixtures_exist() {
        assert!(fixtures_dir().join("vehicles.csv").exists());
        assert!(fixtures_dir().join("trip_istanbul_ankara.json").exists());
    }

    #[test]
    fn test_state_loads_fixture_catalog() {
        let state = test_state();
        assert!(state.catalog().get(fixture_trip::VEHICLE).is_some());
    }
}
