//! Common test utilities and fixture helpers.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use evroute_lib::{
    LatLng, PlanSession, PlannerConfig, Providers, RouteGeometry, TripData, TripFixture,
    TripRequest, VehicleCatalog, VehicleProfile,
};
use evroute_lib::weather::{ElevationSample, WeatherSample};

/// Path to fixtures directory shared by the workspace tests.
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../docs/fixtures")
}

#[allow(dead_code)]
pub fn catalog() -> Arc<VehicleCatalog> {
    let path = fixtures_dir().join("vehicles.csv");
    Arc::new(VehicleCatalog::from_path(&path).expect("load fixture vehicles.csv"))
}

#[allow(dead_code)]
pub fn test_vehicle() -> VehicleProfile {
    catalog()
        .get("test-ev-60")
        .expect("test-ev-60 present in fixtures")
        .clone()
}

#[allow(dead_code)]
pub fn fixture(name: &str) -> TripFixture {
    TripFixture::from_path(&fixtures_dir().join(name)).expect("load trip fixture")
}

#[allow(dead_code)]
pub fn istanbul_ankara() -> TripFixture {
    fixture("trip_istanbul_ankara.json")
}

/// Planner configuration with the default knobs but no real waiting.
#[allow(dead_code)]
pub fn fast_config() -> PlannerConfig {
    let mut config = PlannerConfig::default();
    config.batch_delay = Duration::from_millis(1);
    config.retry.initial_delay = Duration::from_millis(1);
    config
}

#[allow(dead_code)]
pub fn session(fixture: TripFixture) -> PlanSession {
    PlanSession::new(fast_config(), catalog(), Providers::from_fixture(fixture))
}

/// Request following the fixture's own endpoints.
#[allow(dead_code)]
pub fn request_for(fixture: &TripFixture, start: f64, min_arrival: f64) -> TripRequest {
    let first = fixture.geometry.first().expect("geometry");
    let last = fixture.geometry.last().expect("geometry");
    TripRequest {
        vehicle_id: "test-ev-60".to_string(),
        origin: LatLng::new(first[1], first[0]),
        destination: LatLng::new(last[1], last[0]),
        start_soc_percent: start,
        min_arrival_soc_percent: min_arrival,
        strategy: None,
    }
}

/// Trip data built straight from a fixture, with every sample present.
#[allow(dead_code)]
pub fn trip_data(fixture: &TripFixture, spacing_km: f64) -> TripData {
    let vertices = fixture
        .geometry
        .iter()
        .map(|[lon, lat]| LatLng::new(*lat, *lon))
        .collect();
    let route = RouteGeometry::new(vertices, fixture.avg_speed_kmh).expect("fixture route");
    let positions = route.sample_positions(spacing_km, 2, 1000);

    let elevation = match &fixture.elevation_m {
        Some(heights) => route
            .cumulative_km()
            .iter()
            .zip(heights)
            .map(|(km, h)| ElevationSample {
                position_km: *km,
                elevation_m: Some(*h),
            })
            .collect(),
        None => Vec::new(),
    };
    let weather = positions
        .iter()
        .map(|km| WeatherSample {
            position_km: *km,
            conditions: fixture.weather,
        })
        .collect();

    TripData {
        route,
        elevation,
        weather,
        stations: fixture.stations.clone(),
    }
}
