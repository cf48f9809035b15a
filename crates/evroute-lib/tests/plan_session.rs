mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use evroute_lib::providers::{Corridor, ElevationProvider, RouteProvider, StationDirectory};
use evroute_lib::{
    CancellationToken, Error, LatLng, PlanSession, Providers, RouteGeometry, StationRecord,
    StrategyKind, TripFixture,
};

use common::{catalog, fast_config, fixture, istanbul_ankara, request_for, session};

#[derive(Debug, Default)]
struct DownRouting {
    calls: AtomicUsize,
}

#[async_trait]
impl RouteProvider for DownRouting {
    async fn route(&self, _origin: LatLng, _destination: LatLng) -> evroute_lib::Result<RouteGeometry> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::UnexpectedResponse {
            service: "routing",
            message: "503 Service Unavailable".to_string(),
        })
    }
}

#[derive(Debug, Default)]
struct DownDirectory;

#[async_trait]
impl StationDirectory for DownDirectory {
    async fn stations(&self, _corridor: &Corridor) -> evroute_lib::Result<Vec<StationRecord>> {
        Err(Error::UnexpectedResponse {
            service: "station directory",
            message: "connection reset".to_string(),
        })
    }
}

/// Answers every elevation query eventually, long after anyone cares.
#[derive(Debug, Default)]
struct SluggishElevation;

#[async_trait]
impl ElevationProvider for SluggishElevation {
    async fn elevation(&self, _point: LatLng) -> evroute_lib::Result<f64> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(0.0)
    }
}

fn session_with(providers: Providers) -> PlanSession {
    PlanSession::new(fast_config(), catalog(), providers)
}

#[tokio::test(start_paused = true)]
async fn plans_recorded_trip() {
    let trip = istanbul_ankara();
    let request = request_for(&trip, 80.0, 10.0);
    let session = session(trip);

    let plan = session.plan(&request).await.expect("plan");
    assert!(plan.feasible);
    assert_eq!(plan.vehicle_id, "test-ev-60");
    assert_eq!(plan.strategy, StrategyKind::Fastest);
    assert!(plan.stop_count() >= 1);
    assert!(!plan.warnings.iter().any(|w| w.contains("unavailable")));
    assert!(plan.total_distance_km > 390.0);

    let stats = session.cache().stats();
    assert!(stats.entries > 50, "elevation tiles cached: {stats:?}");
}

#[tokio::test(start_paused = true)]
async fn identical_requests_give_identical_json() {
    let trip = istanbul_ankara();
    let request = request_for(&trip, 70.0, 12.0);
    let session = session(trip);

    let first = session.plan(&request).await.expect("first plan");
    let misses = session.cache().stats().misses;
    let second = session.plan(&request).await.expect("second plan");

    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
    let stats = session.cache().stats();
    assert_eq!(stats.misses, misses, "second plan is served from the tile cache");
    assert!(stats.hits > 0);
}

#[tokio::test(start_paused = true)]
async fn missing_data_degrades_to_warnings() {
    let trip = fixture("trip_short_no_data.json");
    let request = request_for(&trip, 80.0, 10.0);
    let session = session(trip);

    let plan = session.plan(&request).await.expect("plan despite missing data");
    assert!(plan.feasible);
    assert_eq!(plan.stop_count(), 0);
    assert!(plan
        .warnings
        .iter()
        .any(|w| w == "elevation data unavailable; assuming level road"));
    assert!(plan
        .warnings
        .iter()
        .any(|w| w.starts_with("weather data unavailable")));
}

#[tokio::test(start_paused = true)]
async fn low_arrival_target_is_raised_to_reserve() {
    let trip = fixture("trip_short_no_data.json");
    let request = request_for(&trip, 80.0, 2.0);
    let session = session(trip);

    let plan = session.plan(&request).await.expect("plan");
    assert!(plan.warnings[0].contains("reserve floor"), "{:?}", plan.warnings);
}

#[tokio::test]
async fn input_errors_are_reported_before_any_io() {
    let trip = istanbul_ankara();
    let routing = Arc::new(DownRouting::default());
    let providers = Providers {
        route: routing.clone(),
        ..Providers::from_fixture(trip.clone())
    };
    let session = session_with(providers);
    let valid = request_for(&trip, 80.0, 10.0);

    let mut request = valid.clone();
    request.vehicle_id = "test-ev-6".to_string();
    match session.plan(&request).await {
        Err(Error::UnknownVehicle { suggestions, .. }) => {
            assert!(suggestions.contains(&"test-ev-60".to_string()))
        }
        other => panic!("unexpected result: {other:?}"),
    }

    let mut request = valid.clone();
    request.start_soc_percent = 120.0;
    match session.plan(&request).await {
        Err(Error::InvalidSoc { field, value }) => {
            assert_eq!(field, "startSocPercent");
            assert_eq!(value, 120.0);
        }
        other => panic!("unexpected result: {other:?}"),
    }

    let mut request = valid.clone();
    request.min_arrival_soc_percent = 100.0;
    assert!(matches!(
        session.plan(&request).await,
        Err(Error::InvalidArrivalSoc { .. })
    ));

    let mut request = valid.clone();
    request.destination = request.origin;
    assert!(matches!(
        session.plan(&request).await,
        Err(Error::IdenticalEndpoints)
    ));

    let mut request = valid;
    request.origin = LatLng::new(95.0, 29.0);
    let err = session.plan(&request).await.expect_err("latitude out of range");
    assert!(matches!(err, Error::InvalidCoordinate { field: "origin", .. }));
    assert!(err.is_input_error());

    assert_eq!(routing.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn routing_outage_surfaces_after_retries() {
    let trip = istanbul_ankara();
    let routing = Arc::new(DownRouting::default());
    let providers = Providers {
        route: routing.clone(),
        ..Providers::from_fixture(trip.clone())
    };
    let session = session_with(providers);

    let err = session
        .plan(&request_for(&trip, 80.0, 10.0))
        .await
        .expect_err("routing is down");
    match err {
        Error::ExternalService {
            service, attempts, ..
        } => {
            assert_eq!(service, "routing");
            assert_eq!(attempts, 3);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(routing.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn station_directory_outage_is_an_error() {
    let trip = istanbul_ankara();
    let providers = Providers {
        stations: Arc::new(DownDirectory),
        ..Providers::from_fixture(trip.clone())
    };
    let session = session_with(providers);

    let err = session
        .plan(&request_for(&trip, 80.0, 10.0))
        .await
        .expect_err("directory is down");
    assert!(matches!(
        err,
        Error::ExternalService {
            service: "station directory",
            ..
        }
    ));
}

#[tokio::test]
async fn cancelled_token_stops_the_plan() {
    let trip = istanbul_ankara();
    let request = request_for(&trip, 80.0, 10.0);
    let session = session(trip);

    let token = CancellationToken::new();
    token.cancel();
    assert!(matches!(
        session.plan_with_cancel(&request, token).await,
        Err(Error::Cancelled)
    ));
}

#[tokio::test(start_paused = true)]
async fn cancelling_mid_sampling_returns_promptly() {
    let trip = istanbul_ankara();
    let request = request_for(&trip, 80.0, 10.0);
    let providers = Providers {
        elevation: Arc::new(SluggishElevation),
        ..Providers::from_fixture(trip)
    };
    let session = session_with(providers);
    let token = CancellationToken::new();

    let started = tokio::time::Instant::now();
    let (result, ()) = tokio::join!(session.plan_with_cancel(&request, token.clone()), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });
    assert!(matches!(result, Err(Error::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn slow_elevation_times_out_into_warnings() {
    let trip = fixture("trip_short_no_data.json");
    let request = request_for(&trip, 80.0, 10.0);
    let providers = Providers {
        elevation: Arc::new(SluggishElevation),
        ..Providers::from_fixture(TripFixture {
            weather: istanbul_ankara().weather,
            ..trip
        })
    };
    let session = session_with(providers);

    let plan = session.plan(&request).await.expect("timeouts are not errors");
    assert!(plan.feasible);
    assert!(plan
        .warnings
        .iter()
        .any(|w| w == "elevation data unavailable; assuming level road"));
    assert!(!plan.warnings.iter().any(|w| w.starts_with("weather")));
}

#[tokio::test(start_paused = true)]
async fn compare_plans_every_strategy() {
    let trip = istanbul_ankara();
    let request = request_for(&trip, 80.0, 10.0);
    let session = session(trip);

    let plans = session.compare(&request).await.expect("plans");
    let kinds: Vec<StrategyKind> = plans.iter().map(|p| p.strategy).collect();
    assert_eq!(kinds, StrategyKind::ALL.to_vec());
    assert!(plans.iter().all(|p| p.feasible));
}
