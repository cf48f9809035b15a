use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::{json, Value};

use evroute_service_plan::app;
use evroute_service_shared::test_utils::{
    fixture_trip, istanbul_ankara_request, state_for_fixture, test_state,
};
use evroute_service_shared::AppState;

fn server(state: AppState) -> TestServer {
    TestServer::new(app(state, "/metrics")).expect("test server")
}

fn plan_body(start_soc: f64, min_arrival: f64) -> Value {
    json!({
        "vehicleId": fixture_trip::VEHICLE,
        "origin": fixture_trip::ISTANBUL,
        "destination": fixture_trip::ANKARA,
        "startSocPercent": start_soc,
        "minArrivalSocPercent": min_arrival,
    })
}

#[tokio::test]
async fn plans_recorded_trip_with_stops() {
    let server = server(test_state());
    let response = server
        .post("/api/v1/plan")
        .add_header(
            HeaderName::from_static("x-request-id"),
            HeaderValue::from_static("trip-42"),
        )
        .json(&plan_body(80.0, 10.0))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-request-id").and_then(|v| v.to_str().ok()),
        Some("trip-42")
    );

    let plan: Value = response.json();
    assert_eq!(plan["feasible"], true);
    assert_eq!(plan["strategy"], "fastest");
    let stops = plan["stops"].as_array().expect("stops array");
    assert!(!stops.is_empty());
    for stop in stops {
        let arrival = stop["arrivalSocPercent"].as_f64().unwrap();
        let departure = stop["departureSocPercent"].as_f64().unwrap();
        assert!((0.0..=100.0).contains(&arrival));
        assert!(departure > arrival && departure <= 100.0);
        assert!(stop["chargeTimeMin"].as_f64().unwrap() > 0.0);
    }
    assert!(plan["arrivalSocPercent"].as_f64().unwrap() >= 10.0 - 1e-6);
    assert!(plan.get("reason").is_none());
}

#[tokio::test]
async fn honours_requested_strategy() {
    let server = server(test_state());
    let mut request = istanbul_ankara_request();
    request.strategy = Some(evroute_lib::StrategyKind::Cheapest);

    let response = server.post("/api/v1/plan").json(&request).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let plan: Value = response.json();
    assert_eq!(plan["strategy"], "cheapest");
}

#[tokio::test]
async fn unreachable_first_station_is_infeasible_not_an_error() {
    let server = server(test_state());
    let response = server.post("/api/v1/plan").json(&plan_body(10.0, 10.0)).await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let plan: Value = response.json();
    assert_eq!(plan["feasible"], false);
    let furthest = plan["furthestReachableKm"].as_f64().expect("furthest reachable");
    assert!(furthest < 55.0);
    assert!(plan["reason"].as_str().is_some_and(|r| !r.is_empty()));
    assert!(plan.get("arrivalSocPercent").is_none());
}

#[tokio::test]
async fn degraded_data_still_plans_short_trip() {
    let server = server(state_for_fixture("trip_short_no_data.json"));
    let body = json!({
        "vehicleId": fixture_trip::VEHICLE,
        "origin": fixture_trip::ISTANBUL,
        "destination": fixture_trip::SHORT_TRIP_END,
        "startSocPercent": 80,
        "minArrivalSocPercent": 10,
    });
    let response = server.post("/api/v1/plan").json(&body).await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let plan: Value = response.json();
    assert_eq!(plan["feasible"], true);
    assert_eq!(plan["stops"].as_array().map(Vec::len), Some(0));
    assert!(!plan["warnings"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_vehicle_is_a_problem_with_suggestions() {
    let server = server(test_state());
    let mut body = plan_body(80.0, 10.0);
    body["vehicleId"] = json!("test-ev-6");

    let response = server.post("/api/v1/plan").json(&body).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/problem+json"
    );
    let problem: Value = response.json();
    assert_eq!(problem["type"], "/problems/unknown-vehicle");
    assert!(problem["detail"].as_str().unwrap().contains("test-ev-60"));
    assert!(problem["instance"].as_str().is_some());
}

#[tokio::test]
async fn out_of_range_soc_is_rejected() {
    let server = server(test_state());
    let response = server.post("/api/v1/plan").json(&plan_body(120.0, 10.0)).await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let problem: Value = response.json();
    assert_eq!(problem["type"], "/problems/invalid-request");
    assert!(problem["detail"].as_str().unwrap().contains("startSocPercent"));
}

#[tokio::test]
async fn identical_endpoints_are_rejected_by_the_planner() {
    let server = server(test_state());
    let mut body = plan_body(80.0, 10.0);
    body["destination"] = json!(fixture_trip::ISTANBUL);

    let response = server.post("/api/v1/plan").json(&body).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let problem: Value = response.json();
    assert!(problem["detail"].as_str().unwrap().contains("identical"));
}

#[tokio::test]
async fn malformed_body_is_a_problem() {
    let server = server(test_state());
    let response = server
        .post("/api/v1/plan")
        .json(&json!({ "vehicleId": fixture_trip::VEHICLE }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let problem: Value = response.json();
    assert_eq!(problem["type"], "/problems/invalid-request");
}

#[tokio::test]
async fn lists_vehicles_sorted_by_id() {
    let server = server(test_state());
    let response = server.get("/api/v1/vehicles").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["count"], 3);
    assert_eq!(body["vehicles"][0]["id"], "test-compact-40");
    assert_eq!(body["vehicles"][1]["usableKwh"].as_f64(), Some(54.0));
}

#[tokio::test]
async fn health_and_metrics_endpoints_respond() {
    let server = server(test_state());

    let live = server.get("/health/live").await;
    assert_eq!(live.status_code(), StatusCode::OK);
    assert_eq!(live.json::<Value>()["status"], "ok");

    let ready = server.get("/health/ready").await;
    assert_eq!(ready.status_code(), StatusCode::OK);
    assert_eq!(ready.json::<Value>()["vehicles_loaded"], 3);

    let metrics = server.get("/metrics").await;
    assert_eq!(metrics.status_code(), StatusCode::OK);
    assert!(metrics.text().starts_with('#') || metrics.text().contains("evroute_"));
}
