mod common;

use evroute_lib::stations::CandidateQuery;
use evroute_lib::vehicle::{ConnectorType, CurrentType};
use evroute_lib::{LatLng, StationCandidateIndex};

use common::{catalog, istanbul_ankara, trip_data};

#[test]
fn filters_and_orders_candidates_for_vehicle() {
    let fixture = istanbul_ankara();
    let data = trip_data(&fixture, 50.0);
    let vehicle = catalog().get("test-ev-60").cloned().expect("vehicle");
    let index = StationCandidateIndex::new(&data.route);

    let candidates = index.candidates_along_route(&data.stations, &CandidateQuery::for_vehicle(&vehicle));
    let ids: Vec<&str> = candidates.iter().map(|c| c.id.as_str()).collect();

    // CHAdeMO-only, off-corridor and duplicate listings are gone; the slow AC
    // site shares its window with a DC charger and is dropped too.
    assert_eq!(
        ids,
        vec![
            "zes-gebze",
            "esarj-izmit",
            "trugo-sakarya",
            "zes-duzce",
            "tesla-bolu",
            "voltrun-gerede",
            "zes-cubuk",
        ]
    );
    assert!(candidates
        .windows(2)
        .all(|pair| pair[0].position_km <= pair[1].position_km));
    for candidate in &candidates {
        assert!(candidate.offset_km <= 5.0, "{} is {} km off route", candidate.id, candidate.offset_km);
        assert!(candidate.power_kw <= vehicle.max_dc_kw);
        assert_eq!(candidate.current, CurrentType::Dc);
        assert!(!candidate.slow);
    }

    let gebze = &candidates[0];
    assert_eq!(gebze.name, "ZES Gebze", "first listing wins");
    assert_eq!(gebze.power_kw, 100.0);
    assert!(gebze.connectors.contains(&ConnectorType::Ccs2));
    assert!(gebze.position_km > 40.0 && gebze.position_km < 70.0);

    let duzce = candidates.iter().find(|c| c.id == "zes-duzce").expect("duzce");
    assert_eq!(duzce.power_kw, 60.0);
}

#[test]
fn slow_station_survives_when_window_has_nothing_faster() {
    let fixture = istanbul_ankara();
    let mut data = trip_data(&fixture, 50.0);
    data.stations.retain(|s| s.id != "zes-duzce");
    let vehicle = catalog().get("test-ev-60").cloned().expect("vehicle");
    let index = StationCandidateIndex::new(&data.route);

    let candidates = index.candidates_along_route(&data.stations, &CandidateQuery::for_vehicle(&vehicle));
    let ac = candidates
        .iter()
        .find(|c| c.id == "ac-duzce")
        .expect("slow AC station kept");
    assert!(ac.slow);
    assert_eq!(ac.current, CurrentType::Ac);
    assert_eq!(ac.power_kw, vehicle.max_ac_kw);
}

#[test]
fn connector_compatibility_depends_on_vehicle() {
    let fixture = istanbul_ankara();
    let data = trip_data(&fixture, 50.0);
    let compact = catalog().get("test-compact-40").cloned().expect("vehicle");
    let index = StationCandidateIndex::new(&data.route);

    let candidates = index.candidates_along_route(&data.stations, &CandidateQuery::for_vehicle(&compact));
    let ids: Vec<&str> = candidates.iter().map(|c| c.id.as_str()).collect();
    assert!(ids.contains(&"chademo-hendek"));
    assert!(!ids.contains(&"esarj-izmit"), "CCS-only station is unusable");
    assert!(candidates.iter().all(|c| c.power_kw <= compact.max_dc_kw));
}

#[test]
fn projection_lands_on_route() {
    let fixture = istanbul_ankara();
    let data = trip_data(&fixture, 50.0);
    let index = StationCandidateIndex::new(&data.route);

    let start = index.project(&data.route.origin());
    assert!(start.position_km.abs() < 1e-6);
    assert!(start.offset_km < 1e-6);

    let end = index.project(&data.route.destination());
    assert!((end.position_km - data.route.total_km()).abs() < 1e-3);

    let midway = data.route.point_at(200.0);
    let shifted = LatLng::new(midway.lat + 0.02, midway.lon);
    let projection = index.project(&shifted);
    assert!((projection.position_km - 200.0).abs() < 5.0);
    assert!(projection.offset_km > 0.1 && projection.offset_km < 2.5);
}
