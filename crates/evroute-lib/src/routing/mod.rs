//! Trip planning: request and plan types, plus the pure planning pipeline.
//!
//! This module provides:
//! - [`TripRequest`] - What the driver asks for
//! - [`TripData`] - Route, samples and stations gathered for one trip
//! - [`RoutePlan`] - The planned trip returned to callers
//! - [`plan_trip`] - Candidate selection, energy profile and search over
//!   already-gathered data
//!
//! # Strategy Pattern
//!
//! The search is objective-agnostic. Each [`ChargeStrategy`] prices edges and
//! chooses the departure levels offered at a station, so new objectives can be
//! added without touching the search.
//!
//! I/O lives in [`crate::service::PlanSession`], which fetches everything and
//! then hands a [`TripData`] to [`plan_trip`].

pub mod search;
pub mod strategy;

pub use search::{PlannedCharge, RouteStateSearch, SearchInput, SearchOutcome, SearchPath, StopSite};
pub use strategy::{
    select_strategy, ChargeStrategy, CheapestStrategy, EdgeCost, FastestStrategy,
    FewestStopsStrategy, StrategyKind,
};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::PlannerConfig;
use crate::energy::{energy_for_segment, EnergyProfile, RouteSegment};
use crate::error::Result;
use crate::geo::{LatLng, RouteGeometry};
use crate::soc::Soc;
use crate::stations::{
    CandidateQuery, ChargingStationCandidate, StationCandidateIndex, StationRecord,
};
use crate::vehicle::constants::DEFAULT_AMBIENT_C;
use crate::vehicle::{temperature_derate, CurrentType, VehicleProfile};
use crate::weather::{weather_near, ElevationSample, WeatherConditions, WeatherSample};

/// Ambient temperature below which a stop carries a cold-charging warning, °C.
const COLD_CHARGING_C: f64 = 5.0;

/// A trip as requested by the driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripRequest {
    pub vehicle_id: String,
    #[serde(with = "lat_lon_pair")]
    pub origin: LatLng,
    #[serde(with = "lat_lon_pair")]
    pub destination: LatLng,
    pub start_soc_percent: f64,
    pub min_arrival_soc_percent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<StrategyKind>,
}

/// Coordinates travel as `[lat, lon]` on the wire.
mod lat_lon_pair {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::geo::LatLng;

    pub fn serialize<S: Serializer>(point: &LatLng, serializer: S) -> Result<S::Ok, S::Error> {
        [point.lat, point.lon].serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<LatLng, D::Error> {
        let [lat, lon] = <[f64; 2]>::deserialize(deserializer)?;
        Ok(LatLng::new(lat, lon))
    }
}

/// Everything fetched from collaborators for one trip.
#[derive(Debug, Clone)]
pub struct TripData {
    pub route: RouteGeometry,
    pub elevation: Vec<ElevationSample>,
    pub weather: Vec<WeatherSample>,
    pub stations: Vec<StationRecord>,
}

/// Validated trip parameters handed to [`plan_trip`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TripParameters {
    pub start_soc: Soc,
    pub min_arrival_soc: Soc,
    pub strategy: StrategyKind,
}

/// One charging stop in a plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeStop {
    pub station_id: String,
    pub station_name: String,
    pub position_km: f64,
    pub distance_from_previous_km: f64,
    pub arrival_soc_percent: Soc,
    pub departure_soc_percent: Soc,
    pub charge_time_min: f64,
    pub energy_added_kwh: f64,
    pub average_power_kw: f64,
    pub peak_power_kw: f64,
    pub cost: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Why a trip cannot be completed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Infeasibility {
    pub furthest_reachable_km: f64,
    pub reason: String,
}

/// Planned trip returned by the library.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePlan {
    pub feasible: bool,
    pub vehicle_id: String,
    pub strategy: StrategyKind,
    pub total_distance_km: f64,
    pub total_drive_time_min: f64,
    pub total_charge_time_min: f64,
    pub total_energy_kwh: f64,
    pub charging_cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arrival_soc_percent: Option<Soc>,
    pub stops: Vec<ChargeStop>,
    #[serde(flatten)]
    pub infeasibility: Option<Infeasibility>,
    pub warnings: Vec<String>,
    pub labels_explored: usize,
}

impl RoutePlan {
    pub fn stop_count(&self) -> usize {
        self.stops.len()
    }

    /// Drive plus charge time, minutes.
    pub fn total_time_min(&self) -> f64 {
        self.total_drive_time_min + self.total_charge_time_min
    }
}

/// Turn route candidates into search sites, costing each detour with the
/// weather nearest the station.
pub fn prepare_sites(
    candidates: Vec<ChargingStationCandidate>,
    weather: &[WeatherSample],
    vehicle: &VehicleProfile,
    config: &PlannerConfig,
) -> Vec<StopSite> {
    candidates
        .into_iter()
        .map(|candidate| {
            let conditions = weather_near(weather, candidate.position_km).unwrap_or_default();
            // Out and back cancels the wind.
            let still = WeatherConditions {
                wind_speed_ms: 0.0,
                ..conditions
            };
            let detour = RouteSegment::flat(candidate.detour_km, config.detour_speed_kmh);
            let detour_kwh = if candidate.detour_km > 0.0 {
                energy_for_segment(&detour, &still, vehicle).net_kwh
            } else {
                0.0
            };
            let price_per_kwh = candidate.price_per_kwh.unwrap_or(match candidate.current {
                CurrentType::Dc => config.dc_price_per_kwh,
                CurrentType::Ac => config.ac_price_per_kwh,
            });
            StopSite {
                ambient_c: conditions.temperature_c,
                detour_kwh,
                detour_minutes: detour.hours() * 60.0,
                price_per_kwh,
                candidate,
            }
        })
        .collect()
}

/// Plan a trip over already-gathered data.
///
/// Degraded samples never fail the plan; they become warnings. The only
/// error this returns is [`crate::Error::Cancelled`].
pub fn plan_trip(
    vehicle: &VehicleProfile,
    params: &TripParameters,
    data: &TripData,
    config: &PlannerConfig,
    cancel: Option<&CancellationToken>,
) -> Result<RoutePlan> {
    let mut warnings = degradation_warnings(&data.elevation, &data.weather);

    // Step 1: Snap stations onto the route and keep the usable ones
    let query = CandidateQuery {
        corridor_width_km: config.corridor_width_km,
        min_power_kw: config.min_station_power_kw,
        window_km: config.station_window_km,
        per_window: config.stations_per_window,
        ..CandidateQuery::for_vehicle(vehicle)
    };
    let index = StationCandidateIndex::new(&data.route);
    let candidates = index.candidates_along_route(&data.stations, &query);
    let slow = candidates.iter().filter(|c| c.slow).count();
    if slow > 0 {
        warnings.push(format!(
            "{slow} charging station(s) below {:.0} kW kept because no faster station is nearby",
            config.min_station_power_kw
        ));
    }

    // Step 2: Cost detours and price each site
    let sites = prepare_sites(candidates, &data.weather, vehicle, config);

    // Step 3: Build the cumulative energy profile with every site as a breakpoint
    let positions: Vec<f64> = sites.iter().map(|s| s.candidate.position_km).collect();
    let profile = EnergyProfile::build(
        &data.route,
        &data.elevation,
        &data.weather,
        &positions,
        config.max_segment_km,
        vehicle,
    );
    warnings.extend(weather_advisories(&data.route, &data.weather));

    // Step 4: Search
    let strategy = select_strategy(params.strategy);
    let search = RouteStateSearch::new(SearchInput {
        vehicle,
        profile: &profile,
        sites: &sites,
        start_soc: params.start_soc,
        min_arrival_soc: params.min_arrival_soc,
        config,
        strategy: strategy.as_ref(),
        cancel,
    });
    let outcome = search.run()?;

    // Step 5: Assemble the plan
    let plan = match outcome {
        SearchOutcome::Found {
            path,
            labels_explored,
        } => {
            let stops = build_stops(&path, &sites, config, strategy.as_ref());
            RoutePlan {
                feasible: true,
                vehicle_id: vehicle.id.clone(),
                strategy: params.strategy,
                total_distance_km: path.distance_km,
                total_drive_time_min: path.drive_minutes,
                total_charge_time_min: path.charge_minutes,
                total_energy_kwh: path.energy_kwh,
                charging_cost: path.cost,
                arrival_soc_percent: Some(path.arrival_soc),
                stops,
                infeasibility: None,
                warnings,
                labels_explored,
            }
        }
        SearchOutcome::Infeasible {
            furthest_reachable_km,
            reason,
            labels_explored,
        } => RoutePlan {
            feasible: false,
            vehicle_id: vehicle.id.clone(),
            strategy: params.strategy,
            total_distance_km: data.route.total_km(),
            total_drive_time_min: profile.total_minutes(),
            total_charge_time_min: 0.0,
            total_energy_kwh: profile.total_kwh(),
            charging_cost: 0.0,
            arrival_soc_percent: None,
            stops: Vec::new(),
            infeasibility: Some(Infeasibility {
                furthest_reachable_km,
                reason,
            }),
            warnings,
            labels_explored,
        },
    };

    info!(
        vehicle = %plan.vehicle_id,
        strategy = %plan.strategy,
        feasible = plan.feasible,
        stops = plan.stops.len(),
        distance_km = plan.total_distance_km,
        minutes = plan.total_time_min(),
        "trip planned"
    );
    Ok(plan)
}

/// Plan the same trip once per strategy, in [`StrategyKind::ALL`] order.
pub fn compare_strategies(
    vehicle: &VehicleProfile,
    params: &TripParameters,
    data: &TripData,
    config: &PlannerConfig,
    cancel: Option<&CancellationToken>,
) -> Result<Vec<RoutePlan>> {
    StrategyKind::ALL
        .iter()
        .map(|kind| {
            let params = TripParameters {
                strategy: *kind,
                ..*params
            };
            plan_trip(vehicle, &params, data, config, cancel)
        })
        .collect()
}

fn build_stops(
    path: &SearchPath,
    sites: &[StopSite],
    config: &PlannerConfig,
    strategy: &dyn ChargeStrategy,
) -> Vec<ChargeStop> {
    let ceiling = strategy.soft_ceiling(config);
    let mut previous_km = 0.0;
    let mut stops = Vec::with_capacity(path.charges.len());
    for charge in &path.charges {
        let site = &sites[charge.site];
        let candidate = &site.candidate;
        let mut stop_warnings = Vec::new();
        if candidate.slow {
            stop_warnings.push(format!("slow charger ({:.0} kW)", candidate.power_kw));
        }
        if site.ambient_c < COLD_CHARGING_C {
            stop_warnings.push(format!(
                "cold battery at {:.0}°C: charging limited to {:.0}% of rated power",
                site.ambient_c,
                temperature_derate(site.ambient_c) * 100.0
            ));
        }
        if charge.departure_soc.percent() > ceiling + 1e-6 {
            stop_warnings.push(format!(
                "charging above {ceiling:.0}% is needed to reach the next stop"
            ));
        }
        stops.push(ChargeStop {
            station_id: candidate.id.clone(),
            station_name: candidate.name.clone(),
            position_km: candidate.position_km,
            distance_from_previous_km: candidate.position_km - previous_km,
            arrival_soc_percent: charge.arrival_soc,
            departure_soc_percent: charge.departure_soc,
            charge_time_min: charge.session.minutes,
            energy_added_kwh: charge.session.energy_kwh,
            average_power_kw: charge.session.average_power_kw,
            peak_power_kw: charge.session.peak_power_kw,
            cost: charge.cost,
            warnings: stop_warnings,
        });
        previous_km = candidate.position_km;
    }
    stops
}

fn degradation_warnings(elevation: &[ElevationSample], weather: &[WeatherSample]) -> Vec<String> {
    let mut out = Vec::new();
    let missing_elevation = elevation.iter().filter(|s| s.elevation_m.is_none()).count();
    if elevation.is_empty() || missing_elevation == elevation.len() {
        out.push("elevation data unavailable; assuming level road".to_string());
    } else if missing_elevation > 0 {
        out.push(format!(
            "elevation unavailable at {missing_elevation} of {} sample points; interpolated from neighbours",
            elevation.len()
        ));
    }

    let missing_weather = weather.iter().filter(|s| s.conditions.is_none()).count();
    if weather.is_empty() || missing_weather == weather.len() {
        out.push(format!(
            "weather data unavailable; assuming {DEFAULT_AMBIENT_C:.0}°C, calm and dry"
        ));
    } else if missing_weather > 0 {
        out.push(format!(
            "weather unavailable at {missing_weather} of {} sample points; using nearest known conditions",
            weather.len()
        ));
    }
    out
}

fn weather_advisories(route: &RouteGeometry, weather: &[WeatherSample]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for sample in weather {
        let Some(conditions) = sample.conditions else {
            continue;
        };
        let from = (sample.position_km - 1.0).max(0.0);
        let to = (sample.position_km + 1.0).min(route.total_km());
        let bearing = route.bearing_between(from, to);
        for advisory in conditions.advisories(bearing) {
            if !out.contains(&advisory) {
                out.push(advisory);
            }
        }
    }
    out
}
