//! Energy cost estimation for route segments.
//!
//! [`energy_for_segment`] turns one stretch of road into net kWh drawn from the
//! battery. The model layers four effects:
//!
//! - speed: `base · d · (1 + k·(v / v_ref)²)` with class constants `k`, `v_ref`
//! - wind: the headwind component scales the aerodynamic share of that
//!   consumption by `((v + headwind) / v)²` and by the air density relative to
//!   the rated condition (sea level, 20 °C); rain scales the rolling share
//! - temperature: [`thermal::temperature_multiplier`] on propulsion plus an
//!   additive cabin HVAC and battery heating draw
//! - grade: `m·g·Δh` divided by drivetrain efficiency on climbs, credited at
//!   regen efficiency on descents, never pushing the segment below a residual
//!   rolling-resistance floor
//!
//! [`profile::EnergyProfile`] applies the model along a whole route.

pub mod profile;
pub mod thermal;

use serde::Serialize;

use crate::soc::Soc;
use crate::vehicle::constants::{
    AIR_GAS_CONSTANT, DEFAULT_AMBIENT_C, GRAVITY_MS2, ISA_SEA_LEVEL_K, JOULES_PER_KWH,
    LAPSE_RATE_K_PER_M, RAIN_ROLLING_PENALTY_PER_LEVEL, RESIDUAL_ROLLING_SHARE,
    SEA_LEVEL_PRESSURE_PA, ZERO_CELSIUS_K,
};
use crate::vehicle::VehicleProfile;
use crate::weather::WeatherConditions;

pub use profile::EnergyProfile;

const WIND_FACTOR_MIN: f64 = 0.7;
const WIND_FACTOR_MAX: f64 = 1.5;

/// One stretch of road with uniform conditions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteSegment {
    pub distance_km: f64,
    /// End elevation minus start elevation, metres.
    pub elevation_delta_m: f64,
    /// Mean elevation above sea level, metres.
    pub altitude_m: f64,
    pub avg_speed_kmh: f64,
    /// Direction of travel, degrees clockwise from north.
    pub bearing_deg: f64,
}

impl RouteSegment {
    /// Level segment heading north.
    pub fn flat(distance_km: f64, avg_speed_kmh: f64) -> Self {
        Self {
            distance_km,
            elevation_delta_m: 0.0,
            altitude_m: 0.0,
            avg_speed_kmh,
            bearing_deg: 0.0,
        }
    }

    pub fn hours(&self) -> f64 {
        if self.avg_speed_kmh > 0.0 {
            self.distance_km / self.avg_speed_kmh
        } else {
            0.0
        }
    }
}

/// Net energy for a segment with its breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentEnergy {
    pub net_kwh: f64,
    pub propulsion_kwh: f64,
    pub climb_kwh: f64,
    pub regen_kwh: f64,
    /// Cabin conditioning plus battery heating.
    pub hvac_kwh: f64,
    pub air_density_kg_m3: f64,
    pub speed_factor: f64,
    pub wind_factor: f64,
    pub temperature_multiplier: f64,
    /// True when the descent credit was cut back to the residual floor.
    pub floor_applied: bool,
}

/// Net battery energy (kWh) to drive `segment` under `weather`.
pub fn energy_for_segment(
    segment: &RouteSegment,
    weather: &WeatherConditions,
    vehicle: &VehicleProfile,
) -> SegmentEnergy {
    let distance_km = segment.distance_km.max(0.0);
    let speed = segment.avg_speed_kmh.max(0.0);

    let speed_factor = speed_factor(vehicle, speed);
    let air_density_kg_m3 = air_density(segment.altitude_m, weather.temperature_c);
    let wind_factor = wind_factor(
        vehicle,
        speed,
        weather.headwind_ms(segment.bearing_deg),
        weather.rain_level(),
        air_density_kg_m3,
    );
    let temperature_multiplier = thermal::temperature_multiplier(weather.temperature_c);

    let propulsion_kwh = vehicle.base_consumption_kwh_per_km
        * distance_km
        * speed_factor
        * wind_factor
        * temperature_multiplier;

    let potential_kwh = potential_energy_kwh(vehicle.mass_kg, segment.elevation_delta_m);
    let (climb_kwh, regen_kwh) = if potential_kwh > 0.0 {
        (potential_kwh / vehicle.drivetrain_efficiency, 0.0)
    } else {
        (0.0, -potential_kwh * vehicle.regen_efficiency)
    };

    let hvac_kwh = thermal::hvac_energy_kwh(
        vehicle.hvac_kw,
        vehicle.battery_heating_kw,
        weather.temperature_c,
        segment.hours(),
    );

    let gross = propulsion_kwh + climb_kwh + hvac_kwh - regen_kwh;
    let floor = residual_floor_kwh(vehicle, distance_km);
    let floor_applied = gross < floor;

    SegmentEnergy {
        net_kwh: gross.max(floor),
        propulsion_kwh,
        climb_kwh,
        regen_kwh,
        hvac_kwh,
        air_density_kg_m3,
        speed_factor,
        wind_factor,
        temperature_multiplier,
        floor_applied,
    }
}

/// Quadratic speed penalty `1 + k·(v / v_ref)²`.
pub fn speed_factor(vehicle: &VehicleProfile, speed_kmh: f64) -> f64 {
    let ratio = speed_kmh / vehicle.class.reference_speed_kmh();
    1.0 + vehicle.class.speed_penalty() * ratio * ratio
}

/// Air density from the ISA barometric formula, kg/m³.
pub fn air_density(altitude_m: f64, temp_c: f64) -> f64 {
    let altitude = if altitude_m.is_finite() {
        altitude_m.clamp(-500.0, 9000.0)
    } else {
        0.0
    };
    let temp_c = if temp_c.is_finite() {
        temp_c.clamp(-60.0, 60.0)
    } else {
        DEFAULT_AMBIENT_C
    };
    let exponent = GRAVITY_MS2 / (AIR_GAS_CONSTANT * LAPSE_RATE_K_PER_M);
    let pressure = SEA_LEVEL_PRESSURE_PA
        * (1.0 - LAPSE_RATE_K_PER_M * altitude / ISA_SEA_LEVEL_K).powf(exponent);
    pressure / (AIR_GAS_CONSTANT * (temp_c + ZERO_CELSIUS_K))
}

/// Density of the condition base consumption is rated at.
pub fn rated_air_density() -> f64 {
    air_density(0.0, DEFAULT_AMBIENT_C)
}

/// Share of road-load force that is aerodynamic drag at `speed_kmh` in air of
/// `air_density_kg_m3`.
pub fn aerodynamic_fraction(vehicle: &VehicleProfile, speed_kmh: f64, air_density_kg_m3: f64) -> f64 {
    let v = speed_kmh / 3.6;
    let aero = 0.5 * air_density_kg_m3 * vehicle.drag_coefficient * vehicle.frontal_area_m2 * v * v;
    let rolling = vehicle.rolling_resistance * vehicle.mass_kg * GRAVITY_MS2;
    if aero + rolling <= 0.0 {
        0.0
    } else {
        aero / (aero + rolling)
    }
}

/// Combined wind, air density and rain multiplier on propulsion. The
/// aerodynamic share of rated consumption scales with the airspeed squared and
/// with density relative to [`rated_air_density`]; rain only adds to the
/// rolling share. Equal to 1 in still, dry air at the rated condition and
/// non-decreasing in `headwind_ms`.
pub fn wind_factor(
    vehicle: &VehicleProfile,
    speed_kmh: f64,
    headwind_ms: f64,
    rain_level: u8,
    air_density_kg_m3: f64,
) -> f64 {
    let wet = 1.0 + RAIN_ROLLING_PENALTY_PER_LEVEL * f64::from(rain_level);
    let v = speed_kmh / 3.6;
    if v < 0.5 {
        return wet;
    }
    let rated = rated_air_density();
    let aero_share = aerodynamic_fraction(vehicle, speed_kmh, rated);
    let density_ratio = if air_density_kg_m3.is_finite() && air_density_kg_m3 > 0.0 {
        air_density_kg_m3 / rated
    } else {
        1.0
    };
    let airspeed = (v + headwind_ms).max(0.0);
    let drag_ratio = density_ratio * (airspeed / v).powi(2);
    let factor = aero_share * drag_ratio + (1.0 - aero_share) * wet;
    factor.clamp(WIND_FACTOR_MIN, WIND_FACTOR_MAX)
}

/// `m·g·Δh` in kWh; negative on descents.
pub fn potential_energy_kwh(mass_kg: f64, elevation_delta_m: f64) -> f64 {
    mass_kg * GRAVITY_MS2 * elevation_delta_m / JOULES_PER_KWH
}

fn residual_floor_kwh(vehicle: &VehicleProfile, distance_km: f64) -> f64 {
    let rolling_j = vehicle.rolling_resistance * vehicle.mass_kg * GRAVITY_MS2 * distance_km * 1000.0;
    RESIDUAL_ROLLING_SHARE * rolling_j / JOULES_PER_KWH
}

/// Flat-road range at `speed_kmh` from `soc` down to empty.
pub fn estimate_range_km(
    vehicle: &VehicleProfile,
    soc: Soc,
    weather: &WeatherConditions,
    speed_kmh: f64,
) -> f64 {
    let per_km = energy_for_segment(&RouteSegment::flat(1.0, speed_kmh), weather, vehicle).net_kwh;
    if per_km <= 0.0 {
        return 0.0;
    }
    soc.energy_kwh(vehicle.usable_kwh()) / per_km
}

/// Back-of-the-envelope stop count for a known total energy requirement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopEstimate {
    /// Energy between the start SoC and the minimum arrival SoC, kWh.
    pub available_kwh: f64,
    /// Energy that must be added en route, kWh (0 when none).
    pub deficit_kwh: f64,
    /// Energy added at each stop, kWh.
    pub per_stop_kwh: f64,
    pub stops: u32,
}

/// Stops needed when each stop adds `per_stop_fraction` of usable capacity:
/// `ceil(deficit / per-stop energy)`.
pub fn estimate_stops(
    usable_kwh: f64,
    start: Soc,
    min_arrival: Soc,
    energy_needed_kwh: f64,
    per_stop_fraction: f64,
) -> StopEstimate {
    let available_kwh = start.energy_kwh(usable_kwh) - min_arrival.energy_kwh(usable_kwh);
    let deficit_kwh = (energy_needed_kwh - available_kwh).max(0.0);
    let per_stop_kwh = usable_kwh * per_stop_fraction.clamp(0.0, 1.0);
    let stops = if deficit_kwh <= 1e-9 {
        0
    } else if per_stop_kwh <= 0.0 {
        u32::MAX
    } else {
        // Guard against 52.2/32.4 style ratios landing a hair above an integer.
        ((deficit_kwh / per_stop_kwh) - 1e-9).ceil() as u32
    };
    StopEstimate {
        available_kwh,
        deficit_kwh,
        per_stop_kwh,
        stops,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vehicle::{ChargingCurve, ConnectorType, VehicleClass};

    fn vehicle() -> VehicleProfile {
        VehicleProfile {
            id: "unit".into(),
            brand: "Unit".into(),
            model: "Test".into(),
            class: VehicleClass::Sedan,
            battery_kwh: 60.0,
            usable_fraction: 0.9,
            mass_kg: 1800.0,
            drag_coefficient: 0.28,
            frontal_area_m2: 2.4,
            rolling_resistance: 0.010,
            drivetrain_efficiency: 0.9,
            regen_efficiency: 0.65,
            base_consumption_kwh_per_km: 0.12,
            max_ac_kw: 11.0,
            max_dc_kw: 100.0,
            hvac_kw: 2.5,
            battery_heating_kw: 4.0,
            connectors: vec![ConnectorType::Ccs2],
            charging_curve: ChargingCurve::linear(100.0, 10.0).unwrap(),
        }
    }

    #[test]
    fn speed_penalty_at_reference_speed() {
        let v = vehicle();
        assert!((speed_factor(&v, 90.0) - 1.35).abs() < 1e-12);
    }

    #[test]
    fn mild_flat_segment_is_pure_propulsion() {
        let v = vehicle();
        let seg = RouteSegment::flat(100.0, 90.0);
        let e = energy_for_segment(&seg, &WeatherConditions { temperature_c: 22.0, ..Default::default() }, &v);
        // 22 °C air is slightly thinner than the rated 20 °C.
        let share = aerodynamic_fraction(&v, 90.0, rated_air_density());
        let ratio = air_density(0.0, 22.0) / rated_air_density();
        let expected = 0.12 * 100.0 * 1.35 * (share * ratio + 1.0 - share);
        assert!((e.net_kwh - expected).abs() < 1e-9);
        assert!(e.net_kwh < 0.12 * 100.0 * 1.35);
        assert_eq!(e.hvac_kwh, 0.0);
        assert!(!e.floor_applied);
    }

    #[test]
    fn climb_costs_more_than_descent_returns() {
        let v = vehicle();
        let weather = WeatherConditions::default();
        let flat = energy_for_segment(&RouteSegment::flat(10.0, 80.0), &weather, &v).net_kwh;
        let up = energy_for_segment(
            &RouteSegment { elevation_delta_m: 200.0, ..RouteSegment::flat(10.0, 80.0) },
            &weather,
            &v,
        );
        let down = energy_for_segment(
            &RouteSegment { elevation_delta_m: -200.0, ..RouteSegment::flat(10.0, 80.0) },
            &weather,
            &v,
        );
        assert!(up.net_kwh > flat);
        assert!(down.net_kwh < flat);
        assert!(up.net_kwh - flat > flat - down.net_kwh);
    }

    #[test]
    fn steep_descent_hits_the_floor() {
        let v = vehicle();
        let seg = RouteSegment { elevation_delta_m: -1500.0, ..RouteSegment::flat(5.0, 60.0) };
        let e = energy_for_segment(&seg, &WeatherConditions::default(), &v);
        assert!(e.floor_applied);
        assert!(e.net_kwh > 0.0);
    }

    #[test]
    fn tailwind_beyond_vehicle_speed_does_not_go_negative() {
        let v = vehicle();
        let f = wind_factor(&v, 50.0, -30.0, 0, rated_air_density());
        assert!(f >= WIND_FACTOR_MIN);
    }

    #[test]
    fn rain_increases_consumption() {
        let v = vehicle();
        let rho = rated_air_density();
        assert!(wind_factor(&v, 90.0, 0.0, 3, rho) > wind_factor(&v, 90.0, 0.0, 0, rho));
    }

    #[test]
    fn air_density_follows_altitude_and_temperature() {
        assert!((air_density(0.0, 15.0) - 1.225).abs() < 1e-3);
        assert!(air_density(2000.0, 15.0) < 0.85 * air_density(0.0, 15.0));
        assert!(air_density(0.0, -10.0) > air_density(0.0, 30.0));
        assert_eq!(air_density(f64::NAN, 20.0), rated_air_density());
    }

    #[test]
    fn still_air_at_rated_condition_is_neutral() {
        let v = vehicle();
        let f = wind_factor(&v, 90.0, 0.0, 0, rated_air_density());
        assert!((f - 1.0).abs() < 1e-12);
    }

    #[test]
    fn thin_mountain_air_lowers_consumption() {
        let v = vehicle();
        let weather = WeatherConditions::default();
        let coast = energy_for_segment(&RouteSegment::flat(10.0, 100.0), &weather, &v);
        let pass = energy_for_segment(
            &RouteSegment { altitude_m: 1800.0, ..RouteSegment::flat(10.0, 100.0) },
            &weather,
            &v,
        );
        assert!(pass.air_density_kg_m3 < coast.air_density_kg_m3);
        assert!(pass.net_kwh < coast.net_kwh);
    }

    #[test]
    fn cold_segment_pays_for_battery_heating() {
        let mut v = vehicle();
        let cold = WeatherConditions { temperature_c: -5.0, ..Default::default() };
        let seg = RouteSegment::flat(90.0, 90.0);
        let heated = energy_for_segment(&seg, &cold, &v);
        v.battery_heating_kw = 0.0;
        let unheated = energy_for_segment(&seg, &cold, &v);
        // One hour at full heater power.
        assert!((heated.hvac_kwh - unheated.hvac_kwh - 4.0).abs() < 1e-9);
    }

    #[test]
    fn stop_estimate_matches_worked_example() {
        let start = Soc::new(80.0).unwrap();
        let arrive = Soc::new(10.0).unwrap();
        let estimate = estimate_stops(54.0, start, arrive, 90.0, 0.6);
        assert!((estimate.available_kwh - 37.8).abs() < 1e-9);
        assert!((estimate.deficit_kwh - 52.2).abs() < 1e-9);
        assert!((estimate.per_stop_kwh - 32.4).abs() < 1e-9);
        assert_eq!(estimate.stops, 2);
    }

    #[test]
    fn no_stops_when_energy_suffices() {
        let estimate = estimate_stops(54.0, Soc::FULL, Soc::new(10.0).unwrap(), 30.0, 0.6);
        assert_eq!(estimate.stops, 0);
        assert_eq!(estimate.deficit_kwh, 0.0);
    }

    #[test]
    fn range_shrinks_in_the_cold() {
        let v = vehicle();
        let mild = estimate_range_km(&v, Soc::FULL, &WeatherConditions::default(), 90.0);
        let cold = estimate_range_km(
            &v,
            Soc::FULL,
            &WeatherConditions { temperature_c: -10.0, ..Default::default() },
            90.0,
        );
        assert!(cold < mild);
    }
}
