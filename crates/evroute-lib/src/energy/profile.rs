//! Cumulative energy and drive time along a route.

use serde::Serialize;

use crate::geo::RouteGeometry;
use crate::vehicle::VehicleProfile;
use crate::weather::{elevation_at, weather_near, ElevationSample, WeatherConditions, WeatherSample};

use super::{energy_for_segment, RouteSegment};

/// Breakpoints closer than this are merged, km.
const MERGE_EPSILON_KM: f64 = 1e-6;

/// Energy model evaluated along a route.
///
/// The route is cut at every sample position, every plan-node position and at
/// least every `max_step_km`; each piece is costed with
/// [`energy_for_segment`] using interpolated elevation and the nearest
/// weather sample. Cumulative sums make any span a subtraction.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergyProfile {
    breakpoints_km: Vec<f64>,
    cumulative_kwh: Vec<f64>,
    cumulative_minutes: Vec<f64>,
    /// Pieces costed with default weather because no sample was known.
    pub default_weather_segments: usize,
    /// Pieces costed as level because elevation was unknown.
    pub flat_segments: usize,
}

impl EnergyProfile {
    pub fn build(
        route: &RouteGeometry,
        elevation: &[ElevationSample],
        weather: &[WeatherSample],
        node_positions_km: &[f64],
        max_step_km: f64,
        vehicle: &VehicleProfile,
    ) -> Self {
        let total = route.total_km();
        let mut points: Vec<f64> = Vec::new();
        points.push(0.0);
        points.push(total);
        points.extend(elevation.iter().map(|s| s.position_km));
        points.extend(weather.iter().map(|s| s.position_km));
        points.extend(node_positions_km.iter().copied());
        if max_step_km > 0.0 {
            let steps = (total / max_step_km).ceil() as usize;
            points.extend((1..steps).map(|i| total * i as f64 / steps as f64));
        }
        points.retain(|p| p.is_finite());
        for p in points.iter_mut() {
            *p = p.clamp(0.0, total);
        }
        points.sort_by(f64::total_cmp);
        points.dedup_by(|b, a| (*b - *a).abs() < MERGE_EPSILON_KM);

        let speed = route.avg_speed_kmh();
        let mut cumulative_kwh = Vec::with_capacity(points.len());
        let mut cumulative_minutes = Vec::with_capacity(points.len());
        cumulative_kwh.push(0.0);
        cumulative_minutes.push(0.0);
        let mut default_weather_segments = 0;
        let mut flat_segments = 0;

        for pair in points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let (start_m, end_m) = (elevation_at(elevation, a), elevation_at(elevation, b));
            let elevation_delta_m = match (start_m, end_m) {
                (Some(ea), Some(eb)) => eb - ea,
                _ => {
                    flat_segments += 1;
                    0.0
                }
            };
            let altitude_m = match (start_m, end_m) {
                (Some(ea), Some(eb)) => 0.5 * (ea + eb),
                (Some(e), None) | (None, Some(e)) => e,
                (None, None) => 0.0,
            };
            let conditions = weather_near(weather, 0.5 * (a + b)).unwrap_or_else(|| {
                default_weather_segments += 1;
                WeatherConditions::default()
            });
            let segment = RouteSegment {
                distance_km: b - a,
                elevation_delta_m,
                altitude_m,
                avg_speed_kmh: speed,
                bearing_deg: route.bearing_between(a, b),
            };
            let energy = energy_for_segment(&segment, &conditions, vehicle);
            let last_kwh = cumulative_kwh[cumulative_kwh.len() - 1];
            let last_min = cumulative_minutes[cumulative_minutes.len() - 1];
            cumulative_kwh.push(last_kwh + energy.net_kwh);
            cumulative_minutes.push(last_min + segment.hours() * 60.0);
        }

        Self {
            breakpoints_km: points,
            cumulative_kwh,
            cumulative_minutes,
            default_weather_segments,
            flat_segments,
        }
    }

    pub fn breakpoints_km(&self) -> &[f64] {
        &self.breakpoints_km
    }

    pub fn cumulative_kwh(&self) -> &[f64] {
        &self.cumulative_kwh
    }

    pub fn cumulative_minutes(&self) -> &[f64] {
        &self.cumulative_minutes
    }

    /// Index of the breakpoint at (or just after) `km`.
    pub fn index_of(&self, km: f64) -> usize {
        self.breakpoints_km
            .partition_point(|p| *p < km - MERGE_EPSILON_KM)
            .min(self.breakpoints_km.len() - 1)
    }

    /// Net energy for the whole route, kWh.
    pub fn total_kwh(&self) -> f64 {
        self.cumulative_kwh[self.cumulative_kwh.len() - 1]
    }

    /// Drive time for the whole route, minutes.
    pub fn total_minutes(&self) -> f64 {
        self.cumulative_minutes[self.cumulative_minutes.len() - 1]
    }

    /// Energy between two positions, kWh.
    pub fn energy_between(&self, from_km: f64, to_km: f64) -> f64 {
        let (i, j) = (self.index_of(from_km), self.index_of(to_km));
        self.cumulative_kwh[j] - self.cumulative_kwh[i]
    }

    /// Furthest position reachable from `from_km` with `budget_kwh` to spend,
    /// interpolating inside the piece where the budget runs out.
    pub fn reach_km(&self, from_km: f64, budget_kwh: f64) -> f64 {
        let start = self.index_of(from_km);
        let base = self.cumulative_kwh[start];
        if budget_kwh <= 0.0 {
            return self.breakpoints_km[start];
        }
        for k in start + 1..self.breakpoints_km.len() {
            let used = self.cumulative_kwh[k] - base;
            if used > budget_kwh {
                let prev_used = self.cumulative_kwh[k - 1] - base;
                let piece = used - prev_used;
                let t = if piece > 0.0 { (budget_kwh - prev_used) / piece } else { 0.0 };
                let (a, b) = (self.breakpoints_km[k - 1], self.breakpoints_km[k]);
                return a + (b - a) * t.clamp(0.0, 1.0);
            }
        }
        self.breakpoints_km[self.breakpoints_km.len() - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::LatLng;
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
            hvac_kw: 0.0,
            battery_heating_kw: 0.0,
            connectors: vec![ConnectorType::Ccs2],
            charging_curve: ChargingCurve::linear(100.0, 10.0).unwrap(),
        }
    }

    fn route() -> RouteGeometry {
        RouteGeometry::new(vec![LatLng::new(0.0, 0.0), LatLng::new(0.0, 2.0)], Some(90.0)).unwrap()
    }

    #[test]
    fn no_samples_means_default_weather_everywhere() {
        let r = route();
        let profile = EnergyProfile::build(&r, &[], &[], &[50.0], 10.0, &vehicle());
        assert_eq!(profile.default_weather_segments, profile.breakpoints_km().len() - 1);
        assert_eq!(profile.flat_segments, profile.breakpoints_km().len() - 1);
        let expected_minutes = r.total_km() / 90.0 * 60.0;
        assert!((profile.total_minutes() - expected_minutes).abs() < 1e-6);
    }

    #[test]
    fn node_positions_become_breakpoints() {
        let profile = EnergyProfile::build(&route(), &[], &[], &[37.5], 0.0, &vehicle());
        let idx = profile.index_of(37.5);
        assert!((profile.breakpoints_km()[idx] - 37.5).abs() < 1e-9);
    }

    #[test]
    fn energy_is_additive() {
        let profile = EnergyProfile::build(&route(), &[], &[], &[60.0, 120.0], 10.0, &vehicle());
        let whole = profile.energy_between(0.0, 120.0);
        let parts = profile.energy_between(0.0, 60.0) + profile.energy_between(60.0, 120.0);
        assert!((whole - parts).abs() < 1e-9);
    }

    #[test]
    fn reach_stops_where_budget_runs_out() {
        let profile = EnergyProfile::build(&route(), &[], &[], &[], 10.0, &vehicle());
        let per_km = profile.total_kwh() / route().total_km();
        let reach = profile.reach_km(0.0, per_km * 50.0);
        assert!((reach - 50.0).abs() < 0.5, "{reach}");
    }
}
