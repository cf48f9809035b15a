//! Weather and elevation samples taken along a route.

use serde::{Deserialize, Serialize};

use crate::vehicle::constants::DEFAULT_AMBIENT_C;

/// Conditions at one point in time and space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherConditions {
    pub temperature_c: f64,
    /// Wind speed at 10 m, m/s.
    pub wind_speed_ms: f64,
    /// Direction the wind blows FROM, degrees clockwise from north.
    pub wind_direction_deg: f64,
    /// Precipitation rate, mm/h.
    pub precipitation_mm: f64,
}

impl Default for WeatherConditions {
    /// Mild, calm and dry. Used whenever a sample is missing.
    fn default() -> Self {
        Self {
            temperature_c: DEFAULT_AMBIENT_C,
            wind_speed_ms: 0.0,
            wind_direction_deg: 0.0,
            precipitation_mm: 0.0,
        }
    }
}

impl WeatherConditions {
    /// Component of the wind opposing travel along `bearing_deg`, m/s.
    /// Negative values are tailwinds.
    pub fn headwind_ms(&self, bearing_deg: f64) -> f64 {
        let relative = (self.wind_direction_deg - bearing_deg).to_radians();
        self.wind_speed_ms * relative.cos()
    }

    /// Rain intensity bucket 0 (dry) to 3 (heavy).
    pub fn rain_level(&self) -> u8 {
        match self.precipitation_mm {
            p if p < 0.1 => 0,
            p if p < 2.5 => 1,
            p if p < 7.5 => 2,
            _ => 3,
        }
    }

    /// Human-readable advisories for these conditions along `bearing_deg`.
    pub fn advisories(&self, bearing_deg: f64) -> Vec<String> {
        let mut out = Vec::new();
        let t = self.temperature_c;
        if t < 0.0 {
            out.push(format!(
                "Freezing temperatures ({t:.0}°C): expect noticeably reduced range and slower charging"
            ));
        } else if t < 10.0 {
            out.push(format!("Cold weather ({t:.0}°C): range reduced by cabin and battery heating"));
        } else if t > 30.0 {
            out.push(format!("Hot weather ({t:.0}°C): air conditioning will increase consumption"));
        }

        let headwind_kmh = self.headwind_ms(bearing_deg) * 3.6;
        if headwind_kmh > 20.0 {
            out.push(format!(
                "Strong headwind ({headwind_kmh:.0} km/h): consumption increased"
            ));
        }
        if self.rain_level() >= 2 {
            out.push("Heavy rain: rolling resistance and consumption increased".to_string());
        }
        if self.wind_speed_ms * 3.6 > 50.0 {
            out.push(format!(
                "Very strong wind ({:.0} km/h): drive with care",
                self.wind_speed_ms * 3.6
            ));
        }
        out
    }
}

/// Weather sample at a position along the route; `None` when the fetch failed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherSample {
    pub position_km: f64,
    pub conditions: Option<WeatherConditions>,
}

/// Elevation sample at a position along the route; `None` when the fetch failed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElevationSample {
    pub position_km: f64,
    pub elevation_m: Option<f64>,
}

/// Linear interpolation over the known elevation samples. `None` when fewer
/// than two samples are known; positions outside the known span clamp to the
/// nearest end.
pub fn elevation_at(samples: &[ElevationSample], km: f64) -> Option<f64> {
    let known: Vec<(f64, f64)> = samples
        .iter()
        .filter_map(|s| s.elevation_m.map(|e| (s.position_km, e)))
        .collect();
    if known.len() < 2 {
        return None;
    }
    let idx = known.partition_point(|(pos, _)| *pos < km);
    if idx == 0 {
        return Some(known[0].1);
    }
    if idx >= known.len() {
        return Some(known[known.len() - 1].1);
    }
    let (p0, e0) = known[idx - 1];
    let (p1, e1) = known[idx];
    if p1 <= p0 {
        return Some(e1);
    }
    Some(e0 + (e1 - e0) * (km - p0) / (p1 - p0))
}

/// Known sample nearest to `km`; ties resolve to the earlier sample.
pub fn weather_near(samples: &[WeatherSample], km: f64) -> Option<WeatherConditions> {
    samples
        .iter()
        .filter_map(|s| s.conditions.map(|c| ((s.position_km - km).abs(), c)))
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, c)| c)
}
