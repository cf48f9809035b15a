//! Recorded trips served from JSON.
//!
//! A fixture stands in for every collaborator at once:
//!
//! ```json
//! {
//!   "name": "Istanbul - Ankara",
//!   "geometry": [[28.97, 41.01], [32.85, 39.93]],
//!   "avgSpeedKmh": 95,
//!   "elevationM": [40, 880],
//!   "weather": {"temperatureC": 8, "windSpeedMs": 3, "windDirectionDeg": 90, "precipitationMm": 0},
//!   "stations": [ ... ]
//! }
//! ```
//!
//! `geometry` holds `[lon, lat]` pairs; when absent, the route is a straight
//! line between the requested endpoints. `elevationM` gives one height per
//! geometry vertex. Leaving out `elevationM` or `weather` makes the matching
//! provider fail, which the planner absorbs as missing samples.

use std::fs;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geo::{LatLng, RouteGeometry};
use crate::stations::StationRecord;
use crate::weather::WeatherConditions;

use super::{Corridor, ElevationProvider, RouteProvider, StationDirectory, WeatherProvider};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripFixture {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub geometry: Vec<[f64; 2]>,
    #[serde(default)]
    pub avg_speed_kmh: Option<f64>,
    #[serde(default)]
    pub elevation_m: Option<Vec<f64>>,
    #[serde(default)]
    pub weather: Option<WeatherConditions>,
    #[serde(default)]
    pub stations: Vec<StationRecord>,
}

impl TripFixture {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::FixtureLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let fixture: Self = serde_json::from_str(&text).map_err(|e| Error::FixtureLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        if let Some(elevation) = &fixture.elevation_m {
            if elevation.len() != fixture.geometry.len() {
                return Err(Error::FixtureLoad {
                    path: path.to_path_buf(),
                    message: format!(
                        "elevationM has {} values for {} geometry vertices",
                        elevation.len(),
                        fixture.geometry.len()
                    ),
                });
            }
        }
        Ok(fixture)
    }

    fn vertices(&self) -> Vec<LatLng> {
        self.geometry
            .iter()
            .map(|[lon, lat]| LatLng::new(*lat, *lon))
            .collect()
    }
}

#[async_trait]
impl RouteProvider for TripFixture {
    async fn route(&self, origin: LatLng, destination: LatLng) -> Result<RouteGeometry> {
        let vertices = if self.geometry.is_empty() {
            vec![origin, destination]
        } else {
            self.vertices()
        };
        RouteGeometry::new(vertices, self.avg_speed_kmh)
    }
}

#[async_trait]
impl ElevationProvider for TripFixture {
    /// Height of the nearest recorded vertex.
    async fn elevation(&self, point: LatLng) -> Result<f64> {
        let unavailable = || Error::UnexpectedResponse {
            service: "fixture elevation",
            message: "fixture has no elevation profile".to_string(),
        };
        let heights = self.elevation_m.as_ref().ok_or_else(unavailable)?;
        self.vertices()
            .iter()
            .zip(heights)
            .min_by(|(a, _), (b, _)| {
                a.distance_km(&point).total_cmp(&b.distance_km(&point))
            })
            .map(|(_, h)| *h)
            .ok_or_else(unavailable)
    }
}

#[async_trait]
impl WeatherProvider for TripFixture {
    async fn current(&self, _point: LatLng) -> Result<WeatherConditions> {
        self.weather.ok_or_else(|| Error::UnexpectedResponse {
            service: "fixture weather",
            message: "fixture has no weather".to_string(),
        })
    }
}

#[async_trait]
impl StationDirectory for TripFixture {
    async fn stations(&self, corridor: &Corridor) -> Result<Vec<StationRecord>> {
        Ok(self
            .stations
            .iter()
            .filter(|s| corridor.bbox.contains(&s.location))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn straight_line_when_geometry_missing() {
        let fixture = TripFixture::default();
        let route = fixture
            .route(LatLng::new(41.0, 29.0), LatLng::new(40.0, 30.0))
            .await
            .unwrap();
        assert_eq!(route.vertices().len(), 2);
        assert!(fixture.current(LatLng::new(41.0, 29.0)).await.is_err());
        assert!(fixture.elevation(LatLng::new(41.0, 29.0)).await.is_err());
    }

    #[tokio::test]
    async fn elevation_comes_from_nearest_vertex() {
        let fixture = TripFixture {
            geometry: vec![[29.0, 41.0], [30.0, 41.0]],
            elevation_m: Some(vec![100.0, 900.0]),
            ..TripFixture::default()
        };
        let h = fixture.elevation(LatLng::new(41.0, 29.9)).await.unwrap();
        assert_eq!(h, 900.0);
    }

    #[test]
    fn mismatched_elevation_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"geometry": [[29.0, 41.0], [30.0, 41.0]], "elevationM": [1.0]}}"#
        )
        .unwrap();
        let err = TripFixture::from_path(file.path()).unwrap_err();
        assert!(matches!(err, Error::FixtureLoad { .. }));
    }
}
