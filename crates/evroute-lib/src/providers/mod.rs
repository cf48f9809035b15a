//! External collaborators consumed by the planner.
//!
//! - [`RouteProvider`] - road geometry between two points
//! - [`ElevationProvider`] - ground height at a point
//! - [`WeatherProvider`] - current conditions at a point
//! - [`StationDirectory`] - charging stations inside a corridor
//!
//! [`http`] talks to OSRM, Open-Meteo and Open Charge Map; [`fixture`] serves
//! a recorded trip from JSON for offline use and tests.

pub mod fixture;
pub mod http;
pub mod retry;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::geo::{BoundingBox, LatLng, RouteGeometry};
use crate::stations::StationRecord;
use crate::weather::WeatherConditions;

pub use fixture::TripFixture;
pub use http::{HttpProviderConfig, HttpProviders};
pub use retry::retry_with_backoff;

/// Area searched for charging stations.
#[derive(Debug, Clone, PartialEq)]
pub struct Corridor {
    pub bbox: BoundingBox,
    /// Points along the route for directories that search by radius.
    pub points: Vec<LatLng>,
    pub radius_km: f64,
}

impl Corridor {
    /// Corridor of `width_km` around `route`, with a search point every
    /// `spacing_km`.
    pub fn around(route: &RouteGeometry, width_km: f64, spacing_km: f64) -> Self {
        let points = route
            .sample_positions(spacing_km, 2, usize::MAX)
            .into_iter()
            .map(|km| route.point_at(km))
            .collect();
        Self {
            bbox: route.bounding_box(width_km),
            points,
            radius_km: width_km.max(spacing_km / 2.0),
        }
    }
}

#[async_trait]
pub trait RouteProvider: Send + Sync {
    async fn route(&self, origin: LatLng, destination: LatLng) -> Result<RouteGeometry>;
}

#[async_trait]
pub trait ElevationProvider: Send + Sync {
    /// Elevation above sea level, metres.
    async fn elevation(&self, point: LatLng) -> Result<f64>;
}

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn current(&self, point: LatLng) -> Result<WeatherConditions>;
}

#[async_trait]
pub trait StationDirectory: Send + Sync {
    async fn stations(&self, corridor: &Corridor) -> Result<Vec<StationRecord>>;
}

/// The four collaborators a planning session needs.
#[derive(Clone)]
pub struct Providers {
    pub route: Arc<dyn RouteProvider>,
    pub elevation: Arc<dyn ElevationProvider>,
    pub weather: Arc<dyn WeatherProvider>,
    pub stations: Arc<dyn StationDirectory>,
}

impl std::fmt::Debug for Providers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Providers").finish_non_exhaustive()
    }
}

impl Providers {
    /// Serve every collaborator from one recorded trip.
    pub fn from_fixture(fixture: TripFixture) -> Self {
        let shared = Arc::new(fixture);
        Self {
            route: shared.clone(),
            elevation: shared.clone(),
            weather: shared.clone(),
            stations: shared,
        }
    }

    /// Live HTTP collaborators.
    pub fn http(config: HttpProviderConfig) -> Result<Self> {
        let shared = Arc::new(HttpProviders::new(config)?);
        Ok(Self {
            route: shared.clone(),
            elevation: shared.clone(),
            weather: shared.clone(),
            stations: shared,
        })
    }
}
