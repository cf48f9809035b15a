//! evroute library entry points.
//!
//! This crate estimates the energy an electric vehicle needs for a trip and
//! plans the charging stops that get it there: vehicle catalog and charging
//! curves, the segment energy model, station selection along the route, the
//! charge-stop search and the session that gathers route, elevation, weather
//! and station data from collaborators. Higher-level consumers (CLI, HTTP
//! service) should only depend on what is exported here.
//!

#![deny(warnings)]

pub mod cache;
pub mod config;
pub mod energy;
pub mod error;
pub mod geo;
pub mod providers;
pub mod routing;
pub mod sampling;
pub mod service;
pub mod soc;
pub mod stations;
pub mod vehicle;
pub mod weather;

pub use cache::ElevationTileCache;
pub use config::{PlannerConfig, RetryPolicy};
pub use energy::{energy_for_segment, estimate_range_km, estimate_stops, EnergyProfile, RouteSegment};
pub use error::{Error, Result};
pub use geo::{LatLng, RouteGeometry};
pub use providers::{Providers, TripFixture};
pub use routing::{plan_trip, ChargeStop, RoutePlan, StrategyKind, TripData, TripParameters, TripRequest};
pub use service::PlanSession;
pub use soc::Soc;
pub use stations::{ChargingStationCandidate, StationCandidateIndex, StationRecord};
pub use vehicle::{ChargingCurve, VehicleCatalog, VehicleProfile};
pub use weather::WeatherConditions;

pub use tokio_util::sync::CancellationToken;
