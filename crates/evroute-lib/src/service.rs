//! Planning session: request validation, collaborator I/O and the hand-off
//! to [`plan_trip`].

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::ElevationTileCache;
use crate::config::PlannerConfig;
use crate::error::{Error, Result};
use crate::providers::{retry_with_backoff, Corridor, Providers};
use crate::routing::{compare_strategies, plan_trip, RoutePlan, TripData, TripParameters, TripRequest};
use crate::sampling::{fetch_limit, sample_elevation, sample_weather};
use crate::soc::Soc;
use crate::vehicle::{VehicleCatalog, VehicleProfile};

/// Origins and destinations closer than this are the same point, km.
const IDENTICAL_ENDPOINTS_KM: f64 = 0.05;

/// A request that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedTrip<'a> {
    pub vehicle: &'a VehicleProfile,
    pub params: TripParameters,
    pub warnings: Vec<String>,
}

/// Owns everything that outlives a single request: configuration, the
/// vehicle catalog, collaborators and the elevation tile cache.
#[derive(Debug)]
pub struct PlanSession {
    config: PlannerConfig,
    catalog: Arc<VehicleCatalog>,
    providers: Providers,
    cache: ElevationTileCache,
}

impl PlanSession {
    pub fn new(config: PlannerConfig, catalog: Arc<VehicleCatalog>, providers: Providers) -> Self {
        let cache = ElevationTileCache::new(config.tile_zoom, config.tile_cache_capacity);
        Self {
            config,
            catalog,
            providers,
            cache,
        }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn catalog(&self) -> &VehicleCatalog {
        &self.catalog
    }

    pub fn cache(&self) -> &ElevationTileCache {
        &self.cache
    }

    /// Check a request before any I/O happens.
    pub fn validate_request(&self, request: &TripRequest) -> Result<ValidatedTrip<'_>> {
        let vehicle = self.catalog.resolve(&request.vehicle_id)?;
        let start_soc = Soc::checked("startSocPercent", request.start_soc_percent)?;
        let mut min_arrival = Soc::checked("minArrivalSocPercent", request.min_arrival_soc_percent)?;
        if min_arrival.percent() >= 100.0 {
            return Err(Error::InvalidArrivalSoc {
                message: "cannot guarantee arriving with a full battery".to_string(),
            });
        }
        request.origin.validate("origin")?;
        request.destination.validate("destination")?;
        if request.origin.distance_km(&request.destination) < IDENTICAL_ENDPOINTS_KM {
            return Err(Error::IdenticalEndpoints);
        }

        let mut warnings = Vec::new();
        let reserve = self.config.reserve_soc_percent;
        if min_arrival.percent() < reserve {
            warnings.push(format!(
                "minimum arrival SoC raised from {} to the {reserve:.0}% reserve floor",
                min_arrival
            ));
            min_arrival = Soc::clamped(reserve);
        }

        Ok(ValidatedTrip {
            vehicle,
            params: TripParameters {
                start_soc,
                min_arrival_soc: min_arrival,
                strategy: request.strategy.unwrap_or(self.config.strategy),
            },
            warnings,
        })
    }

    /// Plan a trip. Equivalent to [`PlanSession::plan_with_cancel`] with a
    /// token nobody cancels.
    pub async fn plan(&self, request: &TripRequest) -> Result<RoutePlan> {
        self.plan_with_cancel(request, CancellationToken::new()).await
    }

    pub async fn plan_with_cancel(
        &self,
        request: &TripRequest,
        cancel: CancellationToken,
    ) -> Result<RoutePlan> {
        let trip = self.validate_request(request)?;
        let data = self.gather(request, &cancel).await?;
        let mut plan = plan_trip(trip.vehicle, &trip.params, &data, &self.config, Some(&cancel))?;
        prepend_warnings(&mut plan, &trip.warnings);
        Ok(plan)
    }

    /// Plan the trip once per strategy, sharing one round of collaborator I/O.
    pub async fn compare(&self, request: &TripRequest) -> Result<Vec<RoutePlan>> {
        let cancel = CancellationToken::new();
        let trip = self.validate_request(request)?;
        let data = self.gather(request, &cancel).await?;
        let mut plans =
            compare_strategies(trip.vehicle, &trip.params, &data, &self.config, Some(&cancel))?;
        for plan in &mut plans {
            prepend_warnings(plan, &trip.warnings);
        }
        Ok(plans)
    }

    async fn gather(&self, request: &TripRequest, cancel: &CancellationToken) -> Result<TripData> {
        let retry = self.config.retry;

        let route = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            route = retry_with_backoff("routing", &retry, || {
                self.providers.route.route(request.origin, request.destination)
            }) => route?,
        };
        debug!(
            km = route.total_km(),
            vertices = route.vertices().len(),
            "route fetched"
        );

        let corridor = Corridor::around(
            &route,
            self.config.corridor_width_km,
            self.config.station_window_km,
        );
        let stations = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            stations = retry_with_backoff("station directory", &retry, || {
                self.providers.stations.stations(&corridor)
            }) => stations?,
        };

        // Both default adapters talk to the same host: one budget for both.
        let limit = fetch_limit(&self.config);
        let (elevation, weather) = tokio::try_join!(
            sample_elevation(
                &route,
                self.providers.elevation.as_ref(),
                &self.cache,
                &self.config,
                &limit,
                cancel,
            ),
            sample_weather(
                &route,
                self.providers.weather.as_ref(),
                &self.config,
                &limit,
                cancel,
            ),
        )?;

        let cache = self.cache.stats();
        info!(
            km = route.total_km(),
            stations = stations.len(),
            elevation_samples = elevation.len(),
            weather_samples = weather.len(),
            cache_entries = cache.entries,
            cache_hits = cache.hits,
            "trip data gathered"
        );

        Ok(TripData {
            route,
            elevation,
            weather,
            stations,
        })
    }
}

fn prepend_warnings(plan: &mut RoutePlan, warnings: &[String]) {
    if warnings.is_empty() {
        return;
    }
    let mut merged = warnings.to_vec();
    merged.append(&mut plan.warnings);
    plan.warnings = merged;
}
