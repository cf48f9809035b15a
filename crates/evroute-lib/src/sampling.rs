//! Elevation and weather sampling along a route.
//!
//! Points are fetched in batches of `fetch_concurrency` running together,
//! with `batch_delay` between batches to stay inside third-party rate
//! limits. Every fetch also takes a permit from a [`Semaphore`] the caller
//! owns, so samplers running side by side against the same host share one
//! `fetch_concurrency` budget. Each fetch is bounded by `fetch_timeout`
//! from the moment it holds a permit; a timeout or error leaves that sample
//! empty instead of failing the plan.

use std::future::Future;

use futures_util::future::join_all;
use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::ElevationTileCache;
use crate::config::PlannerConfig;
use crate::error::{Error, Result};
use crate::geo::RouteGeometry;
use crate::providers::{ElevationProvider, WeatherProvider};
use crate::weather::{ElevationSample, WeatherSample};

/// Permit pool sized for one planning request.
pub fn fetch_limit(config: &PlannerConfig) -> Semaphore {
    Semaphore::new(config.fetch_concurrency.max(1))
}

/// Fetch `fetch(position)` for every position, batch by batch, never holding
/// more than `limit` allows in flight.
///
/// Returns one entry per position, `None` where the fetch failed or timed
/// out. Only cancellation is an error.
pub async fn fetch_batched<T, F, Fut>(
    kind: &'static str,
    positions: &[f64],
    config: &PlannerConfig,
    limit: &Semaphore,
    cancel: &CancellationToken,
    fetch: F,
) -> Result<Vec<Option<T>>>
where
    F: Fn(f64) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut out = Vec::with_capacity(positions.len());
    for (batch, chunk) in positions.chunks(config.fetch_concurrency.max(1)).enumerate() {
        if batch > 0 {
            tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = sleep(config.batch_delay) => {}
            }
        }
        let pending = chunk.iter().map(|km| {
            let km = *km;
            let fut = fetch(km);
            async move {
                let outcome = match limit.acquire().await {
                    Ok(_permit) => timeout(config.fetch_timeout, fut).await,
                    // The pool is never closed while sampling runs.
                    Err(_) => Ok(Err(Error::Cancelled)),
                };
                (km, outcome)
            }
        });
        let results = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            results = join_all(pending) => results,
        };
        for (km, result) in results {
            out.push(match result {
                Ok(Ok(value)) => Some(value),
                Ok(Err(err)) => {
                    warn!(kind, position_km = km, error = %err, "sample unavailable; using default");
                    None
                }
                Err(_) => {
                    warn!(
                        kind,
                        position_km = km,
                        timeout_ms = config.fetch_timeout.as_millis() as u64,
                        "sample timed out; using default"
                    );
                    None
                }
            });
        }
    }
    debug!(
        kind,
        requested = positions.len(),
        missing = out.iter().filter(|v| v.is_none()).count(),
        "sampling finished"
    );
    Ok(out)
}

/// Elevation every `elevation_interval_km`, through the session's tile cache.
pub async fn sample_elevation(
    route: &RouteGeometry,
    provider: &dyn ElevationProvider,
    cache: &ElevationTileCache,
    config: &PlannerConfig,
    limit: &Semaphore,
    cancel: &CancellationToken,
) -> Result<Vec<ElevationSample>> {
    let positions = route.sample_positions(config.elevation_interval_km, 2, config.elevation_max_points);
    let values = fetch_batched("elevation", &positions, config, limit, cancel, |km| {
        cache.get_or_fetch(route.point_at(km), provider)
    })
    .await?;
    Ok(positions
        .into_iter()
        .zip(values)
        .map(|(position_km, elevation_m)| ElevationSample {
            position_km,
            elevation_m,
        })
        .collect())
}

/// Current weather every `weather_interval_km`.
pub async fn sample_weather(
    route: &RouteGeometry,
    provider: &dyn WeatherProvider,
    config: &PlannerConfig,
    limit: &Semaphore,
    cancel: &CancellationToken,
) -> Result<Vec<WeatherSample>> {
    let positions = route.sample_positions(
        config.weather_interval_km,
        config.weather_min_points,
        config.weather_max_points,
    );
    let values = fetch_batched("weather", &positions, config, limit, cancel, |km| {
        provider.current(route.point_at(km))
    })
    .await?;
    Ok(positions
        .into_iter()
        .zip(values)
        .map(|(position_km, conditions)| WeatherSample {
            position_km,
            conditions,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn config() -> PlannerConfig {
        PlannerConfig {
            fetch_concurrency: 5,
            batch_delay: Duration::from_millis(100),
            fetch_timeout: Duration::from_millis(500),
            ..PlannerConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn runs_at_most_one_batch_at_a_time() {
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let positions: Vec<f64> = (0..12).map(f64::from).collect();
        let (in_flight, peak_ref) = (&in_flight, &peak);
        let limit = fetch_limit(&config());
        let out = fetch_batched("test", &positions, &config(), &limit, &CancellationToken::new(), |km| async move {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak_ref.fetch_max(now, Ordering::SeqCst);
            sleep(Duration::from_millis(10)).await;
            in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(km * 2.0)
        })
        .await
        .unwrap();
        assert_eq!(out.len(), 12);
        assert_eq!(out[11], Some(22.0));
        assert_eq!(peak.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn side_by_side_samplers_share_one_budget() {
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let config = config();
        let limit = fetch_limit(&config);
        let token = CancellationToken::new();
        let positions: Vec<f64> = (0..12).map(f64::from).collect();
        let (in_flight, peak_ref) = (&in_flight, &peak);
        let fetch = |km: f64| async move {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak_ref.fetch_max(now, Ordering::SeqCst);
            sleep(Duration::from_millis(10)).await;
            in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(km)
        };
        let (elevation, weather) = tokio::try_join!(
            fetch_batched("elevation", &positions, &config, &limit, &token, fetch),
            fetch_batched("weather", &positions, &config, &limit, &token, fetch),
        )
        .unwrap();
        assert_eq!(elevation.len(), 12);
        assert!(weather.iter().all(Option::is_some));
        assert_eq!(peak.load(Ordering::SeqCst), config.fetch_concurrency);
    }

    #[tokio::test(start_paused = true)]
    async fn timeouts_and_errors_become_none() {
        let positions = [0.0, 1.0, 2.0];
        let limit = fetch_limit(&config());
        let out = fetch_batched("test", &positions, &config(), &limit, &CancellationToken::new(), |km| async move {
            if km == 1.0 {
                sleep(Duration::from_secs(10)).await;
            }
            if km == 2.0 {
                return Err(Error::Cancelled);
            }
            Ok(km)
        })
        .await
        .unwrap();
        assert_eq!(out, vec![Some(0.0), None, None]);
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let positions = [0.0, 1.0];
        let limit = fetch_limit(&config());
        let result = fetch_batched("test", &positions, &config(), &limit, &token, |km| async move {
            sleep(Duration::from_millis(50)).await;
            Ok(km)
        })
        .await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
