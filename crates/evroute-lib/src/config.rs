//! Planner configuration.
//!
//! Every knob has a default suitable for highway trips. Deployments override
//! them through `EVROUTE_*` environment variables:
//!
//! | Variable | Field |
//! |---|---|
//! | `EVROUTE_RESERVE_SOC` | [`PlannerConfig::reserve_soc_percent`] |
//! | `EVROUTE_SOFT_CEILING` | [`PlannerConfig::soft_ceiling_percent`] |
//! | `EVROUTE_CHARGE_STEP` | [`PlannerConfig::charge_step_percent`] |
//! | `EVROUTE_CORRIDOR_KM` | [`PlannerConfig::corridor_width_km`] |
//! | `EVROUTE_MIN_POWER_KW` | [`PlannerConfig::min_station_power_kw`] |
//! | `EVROUTE_FETCH_CONCURRENCY` | [`PlannerConfig::fetch_concurrency`] |
//! | `EVROUTE_BATCH_DELAY_MS` | [`PlannerConfig::batch_delay`] |
//! | `EVROUTE_FETCH_TIMEOUT_MS` | [`PlannerConfig::fetch_timeout`] |
//! | `EVROUTE_MAX_LABELS` | [`PlannerConfig::max_labels`] |
//! | `EVROUTE_STOP_OVERHEAD_MIN` | [`PlannerConfig::stop_overhead_minutes`] |
//! | `EVROUTE_DC_PRICE` / `EVROUTE_AC_PRICE` | default prices per kWh |

use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::routing::strategy::StrategyKind;

/// Bounded exponential backoff for collaborator calls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_delay: Duration::from_millis(200),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1).saturating_pow(attempt.saturating_sub(1));
        self.initial_delay.saturating_mul(factor)
    }
}

/// Tunables for a planning session.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerConfig {
    /// SoC the battery must never drop below while driving.
    pub reserve_soc_percent: f64,
    /// Charging stops above this only when the next leg needs it.
    pub soft_ceiling_percent: f64,
    /// Spacing of discrete departure SoC levels.
    pub charge_step_percent: f64,
    /// Default search objective.
    pub strategy: StrategyKind,
    /// Fixed time priced into every charging stop for pulling in, plugging
    /// in and leaving. Not reported as charging time.
    pub stop_overhead_minutes: f64,

    pub corridor_width_km: f64,
    pub min_station_power_kw: f64,
    pub station_window_km: f64,
    pub stations_per_window: usize,
    /// Speed used to cost the drive to and from an off-route station.
    pub detour_speed_kmh: f64,

    pub weather_interval_km: f64,
    pub weather_min_points: usize,
    pub weather_max_points: usize,
    pub elevation_interval_km: f64,
    pub elevation_max_points: usize,
    /// Longest stretch costed as a single segment.
    pub max_segment_km: f64,

    /// Concurrent sample fetches per batch.
    pub fetch_concurrency: usize,
    pub batch_delay: Duration,
    pub fetch_timeout: Duration,
    pub retry: RetryPolicy,
    pub tile_cache_capacity: usize,
    pub tile_zoom: u8,

    /// Labels popped before the search gives up.
    pub max_labels: usize,
    pub dc_price_per_kwh: f64,
    pub ac_price_per_kwh: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            reserve_soc_percent: 5.0,
            soft_ceiling_percent: 90.0,
            charge_step_percent: 10.0,
            strategy: StrategyKind::Fastest,
            stop_overhead_minutes: 8.0,
            corridor_width_km: 5.0,
            min_station_power_kw: 50.0,
            station_window_km: 50.0,
            stations_per_window: 3,
            detour_speed_kmh: 50.0,
            weather_interval_km: 50.0,
            weather_min_points: 3,
            weather_max_points: 20,
            elevation_interval_km: 5.0,
            elevation_max_points: 200,
            max_segment_km: 10.0,
            fetch_concurrency: 5,
            batch_delay: Duration::from_millis(100),
            fetch_timeout: Duration::from_secs(5),
            retry: RetryPolicy::default(),
            tile_cache_capacity: 4096,
            tile_zoom: 14,
            max_labels: 200_000,
            dc_price_per_kwh: 12.5,
            ac_price_per_kwh: 9.0,
        }
    }
}

impl PlannerConfig {
    /// Defaults overridden by `EVROUTE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(v) = parse_var(&lookup, "EVROUTE_RESERVE_SOC")? {
            config.reserve_soc_percent = v;
        }
        if let Some(v) = parse_var(&lookup, "EVROUTE_SOFT_CEILING")? {
            config.soft_ceiling_percent = v;
        }
        if let Some(v) = parse_var(&lookup, "EVROUTE_CHARGE_STEP")? {
            config.charge_step_percent = v;
        }
        if let Some(v) = parse_var(&lookup, "EVROUTE_CORRIDOR_KM")? {
            config.corridor_width_km = v;
        }
        if let Some(v) = parse_var(&lookup, "EVROUTE_MIN_POWER_KW")? {
            config.min_station_power_kw = v;
        }
        if let Some(v) = parse_var(&lookup, "EVROUTE_FETCH_CONCURRENCY")? {
            config.fetch_concurrency = v;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "EVROUTE_BATCH_DELAY_MS")? {
            config.batch_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "EVROUTE_FETCH_TIMEOUT_MS")? {
            config.fetch_timeout = Duration::from_millis(ms);
        }
        if let Some(v) = parse_var(&lookup, "EVROUTE_MAX_LABELS")? {
            config.max_labels = v;
        }
        if let Some(v) = parse_var(&lookup, "EVROUTE_STOP_OVERHEAD_MIN")? {
            config.stop_overhead_minutes = v;
        }
        if let Some(v) = parse_var(&lookup, "EVROUTE_DC_PRICE")? {
            config.dc_price_per_kwh = v;
        }
        if let Some(v) = parse_var(&lookup, "EVROUTE_AC_PRICE")? {
            config.ac_price_per_kwh = v;
        }
        if let Some(raw) = lookup("EVROUTE_STRATEGY") {
            config.strategy = raw.parse()?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        let percents = [
            (self.reserve_soc_percent, "reserve_soc_percent"),
            (self.soft_ceiling_percent, "soft_ceiling_percent"),
        ];
        for (value, field) in percents {
            if !value.is_finite() || !(0.0..=100.0).contains(&value) {
                return Err(invalid(format!("{field} must be between 0 and 100, got {value}")));
            }
        }
        if self.soft_ceiling_percent <= self.reserve_soc_percent {
            return Err(invalid("soft_ceiling_percent must exceed reserve_soc_percent"));
        }
        if !(self.charge_step_percent > 0.0 && self.charge_step_percent <= 50.0) {
            return Err(invalid(format!(
                "charge_step_percent must be in (0, 50], got {}",
                self.charge_step_percent
            )));
        }

        let positive = [
            (self.corridor_width_km, "corridor_width_km"),
            (self.station_window_km, "station_window_km"),
            (self.detour_speed_kmh, "detour_speed_kmh"),
            (self.weather_interval_km, "weather_interval_km"),
            (self.elevation_interval_km, "elevation_interval_km"),
            (self.max_segment_km, "max_segment_km"),
        ];
        for (value, field) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(invalid(format!("{field} must be a finite positive number")));
            }
        }

        let non_negative = [
            (self.min_station_power_kw, "min_station_power_kw"),
            (self.stop_overhead_minutes, "stop_overhead_minutes"),
            (self.dc_price_per_kwh, "dc_price_per_kwh"),
            (self.ac_price_per_kwh, "ac_price_per_kwh"),
        ];
        for (value, field) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(format!("{field} must be finite and non-negative")));
            }
        }

        if self.fetch_concurrency == 0 {
            return Err(invalid("fetch_concurrency must be at least 1"));
        }
        if self.max_labels == 0 {
            return Err(invalid("max_labels must be at least 1"));
        }
        if self.retry.attempts == 0 {
            return Err(invalid("retry attempts must be at least 1"));
        }
        if self.tile_zoom > 22 {
            return Err(invalid(format!("tile_zoom must be at most 22, got {}", self.tile_zoom)));
        }
        if self.weather_min_points > self.weather_max_points {
            return Err(invalid("weather_min_points exceeds weather_max_points"));
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| invalid(format!("{key}='{raw}': {e}"))),
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::InvalidConfig {
        message: message.into(),
    }
}
