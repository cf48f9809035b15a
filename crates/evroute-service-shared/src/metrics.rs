//! Prometheus metrics for the evroute services.
//!
//! - [`MetricsConfig`] / [`init_metrics`]: install the recorder once at startup
//! - [`metrics_handler`]: render the `/metrics` page
//! - `record_*` helpers for planning outcomes
//!
//! ```no_run
//! use axum::{routing::get, Router};
//! use evroute_service_shared::metrics::{init_metrics, metrics_handler, MetricsConfig};
//!
//! init_metrics(&MetricsConfig::default()).ok();
//! let app: Router = Router::new().route("/metrics", get(metrics_handler));
//! ```

use evroute_lib::cache::CacheStats;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

static PROMETHEUS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    /// Route serving the exposition page.
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/metrics".to_string(),
        }
    }
}

impl MetricsConfig {
    /// `METRICS_ENABLED` ("false" disables) and `METRICS_PATH`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let enabled = lookup("METRICS_ENABLED")
            .map(|v| !v.trim().eq_ignore_ascii_case("false"))
            .unwrap_or(true);
        let path = lookup("METRICS_PATH")
            .filter(|p| p.starts_with('/'))
            .unwrap_or_else(|| "/metrics".to_string());
        Self { enabled, path }
    }
}

/// Install the Prometheus recorder. Only the first call succeeds.
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if !config.enabled {
        return Err(MetricsError::Disabled);
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| MetricsError::InstallFailed(e.to_string()))?;

    PROMETHEUS_HANDLE
        .set(handle)
        .map_err(|_| MetricsError::AlreadyInitialized)?;

    Ok(())
}

pub fn prometheus_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

/// Prometheus exposition text, or a comment when no recorder is installed.
pub async fn metrics_handler() -> String {
    PROMETHEUS_HANDLE
        .get()
        .map(|h| h.render())
        .unwrap_or_else(|| "# Metrics not initialized\n".to_string())
}

#[derive(Debug, Clone)]
pub enum MetricsError {
    Disabled,
    AlreadyInitialized,
    InstallFailed(String),
}

impl std::fmt::Display for MetricsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricsError::Disabled => write!(f, "metrics are disabled"),
            MetricsError::AlreadyInitialized => write!(f, "metrics recorder already initialized"),
            MetricsError::InstallFailed(e) => {
                write!(f, "failed to install metrics recorder: {}", e)
            }
        }
    }
}

impl std::error::Error for MetricsError {}

// =============================================================================
// Planning metrics
// =============================================================================

/// Count a finished plan, feasible or not.
///
/// Increments `evroute_plans_computed_total{strategy, feasible, service}`.
pub fn record_plan_computed(strategy: &str, feasible: bool, service: &str) {
    metrics::counter!(
        "evroute_plans_computed_total",
        "strategy" => strategy.to_string(),
        "feasible" => if feasible { "true" } else { "false" },
        "service" => service.to_string()
    )
    .increment(1);
}

/// Count a request that produced no plan.
///
/// `reason` is a short label such as "validation_error", "unknown_vehicle"
/// or "upstream_unavailable".
pub fn record_plan_failed(reason: &str, service: &str) {
    metrics::counter!(
        "evroute_plans_failed_total",
        "reason" => reason.to_string(),
        "service" => service.to_string()
    )
    .increment(1);
}

/// Record the number of charging stops in a plan.
pub fn record_charge_stops(stops: usize, strategy: &str) {
    metrics::histogram!(
        "evroute_plan_charge_stops",
        "strategy" => strategy.to_string()
    )
    .record(stops as f64);
}

/// Publish elevation tile cache occupancy and hit/miss totals as gauges.
pub fn record_tile_cache(stats: &CacheStats) {
    metrics::gauge!("evroute_tile_cache_entries").set(stats.entries as f64);
    metrics::gauge!("evroute_tile_cache_hits").set(stats.hits as f64);
    metrics::gauge!("evroute_tile_cache_misses").set(stats.misses as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_config_defaults() {
        let config = MetricsConfig::from_lookup(|_| None);
        assert!(config.enabled);
        assert_eq!(config.path, "/metrics");
    }

    #[test]
    fn test_metrics_config_disabled() {
        let config = MetricsConfig::from_lookup(|key| match key {
            "METRICS_ENABLED" => Some("FALSE".to_string()),
            "METRICS_PATH" => Some("no-slash".to_string()),
            _ => None,
        });
        assert!(!config.enabled);
        assert_eq!(config.path, "/metrics");
        assert!(matches!(init_metrics(&config), Err(MetricsError::Disabled)));
    }

    #[tokio::test]
    async fn test_metrics_handler_without_recorder() {
        let output = metrics_handler().await;
        assert!(output.starts_with('#') || output.contains("evroute_"));
    }

    #[test]
    fn test_recorders_do_not_panic_without_exporter() {
        record_plan_computed("fastest", true, "plan");
        record_plan_failed("validation_error", "plan");
        record_charge_stops(2, "fastest");
        record_tile_cache(&CacheStats {
            entries: 10,
            hits: 4,
            misses: 10,
        });
    }
}
