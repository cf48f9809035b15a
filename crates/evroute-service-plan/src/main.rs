//! evroute trip planning service.
//!
//! # Configuration
//!
//! - `SERVICE_PORT` - HTTP port (default: 8080)
//! - `EVROUTE_VEHICLES` - vehicle catalog CSV (default: bundled catalog)
//! - `EVROUTE_TRIP_FIXTURE` - serve all collaborators from a recorded trip
//! - `OSRM_URL`, `OPEN_METEO_URL`, `OPEN_CHARGE_MAP_URL`, `OPEN_CHARGE_MAP_KEY`
//! - `EVROUTE_*` - planner tunables
//! - `RUST_LOG`, `LOG_FORMAT` (json or text), `METRICS_ENABLED`, `METRICS_PATH`

use std::env;
use std::net::SocketAddr;

use tracing::{error, info, warn};

use evroute_service_plan::{app, SERVICE};
use evroute_service_shared::{init_logging, init_metrics, AppState, LoggingConfig, MetricsConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_config = LoggingConfig::from_env().with_service(SERVICE);
    if let Err(e) = init_logging(&logging_config) {
        eprintln!("failed to initialize logging: {e}");
    }

    let metrics_config = MetricsConfig::from_env();
    if let Err(e) = init_metrics(&metrics_config) {
        warn!(error = %e, "continuing without metrics");
    }

    let port: u16 = env::var("SERVICE_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    let state = AppState::from_env().map_err(|e| {
        error!(error = %e, "failed to load application state");
        e
    })?;
    info!(
        vehicles = state.catalog().len(),
        port, "starting plan service"
    );

    let router = app(state, &metrics_config.path);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("plan service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
