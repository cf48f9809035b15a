//! `plan`: plan charging stops for one trip.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::debug;

use evroute_lib::providers::HttpProviderConfig;
use evroute_lib::{
    CancellationToken, LatLng, PlanSession, PlannerConfig, Providers, StrategyKind, TripFixture,
    TripRequest, VehicleCatalog,
};

use crate::output::{render_plan, to_json, OutputFormat};
use crate::terminal::ColorPalette;

/// Base URLs for the live collaborators. Ignored when `--trip` is given.
#[derive(Args, Debug, Clone, Default)]
pub struct ProviderArgs {
    /// OSRM routing server.
    #[arg(long, env = "OSRM_URL")]
    pub osrm_url: Option<String>,
    /// Open-Meteo server for elevation and weather.
    #[arg(long, env = "OPEN_METEO_URL")]
    pub open_meteo_url: Option<String>,
    /// Open Charge Map API server.
    #[arg(long, env = "OPEN_CHARGE_MAP_URL")]
    pub open_charge_map_url: Option<String>,
    /// Open Charge Map API key.
    #[arg(long, env = "OPEN_CHARGE_MAP_KEY", hide_env_values = true)]
    pub open_charge_map_key: Option<String>,
}

impl ProviderArgs {
    pub fn to_config(&self) -> HttpProviderConfig {
        let mut config = HttpProviderConfig::default();
        if let Some(url) = &self.osrm_url {
            config = config.with_osrm_url(url.clone());
        }
        if let Some(url) = &self.open_meteo_url {
            config = config.with_open_meteo_url(url.clone());
        }
        let ocm_url = self
            .open_charge_map_url
            .clone()
            .unwrap_or_else(|| config.open_charge_map_url.clone());
        config.with_open_charge_map(ocm_url, self.open_charge_map_key.clone())
    }
}

/// Trip description shared by `plan` and `compare`.
#[derive(Args, Debug, Clone)]
pub struct TripArgs {
    /// Vehicle id from the catalog.
    #[arg(long)]
    pub vehicle: String,
    /// Origin as `lat,lon`. Defaults to the start of `--trip`.
    #[arg(long = "from", value_parser = parse_lat_lon, allow_hyphen_values = true)]
    pub from: Option<LatLng>,
    /// Destination as `lat,lon`. Defaults to the end of `--trip`.
    #[arg(long = "to", value_parser = parse_lat_lon, allow_hyphen_values = true)]
    pub to: Option<LatLng>,
    /// State of charge at departure, percent.
    #[arg(long, default_value_t = 80.0)]
    pub start_soc: f64,
    /// Lowest acceptable state of charge on arrival, percent.
    #[arg(long, default_value_t = 10.0)]
    pub min_arrival_soc: f64,
    /// Search objective: fastest, fewest-stops or cheapest.
    #[arg(long)]
    pub strategy: Option<StrategyKind>,
    /// Recorded trip JSON to plan offline instead of calling live services.
    #[arg(long)]
    pub trip: Option<PathBuf>,
    #[command(flatten)]
    pub providers: ProviderArgs,
}

impl TripArgs {
    /// Build the session and the request it should answer.
    pub fn prepare(&self, catalog: Arc<VehicleCatalog>) -> Result<(PlanSession, TripRequest)> {
        let config = PlannerConfig::from_env().context("invalid EVROUTE_* configuration")?;

        let (providers, fixture_ends) = match &self.trip {
            Some(path) => {
                let fixture = TripFixture::from_path(path)?;
                let ends = fixture_endpoints(&fixture);
                debug!(path = %path.display(), "planning against recorded trip");
                (Providers::from_fixture(fixture), ends)
            }
            None => (Providers::http(self.providers.to_config())?, None),
        };

        let (origin, destination) = match (self.from, self.to, fixture_ends) {
            (Some(from), Some(to), _) => (from, to),
            (from, to, Some((start, end))) => (from.unwrap_or(start), to.unwrap_or(end)),
            _ => bail!("--from and --to are required unless --trip provides a route"),
        };

        let request = TripRequest {
            vehicle_id: self.vehicle.clone(),
            origin,
            destination,
            start_soc_percent: self.start_soc,
            min_arrival_soc_percent: self.min_arrival_soc,
            strategy: self.strategy,
        };
        Ok((PlanSession::new(config, catalog, providers), request))
    }
}

/// Returns `Ok(false)` when the plan is infeasible.
pub async fn handle_plan(
    catalog: Arc<VehicleCatalog>,
    args: &TripArgs,
    format: OutputFormat,
) -> Result<bool> {
    let (session, request) = args.prepare(catalog)?;

    let token = CancellationToken::new();
    let watcher = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            watcher.cancel();
        }
    });

    let plan = session
        .plan_with_cancel(&request, token)
        .await
        .context("planning failed")?;

    match format {
        OutputFormat::Text => print!("{}", render_plan(&plan, &ColorPalette::detect())),
        OutputFormat::Json => println!("{}", to_json(&plan)?),
    }
    Ok(plan.feasible)
}

/// Parse `lat,lon`.
pub fn parse_lat_lon(raw: &str) -> std::result::Result<LatLng, String> {
    let (lat, lon) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected 'lat,lon', got '{raw}'"))?;
    let lat: f64 = lat
        .trim()
        .parse()
        .map_err(|e| format!("bad latitude '{lat}': {e}"))?;
    let lon: f64 = lon
        .trim()
        .parse()
        .map_err(|e| format!("bad longitude '{lon}': {e}"))?;
    Ok(LatLng::new(lat, lon))
}

fn fixture_endpoints(fixture: &TripFixture) -> Option<(LatLng, LatLng)> {
    let first = fixture.geometry.first()?;
    let last = fixture.geometry.last()?;
    Some((LatLng::new(first[1], first[0]), LatLng::new(last[1], last[0])))
}
