//! HTTP collaborators: OSRM routes, Open-Meteo elevation and weather, and
//! Open Charge Map stations.
//!
//! # Example
//!
//! ```no_run
//! use evroute_lib::providers::{HttpProviderConfig, Providers};
//! use std::time::Duration;
//!
//! let config = HttpProviderConfig::default()
//!     .with_osrm_url("http://localhost:5000")
//!     .with_timeout(Duration::from_secs(10));
//! let providers = Providers::http(config)?;
//! # Ok::<(), evroute_lib::Error>(())
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::geo::{LatLng, RouteGeometry};
use crate::stations::{StationConnector, StationRecord};
use crate::vehicle::CurrentType;
use crate::weather::WeatherConditions;

use super::{Corridor, ElevationProvider, RouteProvider, StationDirectory, WeatherProvider};

/// Default user agent for collaborator requests.
pub const DEFAULT_USER_AGENT: &str = "evroute/0.1";

const DEFAULT_TIMEOUT_SECS: u64 = 15;
const DEFAULT_MAX_STATIONS: usize = 500;

const KMH_PER_MS: f64 = 3.6;

/// Configuration for [`HttpProviders`].
#[derive(Clone)]
pub struct HttpProviderConfig {
    /// OSRM base URL, e.g. `"https://router.project-osrm.org"`.
    pub osrm_url: String,
    /// Open-Meteo base URL serving `/v1/elevation` and `/v1/forecast`.
    pub open_meteo_url: String,
    pub open_charge_map_url: String,
    pub open_charge_map_key: Option<String>,
    pub max_stations: usize,
    pub timeout: Duration,
    pub user_agent: String,
}

impl std::fmt::Debug for HttpProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProviderConfig")
            .field("osrm_url", &self.osrm_url)
            .field("open_meteo_url", &self.open_meteo_url)
            .field("open_charge_map_url", &self.open_charge_map_url)
            .field(
                "open_charge_map_key",
                &self.open_charge_map_key.as_ref().map(|_| "<redacted>"),
            )
            .field("max_stations", &self.max_stations)
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl Default for HttpProviderConfig {
    fn default() -> Self {
        Self {
            osrm_url: "https://router.project-osrm.org".to_string(),
            open_meteo_url: "https://api.open-meteo.com".to_string(),
            open_charge_map_url: "https://api.openchargemap.io".to_string(),
            open_charge_map_key: None,
            max_stations: DEFAULT_MAX_STATIONS,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl HttpProviderConfig {
    /// Defaults overridden by `OSRM_URL`, `OPEN_METEO_URL`,
    /// `OPEN_CHARGE_MAP_URL` and `OPEN_CHARGE_MAP_KEY`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        let var = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        if let Some(url) = var("OSRM_URL") {
            config.osrm_url = url;
        }
        if let Some(url) = var("OPEN_METEO_URL") {
            config.open_meteo_url = url;
        }
        if let Some(url) = var("OPEN_CHARGE_MAP_URL") {
            config.open_charge_map_url = url;
        }
        config.open_charge_map_key = var("OPEN_CHARGE_MAP_KEY");
        config
    }

    #[must_use]
    pub fn with_osrm_url(mut self, url: impl Into<String>) -> Self {
        self.osrm_url = url.into();
        self
    }

    #[must_use]
    pub fn with_open_meteo_url(mut self, url: impl Into<String>) -> Self {
        self.open_meteo_url = url.into();
        self
    }

    #[must_use]
    pub fn with_open_charge_map(mut self, url: impl Into<String>, key: Option<String>) -> Self {
        self.open_charge_map_url = url.into();
        self.open_charge_map_key = key;
        self
    }

    /// Set the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// One HTTP client serving all four collaborator traits.
#[derive(Debug)]
pub struct HttpProviders {
    client: Client,
    config: HttpProviderConfig,
}

impl HttpProviders {
    pub fn new(config: HttpProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    fn route_url(&self, origin: LatLng, destination: LatLng) -> String {
        format!(
            "{}/route/v1/driving/{},{};{},{}?overview=full&geometries=geojson",
            self.config.osrm_url.trim_end_matches('/'),
            origin.lon,
            origin.lat,
            destination.lon,
            destination.lat
        )
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self
            .client
            .get(url)
            .query(query)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl RouteProvider for HttpProviders {
    async fn route(&self, origin: LatLng, destination: LatLng) -> Result<RouteGeometry> {
        let url = self.route_url(origin, destination);
        let response: OsrmRouteResponse = self.get_json(&url, &[]).await?;
        response.into_geometry()
    }
}

#[async_trait]
impl ElevationProvider for HttpProviders {
    async fn elevation(&self, point: LatLng) -> Result<f64> {
        let url = format!("{}/v1/elevation", self.config.open_meteo_url.trim_end_matches('/'));
        let query = [
            ("latitude", point.lat.to_string()),
            ("longitude", point.lon.to_string()),
        ];
        let response: ElevationResponse = self.get_json(&url, &query).await?;
        response
            .elevation
            .first()
            .copied()
            .filter(|e| e.is_finite())
            .ok_or_else(|| Error::UnexpectedResponse {
                service: "open-meteo",
                message: "elevation array is empty".to_string(),
            })
    }
}

#[async_trait]
impl WeatherProvider for HttpProviders {
    async fn current(&self, point: LatLng) -> Result<WeatherConditions> {
        let url = format!("{}/v1/forecast", self.config.open_meteo_url.trim_end_matches('/'));
        let query = [
            ("latitude", point.lat.to_string()),
            ("longitude", point.lon.to_string()),
            (
                "current",
                "temperature_2m,wind_speed_10m,wind_direction_10m,precipitation".to_string(),
            ),
        ];
        let response: ForecastResponse = self.get_json(&url, &query).await?;
        Ok(response.current.into_conditions())
    }
}

#[async_trait]
impl StationDirectory for HttpProviders {
    async fn stations(&self, corridor: &Corridor) -> Result<Vec<StationRecord>> {
        let url = format!(
            "{}/v3/poi/",
            self.config.open_charge_map_url.trim_end_matches('/')
        );
        let bbox = &corridor.bbox;
        let mut query = vec![
            ("output", "json".to_string()),
            ("compact", "true".to_string()),
            ("verbose", "false".to_string()),
            ("maxresults", self.config.max_stations.to_string()),
            (
                "boundingbox",
                format!(
                    "({},{}),({},{})",
                    bbox.max_lat, bbox.min_lon, bbox.min_lat, bbox.max_lon
                ),
            ),
        ];
        if let Some(key) = &self.config.open_charge_map_key {
            query.push(("key", key.clone()));
        }
        let pois: Vec<OcmPoi> = self.get_json(&url, &query).await?;
        Ok(pois.into_iter().filter_map(OcmPoi::into_record).collect())
    }
}

// =============================================================================
// Wire formats
// =============================================================================

#[derive(Debug, Deserialize)]
struct OsrmRouteResponse {
    code: String,
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    /// Metres.
    distance: f64,
    /// Seconds.
    duration: f64,
    geometry: OsrmGeometry,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    /// `[lon, lat]` pairs.
    coordinates: Vec<[f64; 2]>,
}

impl OsrmRouteResponse {
    fn into_geometry(self) -> Result<RouteGeometry> {
        if self.code != "Ok" {
            return Err(Error::UnexpectedResponse {
                service: "osrm",
                message: format!("{}: {}", self.code, self.message.unwrap_or_default()),
            });
        }
        let route = self.routes.into_iter().next().ok_or_else(|| Error::UnexpectedResponse {
            service: "osrm",
            message: "no route returned".to_string(),
        })?;
        let avg_speed = if route.duration > 0.0 {
            Some(route.distance / route.duration * KMH_PER_MS)
        } else {
            None
        };
        let vertices = route
            .geometry
            .coordinates
            .into_iter()
            .map(|[lon, lat]| LatLng::new(lat, lon))
            .collect();
        RouteGeometry::new(vertices, avg_speed)
    }
}

#[derive(Debug, Deserialize)]
struct ElevationResponse {
    elevation: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: CurrentWeather,
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    temperature_2m: f64,
    /// km/h.
    wind_speed_10m: f64,
    wind_direction_10m: f64,
    #[serde(default)]
    precipitation: f64,
}

impl CurrentWeather {
    fn into_conditions(self) -> WeatherConditions {
        WeatherConditions {
            temperature_c: self.temperature_2m,
            wind_speed_ms: self.wind_speed_10m / KMH_PER_MS,
            wind_direction_deg: self.wind_direction_10m,
            precipitation_mm: self.precipitation,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OcmPoi {
    #[serde(rename = "ID")]
    id: u64,
    address_info: Option<OcmAddress>,
    operator_info: Option<OcmOperator>,
    #[serde(default)]
    connections: Vec<OcmConnection>,
    usage_cost: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OcmAddress {
    title: Option<String>,
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OcmOperator {
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OcmConnection {
    #[serde(rename = "ConnectionTypeID")]
    connection_type_id: Option<u32>,
    #[serde(rename = "PowerKW")]
    power_kw: Option<f64>,
    #[serde(rename = "CurrentTypeID")]
    current_type_id: Option<u32>,
}

impl OcmPoi {
    fn into_record(self) -> Option<StationRecord> {
        let address = self.address_info?;
        let connectors = self
            .connections
            .iter()
            .filter_map(|c| {
                Some(StationConnector {
                    kind: ocm_connector_label(c.connection_type_id?).to_string(),
                    power_kw: c.power_kw.filter(|p| *p > 0.0)?,
                    current: c.current_type_id.map(|id| {
                        if id == 30 {
                            CurrentType::Dc
                        } else {
                            CurrentType::Ac
                        }
                    }),
                })
            })
            .collect();
        Some(StationRecord {
            id: format!("ocm-{}", self.id),
            name: address
                .title
                .unwrap_or_else(|| format!("Station {}", self.id)),
            operator: self.operator_info.and_then(|o| o.title),
            location: LatLng::new(address.latitude, address.longitude),
            connectors,
            price_per_kwh: self.usage_cost.as_deref().and_then(parse_usage_cost),
        })
    }
}

/// Open Charge Map connection type ids mapped onto connector labels.
fn ocm_connector_label(id: u32) -> &'static str {
    match id {
        33 => "CCS2",
        32 => "CCS1",
        25 | 1036 => "Type 2",
        1 => "Type 1",
        2 => "CHAdeMO",
        8 | 27 | 30 => "Tesla",
        _ => "unsupported",
    }
}

/// First number in a free-text cost such as `"8.99 TL/kWh"`.
fn parse_usage_cost(text: &str) -> Option<f64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let number: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    number.parse::<f64>().ok().filter(|p| *p > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn osrm_route_converts_to_geometry() {
        let json = r#"{
            "code": "Ok",
            "routes": [{
                "distance": 180000.0,
                "duration": 7200.0,
                "geometry": {"coordinates": [[29.0, 41.0], [30.0, 40.8], [31.0, 40.7]]}
            }]
        }"#;
        let response: OsrmRouteResponse = serde_json::from_str(json).unwrap();
        let route = response.into_geometry().unwrap();
        assert_eq!(route.vertices().len(), 3);
        assert_eq!(route.origin(), LatLng::new(41.0, 29.0));
        assert!((route.avg_speed_kmh() - 90.0).abs() < 1e-9);
    }

    #[test]
    fn osrm_error_code_is_unexpected_response() {
        let json = r#"{"code": "NoRoute", "message": "Impossible route"}"#;
        let response: OsrmRouteResponse = serde_json::from_str(json).unwrap();
        let err = response.into_geometry().unwrap_err();
        assert!(err.to_string().contains("NoRoute"));
    }

    #[test]
    fn open_meteo_wind_is_converted_to_ms() {
        let json = r#"{"current": {"temperature_2m": 4.5, "wind_speed_10m": 36.0,
            "wind_direction_10m": 270.0, "precipitation": 1.2}}"#;
        let response: ForecastResponse = serde_json::from_str(json).unwrap();
        let conditions = response.current.into_conditions();
        assert!((conditions.wind_speed_ms - 10.0).abs() < 1e-9);
        assert_eq!(conditions.temperature_c, 4.5);
    }

    #[test]
    fn ocm_poi_maps_connectors_and_cost() {
        let json = r#"[{
            "ID": 42,
            "AddressInfo": {"Title": "Bolu Dağı", "Latitude": 40.73, "Longitude": 31.6},
            "OperatorInfo": {"Title": "ZES"},
            "UsageCost": "8,99 TL/kWh",
            "Connections": [
                {"ConnectionTypeID": 33, "PowerKW": 120.0, "CurrentTypeID": 30},
                {"ConnectionTypeID": 25, "PowerKW": 22.0, "CurrentTypeID": 20},
                {"ConnectionTypeID": 9999, "PowerKW": 7.0}
            ]
        }]"#;
        let pois: Vec<OcmPoi> = serde_json::from_str(json).unwrap();
        let record = pois.into_iter().next().and_then(OcmPoi::into_record).unwrap();
        assert_eq!(record.id, "ocm-42");
        assert_eq!(record.operator.as_deref(), Some("ZES"));
        assert_eq!(record.connectors.len(), 3);
        assert_eq!(record.connectors[0].current, Some(CurrentType::Dc));
        assert_eq!(record.price_per_kwh, Some(8.99));
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = HttpProviderConfig::default()
            .with_open_charge_map("https://example.invalid", Some("secret".into()));
        assert!(!format!("{config:?}").contains("secret"));
    }
}
