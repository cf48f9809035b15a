//! Application state shared by the axum handlers.

use std::path::PathBuf;
use std::sync::Arc;

use evroute_lib::providers::HttpProviderConfig;
use evroute_lib::{
    Error as LibError, PlanSession, PlannerConfig, Providers, TripFixture, VehicleCatalog,
};

/// Error during application state initialization.
#[derive(Debug)]
pub enum AppStateError {
    /// `EVROUTE_*` planner settings did not validate.
    Config(LibError),

    /// The vehicle catalog could not be loaded.
    CatalogLoad(LibError),

    /// Collaborators could not be constructed.
    Providers(LibError),

    /// A configured file does not exist.
    FileNotFound(String),
}

impl std::fmt::Display for AppStateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(e) => write!(f, "invalid planner configuration: {}", e),
            Self::CatalogLoad(e) => write!(f, "failed to load vehicle catalog: {}", e),
            Self::Providers(e) => write!(f, "failed to set up data providers: {}", e),
            Self::FileNotFound(path) => write!(f, "file not found: {}", path),
        }
    }
}

impl std::error::Error for AppStateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) | Self::CatalogLoad(e) | Self::Providers(e) => Some(e),
            Self::FileNotFound(_) => None,
        }
    }
}

/// Shared state for all handlers: one [`PlanSession`] for the process, so
/// every request shares the catalog and the elevation tile cache.
///
/// Cheap to clone; share it through axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<PlanSession>,
}

impl AppState {
    pub fn new(session: PlanSession) -> Self {
        Self {
            inner: Arc::new(session),
        }
    }

    /// Build state from the environment.
    ///
    /// - `EVROUTE_VEHICLES`: vehicle CSV (bundled catalog when unset)
    /// - `EVROUTE_TRIP_FIXTURE`: serve every collaborator from a recorded trip
    /// - `OSRM_URL`, `OPEN_METEO_URL`, `OPEN_CHARGE_MAP_URL`,
    ///   `OPEN_CHARGE_MAP_KEY`: live collaborators otherwise
    /// - `EVROUTE_*` planner settings, see [`PlannerConfig::from_env`]
    pub fn from_env() -> Result<Self, AppStateError> {
        let var = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());

        let config = PlannerConfig::from_env().map_err(AppStateError::Config)?;

        let catalog = match var("EVROUTE_VEHICLES").map(PathBuf::from) {
            Some(path) => {
                if !path.exists() {
                    return Err(AppStateError::FileNotFound(path.display().to_string()));
                }
                tracing::info!(path = %path.display(), "loading vehicle catalog");
                VehicleCatalog::from_path(&path)
            }
            None => VehicleCatalog::bundled(),
        }
        .map_err(AppStateError::CatalogLoad)?;

        let providers = match var("EVROUTE_TRIP_FIXTURE").map(PathBuf::from) {
            Some(path) => {
                tracing::info!(path = %path.display(), "serving collaborators from trip fixture");
                let fixture = TripFixture::from_path(&path).map_err(AppStateError::Providers)?;
                Providers::from_fixture(fixture)
            }
            None => Providers::http(HttpProviderConfig::from_env())
                .map_err(AppStateError::Providers)?,
        };

        tracing::info!(
            vehicles = catalog.len(),
            strategy = %config.strategy,
            "planning session ready"
        );
        Ok(Self::new(PlanSession::new(
            config,
            Arc::new(catalog),
            providers,
        )))
    }

    pub fn session(&self) -> &PlanSession {
        &self.inner
    }

    pub fn catalog(&self) -> &VehicleCatalog {
        self.inner.catalog()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("vehicle_count", &self.catalog().len())
            .field("cached_tiles", &self.inner.cache().stats().entries)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_state;

    #[test]
    fn test_app_state_clone_shares_session() {
        let state1 = test_state();
        let state2 = state1.clone();
        assert!(std::ptr::eq(state1.session(), state2.session()));
        assert_eq!(state1.catalog().len(), 3);
    }

    #[test]
    fn test_app_state_debug() {
        let debug = format!("{:?}", test_state());
        assert!(debug.contains("AppState"));
        assert!(debug.contains("vehicle_count"));
        assert!(debug.contains("cached_tiles"));
    }

    #[test]
    fn test_app_state_error_display() {
        let err = AppStateError::FileNotFound("/path/to/vehicles.csv".to_string());
        assert!(err.to_string().contains("/path/to/vehicles.csv"));
        assert!(err.to_string().contains("not found"));

        let err = AppStateError::Config(LibError::InvalidConfig {
            message: "reserve_soc_percent out of range".to_string(),
        });
        assert!(std::error::Error::source(&err).is_some());
    }
}
