//! Handlers for the `evroute` subcommands.
//!
//! `main.rs` parses arguments and dispatches here; each module owns one
//! subcommand.

pub mod charge_time;
pub mod compare;
pub mod plan;
pub mod vehicles;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use evroute_lib::VehicleCatalog;

/// Load the vehicle catalog from `path`, or the bundled one when absent.
pub fn load_catalog(path: Option<&Path>) -> Result<Arc<VehicleCatalog>> {
    let catalog = match path {
        Some(path) => VehicleCatalog::from_path(path)
            .with_context(|| format!("failed to load vehicle catalog from {}", path.display()))?,
        None => VehicleCatalog::bundled().context("bundled vehicle catalog is invalid")?,
    };
    Ok(Arc::new(catalog))
}
