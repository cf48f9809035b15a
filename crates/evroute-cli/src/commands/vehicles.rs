//! `vehicles`: list the catalog.

use anyhow::Result;

use evroute_lib::VehicleCatalog;

use crate::output::{render_vehicles, to_json, OutputFormat};

pub fn handle_vehicles(catalog: &VehicleCatalog, format: OutputFormat) -> Result<()> {
    let vehicles = catalog.vehicles_sorted();
    match format {
        OutputFormat::Text => print!("{}", render_vehicles(&vehicles)),
        OutputFormat::Json => println!("{}", to_json(&vehicles)?),
    }
    Ok(())
}
