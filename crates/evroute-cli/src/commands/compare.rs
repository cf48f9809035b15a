//! `compare`: plan the same trip under every strategy.

use std::sync::Arc;

use anyhow::{Context, Result};

use evroute_lib::VehicleCatalog;

use crate::commands::plan::TripArgs;
use crate::output::{render_comparison, to_json, OutputFormat};
use crate::terminal::ColorPalette;

pub async fn handle_compare(
    catalog: Arc<VehicleCatalog>,
    args: &TripArgs,
    format: OutputFormat,
) -> Result<()> {
    let (session, request) = args.prepare(catalog)?;
    let plans = session
        .compare(&request)
        .await
        .context("planning failed")?;

    match format {
        OutputFormat::Text => print!("{}", render_comparison(&plans, &ColorPalette::detect())),
        OutputFormat::Json => println!("{}", to_json(&plans)?),
    }
    Ok(())
}
