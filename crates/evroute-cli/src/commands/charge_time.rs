//! `charge-time`: how long one charging session takes.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use evroute_lib::vehicle::{ChargeLimits, ChargeSession};
use evroute_lib::{Soc, VehicleCatalog};

use crate::output::{render_charge_session, to_json, OutputFormat};

#[derive(Args, Debug, Clone)]
pub struct ChargeTimeArgs {
    /// Vehicle id from the catalog.
    #[arg(long)]
    pub vehicle: String,
    /// Starting state of charge, percent.
    #[arg(long = "from")]
    pub from: f64,
    /// Target state of charge, percent.
    #[arg(long = "to")]
    pub to: f64,
    /// Charger power, kW. Defaults to the vehicle's DC limit.
    #[arg(long)]
    pub power: Option<f64>,
    /// Ambient temperature, °C.
    #[arg(long, default_value_t = 20.0, allow_hyphen_values = true)]
    pub ambient: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChargeTimeReport<'a> {
    vehicle_id: &'a str,
    from_soc_percent: Soc,
    to_soc_percent: Soc,
    charger_power_kw: f64,
    ambient_c: f64,
    #[serde(flatten)]
    session: ChargeSession,
}

pub fn handle_charge_time(
    catalog: &VehicleCatalog,
    args: &ChargeTimeArgs,
    format: OutputFormat,
) -> Result<()> {
    let vehicle = catalog.resolve(&args.vehicle)?;
    let from = Soc::checked("from", args.from)?;
    let to = Soc::checked("to", args.to)?;
    let power = args.power.unwrap_or(vehicle.max_dc_kw);
    if !(power.is_finite() && power > 0.0) {
        anyhow::bail!("charger power must be a positive number of kW, got {power}");
    }

    let limits = ChargeLimits::new(power.min(vehicle.max_dc_kw), args.ambient);
    let session = vehicle.charging_curve.charge_session(
        vehicle.usable_kwh(),
        from.percent(),
        to.percent(),
        limits,
    );

    match format {
        OutputFormat::Text => print!(
            "{}",
            render_charge_session(vehicle, from.percent(), to.percent(), &session)
        ),
        OutputFormat::Json => {
            let report = ChargeTimeReport {
                vehicle_id: &vehicle.id,
                from_soc_percent: from,
                to_soc_percent: to,
                charger_power_kw: power,
                ambient_c: args.ambient,
                session,
            };
            println!("{}", to_json(&report).context("failed to encode report")?);
        }
    }
    Ok(())
}
