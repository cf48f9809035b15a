//! Output formatting for plans, comparisons and the vehicle catalog.
//!
//! Text renderers return a `String` so they can be tested without capturing
//! stdout; JSON output goes through `serde_json` unchanged.

use std::fmt::Write;

use clap::ValueEnum;
use serde::Serialize;

use evroute_lib::vehicle::ChargeSession;
use evroute_lib::{RoutePlan, VehicleProfile};

use crate::terminal::{format_minutes, ColorPalette};

/// How command results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// Serialize `value` as pretty JSON.
pub fn to_json<T: Serialize>(value: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Render a plan as a stop-by-stop itinerary.
pub fn render_plan(plan: &RoutePlan, palette: &ColorPalette) -> String {
    let p = palette;
    let mut out = String::new();

    if plan.feasible {
        let _ = writeln!(
            out,
            "{}Trip plan{} for {} ({} strategy)",
            p.green, p.reset, plan.vehicle_id, plan.strategy
        );
    } else {
        let _ = writeln!(
            out,
            "{}Trip not feasible{} for {} ({} strategy)",
            p.red, p.reset, plan.vehicle_id, plan.strategy
        );
    }
    let _ = writeln!(
        out,
        "  Distance: {:.1} km  Driving: {}  Charging: {}",
        plan.total_distance_km,
        format_minutes(plan.total_drive_time_min),
        format_minutes(plan.total_charge_time_min)
    );
    let _ = writeln!(
        out,
        "  Energy: {:.1} kWh  Charging cost: {:.2}",
        plan.total_energy_kwh, plan.charging_cost
    );

    if let Some(infeasible) = &plan.infeasibility {
        let _ = writeln!(
            out,
            "  Furthest reachable: {:.1} km ({})",
            infeasible.furthest_reachable_km, infeasible.reason
        );
    }

    if plan.stops.is_empty() && plan.feasible {
        let _ = writeln!(out, "  No charging stops needed.");
    }
    for (i, stop) in plan.stops.iter().enumerate() {
        let _ = writeln!(
            out,
            "  {}. {}{}{} at {:.1} km (+{:.1} km)",
            i + 1,
            p.white_bold,
            stop.station_name,
            p.reset,
            stop.position_km,
            stop.distance_from_previous_km
        );
        let _ = writeln!(
            out,
            "     {}{} → {}{}  {}  {:.1} kWh @ {:.0} kW avg  cost {:.2}",
            p.cyan,
            stop.arrival_soc_percent,
            stop.departure_soc_percent,
            p.reset,
            format_minutes(stop.charge_time_min),
            stop.energy_added_kwh,
            stop.average_power_kw,
            stop.cost
        );
        for warning in &stop.warnings {
            let _ = writeln!(out, "     {}! {}{}", p.yellow, warning, p.reset);
        }
    }

    if let Some(arrival) = plan.arrival_soc_percent {
        let _ = writeln!(out, "  Arrival SoC: {}{}{}", p.cyan, arrival, p.reset);
    }
    if !plan.warnings.is_empty() {
        let _ = writeln!(out, "{}Warnings:{}", p.yellow, p.reset);
        for warning in &plan.warnings {
            let _ = writeln!(out, "  - {warning}");
        }
    }
    out
}

/// Render one row per strategy.
pub fn render_comparison(plans: &[RoutePlan], palette: &ColorPalette) -> String {
    let p = palette;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}{:<14} {:>8} {:>6} {:>14} {:>14} {:>10}{}",
        p.white_bold, "Strategy", "Feasible", "Stops", "Total time", "Charging", "Cost", p.reset
    );
    for plan in plans {
        let _ = writeln!(
            out,
            "{:<14} {:>8} {:>6} {:>14} {:>14} {:>10.2}",
            plan.strategy.as_str(),
            if plan.feasible { "yes" } else { "no" },
            plan.stop_count(),
            format_minutes(plan.total_time_min()),
            format_minutes(plan.total_charge_time_min),
            plan.charging_cost
        );
    }
    out
}

/// Render the vehicle catalog as a table.
pub fn render_vehicles(vehicles: &[&VehicleProfile]) -> String {
    let mut out = String::new();
    if vehicles.is_empty() {
        let _ = writeln!(out, "No vehicles available in catalog.");
        return out;
    }
    let _ = writeln!(out, "Available vehicles ({}):", vehicles.len());
    let _ = writeln!(
        out,
        "{:<22} {:<28} {:>8} {:>8} {:>8}  {}",
        "Id", "Name", "Usable", "DC kW", "AC kW", "Connectors"
    );
    for vehicle in vehicles {
        let connectors: Vec<String> = vehicle.connectors.iter().map(ToString::to_string).collect();
        let _ = writeln!(
            out,
            "{:<22} {:<28} {:>8.1} {:>8.0} {:>8.1}  {}",
            vehicle.id,
            vehicle.display_name(),
            vehicle.usable_kwh(),
            vehicle.max_dc_kw,
            vehicle.max_ac_kw,
            connectors.join(", ")
        );
    }
    out
}

/// Render a single charging session.
pub fn render_charge_session(
    vehicle: &VehicleProfile,
    from: f64,
    to: f64,
    session: &ChargeSession,
) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}: {from:.0}% → {to:.0}% takes {}",
        vehicle.display_name(),
        format_minutes(session.minutes)
    );
    let _ = writeln!(
        out,
        "  {:.1} kWh added, {:.0} kW average, {:.0} kW peak",
        session.energy_kwh, session.average_power_kw, session.peak_power_kw
    );
    out
}
