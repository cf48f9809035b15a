use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use evroute_cli::commands::charge_time::{handle_charge_time, ChargeTimeArgs};
use evroute_cli::commands::compare::handle_compare;
use evroute_cli::commands::load_catalog;
use evroute_cli::commands::plan::{handle_plan, TripArgs};
use evroute_cli::commands::vehicles::handle_vehicles;
use evroute_cli::output::OutputFormat;

/// Exit status for a plan that cannot reach its destination.
const EXIT_INFEASIBLE: u8 = 2;

#[derive(Parser, Debug)]
#[command(author, version, about = "EV trip energy estimates and charging-stop planning")]
struct Cli {
    /// Vehicle catalog CSV. Defaults to the bundled catalog.
    #[arg(long, global = true, env = "EVROUTE_VEHICLES")]
    vehicles: Option<PathBuf>,

    /// Output format.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Plan charging stops for a trip. Exits with status 2 when the trip is infeasible.
    Plan(TripArgs),
    /// Plan a trip once per strategy and compare the results.
    Compare(TripArgs),
    /// List the vehicles in the catalog.
    Vehicles,
    /// Time a single charging session on a vehicle's charging curve.
    ChargeTime(ChargeTimeArgs),
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();
    let catalog = load_catalog(cli.vehicles.as_deref())?;

    match cli.command {
        Command::Plan(args) => {
            let feasible = handle_plan(catalog, &args, cli.format).await?;
            if !feasible {
                return Ok(ExitCode::from(EXIT_INFEASIBLE));
            }
        }
        Command::Compare(args) => handle_compare(catalog, &args, cli.format).await?,
        Command::Vehicles => handle_vehicles(&catalog, cli.format)?,
        Command::ChargeTime(args) => handle_charge_time(&catalog, &args, cli.format)?,
    }
    Ok(ExitCode::SUCCESS)
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
