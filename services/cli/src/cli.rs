use crate::compute::{run_compute, run_summary, ComputeArgs, SummaryArgs};
use clap::{Parser, Subcommand};
use leasing_kpi::config::AppConfig;
use leasing_kpi::error::AppError;
use leasing_kpi::telemetry;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(
    name = "leasing-kpi-cli",
    about = "Compute occupancy, leasing and availability KPIs from property-management extracts",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute the dashboard payload and print it as JSON
    Compute(ComputeArgs),
    /// Load the datasets and report which keys and how many rows were found
    Summary(SummaryArgs),
}

pub(crate) fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    debug!(environment = ?config.environment, "configuration loaded");

    match cli.command {
        Command::Compute(args) => run_compute(args, &config),
        Command::Summary(args) => run_summary(args, &config),
    }
}
