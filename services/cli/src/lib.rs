mod cli;
mod compute;
mod infra;

use leasing_kpi::error::AppError;

pub fn run() -> Result<(), AppError> {
    cli::run()
}
