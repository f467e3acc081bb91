mod cli;
mod infra;
mod routes;
mod server;

use pa_intake::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
