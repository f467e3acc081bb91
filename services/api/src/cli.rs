use crate::server;
use clap::{Args, Parser, Subcommand};
use pa_intake::config::AppConfig;
use pa_intake::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "PA Intake",
    about = "Run the prior-authorization intake service",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Print the resolved configuration with secrets redacted
    Config,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Config => {
            let config = AppConfig::load()?;
            println!("{config:#?}");
            Ok(())
        }
    }
}
