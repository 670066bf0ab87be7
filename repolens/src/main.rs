mod config;
mod telemetry;

use clap::{Args, Parser, Subcommand};
use repo_aggregator::upstream::Credential;
use std::path::PathBuf;
use std::process;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(version, about = "Serves public repositories enriched with their languages")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Start the repositories API
    Run(RunArgs),
    /// Parse and validate a config file, then exit
    CheckConfig(ConfigArgs),
}

#[derive(Args)]
struct ConfigArgs {
    #[arg(long)]
    config_path: PathBuf,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    config: ConfigArgs,
    /// API token for the upstream
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error("no upstream token given, pass --token or set GITHUB_TOKEN")]
    MissingToken,
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Telemetry(#[from] telemetry::TelemetryError),
    #[error("could not start runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error(transparent)]
    Aggregator(#[from] repo_aggregator::errors::AggregatorError),
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        CliCommand::Run(args) => run(args),
        CliCommand::CheckConfig(args) => config::Config::from_file(&args.config_path)
            .map(|_| println!("{} is valid", args.config_path.display()))
            .map_err(CliError::from),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn credential(token: Option<String>) -> Result<Credential, CliError> {
    match token {
        Some(token) if !token.trim().is_empty() => Ok(Credential::new(token)),
        _ => Err(CliError::MissingToken),
    }
}

fn run(args: RunArgs) -> Result<(), CliError> {
    let credential = credential(args.token)?;
    let config = config::Config::from_file(&args.config.config_path)?;
    let _telemetry = telemetry::init(&config.common)?;

    let shutdown = CancellationToken::new();

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    rt.block_on(async {
        let signal_shutdown = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Received interrupt, shutting down");
                    signal_shutdown.cancel();
                }
                Err(e) => tracing::error!("Unable to listen for interrupt: {e}"),
            }
        });

        tracing::info!("Starting repolens");
        repo_aggregator::run(config.aggregator, credential, shutdown).await
    })?;

    Ok(())
}
