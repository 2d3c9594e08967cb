//! Main entry point for the streetview-survey CLI

use clap::Parser;
use streetview_survey::cli::{Cli, Commands};
use streetview_survey::fetcher::streetview_config::load_dotenv;
use streetview_survey::metrics;
use streetview_survey::shutdown::ShutdownCoordinator;
use tracing::{debug, error, warn};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing() {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("streetview_survey=info"));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() {
    // Before tracing and argument parsing, so `.env` can supply RUST_LOG and the API key
    let dotenv = load_dotenv();
    init_tracing();
    match dotenv {
        Ok(Some(path)) => debug!("Loaded environment from {}", path.display()),
        Ok(None) => {}
        Err(e) => warn!("Ignoring environment file: {e}"),
    }

    let cli = Cli::parse();

    if let Some(addr) = cli.metrics_addr {
        if let Err(e) = metrics::init_metrics(addr).await {
            error!("Failed to start metrics exporter: {}", e);
            eprintln!("Error: failed to start metrics exporter: {e}");
            std::process::exit(1);
        }
    }

    // First Ctrl+C stops the survey before its next request; a second one exits now
    let shutdown = ShutdownCoordinator::shared();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if shutdown.request_shutdown() {
                    warn!("Ctrl+C received - finishing current request...");
                } else {
                    warn!("Second Ctrl+C received - exiting immediately");
                    std::process::exit(130);
                }
            }
        }
    });

    let result = match cli.command {
        Commands::Survey(ref args) => args
            .execute(&cli, shutdown.clone())
            .await
            .map_err(|e| anyhow::anyhow!(e)),
        Commands::Grid(ref args) => args
            .execute(cli.output_format)
            .map_err(|e| anyhow::anyhow!(e)),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
