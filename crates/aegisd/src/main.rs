//! aegisd — the Aegis dashboard daemon.
//!
//! Single binary that assembles the dashboard:
//! - Metrics poller (scrapes Core B on a fixed cadence)
//! - Monitor panel + REST API
//! - Deployment bundle generator
//!
//! # Usage
//!
//! ```text
//! aegisd serve --port 3000 --endpoint http://localhost:8001/metrics
//! aegisd scrape --endpoint http://localhost:8001/metrics
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use aegis_metrics::{Fetcher, HttpFetcher, MonitorConfig, Poller, aggregate, parse};
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(name = "aegisd", about = "Aegis dashboard daemon")]
struct Cli {
    /// Path to aegis.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the dashboard and poll Core B metrics.
    Serve {
        /// Port to listen on.
        #[arg(long, default_value = "3000")]
        port: u16,

        /// Core B metrics endpoint (overrides the config file).
        #[arg(long)]
        endpoint: Option<String>,

        /// Poll interval in seconds (overrides the config file).
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Scrape once and print the derived state as JSON.
    Scrape {
        /// Core B metrics endpoint (overrides the config file).
        #[arg(long)]
        endpoint: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new("info,aegisd=debug,aegis_metrics=debug")
                }),
        )
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => MonitorConfig::from_file(path)?,
        None => MonitorConfig::default(),
    };

    match cli.command {
        Command::Serve {
            port,
            endpoint,
            interval,
        } => {
            if let Some(endpoint) = endpoint {
                config.endpoint = endpoint;
            }
            if let Some(interval) = interval {
                anyhow::ensure!(interval > 0, "--interval must be at least 1");
                config.interval_secs = interval;
            }
            run_serve(port, config).await
        }
        Command::Scrape { endpoint } => {
            if let Some(endpoint) = endpoint {
                config.endpoint = endpoint;
            }
            run_scrape(config).await
        }
    }
}

async fn run_serve(port: u16, config: MonitorConfig) -> anyhow::Result<()> {
    info!("Aegis dashboard starting");

    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new());
    let poller = Poller::new(fetcher.clone(), config.families.clone());
    poller.start(config.endpoint.clone(), config.interval())?;
    info!(endpoint = %config.endpoint, interval = config.interval_secs, "metrics poller initialized");

    let router = aegis_dashboard::build_router(poller.clone(), fetcher);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(%addr, "dashboard server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("shutdown signal received");
        })
        .await?;

    poller.stop();
    info!("Aegis dashboard stopped");
    Ok(())
}

async fn run_scrape(config: MonitorConfig) -> anyhow::Result<()> {
    let fetcher = HttpFetcher::new();
    let body = tokio::time::timeout(Duration::from_secs(30), fetcher.fetch(&config.endpoint))
        .await
        .map_err(|_| anyhow::anyhow!("scrape of {} timed out", config.endpoint))??;

    let samples = parse(&body, &config.families.prefixes());
    let state = aggregate(&samples, &config.families);
    info!(endpoint = %config.endpoint, samples = samples.len(), "scrape complete");

    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}
