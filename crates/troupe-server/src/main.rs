//! Troupe registry server
//!
//! Binds the configured endpoint and serves the actor directory until
//! SIGINT/SIGTERM. Exits 0 on clean shutdown, nonzero on bind failure.

use std::sync::atomic::Ordering;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use troupe_core::config::RegistryConfig;
use troupe_registry::RegistryServer;

/// Troupe registry server CLI
#[derive(Parser, Debug)]
#[command(name = "troupe-server")]
#[command(about = "Central actor registry with heartbeat-based liveness")]
#[command(version)]
struct Cli {
    /// Configuration file path (registry.json)
    #[arg(short, long)]
    config: Option<String>,

    /// Endpoint to bind, overriding the configuration
    #[arg(short, long)]
    bind: Option<String>,

    /// Enable verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => RegistryConfig::load(path).context("loading configuration")?,
        None => RegistryConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.registry_endpoint = bind;
    }
    config.validate().context("validating configuration")?;

    info!(endpoint = %config.registry_endpoint, "starting registry");

    let server = RegistryServer::new(config);
    let shutdown = server.shutdown_flag();
    ctrlc::set_handler(move || {
        info!("shutdown signal received");
        shutdown.store(false, Ordering::Release);
    })
    .context("installing signal handler")?;

    server.run().context("registry server")?;
    info!("registry stopped");
    Ok(())
}
