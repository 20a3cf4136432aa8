//! Maceo command-line interface

use anyhow::Result;
use clap::Parser;
use maceo_core::{AppState, RuntimeConfig, ServerConfig, ANALYZE_UPSTREAM, ANONYMIZE_UPSTREAM};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[arg(long, default_value = "0.0.0.0:8080", help = "Address to listen on")]
    pub listen: SocketAddr,

    #[arg(long, default_value = maceo_core::DEFAULT_CONFIG_PATH, help = "Path to the optional configuration file, read on every request")]
    pub config: PathBuf,

    #[arg(long, default_value = maceo_core::DEFAULT_VERSION_FILE, help = "Path to the version.json used for response headers")]
    pub version_file: PathBuf,

    #[arg(long, help = "Built-in base URL of the analyze upstream")]
    pub analyze_url: Option<String>,

    #[arg(long, help = "Built-in base URL of the anonymize upstream")]
    pub anonymize_url: Option<String>,

    #[arg(
        long,
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Time budget for one request in seconds, shared by both upstream calls"
    )]
    pub request_timeout_secs: u64,

    #[arg(long, default_value = "info", help = "Log level (error, warn, info, debug, trace)")]
    pub log_level: String,
}

impl Args {
    pub fn server_config(&self) -> ServerConfig {
        let mut defaults = RuntimeConfig::default();
        if let Some(ref url) = self.analyze_url {
            defaults = defaults.with_upstream(ANALYZE_UPSTREAM, url.clone());
        }
        if let Some(ref url) = self.anonymize_url {
            defaults = defaults.with_upstream(ANONYMIZE_UPSTREAM, url.clone());
        }

        ServerConfig {
            config_path: self.config.clone(),
            defaults,
            version_file: self.version_file.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = args.log_level.parse::<tracing::Level>()
        .unwrap_or_else(|_| {
            eprintln!("Invalid log level '{}', defaulting to 'info'", args.log_level);
            tracing::Level::INFO
        });

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting maceo");
    let server_config = args.server_config();
    info!("Configuration file: {}", server_config.config_path.display());
    info!("Version file: {}", server_config.version_file.display());
    info!("Request timeout: {:?}", server_config.request_timeout);
    for (name, url) in &server_config.defaults.upstreams {
        info!("Default upstream '{}': {}", name, url);
    }

    match tokio::fs::metadata(&server_config.config_path).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("No configuration file found, built-in defaults will be used until one appears");
        }
        Err(e) => warn!(
            "Cannot access configuration file {}: {}; requests will fail until it is readable",
            server_config.config_path.display(),
            e
        ),
    }

    let state = AppState::new(server_config)?;
    let app = maceo_core::router(state);

    let listener = tokio::net::TcpListener::bind(args.listen).await
        .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", args.listen, e))?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("maceo shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
