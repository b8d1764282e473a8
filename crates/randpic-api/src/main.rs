//! # randpic: Binary Entry Point
//!
//! Starts the Axum HTTP server. Configuration comes from an optional YAML
//! file, overridden by flags and their environment fallbacks.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use randpic_core::config::{ConfigFile, ServiceConfig};

/// Random image server with token re-fetch and access statistics.
#[derive(Parser, Debug)]
#[command(name = "randpic", version, about)]
struct Cli {
    /// YAML configuration file.
    #[arg(long, env = "RANDPIC_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,

    /// Address to bind.
    #[arg(long, env = "RANDPIC_BIND", default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Base directory holding one subdirectory per library.
    #[arg(long, env = "RANDPIC_IMAGE_DIR")]
    image_dir: Option<PathBuf>,

    /// Statistics file.
    #[arg(long, env = "RANDPIC_STATS_FILE")]
    stats_file: Option<PathBuf>,

    /// Token secret.
    #[arg(long, env = "RANDPIC_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

impl Cli {
    fn overrides(&self) -> ConfigFile {
        ConfigFile {
            image_base_dir: self.image_dir.clone(),
            stats_file: self.stats_file.clone(),
            secret: self.secret.clone(),
            libraries: None,
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<ServiceConfig> {
    let file = match &cli.config {
        Some(path) => ConfigFile::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ConfigFile::default(),
    };
    let config = ServiceConfig::from_file(file.merge(cli.overrides()))
        .context("invalid configuration")?;
    Ok(config)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
    }
    tracing::info!("shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = load_config(&cli)?;
    if config.ephemeral_key {
        tracing::warn!(
            "no secret configured; generated a per-process key, tokens will not survive a restart"
        );
    }
    tracing::info!(
        image_dir = %config.image_base_dir.display(),
        stats_file = %config.stats_file.display(),
        libraries = config.libraries.len(),
        "configuration loaded"
    );

    let app = randpic_api::app(randpic_api::AppState::new(config));

    let addr = SocketAddr::new(cli.bind, cli.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!("randpic listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}
