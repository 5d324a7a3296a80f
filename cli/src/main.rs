// Copyright (c) 2026 Props Contributors
// SPDX-License-Identifier: AGPL-3.0

//! # Registry Proxy CLI
//!
//! The `registry-proxy` binary runs the access-controlled front for the
//! shared OCI registry and manages its configuration and audit schema.
//!
//! ## Commands
//!
//! - `registry-proxy serve` - Run the proxy until Ctrl+C/SIGTERM
//! - `registry-proxy config show|validate|generate` - Configuration management
//! - `registry-proxy migrate [--dry-run]` - Apply audit table migrations

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod server;

use commands::{ConfigCommand, MigrateCommand};
use registry_proxy_core::domain::proxy_config::ProxyConfigManifest;

/// Registry Proxy - ACL and audit front for the shared image registry
#[derive(Parser)]
#[command(name = "registry-proxy")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "REGISTRY_PROXY_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); defaults to the configured level
    #[arg(long, global = true, env = "REGISTRY_PROXY_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the registry proxy
    #[command(name = "serve")]
    Serve {
        /// Listen port (overrides spec.server.port)
        #[arg(long, env = "REGISTRY_PROXY_PORT")]
        port: Option<u16>,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Apply database migrations for the audit table
    #[command(name = "migrate")]
    Migrate {
        #[command(flatten)]
        command: MigrateCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port } => {
            let mut config = ProxyConfigManifest::load_or_default(cli.config)
                .context("Failed to load configuration")?;
            if let Some(port) = port {
                config.spec.server.port = port;
            }
            let logging = &config.spec.observability.logging;
            init_logging(cli.log_level.as_deref().unwrap_or(&logging.level), &logging.format)?;
            server::run(config).await
        }
        Commands::Config { command } => {
            init_logging(cli.log_level.as_deref().unwrap_or("warn"), "text")?;
            commands::config::handle_command(command, cli.config).await
        }
        Commands::Migrate { command } => {
            init_logging(cli.log_level.as_deref().unwrap_or("info"), "text")?;
            commands::migrate::execute(command, cli.config).await
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        "json" => builder.json().with_current_span(true).init(),
        _ => builder.with_target(false).compact().init(),
    }

    Ok(())
}
