// Copyright (c) 2026 Props Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use registry_proxy_core::domain::proxy_config::ProxyConfigManifest;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./registry-proxy.yaml)
        #[arg(short, long, default_value = "./registry-proxy.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = ProxyConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        match &config_override {
            Some(path) => println!("  1. --config flag: {}", path.display()),
            None => println!("  1. --config flag: {}", "(not set)".dimmed()),
        }
        println!(
            "  2. REGISTRY_PROXY_CONFIG_PATH: {}",
            std::env::var("REGISTRY_PROXY_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./registry-proxy.yaml");
        println!("  4. ~/.registry-proxy/config.yaml");
        println!("  5. /etc/registry-proxy/config.yaml");
        println!();
    }

    let spec = &config.spec;
    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Server:".bold());
    println!("  Listen: {}:{}", spec.server.bind_address, spec.server.port);
    println!();

    println!("{}", "Upstream registry:".bold());
    println!("  URL: {}", spec.upstream.url);
    println!(
        "  Timeouts: {}s response, {}s connect, {}s read, {}s inspect",
        spec.upstream.timeout_seconds,
        spec.upstream.connect_timeout_seconds,
        spec.upstream.read_timeout_seconds,
        spec.upstream.inspect_timeout_seconds
    );
    println!("  Max manifest: {} bytes", spec.upstream.max_manifest_bytes);
    println!();

    println!("{}", "Identity store:".bold());
    println!(
        "  postgres://{}@{}:{}/{}",
        spec.identity_store.username,
        spec.identity_store.host,
        spec.identity_store.port,
        spec.identity_store.database
    );
    println!(
        "  Password: {}",
        if spec.identity_store.password.is_some() { "(set)" } else { "(none)" }
    );
    println!();

    println!("{}", "Auth:".bold());
    println!("  Admin username: {}", spec.auth.admin_username);
    println!("  Agent username prefix: {}", spec.auth.agent_username_prefix);
    println!("  Realm: {}", spec.auth.realm);
    println!();

    println!("{}", "Observability:".bold());
    println!(
        "  Logging: {} ({})",
        spec.observability.logging.level, spec.observability.logging.format
    );
    if spec.observability.metrics.enabled {
        println!("  Metrics: enabled on port {}", spec.observability.metrics.port);
    } else {
        println!("  Metrics: {}", "disabled".dimmed());
    }
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = ProxyConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config.validate().context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        include_str!("../../templates/config-with-examples.yaml").to_string()
    } else {
        ProxyConfigManifest::default()
            .to_yaml_string()
            .context("Failed to render default configuration")?
    };

    std::fs::write(&output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!("{}", format!("✓ Configuration generated: {}", output.display()).green());

    Ok(())
}
