// Copyright (c) 2026 Props Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Database Migrate Command
//!
//! Applies the `registry_push_audit` schema to the configured identity store
//! database.
//!
//! # Usage
//!
//! ```bash
//! # Apply all pending migrations
//! registry-proxy migrate
//!
//! # Preview migrations without applying
//! registry-proxy migrate --dry-run
//! ```
//!
//! Connection settings come from `spec.identity_store` (or `PG*` overrides).

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use registry_proxy_core::domain::proxy_config::ProxyConfigManifest;
use registry_proxy_core::infrastructure::db::Database;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

#[derive(Args)]
pub struct MigrateCommand {
    /// Perform a dry run without applying changes
    #[arg(long)]
    dry_run: bool,
}

pub async fn execute(cmd: MigrateCommand, config_path: Option<PathBuf>) -> Result<()> {
    println!("{}", "Registry Proxy Migrate".bold().green());

    let config = ProxyConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;
    let store = &config.spec.identity_store;

    println!("Connecting to {}:{}/{}...", store.host, store.port, store.database);
    let database = Database::connect(store)
        .await
        .context("Failed to connect to database")?;
    let pool = database.get_pool();

    // The tracking table does not exist before the first run.
    let applied_count = sqlx::query("SELECT version FROM _sqlx_migrations WHERE success")
        .fetch_all(pool)
        .await
        .map(|rows| rows.len())
        .unwrap_or(0);

    let total_migrations = MIGRATOR.iter().count();

    println!("Migration status: {} applied, {} total available.", applied_count, total_migrations);

    if applied_count < total_migrations {
        if cmd.dry_run {
            println!("Pending migrations found (Dry Run):");
            for migration in MIGRATOR.iter().skip(applied_count) {
                println!(" - {} {}", migration.version, migration.description);
            }
            println!("Skipping application due to --dry-run");
            return Ok(());
        }

        println!("Applying pending migrations...");
        MIGRATOR.run(pool).await.context("Failed to apply migrations")?;
        println!("{}", "✓ Database updated successfully.".green());
    } else {
        println!("{}", "✓ Database is up to date.".green());
    }

    Ok(())
}
