// Copyright (c) 2026 Props Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Connection Pool
//!
//! Wraps `sqlx::postgres::PgPool` in a thin `Database` newtype shared by the
//! identity store and the audit repository. The base connect options are kept
//! so per-request credential checks can reuse host, port and database.

use anyhow::Result;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};

use crate::domain::proxy_config::IdentityStoreConfig;

pub const APPLICATION_NAME: &str = "registry-proxy";

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
    options: PgConnectOptions,
}

impl Database {
    /// Connect the service-account pool eagerly.
    pub async fn connect(config: &IdentityStoreConfig) -> Result<Self> {
        let options = Self::connect_options(config)?;
        let pool = Self::pool_options(config).connect_with(options.clone()).await?;
        Ok(Self { pool, options })
    }

    /// Build the pool without connecting; connections open on first use.
    pub fn connect_lazy(config: &IdentityStoreConfig) -> Result<Self> {
        let options = Self::connect_options(config)?;
        let pool = Self::pool_options(config).connect_lazy_with(options.clone());
        Ok(Self { pool, options })
    }

    pub fn get_pool(&self) -> &PgPool {
        &self.pool
    }

    /// Service-account connect options.
    pub fn options(&self) -> &PgConnectOptions {
        &self.options
    }

    fn connect_options(config: &IdentityStoreConfig) -> Result<PgConnectOptions> {
        let mut options = PgConnectOptions::new_without_pgpass()
            .host(&config.host)
            .port(config.port)
            .database(&config.database)
            .username(&config.username)
            .application_name(APPLICATION_NAME);
        if let Some(password) = config.resolved_password()? {
            options = options.password(&password);
        }
        Ok(options)
    }

    fn pool_options(config: &IdentityStoreConfig) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout())
    }
}
