// Copyright (c) 2026 Props Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Proxy HTTP server
//!
//! Wires the PostgreSQL identity store, the audit repository and the upstream
//! client into the router, then serves until Ctrl+C or SIGTERM.

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use registry_proxy_core::application::RegistryProxyService;
use registry_proxy_core::domain::proxy_config::ProxyConfigManifest;
use registry_proxy_core::infrastructure::db::Database;
use registry_proxy_core::infrastructure::identity::PostgresIdentityStore;
use registry_proxy_core::infrastructure::repositories::PostgresAuditRepository;
use registry_proxy_core::infrastructure::upstream::HttpUpstreamRegistry;
use registry_proxy_core::presentation::api::app;

pub async fn run(config: ProxyConfigManifest) -> Result<()> {
    config.validate().context("Configuration validation failed")?;
    let spec = &config.spec;

    info!(
        name = %config.metadata.name,
        upstream = %spec.upstream.url,
        identity_store = %format!(
            "{}:{}/{}",
            spec.identity_store.host, spec.identity_store.port, spec.identity_store.database
        ),
        "Registry proxy starting"
    );

    if spec.observability.metrics.enabled {
        let addr = SocketAddr::from(([0, 0, 0, 0], spec.observability.metrics.port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!("Metrics exporter listening on {}", addr);
    }

    // Lazy so the proxy starts while the database is still coming up.
    let database = Database::connect_lazy(&spec.identity_store)
        .context("Invalid identity store configuration")?;
    if let Err(e) = sqlx::query("SELECT 1").execute(database.get_pool()).await {
        warn!(error = %e, "Identity store not reachable yet; requests will fail until it is");
    }

    let identity_store = Arc::new(PostgresIdentityStore::new(
        &database,
        spec.identity_store.connect_timeout(),
    ));
    let audit_repository = Arc::new(PostgresAuditRepository::new(database.get_pool().clone()));
    let upstream = Arc::new(
        HttpUpstreamRegistry::new(&spec.upstream).context("Failed to create upstream client")?,
    );

    let service = RegistryProxyService::new(
        identity_store,
        audit_repository,
        upstream,
        spec.auth.username_policy(),
        spec.upstream.max_manifest_bytes,
    );
    let router = app(Arc::new(service), &spec.auth.realm);

    let addr = format!("{}:{}", spec.server.bind_address, spec.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Registry proxy listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Registry proxy shutting down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
