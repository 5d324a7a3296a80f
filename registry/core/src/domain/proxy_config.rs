// Copyright (c) 2026 Props Contributors
// SPDX-License-Identifier: AGPL-3.0

// Proxy Configuration Types
//
// Kubernetes-style manifest (apiVersion/kind/metadata/spec) describing:
// - Listener address
// - Upstream registry endpoint and timeouts
// - Identity store (PostgreSQL) connection
// - Username conventions for admin and agent principals
// - Logging and metrics settings

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::caller::UsernamePolicy;

pub const API_VERSION: &str = "registry-proxy/v1";
pub const KIND: &str = "RegistryProxyConfig";

/// Top-level configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfigManifest {
    /// API version (must be "registry-proxy/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "RegistryProxyConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: ProxyConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable deployment name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxyConfigSpec {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub identity_store: IdentityStoreConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Network bind address (e.g. "0.0.0.0" or "127.0.0.1")
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// HTTP listener port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the backing registry
    #[serde(default = "default_upstream_url")]
    pub url: String,

    /// Upper bound on waiting for upstream response headers
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    #[serde(default = "default_connect_timeout_seconds")]
    pub connect_timeout_seconds: u64,

    /// Idle limit between body chunks while streaming
    #[serde(default = "default_timeout_seconds")]
    pub read_timeout_seconds: u64,

    /// Timeout for fetching an image config during audit
    #[serde(default = "default_inspect_timeout_seconds")]
    pub inspect_timeout_seconds: u64,

    /// Largest manifest body accepted for a push, and largest config blob
    /// read while auditing one
    #[serde(default = "default_max_manifest_bytes")]
    pub max_manifest_bytes: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: default_upstream_url(),
            timeout_seconds: default_timeout_seconds(),
            connect_timeout_seconds: default_connect_timeout_seconds(),
            read_timeout_seconds: default_timeout_seconds(),
            inspect_timeout_seconds: default_inspect_timeout_seconds(),
            max_manifest_bytes: default_max_manifest_bytes(),
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_seconds)
    }

    pub fn inspect_timeout(&self) -> Duration {
        Duration::from_secs(self.inspect_timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityStoreConfig {
    #[serde(default = "default_pg_host")]
    pub host: String,

    #[serde(default = "default_pg_port")]
    pub port: u16,

    #[serde(default = "default_pg_database")]
    pub database: String,

    /// Service account used for run lookups and audit writes
    #[serde(default = "default_pg_username")]
    pub username: String,

    /// Service account password (supports "env:VAR_NAME")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default = "default_connect_timeout_seconds")]
    pub connect_timeout_seconds: u64,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for IdentityStoreConfig {
    fn default() -> Self {
        Self {
            host: default_pg_host(),
            port: default_pg_port(),
            database: default_pg_database(),
            username: default_pg_username(),
            password: None,
            connect_timeout_seconds: default_connect_timeout_seconds(),
            max_connections: default_max_connections(),
        }
    }
}

impl IdentityStoreConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Service password with any `env:` indirection resolved.
    pub fn resolved_password(&self) -> anyhow::Result<Option<String>> {
        match &self.password {
            None => Ok(None),
            Some(value) => match value.strip_prefix("env:") {
                Some(var) => std::env::var(var).map(Some).map_err(|_| {
                    anyhow::anyhow!("identity_store.password references unset variable '{}'", var)
                }),
                None => Ok(Some(value.clone())),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Username of the single administrative principal
    #[serde(default = "default_admin_username")]
    pub admin_username: String,

    /// Prefix of agent usernames; the remainder is the run id
    #[serde(default = "default_agent_prefix")]
    pub agent_username_prefix: String,

    /// Realm advertised in `WWW-Authenticate` challenges
    #[serde(default = "default_realm")]
    pub realm: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_username: default_admin_username(),
            agent_username_prefix: default_agent_prefix(),
            realm: default_realm(),
        }
    }
}

impl AuthConfig {
    pub fn username_policy(&self) -> UsernamePolicy {
        UsernamePolicy {
            admin_username: self.admin_username.clone(),
            agent_prefix: self.agent_username_prefix.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format ("json" or "text")
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Prometheus scrape port
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5050
}

fn default_upstream_url() -> String {
    "http://props-registry:5000".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_connect_timeout_seconds() -> u64 {
    5
}

fn default_inspect_timeout_seconds() -> u64 {
    5
}

fn default_max_manifest_bytes() -> usize {
    4 * 1024 * 1024
}

fn default_pg_host() -> String {
    "props-postgres".to_string()
}

fn default_pg_port() -> u16 {
    5432
}

fn default_pg_database() -> String {
    "eval_results".to_string()
}

fn default_pg_username() -> String {
    "postgres".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_admin_username() -> String {
    "postgres".to_string()
}

fn default_agent_prefix() -> String {
    "agent_".to_string()
}

fn default_realm() -> String {
    "registry-proxy".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for ProxyConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "registry-proxy".to_string(),
                labels: None,
            },
            spec: ProxyConfigSpec::default(),
        }
    }
}

impl ProxyConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Discover configuration file using precedence order
    /// 1. REGISTRY_PROXY_CONFIG_PATH environment variable
    /// 2. ./registry-proxy.yaml (working directory)
    /// 3. ~/.registry-proxy/config.yaml (user home)
    /// 4. /etc/registry-proxy/config.yaml (system)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("REGISTRY_PROXY_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./registry-proxy.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".registry-proxy").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/registry-proxy/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides so container deployments can
    /// configure the proxy without a file.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("REGISTRY_PROXY_UPSTREAM_URL") {
            tracing::info!("Environment override: REGISTRY_PROXY_UPSTREAM_URL={}", url);
            self.spec.upstream.url = url;
        }

        let store = &mut self.spec.identity_store;
        if let Some(host) = lookup("PGHOST") {
            store.host = host;
        }
        if let Some(port) = lookup("PGPORT") {
            match port.parse() {
                Ok(port) => store.port = port,
                Err(_) => tracing::warn!("Invalid value for PGPORT: '{}'. Ignoring.", port),
            }
        }
        if let Some(database) = lookup("PGDATABASE") {
            store.database = database;
        }
        if let Some(user) = lookup("PGUSER") {
            store.username = user;
        }
        if lookup("PGPASSWORD").is_some() {
            store.password = Some("env:PGPASSWORD".to_string());
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!("Invalid apiVersion: '{}'. Must be '{}'", self.api_version, API_VERSION);
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let upstream = &self.spec.upstream;
        let url = url::Url::parse(&upstream.url)
            .map_err(|e| anyhow::anyhow!("Invalid upstream.url '{}': {}", upstream.url, e))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("upstream.url must use http or https, got '{}'", url.scheme());
        }
        if upstream.timeout_seconds == 0
            || upstream.connect_timeout_seconds == 0
            || upstream.read_timeout_seconds == 0
        {
            anyhow::bail!("upstream timeouts must be greater than zero");
        }
        if upstream.max_manifest_bytes == 0 {
            anyhow::bail!("upstream.max_manifest_bytes must be greater than zero");
        }

        let store = &self.spec.identity_store;
        if store.host.is_empty() || store.database.is_empty() || store.username.is_empty() {
            anyhow::bail!("identity_store host, database and username cannot be empty");
        }
        if store.max_connections == 0 {
            anyhow::bail!("identity_store.max_connections must be greater than zero");
        }

        let auth = &self.spec.auth;
        if auth.admin_username.is_empty() || auth.agent_username_prefix.is_empty() {
            anyhow::bail!("auth.admin_username and auth.agent_username_prefix cannot be empty");
        }
        if auth.admin_username.starts_with(&auth.agent_username_prefix) {
            anyhow::bail!(
                "auth.admin_username '{}' must not start with the agent prefix '{}'",
                auth.admin_username,
                auth.agent_username_prefix
            );
        }

        if !matches!(self.spec.observability.logging.format.as_str(), "json" | "text") {
            anyhow::bail!("observability.logging.format must be 'json' or 'text'");
        }

        Ok(())
    }
}
