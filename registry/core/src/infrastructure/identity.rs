// Copyright (c) 2026 Props Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Identity Stores
//!
//! | Implementation | Credential check | Kind lookup |
//! |----------------|------------------|-------------|
//! | `PostgresIdentityStore` | opens a connection as the caller | `agent_runs.type_config` |
//! | `StaticIdentityStore` | in-memory map | in-memory map |
//!
//! PostgreSQL itself is the credential authority: the secret is never
//! compared by the proxy, only presented to the server as a login.

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgPool};
use sqlx::{Connection, Row};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::domain::caller::RunId;
use crate::domain::identity::{Credentials, IdentityStore, IdentityStoreError};
use crate::infrastructure::db::Database;

pub struct PostgresIdentityStore {
    pool: PgPool,
    base_options: PgConnectOptions,
    connect_timeout: Duration,
}

impl PostgresIdentityStore {
    pub fn new(database: &Database, connect_timeout: Duration) -> Self {
        Self {
            pool: database.get_pool().clone(),
            base_options: database.options().clone(),
            connect_timeout,
        }
    }
}

#[async_trait]
impl IdentityStore for PostgresIdentityStore {
    async fn verify_credentials(
        &self,
        credentials: &Credentials,
    ) -> Result<(), IdentityStoreError> {
        let options = self
            .base_options
            .clone()
            .username(&credentials.username)
            .password(credentials.secret());

        let connection =
            tokio::time::timeout(self.connect_timeout, PgConnection::connect_with(&options))
                .await
                .map_err(|_| {
                    IdentityStoreError::Unavailable("connection attempt timed out".to_string())
                })?;

        match connection {
            Ok(connection) => {
                if let Err(e) = connection.close().await {
                    debug!(error = %e, "Error closing credential check connection");
                }
                Ok(())
            }
            // The server answered and refused the login.
            Err(sqlx::Error::Database(e)) => {
                Err(IdentityStoreError::Rejected(e.message().to_string()))
            }
            Err(e) => Err(IdentityStoreError::Unavailable(e.to_string())),
        }
    }

    async fn agent_kind(&self, run_id: RunId) -> Result<Option<String>, IdentityStoreError> {
        let row = sqlx::query(
            r#"
            SELECT type_config->>'agent_type' AS agent_type
            FROM agent_runs
            WHERE agent_run_id = $1
            "#,
        )
        .bind(run_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| IdentityStoreError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let kind: Option<String> = row
                    .try_get("agent_type")
                    .map_err(|e| IdentityStoreError::Query(e.to_string()))?;
                // A run without a recorded kind can never classify.
                Ok(Some(kind.unwrap_or_default()))
            }
            None => Ok(None),
        }
    }
}

/// Fixed credentials and run kinds, for development and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityStore {
    users: HashMap<String, String>,
    kinds: HashMap<RunId, String>,
    agent_prefix: Option<String>,
}

impl StaticIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a non-default agent username prefix for `with_agent`.
    pub fn with_agent_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.agent_prefix = Some(prefix.into());
        self
    }

    pub fn with_user(mut self, username: impl Into<String>, secret: impl Into<String>) -> Self {
        self.users.insert(username.into(), secret.into());
        self
    }

    /// Register an agent login for `run_id` and the raw kind stored for the run.
    pub fn with_agent(
        mut self,
        run_id: RunId,
        secret: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        let prefix = self.agent_prefix.as_deref().unwrap_or("agent_");
        let username = format!("{}{}", prefix, run_id);
        self.users.insert(username, secret.into());
        self.kinds.insert(run_id, kind.into());
        self
    }
}

#[async_trait]
impl IdentityStore for StaticIdentityStore {
    async fn verify_credentials(
        &self,
        credentials: &Credentials,
    ) -> Result<(), IdentityStoreError> {
        match self.users.get(&credentials.username) {
            Some(secret) if secret == credentials.secret() => Ok(()),
            _ => Err(IdentityStoreError::Rejected(format!(
                "password authentication failed for user \"{}\"",
                credentials.username
            ))),
        }
    }

    async fn agent_kind(&self, run_id: RunId) -> Result<Option<String>, IdentityStoreError> {
        Ok(self.kinds.get(&run_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_store() {
        let run_id = RunId::new();
        let store = StaticIdentityStore::new()
            .with_user("postgres", "pw")
            .with_agent(run_id, "s3cret", "critic");

        assert!(store.verify_credentials(&Credentials::new("postgres", "pw")).await.is_ok());
        assert!(matches!(
            store.verify_credentials(&Credentials::new("postgres", "nope")).await,
            Err(IdentityStoreError::Rejected(_))
        ));
        assert!(store
            .verify_credentials(&Credentials::new(format!("agent_{}", run_id), "s3cret"))
            .await
            .is_ok());
        assert_eq!(store.agent_kind(run_id).await.unwrap().as_deref(), Some("critic"));
        assert_eq!(store.agent_kind(RunId::new()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_custom_agent_prefix() {
        let run_id = RunId::new();
        let store = StaticIdentityStore::new()
            .with_agent_prefix("agent-")
            .with_agent(run_id, "s3cret", "grader");
        assert!(store
            .verify_credentials(&Credentials::new(format!("agent-{}", run_id), "s3cret"))
            .await
            .is_ok());
    }
}
