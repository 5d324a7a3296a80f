// Copyright (c) 2026 Props Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Identity Store Interface
//!
//! The identity store is the source of truth for credential validity: a
//! username/secret pair is live iff the store accepts it as its own native
//! login. There is no separate credential table to keep in sync.
//!
//! The same store records which [`crate::domain::caller::AgentKind`] each agent
//! run was launched as.

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

use crate::domain::caller::RunId;

/// Username/secret pair taken from a Basic `Authorization` header.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    secret: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum IdentityStoreError {
    #[error("credentials rejected: {0}")]
    Rejected(String),

    #[error("identity store unavailable: {0}")]
    Unavailable(String),

    #[error("identity store query failed: {0}")]
    Query(String),
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Succeeds iff the store accepts `credentials` as a login.
    async fn verify_credentials(&self, credentials: &Credentials) -> Result<(), IdentityStoreError>;

    /// Raw agent kind recorded for `run_id`, or `None` if the run is unknown.
    async fn agent_kind(&self, run_id: RunId) -> Result<Option<String>, IdentityStoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secret() {
        let creds = Credentials::new("agent_x", "hunter2");
        let rendered = format!("{:?}", creds);
        assert!(rendered.contains("agent_x"));
        assert!(!rendered.contains("hunter2"));
    }
}
