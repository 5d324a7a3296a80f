// Copyright (c) 2026 Props Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Audit Repository Interface
//!
//! Persistence contract for [`AuditRecord`]s, implemented in
//! `crate::infrastructure::repositories`.
//!
//! | Implementation | Backing |
//! |----------------|---------|
//! | `PostgresAuditRepository` | `registry_push_audit` table |
//! | `InMemoryAuditRepository` | `HashMap`, for development and tests |
//!
//! Append-only: the contract has no update or delete.

use async_trait::async_trait;

use crate::domain::audit::{AuditOutcome, AuditRecord};
use crate::domain::caller::RunId;
use crate::domain::reference::Digest;
use crate::domain::repository_name::RepositoryName;

#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Insert `record` unless one already exists for its `(repository, digest)`.
    async fn record_if_absent(&self, record: &AuditRecord) -> Result<AuditOutcome, RepositoryError>;

    /// Find the record for `(repository, digest)`
    async fn find(
        &self,
        repository: RepositoryName,
        digest: &Digest,
    ) -> Result<Option<AuditRecord>, RepositoryError>;

    /// All records pushed by an agent run, oldest first
    async fn list_by_run(&self, run_id: RunId) -> Result<Vec<AuditRecord>, RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}
