// Copyright (c) 2026 Props Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Audit Repository Implementations
//!
//! - **PostgresAuditRepository**: `registry_push_audit` table
//! - **InMemoryAuditRepository**: `HashMap`-backed, for development and tests

pub mod postgres_audit;

pub use postgres_audit::PostgresAuditRepository;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::domain::audit::{AuditOutcome, AuditRecord};
use crate::domain::caller::RunId;
use crate::domain::reference::Digest;
use crate::domain::repository::{AuditRepository, RepositoryError};
use crate::domain::repository_name::RepositoryName;

type AuditKey = (RepositoryName, Digest);

#[derive(Clone, Default)]
pub struct InMemoryAuditRepository {
    records: Arc<RwLock<HashMap<AuditKey, AuditRecord>>>,
}

impl InMemoryAuditRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|records| records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> RepositoryError {
    RepositoryError::Database("audit store lock poisoned".to_string())
}

#[async_trait]
impl AuditRepository for InMemoryAuditRepository {
    async fn record_if_absent(
        &self,
        record: &AuditRecord,
    ) -> Result<AuditOutcome, RepositoryError> {
        let mut records = self.records.write().map_err(poisoned)?;
        let key = (record.repository, record.digest.clone());
        if records.contains_key(&key) {
            return Ok(AuditOutcome::AlreadyRecorded);
        }
        records.insert(key, record.clone());
        Ok(AuditOutcome::Recorded)
    }

    async fn find(
        &self,
        repository: RepositoryName,
        digest: &Digest,
    ) -> Result<Option<AuditRecord>, RepositoryError> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.get(&(repository, digest.clone())).cloned())
    }

    async fn list_by_run(&self, run_id: RunId) -> Result<Vec<AuditRecord>, RepositoryError> {
        let records = self.records.read().map_err(poisoned)?;
        let mut matching: Vec<AuditRecord> = records
            .values()
            .filter(|r| r.caller.run_id() == Some(run_id))
            .cloned()
            .collect();
        matching.sort_by_key(|r| r.pushed_at);
        Ok(matching)
    }
}
