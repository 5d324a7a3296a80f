// Copyright (c) 2026 Props Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Audit Repository
//!
//! `AuditRepository` backed by the `registry_push_audit` table (see
//! `cli/migrations`). `(repository, digest)` is the primary key, so
//! `record_if_absent` is a single `INSERT .. ON CONFLICT DO NOTHING` and the
//! affected-row count tells a new record from a repeat push.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use uuid::Uuid;

use crate::domain::audit::{AuditOutcome, AuditRecord};
use crate::domain::caller::{AgentKind, CallerIdentity, RunId};
use crate::domain::reference::Digest;
use crate::domain::repository::{AuditRepository, RepositoryError};
use crate::domain::repository_name::RepositoryName;

const CALLER_ADMIN: &str = "admin";
const CALLER_AGENT: &str = "agent";

pub struct PostgresAuditRepository {
    pool: PgPool,
}

impl PostgresAuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRepository for PostgresAuditRepository {
    async fn record_if_absent(
        &self,
        record: &AuditRecord,
    ) -> Result<AuditOutcome, RepositoryError> {
        let (caller_type, run_id, agent_kind) = match record.caller {
            CallerIdentity::Admin => (CALLER_ADMIN, None, None),
            CallerIdentity::Agent { run_id, kind } => {
                (CALLER_AGENT, Some(run_id.0), Some(kind.as_str()))
            }
        };

        let result = sqlx::query(
            r#"
            INSERT INTO registry_push_audit (
                repository, digest, reference_tag, caller_type,
                agent_run_id, agent_kind, base_digest, pushed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (repository, digest) DO NOTHING
            "#,
        )
        .bind(record.repository.as_str())
        .bind(record.digest.to_string())
        .bind(record.tag.as_deref())
        .bind(caller_type)
        .bind(run_id)
        .bind(agent_kind)
        .bind(record.base_digest.as_deref())
        .bind(record.pushed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to record push: {}", e)))?;

        Ok(if result.rows_affected() == 0 {
            AuditOutcome::AlreadyRecorded
        } else {
            AuditOutcome::Recorded
        })
    }

    async fn find(
        &self,
        repository: RepositoryName,
        digest: &Digest,
    ) -> Result<Option<AuditRecord>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT repository, digest, reference_tag, caller_type,
                   agent_run_id, agent_kind, base_digest, pushed_at
            FROM registry_push_audit
            WHERE repository = $1 AND digest = $2
            "#,
        )
        .bind(repository.as_str())
        .bind(digest.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn list_by_run(&self, run_id: RunId) -> Result<Vec<AuditRecord>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT repository, digest, reference_tag, caller_type,
                   agent_run_id, agent_kind, base_digest, pushed_at
            FROM registry_push_audit
            WHERE agent_run_id = $1
            ORDER BY pushed_at ASC
            "#,
        )
        .bind(run_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }
}

fn record_from_row(row: &PgRow) -> Result<AuditRecord, RepositoryError> {
    let repository: String = row.try_get("repository")?;
    let digest: String = row.try_get("digest")?;
    let caller_type: String = row.try_get("caller_type")?;
    let run_id: Option<Uuid> = row.try_get("agent_run_id")?;
    let agent_kind: Option<String> = row.try_get("agent_kind")?;
    let pushed_at: DateTime<Utc> = row.try_get("pushed_at")?;

    let caller = match (caller_type.as_str(), run_id, agent_kind) {
        (CALLER_ADMIN, _, _) => CallerIdentity::Admin,
        (CALLER_AGENT, Some(run_id), Some(kind)) => CallerIdentity::Agent {
            run_id: RunId(run_id),
            kind: kind
                .parse::<AgentKind>()
                .map_err(|e| RepositoryError::Serialization(e.to_string()))?,
        },
        (other, _, _) => {
            return Err(RepositoryError::Serialization(format!(
                "Inconsistent caller columns (caller_type '{}')",
                other
            )))
        }
    };

    Ok(AuditRecord {
        repository: repository
            .parse::<RepositoryName>()
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?,
        digest: digest
            .parse::<Digest>()
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?,
        tag: row.try_get("reference_tag")?,
        caller,
        base_digest: row.try_get("base_digest")?,
        pushed_at,
    })
}
