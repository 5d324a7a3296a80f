// Copyright (c) 2026 Props Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Audit Records
//!
//! One record per manifest accepted through the proxy. Records are written
//! before the push is forwarded and are never updated or deleted by the proxy.
//! `(repository, digest)` identifies a record; pushing recorded content again
//! leaves the existing record untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::caller::CallerIdentity;
use crate::domain::reference::Digest;
use crate::domain::repository_name::RepositoryName;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub repository: RepositoryName,
    pub digest: Digest,
    /// Tag the manifest was pushed under, for admin tag pushes.
    pub tag: Option<String>,
    /// Snapshot of the caller at push time.
    pub caller: CallerIdentity,
    /// Parent image digest, when the image config declares one.
    pub base_digest: Option<String>,
    pub pushed_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(
        repository: RepositoryName,
        digest: Digest,
        tag: Option<String>,
        caller: CallerIdentity,
        base_digest: Option<String>,
    ) -> Self {
        Self {
            repository,
            digest,
            tag,
            caller,
            base_digest,
            pushed_at: Utc::now(),
        }
    }
}

/// Result of an idempotent record attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditOutcome {
    Recorded,
    AlreadyRecorded,
}

impl AuditOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditOutcome::Recorded => "recorded",
            AuditOutcome::AlreadyRecorded => "already_recorded",
        }
    }
}
