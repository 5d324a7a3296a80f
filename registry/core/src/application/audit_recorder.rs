// Copyright (c) 2026 Props Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Audit Recorder
//!
//! First half of the two-phase manifest push:
//!
//! ```text
//! AuditRecorder::attempt_audit(..) -> Result<AuditToken, ProxyError>
//!   └─ RegistryProxyService::forward_manifest(AuditToken, ..) -> Result<Response, ProxyError>
//! ```
//!
//! An [`AuditToken`] can only be produced by a successful (or idempotently
//! skipped) audit write, and it owns the manifest body. The body cannot reach
//! the upstream registry without first passing through here.
//!
//! Failure asymmetry: a failed write stops the push; a failed forward after a
//! successful write leaves an orphan row, which external reconciliation prunes.

use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::audit::{AuditOutcome, AuditRecord};
use crate::domain::caller::CallerIdentity;
use crate::domain::errors::ProxyError;
use crate::domain::manifest;
use crate::domain::reference::{Digest, Reference};
use crate::domain::repository::AuditRepository;
use crate::domain::repository_name::RepositoryName;
use crate::domain::upstream::UpstreamRegistry;

/// Proof that a manifest push has been durably recorded.
#[derive(Debug)]
pub struct AuditToken {
    record: AuditRecord,
    outcome: AuditOutcome,
    body: Bytes,
}

impl AuditToken {
    pub fn record(&self) -> &AuditRecord {
        &self.record
    }

    pub fn outcome(&self) -> AuditOutcome {
        self.outcome
    }

    /// Release the manifest body for forwarding.
    pub fn into_parts(self) -> (AuditRecord, Bytes) {
        (self.record, self.body)
    }
}

pub struct AuditRecorder {
    repository: Arc<dyn AuditRepository>,
    upstream: Arc<dyn UpstreamRegistry>,
}

impl AuditRecorder {
    pub fn new(repository: Arc<dyn AuditRepository>, upstream: Arc<dyn UpstreamRegistry>) -> Self {
        Self { repository, upstream }
    }

    /// Record an authorized manifest push.
    ///
    /// For a digest reference the body must hash to that digest. For a tag the
    /// recorded digest is the SHA-256 of the body, which is what the registry
    /// will store it under.
    pub async fn attempt_audit(
        &self,
        caller: &CallerIdentity,
        repository: RepositoryName,
        reference: &Reference,
        body: Bytes,
    ) -> Result<AuditToken, ProxyError> {
        let digest = match reference {
            Reference::Digest(expected) => {
                if !expected.matches(&body) {
                    return Err(ProxyError::InvalidReference(format!(
                        "manifest body does not match digest {}",
                        expected
                    )));
                }
                expected.clone()
            }
            Reference::Tag(_) => Digest::sha256(&body),
        };

        let base_digest = self.base_digest(repository, &body).await;
        let record = AuditRecord::new(
            repository,
            digest,
            reference.as_tag().map(str::to_string),
            *caller,
            base_digest,
        );

        let outcome = self.repository.record_if_absent(&record).await.map_err(|e| {
            warn!(
                repository = %record.repository,
                digest = %record.digest,
                error = %e,
                "Audit write failed; push will not be forwarded"
            );
            metrics::counter!("registry_proxy_audit_records_total", "outcome" => "failed")
                .increment(1);
            ProxyError::AuditWriteFailed(e.to_string())
        })?;

        metrics::counter!(
            "registry_proxy_audit_records_total",
            "outcome" => outcome.as_str()
        )
        .increment(1);
        match outcome {
            AuditOutcome::Recorded => info!(
                repository = %record.repository,
                digest = %record.digest,
                caller = %record.caller,
                base_digest = record.base_digest.as_deref().unwrap_or("none"),
                "Recorded manifest push"
            ),
            AuditOutcome::AlreadyRecorded => debug!(
                repository = %record.repository,
                digest = %record.digest,
                "Manifest already recorded, skipping"
            ),
        }

        Ok(AuditToken { record, outcome, body })
    }

    /// Best-effort lookup of the parent image through the config blob label.
    async fn base_digest(&self, repository: RepositoryName, body: &[u8]) -> Option<String> {
        let config_digest = manifest::config_digest(body)?;
        match self.upstream.fetch_blob(repository, &config_digest).await {
            Ok(Some(blob)) => manifest::base_digest_label(&blob),
            Ok(None) => {
                debug!(digest = %config_digest, "Config blob not found upstream");
                None
            }
            Err(e) => {
                warn!(digest = %config_digest, error = %e, "Failed to fetch config blob");
                None
            }
        }
    }
}
