// Copyright (c) 2026 Props Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Registry Proxy Service
//!
//! Per-request orchestration. Every request takes the same path:
//!
//! ```text
//! RegistryOperation::parse
//!   └─ IdentityValidator::authenticate   → 401
//!   └─ access::evaluate                  → 403
//!   └─ operation-specific checks         → 400 / 404 / 413
//!   └─ ManifestPush only:
//!        AuditRecorder::attempt_audit    → 500, nothing forwarded
//!        forward_manifest(AuditToken)
//!   └─ UpstreamRegistry::forward         → 502 / 504
//! ```
//!
//! No state is kept between requests.

use axum::body::Body;
use axum::http::header::{HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{request, Request, Response, StatusCode};
use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::application::audit_recorder::{AuditRecorder, AuditToken};
use crate::application::authentication::IdentityValidator;
use crate::domain::access::{self, AccessDecision};
use crate::domain::caller::{CallerIdentity, UsernamePolicy};
use crate::domain::errors::ProxyError;
use crate::domain::identity::IdentityStore;
use crate::domain::operation::RegistryOperation;
use crate::domain::reference::{Digest, Reference};
use crate::domain::repository::AuditRepository;
use crate::domain::repository_name::RepositoryName;
use crate::domain::upstream::UpstreamRegistry;

pub const API_VERSION_HEADER: &str = "docker-distribution-api-version";
pub const API_VERSION: &str = "registry/2.0";

pub struct RegistryProxyService {
    validator: IdentityValidator,
    recorder: AuditRecorder,
    upstream: Arc<dyn UpstreamRegistry>,
    max_manifest_bytes: usize,
}

impl RegistryProxyService {
    pub fn new(
        identity_store: Arc<dyn IdentityStore>,
        audit_repository: Arc<dyn AuditRepository>,
        upstream: Arc<dyn UpstreamRegistry>,
        policy: UsernamePolicy,
        max_manifest_bytes: usize,
    ) -> Self {
        Self {
            validator: IdentityValidator::new(identity_store, policy),
            recorder: AuditRecorder::new(audit_repository, upstream.clone()),
            upstream,
            max_manifest_bytes,
        }
    }

    /// Handle one registry request end to end.
    pub async fn handle(&self, request: Request<Body>) -> Result<Response<Body>, ProxyError> {
        let operation = RegistryOperation::parse(request.method(), request.uri());
        let result = self.dispatch(operation.clone(), request).await;

        let outcome = match &result {
            Ok(response) if response.status().is_success() => "ok",
            Ok(_) => "upstream_error",
            Err(e) => e.code(),
        };
        metrics::counter!(
            "registry_proxy_requests_total",
            "operation" => operation.name(),
            "outcome" => outcome
        )
        .increment(1);

        result
    }

    async fn dispatch(
        &self,
        operation: RegistryOperation,
        request: Request<Body>,
    ) -> Result<Response<Body>, ProxyError> {
        let caller = self.validator.authenticate(request.headers()).await?;

        if let AccessDecision::Deny(reason) = access::evaluate(&caller, &operation) {
            warn!(
                caller = %caller,
                operation = operation.name(),
                repository = operation.repository().unwrap_or("-"),
                path = %request.uri().path(),
                reason = %reason,
                "Access denied"
            );
            return Err(ProxyError::Forbidden(reason));
        }
        debug!(caller = %caller, operation = operation.name(), "Access granted");

        match operation {
            RegistryOperation::ApiVersionCheck => Ok(api_version_response()),
            RegistryOperation::BlobRead { digest, .. } => {
                parse_digest(&digest)?;
                self.upstream.forward(request).await
            }
            RegistryOperation::BlobUploadStart { repository }
            | RegistryOperation::BlobUploadChunk { repository, .. } => {
                known_repository(&repository)?;
                self.upstream.forward(request).await
            }
            RegistryOperation::BlobUploadComplete { repository, digest, .. } => {
                known_repository(&repository)?;
                let digest = digest.ok_or_else(|| {
                    ProxyError::InvalidReference(
                        "upload completion requires a digest parameter".to_string(),
                    )
                })?;
                parse_digest(&digest)?;
                self.upstream.forward(request).await
            }
            RegistryOperation::ManifestPush { repository, reference } => {
                let repository = known_repository(&repository)?;
                self.push_manifest(&caller, repository, reference, request).await
            }
            RegistryOperation::Catalog
            | RegistryOperation::TagList { .. }
            | RegistryOperation::ManifestRead { .. } => self.upstream.forward(request).await,
            // Already denied by the ACL.
            RegistryOperation::Delete | RegistryOperation::Unrecognized => {
                Err(ProxyError::Forbidden("operation not allowed".to_string()))
            }
        }
    }

    async fn push_manifest(
        &self,
        caller: &CallerIdentity,
        repository: RepositoryName,
        reference: Reference,
        request: Request<Body>,
    ) -> Result<Response<Body>, ProxyError> {
        let (parts, body) = request.into_parts();
        let body = self.read_manifest(body).await?;

        let token = self.recorder.attempt_audit(caller, repository, &reference, body).await?;
        let digest = token.record().digest.clone();

        let result = self.forward_manifest(token, parts).await;
        match &result {
            Ok(response) if !response.status().is_success() => warn!(
                repository = %repository,
                digest = %digest,
                status = %response.status(),
                "Upstream rejected a recorded manifest push; audit row may be orphaned"
            ),
            Err(e) => warn!(
                repository = %repository,
                digest = %digest,
                error = %e,
                "Forwarding a recorded manifest push failed; audit row may be orphaned"
            ),
            Ok(_) => {}
        }
        result
    }

    /// Second half of a manifest push. Only an [`AuditToken`] can supply the body.
    async fn forward_manifest(
        &self,
        token: AuditToken,
        mut parts: request::Parts,
    ) -> Result<Response<Body>, ProxyError> {
        let (_, body) = token.into_parts();
        parts.headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        self.upstream.forward(Request::from_parts(parts, Body::from(body))).await
    }

    async fn read_manifest(&self, body: Body) -> Result<Bytes, ProxyError> {
        match Limited::new(body, self.max_manifest_bytes).collect().await {
            Ok(collected) => Ok(collected.to_bytes()),
            Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
                Err(ProxyError::ManifestTooLarge {
                    limit: self.max_manifest_bytes,
                })
            }
            Err(e) => Err(ProxyError::MalformedRequest(format!(
                "failed to read manifest body: {}",
                e
            ))),
        }
    }
}

fn known_repository(name: &str) -> Result<RepositoryName, ProxyError> {
    name.parse::<RepositoryName>()
        .map_err(|e| ProxyError::UnknownRepository(e.0))
}

fn parse_digest(value: &str) -> Result<Digest, ProxyError> {
    value
        .parse::<Digest>()
        .map_err(|e| ProxyError::InvalidReference(e.to_string()))
}

fn api_version_response() -> Response<Body> {
    let mut response = Response::new(Body::from("{}"));
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(API_VERSION_HEADER, HeaderValue::from_static(API_VERSION));
    response
}
