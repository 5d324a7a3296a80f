// Copyright (c) 2026 Props Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Proxy Error Taxonomy
//!
//! Every rejection the proxy produces, each with a distinct HTTP status and a
//! distribution-protocol error code.
//!
//! | Variant | Status | Code | Upstream contacted |
//! |---------|--------|------|--------------------|
//! | `Unauthenticated` | 401 | `UNAUTHORIZED` | never |
//! | `Forbidden` | 403 | `DENIED` | never |
//! | `InvalidReference` | 400 | `DIGEST_INVALID` | never |
//! | `UnknownRepository` | 404 | `NAME_UNKNOWN` | never |
//! | `ManifestTooLarge` | 413 | `SIZE_INVALID` | never |
//! | `MalformedRequest` | 400 | `MANIFEST_INVALID` | never |
//! | `AuditWriteFailed` | 500 | `AUDIT_WRITE_FAILED` | never |
//! | `UpstreamTimeout` | 504 | `UPSTREAM_TIMEOUT` | yes |
//! | `UpstreamFailure` | 502 | `UPSTREAM_UNAVAILABLE` | yes |

use axum::http::StatusCode;
use thiserror::Error;

/// Message returned for every authentication failure, whatever the cause.
pub const UNAUTHENTICATED_MESSAGE: &str = "authentication required";

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("{}", UNAUTHENTICATED_MESSAGE)]
    Unauthenticated,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("invalid reference: {0}")]
    InvalidReference(String),

    #[error("unknown repository: {0}")]
    UnknownRepository(String),

    #[error("manifest exceeds {limit} bytes")]
    ManifestTooLarge { limit: usize },

    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("audit write failed: {0}")]
    AuditWriteFailed(String),

    #[error("upstream registry timed out")]
    UpstreamTimeout,

    #[error("upstream registry failure: {0}")]
    UpstreamFailure(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ProxyError::Forbidden(_) => StatusCode::FORBIDDEN,
            ProxyError::InvalidReference(_) => StatusCode::BAD_REQUEST,
            ProxyError::UnknownRepository(_) => StatusCode::NOT_FOUND,
            ProxyError::ManifestTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::AuditWriteFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::UpstreamFailure(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ProxyError::Unauthenticated => "UNAUTHORIZED",
            ProxyError::Forbidden(_) => "DENIED",
            ProxyError::InvalidReference(_) => "DIGEST_INVALID",
            ProxyError::UnknownRepository(_) => "NAME_UNKNOWN",
            ProxyError::ManifestTooLarge { .. } => "SIZE_INVALID",
            ProxyError::MalformedRequest(_) => "MANIFEST_INVALID",
            ProxyError::AuditWriteFailed(_) => "AUDIT_WRITE_FAILED",
            ProxyError::UpstreamTimeout => "UPSTREAM_TIMEOUT",
            ProxyError::UpstreamFailure(_) => "UPSTREAM_UNAVAILABLE",
        }
    }
}
