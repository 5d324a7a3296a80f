// Copyright (c) 2026 Props Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Identity Validator
//!
//! Turns an `Authorization` header into a [`CallerIdentity`].
//!
//! ```text
//! Authorization: Basic …
//!   └─ parse_basic_auth            ← scheme, base64, UTF-8, "user:secret"
//!   └─ UsernamePolicy::principal_for ← admin name or agent_<run id>
//!   └─ IdentityStore::verify_credentials
//!   └─ IdentityStore::agent_kind   ← agents only
//!   └─ classify_caller
//! ```
//!
//! Every failure along the chain collapses into
//! [`ProxyError::Unauthenticated`]. The specific reason is logged, never
//! returned, so the response cannot be used as an oracle for guessing
//! usernames or secrets.

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::caller::{classify_caller, CallerIdentity, Principal, UsernamePolicy};
use crate::domain::errors::ProxyError;
use crate::domain::identity::{Credentials, IdentityStore};

/// Extract Basic credentials from request headers.
pub fn parse_basic_auth(headers: &HeaderMap) -> Option<Credentials> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, secret) = decoded.split_once(':')?;
    Some(Credentials::new(username, secret))
}

pub struct IdentityValidator {
    store: Arc<dyn IdentityStore>,
    policy: UsernamePolicy,
}

impl IdentityValidator {
    pub fn new(store: Arc<dyn IdentityStore>, policy: UsernamePolicy) -> Self {
        Self { store, policy }
    }

    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<CallerIdentity, ProxyError> {
        let Some(credentials) = parse_basic_auth(headers) else {
            debug!("Request without usable Basic credentials");
            return Err(ProxyError::Unauthenticated);
        };

        let Some(principal) = self.policy.principal_for(&credentials.username) else {
            warn!(username = %credentials.username, "Rejected unrecognised username shape");
            return Err(ProxyError::Unauthenticated);
        };

        if let Err(e) = self.store.verify_credentials(&credentials).await {
            warn!(username = %credentials.username, error = %e, "Credential validation failed");
            return Err(ProxyError::Unauthenticated);
        }

        let stored_kind = match principal {
            Principal::Admin => None,
            Principal::Agent(run_id) => match self.store.agent_kind(run_id).await {
                Ok(kind) => kind,
                Err(e) => {
                    warn!(run_id = %run_id, error = %e, "Agent kind lookup failed");
                    return Err(ProxyError::Unauthenticated);
                }
            },
        };

        classify_caller(principal, stored_kind.as_deref()).map_err(|e| {
            warn!(username = %credentials.username, error = %e, "Caller classification failed");
            ProxyError::Unauthenticated
        })
    }
}
