// Copyright (c) 2026 Props Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Upstream registry port. The HTTP implementation lives in
//! `crate::infrastructure::upstream`.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use bytes::Bytes;

use crate::domain::errors::ProxyError;
use crate::domain::reference::Digest;
use crate::domain::repository_name::RepositoryName;

#[async_trait]
pub trait UpstreamRegistry: Send + Sync {
    /// Relay an already-authorized request and stream the response back.
    ///
    /// Upstream HTTP responses are returned whatever their status. Only
    /// transport failures become errors.
    async fn forward(&self, request: Request<Body>) -> Result<Response<Body>, ProxyError>;

    /// Fetch a small blob (an image config) for inspection. `Ok(None)` if the
    /// upstream does not have it.
    async fn fetch_blob(
        &self,
        repository: RepositoryName,
        digest: &Digest,
    ) -> Result<Option<Bytes>, ProxyError>;
}
