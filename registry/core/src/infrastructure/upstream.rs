// Copyright (c) 2026 Props Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # HTTP Upstream Registry
//!
//! Relays authorized requests to the backing registry over plain HTTP and
//! streams bodies in both directions.
//!
//! - Request: path and query are kept; `Host`, `Authorization` and hop-by-hop
//!   headers are dropped.
//! - Response: status, headers and body are relayed verbatim whatever the
//!   status; hop-by-hop headers are dropped and a `Location` pointing at the
//!   upstream base URL is rewritten to a relative path.
//! - Redirects are returned to the client, never followed.
//!
//! `timeout` bounds the wait for response headers once the request body has
//! been sent. While a body is still uploading and while a response is
//! streaming, only the per-chunk idle limit applies, so large blobs are not
//! cut off.

use anyhow::Context;
use async_trait::async_trait;
use axum::body::{Body, HttpBody};
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::{Request, Response, StatusCode, Uri};
use bytes::{Bytes, BytesMut};
use futures::stream::{self, Stream, StreamExt};
use reqwest::Client;
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::domain::errors::ProxyError;
use crate::domain::proxy_config::UpstreamConfig;
use crate::domain::reference::Digest;
use crate::domain::repository_name::RepositoryName;
use crate::domain::upstream::UpstreamRegistry;

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UploadState {
    Streaming,
    Finished,
    Stalled,
}

pub struct HttpUpstreamRegistry {
    client: Client,
    /// Base URL without a trailing slash (e.g. "http://props-registry:5000")
    base_url: String,
    timeout: Duration,
    read_timeout: Duration,
    inspect_timeout: Duration,
    max_blob_bytes: usize,
}

impl HttpUpstreamRegistry {
    pub fn new(config: &UpstreamConfig) -> anyhow::Result<Self> {
        let parsed = url::Url::parse(&config.url)
            .with_context(|| format!("Invalid upstream registry URL '{}'", config.url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            anyhow::bail!(
                "Upstream registry URL must be http or https, got '{}'",
                parsed.scheme()
            );
        }

        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(config.connect_timeout())
            .read_timeout(config.read_timeout())
            .build()
            .context("Failed to create upstream HTTP client")?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            timeout: config.timeout(),
            read_timeout: config.read_timeout(),
            inspect_timeout: config.inspect_timeout(),
            max_blob_bytes: config.max_manifest_bytes,
        })
    }

    fn build_url(&self, uri: &Uri) -> String {
        let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        format!("{}{}", self.base_url, path)
    }

    /// Turn an absolute upstream `Location` into a path the client can
    /// resolve against the proxy.
    fn rewrite_location(&self, value: &HeaderValue) -> Option<HeaderValue> {
        let location = value.to_str().ok()?;
        let rest = location.strip_prefix(self.base_url.as_str())?;
        let relative = if rest.starts_with('/') {
            rest.to_string()
        } else {
            format!("/{}", rest)
        };
        HeaderValue::from_str(&relative).ok()
    }

    fn response_headers(&self, upstream: &HeaderMap) -> HeaderMap {
        let mut headers = strip_hop_by_hop(upstream);
        if let Some(location) = headers.get(header::LOCATION) {
            if let Some(rewritten) = self.rewrite_location(location) {
                headers.insert(header::LOCATION, rewritten);
            }
        }
        headers
    }

    /// Wait for the upstream response.
    ///
    /// No deadline applies while the request body is still streaming; the
    /// idle limit in [`idle_bounded`] covers that phase. The header timeout
    /// starts once the body is done.
    async fn await_response<F>(
        &self,
        send: F,
        mut upload: watch::Receiver<UploadState>,
    ) -> Result<reqwest::Response, ProxyError>
    where
        F: Future<Output = reqwest::Result<reqwest::Response>>,
    {
        tokio::pin!(send);

        while *upload.borrow_and_update() == UploadState::Streaming {
            tokio::select! {
                result = &mut send => return sent(result, &upload),
                changed = upload.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        match tokio::time::timeout(self.timeout, &mut send).await {
            Ok(result) => sent(result, &upload),
            Err(_) => Err(ProxyError::UpstreamTimeout),
        }
    }

    async fn fetch_verified(
        &self,
        url: &str,
        digest: &Digest,
    ) -> Result<Option<Bytes>, ProxyError> {
        let mut response = self.client.get(url).send().await.map_err(transport_error)?;
        match response.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            status if !status.is_success() => {
                return Err(ProxyError::UpstreamFailure(format!(
                    "blob fetch returned {}",
                    status
                )))
            }
            _ => {}
        }

        let limit = self.max_blob_bytes;
        if response.content_length().is_some_and(|len| len > limit as u64) {
            debug!(digest = %digest, limit, "Blob exceeds inspection limit, skipping");
            return Ok(None);
        }

        let mut blob = BytesMut::new();
        while let Some(chunk) = response.chunk().await.map_err(transport_error)? {
            if blob.len() + chunk.len() > limit {
                debug!(digest = %digest, limit, "Blob exceeds inspection limit, skipping");
                return Ok(None);
            }
            blob.extend_from_slice(&chunk);
        }

        let blob = blob.freeze();
        if !digest.matches(&blob) {
            return Err(ProxyError::UpstreamFailure(format!(
                "blob content does not match {}",
                digest
            )));
        }
        Ok(Some(blob))
    }
}

fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let mut filtered = headers.clone();
    for name in HOP_BY_HOP.iter() {
        filtered.remove(name);
    }
    filtered
}

fn transport_error(e: reqwest::Error) -> ProxyError {
    if e.is_timeout() {
        ProxyError::UpstreamTimeout
    } else {
        ProxyError::UpstreamFailure(e.to_string())
    }
}

fn sent(
    result: reqwest::Result<reqwest::Response>,
    upload: &watch::Receiver<UploadState>,
) -> Result<reqwest::Response, ProxyError> {
    result.map_err(|e| {
        if *upload.borrow() == UploadState::Stalled {
            ProxyError::UpstreamTimeout
        } else {
            transport_error(e)
        }
    })
}

/// Stream a request body to the upstream, failing once no chunk arrives
/// within `idle`. The final state is published on `state`.
fn idle_bounded(
    body: Body,
    idle: Duration,
    state: watch::Sender<UploadState>,
) -> impl Stream<Item = Result<Bytes, io::Error>> + Send + 'static {
    let chunks = body.into_data_stream();
    stream::unfold(Some((chunks, state)), move |upload| async move {
        let (mut chunks, state) = match upload {
            Some(upload) => upload,
            None => return None,
        };
        match tokio::time::timeout(idle, chunks.next()).await {
            Ok(Some(Ok(chunk))) => Some((Ok(chunk), Some((chunks, state)))),
            Ok(Some(Err(e))) => Some((Err(io::Error::other(e)), None)),
            Ok(None) => {
                state.send_replace(UploadState::Finished);
                None
            }
            Err(_) => {
                state.send_replace(UploadState::Stalled);
                let stalled = io::Error::new(io::ErrorKind::TimedOut, "request body stalled");
                Some((Err(stalled), None))
            }
        }
    })
}

#[async_trait]
impl UpstreamRegistry for HttpUpstreamRegistry {
    async fn forward(&self, request: Request<Body>) -> Result<Response<Body>, ProxyError> {
        let (parts, body) = request.into_parts();
        let url = self.build_url(&parts.uri);

        let mut headers = strip_hop_by_hop(&parts.headers);
        headers.remove(header::HOST);
        headers.remove(header::AUTHORIZATION);

        let (upload_tx, upload_rx) = watch::channel(UploadState::Finished);
        let mut builder = self.client.request(parts.method.clone(), &url).headers(headers);
        if body.size_hint().exact() != Some(0) {
            upload_tx.send_replace(UploadState::Streaming);
            let chunks = idle_bounded(body, self.read_timeout, upload_tx);
            builder = builder.body(reqwest::Body::wrap_stream(chunks));
        }

        debug!(method = %parts.method, url = %url, "Forwarding to upstream registry");
        let upstream = self
            .await_response(builder.send(), upload_rx)
            .await
            .inspect_err(|e| {
                warn!(
                    method = %parts.method,
                    url = %url,
                    error = %e,
                    "Upstream registry request failed"
                )
            })?;

        let status = upstream.status();
        let headers = self.response_headers(upstream.headers());
        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }

    async fn fetch_blob(
        &self,
        repository: RepositoryName,
        digest: &Digest,
    ) -> Result<Option<Bytes>, ProxyError> {
        let url = format!("{}/v2/{}/blobs/{}", self.base_url, repository, digest);
        tokio::time::timeout(self.inspect_timeout, self.fetch_verified(&url, digest))
            .await
            .map_err(|_| ProxyError::UpstreamTimeout)?
    }
}
