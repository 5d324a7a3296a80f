// Copyright (c) 2026 Props Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # HTTP Surface
//!
//! `/health` is answered directly. Every other path goes to
//! [`RegistryProxyService::handle`]; its errors are rendered as distribution
//! error bodies:
//!
//! ```json
//! {"errors":[{"code":"DENIED","message":"forbidden: ..."}]}
//! ```

use axum::extract::{Request, State};
use axum::http::header::{HeaderValue, WWW_AUTHENTICATE};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::application::registry_proxy::RegistryProxyService;
use crate::domain::errors::ProxyError;

pub struct AppState {
    pub proxy: Arc<RegistryProxyService>,
    /// Pre-rendered `WWW-Authenticate` challenge
    pub challenge: HeaderValue,
}

pub fn app(proxy: Arc<RegistryProxyService>, realm: &str) -> Router {
    let challenge = HeaderValue::from_str(&format!("Basic realm=\"{}\"", realm))
        .unwrap_or_else(|_| HeaderValue::from_static("Basic realm=\"registry-proxy\""));
    let state = Arc::new(AppState { proxy, challenge });

    Router::new()
        .route("/health", get(health))
        .fallback(proxy_request)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn proxy_request(State(state): State<Arc<AppState>>, request: Request) -> Response {
    match state.proxy.handle(request).await {
        Ok(response) => response,
        Err(e) => error_response(&e, &state.challenge),
    }
}

pub fn error_response(error: &ProxyError, challenge: &HeaderValue) -> Response {
    let body = json!({
        "errors": [{ "code": error.code(), "message": error.to_string() }]
    });
    let mut response = (error.status(), Json(body)).into_response();
    if matches!(error, ProxyError::Unauthenticated) {
        response.headers_mut().insert(WWW_AUTHENTICATE, challenge.clone());
    }
    response
}

