// Copyright (c) 2026 Props Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for the registry proxy router
//!
//! These tests drive the full Axum router with:
//! 1. `StaticIdentityStore` standing in for PostgreSQL logins and `agent_runs`
//! 2. `InMemoryAuditRepository` standing in for `registry_push_audit`
//! 3. A mockito server standing in for the upstream registry
//!
//! Upstream mocks created with `.expect(0)` prove a request was stopped at the
//! proxy.

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, Response, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use mockito::{Matcher, ServerGuard};
use registry_proxy_core::application::RegistryProxyService;
use registry_proxy_core::domain::caller::{AgentKind, CallerIdentity, RunId, UsernamePolicy};
use registry_proxy_core::domain::proxy_config::UpstreamConfig;
use registry_proxy_core::domain::reference::Digest;
use registry_proxy_core::domain::repository::AuditRepository;
use registry_proxy_core::domain::repository_name::RepositoryName;
use registry_proxy_core::infrastructure::identity::StaticIdentityStore;
use registry_proxy_core::infrastructure::repositories::InMemoryAuditRepository;
use registry_proxy_core::infrastructure::upstream::HttpUpstreamRegistry;
use registry_proxy_core::presentation::api::app;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const MANIFEST_TYPE: &str = "application/vnd.oci.image.manifest.v1+json";

struct Harness {
    router: Router,
    audit: Arc<InMemoryAuditRepository>,
    upstream: ServerGuard,
    optimizer_run: RunId,
    optimizer: String,
    improvement: String,
    critic: String,
    grader: String,
}

async fn harness() -> Harness {
    let upstream = mockito::Server::new_async().await;
    harness_with_upstream(upstream.url(), upstream).await
}

async fn harness_with_upstream(url: String, upstream: ServerGuard) -> Harness {
    harness_with_config(UpstreamConfig { url, ..UpstreamConfig::default() }, upstream).await
}

async fn harness_with_config(config: UpstreamConfig, upstream: ServerGuard) -> Harness {
    let optimizer_run = RunId::new();
    let improvement_run = RunId::new();
    let critic_run = RunId::new();
    let grader_run = RunId::new();
    let store = StaticIdentityStore::new()
        .with_user("postgres", "admin-secret")
        .with_agent(optimizer_run, "agent-secret", "prompt_optimizer")
        .with_agent(improvement_run, "agent-secret", "improvement")
        .with_agent(critic_run, "agent-secret", "critic")
        .with_agent(grader_run, "agent-secret", "grader");

    let audit = Arc::new(InMemoryAuditRepository::new());
    let registry = HttpUpstreamRegistry::new(&config).unwrap();
    let service = RegistryProxyService::new(
        Arc::new(store),
        audit.clone(),
        Arc::new(registry),
        UsernamePolicy::default(),
        4 * 1024 * 1024,
    );

    Harness {
        router: app(Arc::new(service), "registry-proxy"),
        audit,
        upstream,
        optimizer_run,
        optimizer: format!("agent_{}", optimizer_run),
        improvement: format!("agent_{}", improvement_run),
        critic: format!("agent_{}", critic_run),
        grader: format!("agent_{}", grader_run),
    }
}

fn basic(user: &str, secret: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", user, secret)))
}

fn agent_request(method: Method, uri: &str, user: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, basic(user, "agent-secret"))
        .header(header::CONTENT_TYPE, MANIFEST_TYPE)
        .body(body.into())
        .unwrap()
}

fn admin_request(method: Method, uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, basic("postgres", "admin-secret"))
        .header(header::CONTENT_TYPE, MANIFEST_TYPE)
        .body(body.into())
        .unwrap()
}

async fn send(h: &Harness, request: Request<Body>) -> Response<Body> {
    h.router.clone().oneshot(request).await.unwrap()
}

async fn error_code(response: Response<Body>) -> String {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value: Value = serde_json::from_slice(&body).unwrap();
    value["errors"][0]["code"].as_str().unwrap().to_string()
}

fn manifest(marker: &str) -> String {
    json!({
        "schemaVersion": 2,
        "mediaType": MANIFEST_TYPE,
        "layers": [],
        "annotations": { "marker": marker }
    })
    .to_string()
}

#[tokio::test]
async fn test_non_publishing_agents_cannot_push_manifests() {
    let mut h = harness().await;
    let never = h.upstream.mock("PUT", Matcher::Any).expect(0).create_async().await;

    let body = manifest("critic");
    let digest = Digest::sha256(body.as_bytes());
    for user in [h.critic.clone(), h.grader.clone()] {
        for uri in [
            format!("/v2/critic/manifests/{}", digest),
            "/v2/critic/manifests/latest".to_string(),
        ] {
            let response = send(&h, agent_request(Method::PUT, &uri, &user, body.clone())).await;
            assert_eq!(response.status(), StatusCode::FORBIDDEN);
            assert_eq!(error_code(response).await, "DENIED");
        }
    }

    assert!(h.audit.is_empty());
    never.assert_async().await;
}

#[tokio::test]
async fn test_publishing_agent_pushes_by_digest_only() {
    let mut h = harness().await;
    let body = manifest("optimizer");
    let digest = Digest::sha256(body.as_bytes());

    let tag_push = h
        .upstream
        .mock("PUT", "/v2/critic/manifests/latest")
        .expect(0)
        .create_async()
        .await;
    let digest_push = h
        .upstream
        .mock("PUT", format!("/v2/critic/manifests/{}", digest).as_str())
        .match_body(Matcher::Exact(body.clone()))
        .with_status(201)
        .with_header("Docker-Content-Digest", &digest.to_string())
        .expect(1)
        .create_async()
        .await;

    let response = send(
        &h,
        agent_request(Method::PUT, "/v2/critic/manifests/latest", &h.optimizer, body.clone()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(h.audit.is_empty());

    let uri = format!("/v2/critic/manifests/{}", digest);
    let response = send(&h, agent_request(Method::PUT, &uri, &h.optimizer, body)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.headers()["docker-content-digest"], digest.to_string().as_str());

    let record = h
        .audit
        .find(RepositoryName::for_kind(AgentKind::Critic), &digest)
        .await
        .unwrap()
        .expect("push should be recorded");
    assert_eq!(
        record.caller,
        CallerIdentity::Agent { run_id: h.optimizer_run, kind: AgentKind::PromptOptimizer }
    );
    assert_eq!(h.audit.len(), 1);

    tag_push.assert_async().await;
    digest_push.assert_async().await;
}

#[tokio::test]
async fn test_improvement_agent_pushes_by_digest() {
    let mut h = harness().await;
    let body = manifest("improvement");
    let digest = Digest::sha256(body.as_bytes());
    let uri = format!("/v2/grader/manifests/{}", digest);
    let _push = h.upstream.mock("PUT", uri.as_str()).with_status(201).create_async().await;

    let response = send(&h, agent_request(Method::PUT, &uri, &h.improvement, body)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(h.audit.len(), 1);
}

#[tokio::test]
async fn test_admin_pushes_by_tag_and_digest() {
    let mut h = harness().await;
    let tagged = manifest("tagged");
    let pinned = manifest("pinned");
    let pinned_digest = Digest::sha256(pinned.as_bytes());
    let pinned_uri = format!("/v2/grader/manifests/{}", pinned_digest);

    let _tag_push = h
        .upstream
        .mock("PUT", "/v2/grader/manifests/v1")
        .with_status(201)
        .create_async()
        .await;
    let _digest_push = h
        .upstream
        .mock("PUT", pinned_uri.as_str())
        .with_status(201)
        .create_async()
        .await;

    let response = send(
        &h,
        admin_request(Method::PUT, "/v2/grader/manifests/v1", tagged.clone()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let response = send(&h, admin_request(Method::PUT, &pinned_uri, pinned)).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let repo = RepositoryName::for_kind(AgentKind::Grader);
    let tag_record = h
        .audit
        .find(repo, &Digest::sha256(tagged.as_bytes()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tag_record.tag.as_deref(), Some("v1"));
    assert_eq!(tag_record.caller, CallerIdentity::Admin);
    assert!(h.audit.find(repo, &pinned_digest).await.unwrap().is_some());
}

#[tokio::test]
async fn test_delete_never_reaches_upstream() {
    let mut h = harness().await;
    let never = h.upstream.mock("DELETE", Matcher::Any).expect(0).create_async().await;

    let digest = Digest::sha256(b"anything");
    for uri in [
        format!("/v2/critic/manifests/{}", digest),
        format!("/v2/critic/blobs/{}", digest),
        "/v2/critic/manifests/latest".to_string(),
    ] {
        for request in [
            admin_request(Method::DELETE, &uri, Body::empty()),
            agent_request(Method::DELETE, &uri, &h.optimizer, Body::empty()),
        ] {
            let response = send(&h, request).await;
            assert_eq!(response.status(), StatusCode::FORBIDDEN);
        }
    }
    never.assert_async().await;
}

#[tokio::test]
async fn test_repeat_push_is_idempotent() {
    let mut h = harness().await;
    let body = manifest("repeat");
    let digest = Digest::sha256(body.as_bytes());
    let uri = format!("/v2/improvement/manifests/{}", digest);
    let push = h
        .upstream
        .mock("PUT", uri.as_str())
        .with_status(201)
        .expect(2)
        .create_async()
        .await;

    for _ in 0..2 {
        let response = send(&h, agent_request(Method::PUT, &uri, &h.optimizer, body.clone())).await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }
    assert_eq!(h.audit.len(), 1);
    push.assert_async().await;
}

#[tokio::test]
async fn test_authentication_failures_are_indistinguishable() {
    let mut h = harness().await;
    let never = h.upstream.mock("GET", Matcher::Any).expect(0).create_async().await;
    let uri = "/v2/critic/manifests/latest";

    let requests = [
        Request::get(uri).body(Body::empty()).unwrap(),
        Request::get(uri)
            .header(header::AUTHORIZATION, basic("postgres", "wrong"))
            .body(Body::empty())
            .unwrap(),
        Request::get(uri)
            .header(header::AUTHORIZATION, basic("mallory", "admin-secret"))
            .body(Body::empty())
            .unwrap(),
        Request::get(uri)
            .header(
                header::AUTHORIZATION,
                basic(&format!("agent_{}", RunId::new()), "agent-secret"),
            )
            .body(Body::empty())
            .unwrap(),
        Request::get(uri)
            .header(header::AUTHORIZATION, "Bearer token")
            .body(Body::empty())
            .unwrap(),
    ];

    let mut bodies = Vec::new();
    for request in requests {
        let response = send(&h, request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()[header::WWW_AUTHENTICATE],
            "Basic realm=\"registry-proxy\""
        );
        bodies.push(to_bytes(response.into_body(), usize::MAX).await.unwrap());
    }
    assert!(bodies.windows(2).all(|pair| pair[0] == pair[1]));
    never.assert_async().await;
}

#[tokio::test]
async fn test_critic_read_denied_optimizer_publish_then_read() {
    let mut h = harness().await;
    let body = manifest("e2e");
    let digest = Digest::sha256(body.as_bytes());
    let uri = format!("/v2/prompt-optimizer/manifests/{}", digest);

    let critic_read = h
        .upstream
        .mock("GET", "/v2/critic/manifests/latest")
        .expect(0)
        .create_async()
        .await;
    let _push = h
        .upstream
        .mock("PUT", uri.as_str())
        .match_body(Matcher::Exact(body.clone()))
        .with_status(201)
        .create_async()
        .await;
    let _read = h
        .upstream
        .mock("GET", uri.as_str())
        .with_status(200)
        .with_header("content-type", MANIFEST_TYPE)
        .with_body(body.clone())
        .create_async()
        .await;

    let response = send(
        &h,
        agent_request(Method::GET, "/v2/critic/manifests/latest", &h.critic, Body::empty()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(&h, agent_request(Method::PUT, &uri, &h.optimizer, body.clone())).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(h.audit.len(), 1);
    assert!(h
        .audit
        .find(RepositoryName::for_kind(AgentKind::PromptOptimizer), &digest)
        .await
        .unwrap()
        .is_some());

    let response = send(&h, agent_request(Method::GET, &uri, &h.optimizer, Body::empty())).await;
    assert_eq!(response.status(), StatusCode::OK);
    let fetched = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(fetched, body.as_bytes());
    critic_read.assert_async().await;
}

#[tokio::test]
async fn test_base_digest_recorded_from_config_label() {
    let mut h = harness().await;
    let config = json!({
        "config": { "Labels": { "org.opencontainers.image.base.digest": "sha256:parent" } }
    })
    .to_string();
    let config_digest = Digest::sha256(config.as_bytes());
    let body = json!({
        "schemaVersion": 2,
        "config": {
            "mediaType": "application/vnd.oci.image.config.v1+json",
            "digest": config_digest.to_string(),
            "size": config.len()
        },
        "layers": []
    })
    .to_string();
    let digest = Digest::sha256(body.as_bytes());
    let uri = format!("/v2/critic/manifests/{}", digest);

    let _config = h
        .upstream
        .mock("GET", format!("/v2/critic/blobs/{}", config_digest).as_str())
        .with_status(200)
        .with_body(config)
        .create_async()
        .await;
    let _push = h.upstream.mock("PUT", uri.as_str()).with_status(201).create_async().await;

    let response = send(&h, agent_request(Method::PUT, &uri, &h.optimizer, body)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let record = h
        .audit
        .find(RepositoryName::for_kind(AgentKind::Critic), &digest)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.base_digest.as_deref(), Some("sha256:parent"));
}

#[tokio::test]
async fn test_upstream_errors_relayed_verbatim() {
    let mut h = harness().await;
    let missing = r#"{"errors":[{"code":"MANIFEST_UNKNOWN","message":"manifest unknown"}]}"#;
    let _missing = h
        .upstream
        .mock("GET", "/v2/critic/manifests/nope")
        .with_status(404)
        .with_header("content-type", "application/json")
        .with_body(missing)
        .create_async()
        .await;

    let response = send(
        &h,
        admin_request(Method::GET, "/v2/critic/manifests/nope", Body::empty()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(body, missing.as_bytes());
}

#[tokio::test]
async fn test_upload_location_rewritten_to_proxy_path() {
    let mut h = harness().await;
    let absolute = format!("{}/v2/improvement/blobs/uploads/abc?_state=xyz", h.upstream.url());
    let _start = h
        .upstream
        .mock("POST", "/v2/improvement/blobs/uploads/")
        .with_status(202)
        .with_header("location", &absolute)
        .create_async()
        .await;

    let response = send(
        &h,
        agent_request(Method::POST, "/v2/improvement/blobs/uploads/", &h.optimizer, Body::empty()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(
        response.headers()[header::LOCATION],
        "/v2/improvement/blobs/uploads/abc?_state=xyz"
    );
}

#[tokio::test]
async fn test_local_rejections() {
    let mut h = harness().await;
    let never_put = h.upstream.mock("PUT", Matcher::Any).expect(0).create_async().await;
    let never_post = h.upstream.mock("POST", Matcher::Any).expect(0).create_async().await;

    let response = send(
        &h,
        agent_request(
            Method::PUT,
            "/v2/improvement/blobs/uploads/abc?digest=md5:abc",
            &h.optimizer,
            Body::empty(),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(response).await, "DIGEST_INVALID");

    let response = send(
        &h,
        agent_request(Method::POST, "/v2/janitor/blobs/uploads/", &h.optimizer, Body::empty()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(error_code(response).await, "NAME_UNKNOWN");

    let body = manifest("mismatch");
    let wrong = Digest::sha256(b"other content");
    let uri = format!("/v2/critic/manifests/{}", wrong);
    let response = send(&h, agent_request(Method::PUT, &uri, &h.optimizer, body)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(h.audit.is_empty());

    never_put.assert_async().await;
    never_post.assert_async().await;
}

#[tokio::test]
async fn test_unreachable_upstream_is_bad_gateway() {
    let placeholder = mockito::Server::new_async().await;
    let h = harness_with_upstream("http://127.0.0.1:1".to_string(), placeholder).await;

    let response = send(
        &h,
        admin_request(Method::GET, "/v2/critic/tags/list", Body::empty()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(error_code(response).await, "UPSTREAM_UNAVAILABLE");
}

/// Accepts connections and never answers.
async fn silent_upstream() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_stalled_upstream_is_gateway_timeout() {
    let placeholder = mockito::Server::new_async().await;
    let config = UpstreamConfig {
        url: silent_upstream().await,
        timeout_seconds: 1,
        ..UpstreamConfig::default()
    };
    let h = harness_with_config(config, placeholder).await;

    let response = send(
        &h,
        admin_request(Method::GET, "/v2/critic/tags/list", Body::empty()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(error_code(response).await, "UPSTREAM_TIMEOUT");

    // The audit row written before a timed-out forward stays in place.
    let body = manifest("stalled");
    let uri = format!("/v2/critic/manifests/{}", Digest::sha256(body.as_bytes()));
    let response = send(&h, admin_request(Method::PUT, &uri, body)).await;
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(h.audit.len(), 1);
}

#[tokio::test]
async fn test_health_and_version_check() {
    let h = harness().await;

    let response = send(&h, Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body, json!({ "status": "ok" }));

    let response = send(&h, agent_request(Method::GET, "/v2/", &h.critic, Body::empty())).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["docker-distribution-api-version"], "registry/2.0");

    let response = send(&h, Request::get("/v2/").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
