//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceExt;

use image_builder_gateway::compose::{ComposeBackend, MemoryComposeBackend};
use image_builder_gateway::contract::ContractDocument;
use image_builder_gateway::distribution::AllDistroRegistry;
use image_builder_gateway::http::{AppState, GatewayServer, HttpErrorList};
use image_builder_gateway::security::identity::{encode_identity_header, Identity, IDENTITY_HEADER};
use image_builder_gateway::security::{AllowList, AllowListSource, DistroAccessGate, SharedAllowList};
use image_builder_gateway::GatewayConfig;

pub const V1: &str = "/api/image-builder/v1";
pub const V1_0: &str = "/api/image-builder/v1.0";

pub struct TestApp {
    pub router: Router,
    pub allow_list: Arc<SharedAllowList>,
}

pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.access.distributions_dir = concat!(env!("CARGO_MANIFEST_DIR"), "/distributions").to_string();
    config
}

pub fn allow_list(entries: &[(&str, &str)]) -> AllowList {
    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    for (org, pattern) in entries {
        map.entry(org.to_string()).or_default().push(pattern.to_string());
    }
    AllowList::from_map(map)
}

pub fn state_with(
    config: &GatewayConfig,
    compose: Arc<dyn ComposeBackend>,
    allow: &[(&str, &str)],
    metrics: Option<PrometheusHandle>,
) -> (AppState, Arc<SharedAllowList>) {
    let document = ContractDocument::bundled().unwrap();
    let distros = AllDistroRegistry::load_dir(std::path::Path::new(&config.access.distributions_dir)).unwrap();
    let shared = Arc::new(SharedAllowList::new(allow_list(allow)));
    let source: Arc<dyn AllowListSource> = shared.clone();
    let gate = DistroAccessGate::new(Arc::new(distros), source);
    let state = AppState::assemble(document, gate, compose, config, metrics).unwrap();
    (state, shared)
}

pub fn app_with(config: &GatewayConfig, compose: Arc<dyn ComposeBackend>, allow: &[(&str, &str)]) -> TestApp {
    let (state, allow_list) = state_with(config, compose, allow, None);
    TestApp {
        router: GatewayServer::new(state).router(),
        allow_list,
    }
}

pub fn app(allow: &[(&str, &str)]) -> TestApp {
    app_with(&test_config(), Arc::new(MemoryComposeBackend::new()), allow)
}

/// Encoded identity header. `entitled: None` leaves out the `rhel` entitlement.
pub fn identity(org_id: &str, account_number: Option<&str>, entitled: Option<bool>) -> String {
    let mut id = Identity::new(org_id, account_number);
    if let Some(e) = entitled {
        id = id.with_entitlement("rhel", e);
    }
    encode_identity_header(&id).unwrap()
}

pub fn associate(org_id: &str) -> String {
    let id = Identity::new(org_id, Some("000001"))
        .with_type("Associate")
        .with_entitlement("rhel", true);
    encode_identity_header(&id).unwrap()
}

pub fn entitled(org_id: &str) -> String {
    identity(org_id, Some("000001"), Some(true))
}

pub fn get(uri: &str, identity: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(id) = identity {
        builder = builder.header(IDENTITY_HEADER, id);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, identity: &str, content_type: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(IDENTITY_HEADER, identity)
        .header(header::CONTENT_TYPE, content_type)
        .body(body.into())
        .unwrap()
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    /// The single error of an error envelope.
    pub fn error(&self) -> (String, String) {
        let list: HttpErrorList = serde_json::from_slice(&self.body).unwrap();
        assert_eq!(list.errors.len(), 1, "envelope must carry exactly one error");
        let e = &list.errors[0];
        (e.title.clone(), e.detail.clone())
    }
}

pub async fn send(router: &Router, req: Request<Body>) -> TestResponse {
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    TestResponse { status, headers, body }
}

pub fn compose_body(distribution: &str) -> String {
    serde_json::json!({
        "distribution": distribution,
        "image_name": "my-image",
        "image_requests": [{ "architecture": "x86_64", "image_type": "guest-image" }]
    })
    .to_string()
}
