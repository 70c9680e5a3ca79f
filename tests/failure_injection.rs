//! Failure injection: broken collaborators must surface as one generic 500.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use common::*;
use serde_json::Value;
use uuid::Uuid;

use image_builder_gateway::compose::{ComposeBackend, ComposeEntry, ComposeError, ComposePage};
use image_builder_gateway::http::GatewayServer;
use image_builder_gateway::observability::metrics::{init_metrics, COMPOSE_ERRORS};

/// A backend whose every call fails.
#[derive(Debug)]
struct UnavailableBackend;

#[async_trait]
impl ComposeBackend for UnavailableBackend {
    async fn submit(&self, _org_id: &str, _request: Value) -> Result<Uuid, ComposeError> {
        Err(ComposeError::Unavailable("connection refused (10.0.0.7:8080)".to_string()))
    }

    async fn list(
        &self,
        _org_id: &str,
        _limit: usize,
        _offset: usize,
        _ignore: &[String],
    ) -> Result<ComposePage, ComposeError> {
        Err(ComposeError::Unavailable("connection refused (10.0.0.7:8080)".to_string()))
    }

    async fn status(&self, _org_id: &str, _id: Uuid) -> Result<ComposeEntry, ComposeError> {
        Err(ComposeError::Unavailable("connection refused (10.0.0.7:8080)".to_string()))
    }
}

fn compose_error_count(text: &str) -> u64 {
    text.lines()
        .filter(|l| l.starts_with(COMPOSE_ERRORS))
        .filter_map(|l| l.rsplit(' ').next())
        .filter_map(|v| v.parse::<f64>().ok())
        .map(|v| v as u64)
        .sum()
}

#[tokio::test]
async fn test_backend_failure_is_generic_500_and_counted() {
    let handle = init_metrics().unwrap();
    let (state, _) = state_with(&test_config(), Arc::new(UnavailableBackend), &[], Some(handle.clone()));
    let router = GatewayServer::new(state).router();
    let id = entitled("000001");

    let before = compose_error_count(&handle.render());
    let resp = send(
        &router,
        post_json(&format!("{V1}/compose"), &id, "application/json", compose_body("rhel-9")),
    )
    .await;
    assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
    let (title, detail) = resp.error();
    assert_eq!(title, "500");
    assert_eq!(detail, "Internal Server Error");
    assert!(!detail.contains("10.0.0.7"));
    assert_eq!(compose_error_count(&handle.render()), before + 1);

    // Server errors elsewhere do not count as compose errors.
    let resp = send(&router, get(&format!("{V1}/composes"), Some(&id))).await;
    assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(compose_error_count(&handle.render()), before + 1);

    // The exposition endpoint serves the same registry.
    let resp = send(&router, get("/metrics", None)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(String::from_utf8_lossy(&resp.body).contains(COMPOSE_ERRORS));
}

#[tokio::test]
async fn test_broken_allow_list_pattern_is_internal_error() {
    let app = app(&[("000001", "rhel-(10")]);
    let resp = send(
        &app.router,
        get(&format!("{V1}/architectures/rhel-10-nightly"), Some(&entitled("000001"))),
    )
    .await;
    assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.error().1, "Internal Server Error");

    // Unrestricted distributions never consult the allow-list.
    let resp = send(
        &app.router,
        get(&format!("{V1}/architectures/rhel-9"), Some(&entitled("000001"))),
    )
    .await;
    assert_eq!(resp.status, StatusCode::OK);
}

#[tokio::test]
async fn test_broken_pattern_for_other_org_is_ignored() {
    let app = app(&[("000002", "rhel-(10")]);
    let resp = send(
        &app.router,
        get(&format!("{V1}/architectures/rhel-10-nightly"), Some(&entitled("000001"))),
    )
    .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_head_server_error_has_no_body() {
    let (state, _) = state_with(&test_config(), Arc::new(UnavailableBackend), &[], None);
    let router = GatewayServer::new(state).router();
    let req = axum::http::Request::builder()
        .method("HEAD")
        .uri(format!("{V1}/composes"))
        .header(image_builder_gateway::security::identity::IDENTITY_HEADER, entitled("000001"))
        .body(axum::body::Body::empty())
        .unwrap();
    let resp = send(&router, req).await;
    assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(resp.body.is_empty());
}
