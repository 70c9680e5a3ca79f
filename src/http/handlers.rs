//! Operation handlers.
//!
//! Handlers run after admission: the request has been routed, validated and
//! carries a resolved identity. They stay thin; builds happen behind
//! [`ComposeBackend`](crate::compose::ComposeBackend).

use axum::{
    extract::State,
    http::{header, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::contract::document::Operation;
use crate::http::error::{respond, ApiError};
use crate::http::server::AppState;
use crate::security::Identity;
use crate::validation::ValidatedRequest;

#[derive(Debug, Serialize)]
struct DistributionSummary<'a> {
    name: &'a str,
    description: &'a str,
}

#[derive(Debug, Serialize)]
struct ArchitectureSummary<'a> {
    arch: &'a str,
    image_types: &'a [String],
}

/// Run the handler for `operation`.
pub async fn dispatch(
    state: &AppState,
    operation: &Operation,
    identity: &Identity,
    req: ValidatedRequest,
) -> Result<Response, ApiError> {
    match operation.operation_id.as_str() {
        "getVersion" => Ok(version(state)),
        "getReadiness" => Ok(readiness()),
        "getOpenapiJson" => Ok(Json(state.document.as_json().clone()).into_response()),
        "getDistributions" => distributions(state, identity),
        "getArchitectures" => architectures(state, identity, &req),
        "composeImage" => compose(state, identity, req).await,
        "getComposes" => composes(state, identity, &req).await,
        "getComposeStatus" => compose_status(state, identity, &req).await,
        other => Err(ApiError::Http {
            status: StatusCode::NOT_IMPLEMENTED,
            message: format!("operation {other} is not implemented"),
        }),
    }
}

fn version(state: &AppState) -> Response {
    Json(json!({ "version": state.document.version() })).into_response()
}

fn readiness() -> Response {
    Json(json!({ "readiness": "ready" })).into_response()
}

fn distributions(state: &AppState, identity: &Identity) -> Result<Response, ApiError> {
    let permitted = state.gate.permitted(identity)?;
    let body: Vec<DistributionSummary<'_>> = permitted
        .iter()
        .map(|d| DistributionSummary {
            name: d.name(),
            description: &d.distribution.description,
        })
        .collect();
    Ok(Json(body).into_response())
}

fn architectures(
    state: &AppState,
    identity: &Identity,
    req: &ValidatedRequest,
) -> Result<Response, ApiError> {
    let name = req
        .path
        .get("distribution")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let distro = state.gate.authorize(identity, name)?;
    let body: Vec<ArchitectureSummary<'_>> = distro
        .architectures
        .iter()
        .map(|(arch, info)| ArchitectureSummary {
            arch,
            image_types: &info.image_types,
        })
        .collect();
    Ok(Json(body).into_response())
}

async fn compose(
    state: &AppState,
    identity: &Identity,
    req: ValidatedRequest,
) -> Result<Response, ApiError> {
    let body = req.body.unwrap_or(Value::Null);
    let name = body
        .get("distribution")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let distro = state
        .gate
        .authorize(identity, name)
        .map_err(|e| ApiError::from(e).context("authorizing compose"))?;

    let requests = body
        .get("image_requests")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for image_request in requests {
        let arch = image_request
            .get("architecture")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let image_type = image_request
            .get("image_type")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let Some(info) = distro.architectures.get(arch) else {
            return Err(bad_request(format!(
                "Architecture {arch} is not available for {}",
                distro.name()
            )));
        };
        if !info.image_types.iter().any(|t| t == image_type) {
            return Err(bad_request(format!(
                "Image type {image_type} is not available for {} on {arch}",
                distro.name()
            )));
        }
    }

    let id = state
        .compose
        .submit(identity.org_id(), body)
        .await
        .map_err(|e| ApiError::from(e).context("submitting compose"))?;
    tracing::info!(compose_id = %id, org_id = %identity.org_id(), distribution = %distro.name(), "compose submitted");

    Ok((StatusCode::CREATED, Json(json!({ "id": id }))).into_response())
}

async fn composes(
    state: &AppState,
    identity: &Identity,
    req: &ValidatedRequest,
) -> Result<Response, ApiError> {
    let limit = query_usize(req, "limit", 100);
    let offset = query_usize(req, "offset", 0);
    let ignore: Vec<String> = req
        .query
        .get("ignoreImageTypes")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();

    let page = state
        .compose
        .list(identity.org_id(), limit, offset, &ignore)
        .await?;
    let data: Vec<Value> = page
        .data
        .iter()
        .map(|e| {
            let mut item = json!({
                "id": e.id,
                "created_at": e.created_at.to_rfc3339(),
                "request": e.request,
            });
            if let Some(name) = &e.image_name {
                item["image_name"] = json!(name);
            }
            item
        })
        .collect();
    Ok(Json(json!({ "meta": { "count": page.count }, "data": data })).into_response())
}

async fn compose_status(
    state: &AppState,
    identity: &Identity,
    req: &ValidatedRequest,
) -> Result<Response, ApiError> {
    let raw = req
        .path
        .get("composeId")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let id = Uuid::parse_str(raw)
        .map_err(|e| bad_request(format!("Invalid format for parameter composeId: {e}")))?;
    let entry = state.compose.status(identity.org_id(), id).await?;
    Ok(Json(json!({ "id": entry.id, "status": entry.status, "request": entry.request })).into_response())
}

fn query_usize(req: &ValidatedRequest, name: &str, default: usize) -> usize {
    req.query
        .get(name)
        .and_then(Value::as_u64)
        .and_then(|v| usize::try_from(v).ok())
        .unwrap_or(default)
}

fn bad_request(message: String) -> ApiError {
    ApiError::Http {
        status: StatusCode::BAD_REQUEST,
        message,
    }
}

/// `GET /status`, the liveness probe.
pub async fn status(State(state): State<AppState>) -> Response {
    version(&state)
}

/// `GET /ready`, the readiness probe.
pub async fn ready() -> Response {
    readiness()
}

/// `GET /metrics` in Prometheus text format.
pub async fn metrics(State(state): State<AppState>, method: Method, uri: Uri) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => respond(&method, uri.path(), ApiError::RouteNotFound(uri.path().to_string())),
    }
}

pub async fn not_found(method: Method, uri: Uri) -> Response {
    respond(&method, uri.path(), ApiError::RouteNotFound(uri.path().to_string()))
}

pub async fn method_not_allowed(method: Method, uri: Uri) -> Response {
    let err = ApiError::MethodNotAllowed(format!("{method} {}", uri.path()));
    respond(&method, uri.path(), err)
}
