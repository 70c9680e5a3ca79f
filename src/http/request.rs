//! Request identification and body handling.
//!
//! # Responsibilities
//! - Tag every request with an `x-request-id` (UUID v4 unless supplied)
//! - Open a tracing span per request carrying that id
//! - Read JSON request bodies under a size limit
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Content-Length checked before the body is read
//! - Media type checked before any parsing is attempted

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, Request},
};
use serde_json::Value;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::Span;

use crate::http::error::ApiError;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid)
}

pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(X_REQUEST_ID)
}

/// The request id assigned by [`set_request_id_layer`].
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Span for `TraceLayer::make_span_with`.
pub fn request_span(req: &Request<Body>) -> Span {
    tracing::info_span!(
        "request",
        request_id = %request_id(req.headers()),
        method = %req.method(),
        path = %req.uri().path(),
    )
}

/// The only accepted request body media type, compared verbatim.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Read and parse a JSON body.
///
/// The request must carry exactly one `Content-Type` header whose value is
/// `application/json`, without parameters. Anything else is 415.
pub async fn read_json_body(headers: &HeaderMap, body: Body, limit: usize) -> Result<Value, ApiError> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > limit) {
        return Err(ApiError::PayloadTooLarge(limit));
    }

    let mut content_types = headers.get_all(header::CONTENT_TYPE).iter();
    match (content_types.next(), content_types.next()) {
        (Some(ct), None) if ct.as_bytes() == JSON_CONTENT_TYPE.as_bytes() => {}
        _ => return Err(ApiError::UnsupportedMediaType),
    }

    let bytes = axum::body::to_bytes(body, limit)
        .await
        .map_err(|e| ApiError::MalformedBody(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::MalformedBody(e.to_string()))
}
