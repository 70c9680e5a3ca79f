//! Error envelope.
//!
//! Every failure raised while admitting or serving a request ends up here
//! as an [`ApiError`] and is written once as
//! `{"errors": [{"title": "<status>", "detail": "<message>"}]}`.
//!
//! # Design Decisions
//! - Each variant carries its own status and message; no downcasting
//! - [`ApiError::Wrapped`] adds context without hiding the inner status
//! - Server errors are logged in full; callers get a generic detail for
//!   failures that are not already phrased for them
//! - HEAD responses carry the status only

use axum::{
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::compose::ComposeError;
use crate::observability::metrics;
use crate::routing::RouteError;
use crate::security::{AccessError, IdentityError};
use crate::validation::{RequestValidationError, ValidationFailure};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unsupported media type")]
    UnsupportedMediaType,

    #[error("malformed request body: {0}")]
    MalformedBody(String),

    #[error(transparent)]
    SchemaValidation(ValidationFailure),

    #[error("no route for {0}")]
    RouteNotFound(String),

    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("identity missing in request handler")]
    MissingIdentity,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("distribution not available")]
    DistroNotFound,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("{status}: {message}")]
    Http { status: StatusCode, message: String },

    #[error("{context}: {source}")]
    Wrapped {
        context: String,
        source: Box<ApiError>,
    },
}

impl ApiError {
    /// Attach context while keeping the status and detail of `self`.
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Wrapped {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, past any number of [`ApiError::Wrapped`] layers.
    pub fn root(&self) -> &ApiError {
        let mut current = self;
        while let Self::Wrapped { source, .. } = current {
            current = source;
        }
        current
    }

    pub fn status(&self) -> StatusCode {
        match self.root() {
            Self::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::MalformedBody(_) | Self::SchemaValidation(_) => StatusCode::BAD_REQUEST,
            Self::RouteNotFound(_) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::InvalidIdentity(_) | Self::DistroNotFound => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::MissingIdentity | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Http { status, .. } => *status,
            Self::Wrapped { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message shown to the caller.
    pub fn detail(&self) -> String {
        match self.root() {
            Self::UnsupportedMediaType => "request must be json-encoded".to_string(),
            Self::MalformedBody(e) => format!("cannot parse request body: {e}"),
            Self::SchemaValidation(failure) => failure.to_string(),
            Self::RouteNotFound(_) => "Not Found".to_string(),
            Self::MethodNotAllowed(_) => "Method Not Allowed".to_string(),
            Self::PayloadTooLarge(limit) => format!("request body exceeds {limit} bytes"),
            Self::Unauthenticated(m)
            | Self::InvalidIdentity(m)
            | Self::Forbidden(m)
            | Self::NotFound(m) => m.clone(),
            Self::MissingIdentity => "Identity Header missing in request handler".to_string(),
            Self::DistroNotFound => "Distribution not available".to_string(),
            Self::Internal(_) | Self::Wrapped { .. } => "Internal Server Error".to_string(),
            Self::Http { message, .. } => message.clone(),
        }
    }
}

/// A single entry of the error envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpError {
    pub title: String,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpErrorList {
    pub errors: Vec<HttpError>,
}

impl HttpErrorList {
    pub fn single(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            errors: vec![HttpError {
                title: status.as_u16().to_string(),
                detail: detail.into(),
            }],
        }
    }
}

fn is_internal(status: StatusCode) -> bool {
    (500..=511).contains(&status.as_u16())
}

/// Turn `err` into the one response written for this request.
pub fn respond(method: &Method, path: &str, err: ApiError) -> Response {
    let status = err.status();
    let detail = err.detail();

    if is_internal(status) {
        tracing::error!(
            status = status.as_u16(),
            method = %method,
            path = %path,
            error = %err,
            "internal error"
        );
        if path.ends_with("/compose") {
            metrics::record_compose_error();
        }
    } else {
        match err.root() {
            ApiError::MalformedBody(e) => {
                tracing::info!(method = %method, path = %path, error = %e, "request body is not valid JSON")
            }
            ApiError::SchemaValidation(failure) => tracing::info!(
                method = %method,
                path = %path,
                violations = failure.violations().len(),
                error = %failure,
                "request rejected by schema"
            ),
            _ => tracing::debug!(status = status.as_u16(), path = %path, error = %err, "request rejected"),
        }
    }

    if *method == Method::HEAD {
        return status.into_response();
    }
    (status, Json(HttpErrorList::single(status, detail))).into_response()
}

impl From<RouteError> for ApiError {
    fn from(err: RouteError) -> Self {
        match err {
            RouteError::NotFound(path) => Self::RouteNotFound(path),
        }
    }
}

impl From<RequestValidationError> for ApiError {
    fn from(err: RequestValidationError) -> Self {
        match err {
            RequestValidationError::Invalid(failure) => Self::SchemaValidation(failure),
            e @ RequestValidationError::Compile { .. } => Self::Internal(e.to_string()),
        }
    }
}

impl From<AccessError> for ApiError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::NotFound => Self::DistroNotFound,
            e @ AccessError::Forbidden(_) => Self::Forbidden(e.to_string()),
            AccessError::AllowList(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Missing => Self::Unauthenticated(err.to_string()),
            other => Self::InvalidIdentity(other.to_string()),
        }
    }
}

impl From<ComposeError> for ApiError {
    fn from(err: ComposeError) -> Self {
        match err {
            ComposeError::NotFound(id) => Self::NotFound(format!("Compose {id} not found")),
            ComposeError::Unavailable(_) => Self::Internal(err.to_string()),
        }
    }
}
