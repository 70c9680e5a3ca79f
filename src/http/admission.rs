//! Request admission for contract operations.
//!
//! # Data Flow
//! ```text
//! {base}/{*path} (identity attached, associates already refused)
//!     → OperationRouter::find_route      404
//!     → read_json_body                    413 / 415 / 400
//!     → ValidationScope → RequestValidator 400
//!     → resolve_identity                  500 when the extraction stage was skipped
//!     → handlers::dispatch               403 / 400 / 404 / 201 / 200
//! ```
//! Any error short-circuits to `error::respond`, which writes the only response.

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request},
    response::Response,
};

use crate::http::error::{respond, ApiError};
use crate::http::handlers;
use crate::http::request::read_json_body;
use crate::http::server::AppState;
use crate::security::identity::resolve_identity;
use crate::validation::{RequestInput, ValidationScope};

/// Catch-all handler mounted under every base path.
pub async fn api_handler(State(state): State<AppState>, req: Request<Body>) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match admit(&state, req).await {
        Ok(response) if method == Method::HEAD => {
            let (parts, _) = response.into_parts();
            Response::from_parts(parts, Body::empty())
        }
        Ok(response) => response,
        Err(err) => respond(&method, &path, err),
    }
}

async fn admit(state: &AppState, req: Request<Body>) -> Result<Response, ApiError> {
    let route = state.router.find_route(req.method(), req.uri().path())?;
    let operation = route.operation;

    let (parts, body) = req.into_parts();
    let body = if operation.request_body.is_some() {
        Some(read_json_body(&parts.headers, body, state.max_body_size).await?)
    } else {
        None
    };

    let scope = ValidationScope::new().with_validation_options(&state.validation_options);
    let input = RequestInput {
        path_params: &route.path_params,
        query: parts.uri.query(),
        headers: &parts.headers,
        body: body.as_ref(),
    };
    let validated = state
        .validator
        .validate(&operation, &input, &scope.validation_options())?;

    let identity = resolve_identity(&parts.extensions)?;
    tracing::debug!(
        operation_id = %operation.operation_id,
        org_id = %identity.org_id(),
        "request admitted"
    );

    handlers::dispatch(state, &operation, identity, validated).await
}
