//! Caller identity.
//!
//! The `x-rh-identity` header is verified by the platform gateway before a
//! request reaches this service. This module only decodes the trusted
//! payload (base64 of a JSON document) and hands the result to handlers via
//! request extensions.

use std::collections::BTreeMap;

use axum::{
    body::Body,
    http::{Extensions, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::http::error::{respond, ApiError};

pub const IDENTITY_HEADER: &str = "x-rh-identity";

/// `identity.type` of Red Hat staff identities.
pub const ASSOCIATE_TYPE: &str = "Associate";

/// Decoded identity header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub identity: IdentityInfo,
    #[serde(default)]
    pub entitlements: BTreeMap<String, Entitlement>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,
    /// `User`, `System`, `Associate`, ...
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub identity_type: Option<String>,
    #[serde(default)]
    pub internal: Internal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Internal {
    #[serde(default)]
    pub org_id: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlement {
    #[serde(default)]
    pub is_entitled: bool,
}

impl Identity {
    /// Identity for `org_id` with an optional account number and no entitlements.
    pub fn new(org_id: impl Into<String>, account_number: Option<&str>) -> Self {
        Self {
            identity: IdentityInfo {
                account_number: account_number.map(str::to_string),
                identity_type: None,
                internal: Internal {
                    org_id: org_id.into(),
                },
            },
            entitlements: BTreeMap::new(),
        }
    }

    pub fn with_entitlement(mut self, feature: &str, is_entitled: bool) -> Self {
        self.entitlements
            .insert(feature.to_string(), Entitlement { is_entitled });
        self
    }

    pub fn with_type(mut self, identity_type: &str) -> Self {
        self.identity.identity_type = Some(identity_type.to_string());
        self
    }

    pub fn identity_type(&self) -> Option<&str> {
        self.identity.identity_type.as_deref()
    }

    pub fn is_associate(&self) -> bool {
        self.identity_type() == Some(ASSOCIATE_TYPE)
    }

    pub fn org_id(&self) -> &str {
        &self.identity.internal.org_id
    }

    pub fn account_number(&self) -> Option<&str> {
        self.identity.account_number.as_deref()
    }

    pub fn entitlement(&self, feature: &str) -> Option<Entitlement> {
        self.entitlements.get(feature).copied()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("missing x-rh-identity header")]
    Missing,

    #[error("x-rh-identity header is not valid base64: {0}")]
    Encoding(String),

    #[error("x-rh-identity header is not a valid identity document: {0}")]
    Json(String),

    #[error("identity has no org_id")]
    MissingOrgId,
}

pub fn decode_identity_header(value: &str) -> Result<Identity, IdentityError> {
    let bytes = STANDARD
        .decode(value.trim())
        .map_err(|e| IdentityError::Encoding(e.to_string()))?;
    let identity: Identity =
        serde_json::from_slice(&bytes).map_err(|e| IdentityError::Json(e.to_string()))?;
    if identity.org_id().is_empty() {
        return Err(IdentityError::MissingOrgId);
    }
    Ok(identity)
}

/// Encode an identity the way the platform gateway does. Used by clients and tests.
pub fn encode_identity_header(identity: &Identity) -> Result<String, serde_json::Error> {
    Ok(STANDARD.encode(serde_json::to_vec(identity)?))
}

pub fn identity_from_headers(headers: &HeaderMap) -> Result<Identity, IdentityError> {
    let value = headers
        .get(IDENTITY_HEADER)
        .ok_or(IdentityError::Missing)?
        .to_str()
        .map_err(|e| IdentityError::Encoding(e.to_string()))?;
    decode_identity_header(value)
}

/// Decode the identity header and attach the result to the request.
pub async fn extract_identity(mut req: Request<Body>, next: Next) -> Response {
    match identity_from_headers(req.headers()) {
        Ok(identity) => {
            debug!(org_id = %identity.org_id(), "identity resolved");
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        Err(e) => respond(req.method(), req.uri().path(), ApiError::from(e)),
    }
}

/// Refuse associate identities. Runs after [`extract_identity`].
///
/// Associates answer as an unknown account so the API does not reveal that
/// the identity was recognized.
pub async fn reject_associates(req: Request<Body>, next: Next) -> Response {
    let identity = match resolve_identity(req.extensions()) {
        Ok(identity) => identity,
        Err(e) => return respond(req.method(), req.uri().path(), e),
    };
    if identity.is_associate() {
        debug!(org_id = %identity.org_id(), "associate identity refused");
        let err = ApiError::NotFound("Account not found".to_string());
        return respond(req.method(), req.uri().path(), err);
    }
    next.run(req).await
}

/// The identity attached by [`extract_identity`].
///
/// Absence means the extraction stage was bypassed, which is a deployment
/// fault rather than a client error.
pub fn resolve_identity(extensions: &Extensions) -> Result<&Identity, ApiError> {
    extensions.get::<Identity>().ok_or(ApiError::MissingIdentity)
}
