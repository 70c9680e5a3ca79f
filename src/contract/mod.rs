//! Interface contract subsystem.
//!
//! # Data Flow
//! ```text
//! api/openapi.yaml (embedded) or contract.document_path
//!     → document.rs (parse, resolve parameter refs, structural checks)
//!     → checks.rs (defaults and examples, governed by ValidationOptions)
//!     → ContractDocument (immutable, shared via Arc)
//!     → routing::router + validation::validator
//! ```
//!
//! # Design Decisions
//! - A malformed document is a startup error, never a per-request error
//! - Only local (`#/...`) references are supported
//! - OpenAPI 3.0 schemas compile as draft 4, 3.1 as draft 2020-12

pub mod checks;
pub mod document;

use thiserror::Error;

pub use checks::check_examples_and_defaults;
pub use document::{ContractDocument, Operation, Parameter, ParameterLocation, SchemaDialect};

/// Reasons an OpenAPI document is rejected.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to read OpenAPI document {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse OpenAPI document: {0}")]
    Parse(String),

    #[error("unsupported OpenAPI version '{0}', expected 3.x")]
    UnsupportedVersion(String),

    #[error("info.version is missing")]
    MissingVersion,

    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("invalid parameter on '{path}': {reason}")]
    InvalidParameter { path: String, reason: String },

    #[error("invalid request body on {operation_id}: {reason}")]
    InvalidRequestBody { operation_id: String, reason: String },

    #[error("{method} {path} has no operationId")]
    MissingOperationId { method: String, path: String },

    #[error("duplicate operationId '{0}'")]
    DuplicateOperationId(String),

    #[error("{operation_id}: path parameter '{name}' is not declared")]
    UndeclaredPathParameter { operation_id: String, name: String },

    #[error("{operation_id}: path parameter '{name}' does not appear in the path")]
    UnusedPathParameter { operation_id: String, name: String },

    #[error("unresolved reference {0}")]
    UnresolvedRef(String),

    #[error("external reference {reference} at {at} is not supported")]
    ExternalRef { reference: String, at: String },

    #[error("schema at {site} is invalid: {reason}")]
    InvalidSchema { site: String, reason: String },

    #[error("default value at {site} does not match its schema: {details}")]
    InvalidDefault { site: String, details: String },

    #[error("example at {site} does not match its schema: {details}")]
    InvalidExample { site: String, details: String },

    #[error("no routes could be built: {0}")]
    Routing(String),
}
