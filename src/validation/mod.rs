//! Request validation subsystem.
//!
//! # Data Flow
//! ```text
//! RouteMatch (operation + path params) + query + headers + JSON body
//!     → options.rs (ValidationOptions resolved from the ValidationScope)
//!     → validator.rs (coerce parameters, look up compiled schemas)
//!     → schema.rs (normalize OpenAPI schema, compile, check access modes)
//!     → Return: ValidatedRequest or ValidationFailure
//! ```
//!
//! # Design Decisions
//! - Options are passed explicitly into every validation call
//! - All violations are collected, not just the first
//! - Compiled schemas are shared read-only across requests

pub mod options;
pub mod schema;
pub mod validator;

use std::fmt;

pub use options::{ValidationOption, ValidationOptions, ValidationScope};
pub use validator::{RequestInput, RequestValidationError, RequestValidator, ValidatedRequest};

/// A single schema violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Where the offending value sits, e.g. `body/image_requests/0` or `query.limit`.
    pub location: String,
    pub message: String,
}

impl Violation {
    pub fn new(location: &str, message: impl Into<String>) -> Self {
        Self {
            location: location.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

/// A well-formed request that the schema does not permit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    violations: Vec<Violation>,
}

impl ValidationFailure {
    pub fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request validation failed: ")?;
        for (i, v) in self.violations.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationFailure {}
