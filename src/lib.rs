//! Image builder API gateway.
//!
//! The request-admission layer of an image-building service: every inbound
//! request is routed and validated against the OpenAPI contract, carries a
//! caller identity, and passes an entitlement and allow-list gate before a
//! handler runs.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──▶ request id + trace span + metrics
//!     ──▶ security::identity      (x-rh-identity → Identity)
//!     ──▶ routing                 (method + path → Operation)
//!     ──▶ validation              (ValidationScope, schemas)
//!     ──▶ http::handlers          (operations)
//!            └─▶ security::access_control (distribution gate)
//!            └─▶ compose          (ComposeBackend)
//!     ◀── http::error             (single error envelope)
//! ```

// Core subsystems
pub mod config;
pub mod contract;
pub mod http;
pub mod routing;
pub mod validation;

// Domain
pub mod compose;
pub mod distribution;
pub mod security;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::schema::GatewayConfig;
pub use http::{ApiError, GatewayServer};
pub use lifecycle::Shutdown;
