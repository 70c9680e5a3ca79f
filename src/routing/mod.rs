//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → router.rs (strip base path, try templates by specificity)
//!     → matcher.rs (segment match, extract path params)
//!     → Return: RouteMatch or NotFound
//!
//! Route Compilation (at startup):
//!     ContractDocument operations
//!     → Parse path templates
//!     → Sort by literal segment count
//!     → Freeze as immutable OperationRouter
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path
//! - Deterministic: same input always matches same route

pub mod matcher;
pub mod router;

pub use matcher::{PathParams, PathTemplate};
pub use router::{OperationRouter, RouteError, RouteMatch};
