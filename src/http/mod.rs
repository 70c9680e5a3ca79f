//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID, span, JSON body)
//!     → security::identity (x-rh-identity → Identity)
//!     → admission.rs (route, validate, resolve identity)
//!     → handlers.rs (operations, probes, metrics)
//!     → error.rs (single error envelope on any failure)
//! ```

pub mod admission;
pub mod error;
pub mod handlers;
pub mod request;
pub mod server;

pub use error::{ApiError, HttpError, HttpErrorList};
pub use request::X_REQUEST_ID;
pub use server::{AppState, GatewayServer};
