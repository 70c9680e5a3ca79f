//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → identity.rs (decode x-rh-identity, attach Identity, refuse associates)
//!     → validation, handler
//!     → access_control.rs (entitlement tier, restricted flag, allow-list)
//!         → allow_list.rs (org → distribution patterns)
//!
//! Out of band:
//!     reload.rs (file change) → SharedAllowList::replace
//! ```
//!
//! # Design Decisions
//! - Fail closed: a missing identity never reaches a handler
//! - Registries are injected, shared read-only, swapped whole on reload
//! - Forbidden stays distinct from not-found

pub mod access_control;
pub mod allow_list;
pub mod identity;
pub mod reload;

pub use access_control::{AccessError, DistroAccessGate};
pub use allow_list::{AllowList, AllowListError, AllowListSource, SharedAllowList};
pub use identity::{Identity, IdentityError};
