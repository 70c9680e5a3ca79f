//! Distribution catalog.
//!
//! # Data Flow
//! ```text
//! access.distributions_dir/*.json
//!     → registry.rs (parse, index by name)
//!     → AllDistroRegistry (full catalog)
//!     → available(entitled) → DistroRegistry (full or unrestricted subset)
//! ```
//!
//! # Design Decisions
//! - Loaded once at startup, shared read-only behind `Arc`
//! - Unrestricted subset is precomputed so lookups never filter per request

pub mod registry;

pub use registry::{
    AllDistroRegistry, ArchitectureInfo, DistributionError, DistributionFile, DistributionItem,
    DistroRegistry,
};
