//! Compose submission seam.
//!
//! Image builds happen in an external composer service. Handlers talk to it
//! only through [`ComposeBackend`], so deployments can plug in a real client
//! while tests and standalone runs use [`MemoryComposeBackend`].

pub mod backend;

pub use backend::{
    ComposeBackend, ComposeEntry, ComposeError, ComposePage, ComposeState, MemoryComposeBackend,
};
