//! Startup orchestration.
//!
//! # Responsibilities
//! - Load the contract, distributions and allow-list
//! - Initialize metrics and the compose backend
//! - Assemble the shared application state
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently

use std::path::Path;
use std::sync::Arc;

use notify::RecommendedWatcher;
use thiserror::Error;

use crate::compose::{ComposeBackend, MemoryComposeBackend};
use crate::config::GatewayConfig;
use crate::contract::{ContractDocument, DocumentError};
use crate::distribution::{AllDistroRegistry, DistributionError};
use crate::http::AppState;
use crate::observability::metrics::init_metrics;
use crate::security::allow_list::{AllowList, AllowListError, AllowListSource, SharedAllowList};
use crate::security::reload::AllowListWatcher;
use crate::security::DistroAccessGate;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("interface contract: {0}")]
    Contract(#[from] DocumentError),

    #[error("distributions: {0}")]
    Distributions(#[from] DistributionError),

    #[error("allow-list: {0}")]
    AllowList(#[from] AllowListError),

    #[error("allow-list watcher: {0}")]
    Watcher(#[from] notify::Error),

    #[error("metrics: {0}")]
    Metrics(String),
}

/// Everything `main` needs to serve.
pub struct Started {
    pub state: AppState,
    pub allow_list: Arc<SharedAllowList>,
    /// Keeps the allow-list watcher alive while present.
    pub watcher: Option<RecommendedWatcher>,
}

/// Build the application state from a validated configuration.
pub fn build_state(config: &GatewayConfig) -> Result<Started, StartupError> {
    let document = match &config.contract.document_path {
        Some(path) => ContractDocument::from_path(Path::new(path))?,
        None => ContractDocument::bundled()?,
    };

    let distros = AllDistroRegistry::load_dir(Path::new(&config.access.distributions_dir))?;

    let allow_path = config.access.allow_file.as_deref().map(Path::new);
    let allow_list = Arc::new(SharedAllowList::new(AllowList::load(allow_path)?));
    let watcher = match allow_path {
        Some(path) if config.access.watch_allow_file => {
            Some(AllowListWatcher::new(path, Arc::clone(&allow_list)).run()?)
        }
        _ => None,
    };

    let metrics = if config.observability.metrics_enabled {
        Some(init_metrics().map_err(StartupError::Metrics)?)
    } else {
        None
    };

    let source: Arc<dyn AllowListSource> = allow_list.clone();
    let gate = DistroAccessGate::new(Arc::new(distros), source);
    let compose: Arc<dyn ComposeBackend> = Arc::new(MemoryComposeBackend::new());

    let state = AppState::assemble(document, gate, compose, config, metrics)?;
    Ok(Started {
        state,
        allow_list,
        watcher,
    })
}
