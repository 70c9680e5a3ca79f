//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from an optional TOML file, apply environment
/// overrides and validate the result.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => GatewayConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply environment overrides on top of file values.
///
/// `lookup` is injected so tests do not have to mutate the process environment.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("PATH_PREFIX") {
        config.routing.path_prefix = v;
    }
    if let Some(v) = lookup("APP_NAME") {
        config.routing.app_name = v;
    }
    if let Some(v) = lookup("LISTEN_ADDRESS") {
        config.listener.bind_address = v;
    }
    if let Some(v) = lookup("ALLOW_FILE") {
        config.access.allow_file = Some(v).filter(|v| !v.is_empty());
    }
    if let Some(v) = lookup("DISTRIBUTIONS_DIR") {
        config.access.distributions_dir = v;
    }
    if let Some(v) = lookup("OPENAPI_DOCUMENT") {
        config.contract.document_path = Some(v).filter(|v| !v.is_empty());
    }
}
