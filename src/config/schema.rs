//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::validation::options::{self, ValidationOption};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Mount points of the API groups.
    pub routing: RoutingConfig,

    /// Interface contract source.
    pub contract: ContractConfig,

    /// Optional validation rules.
    pub validation: ValidationConfig,

    /// Allow-list and distribution catalog.
    pub access: AccessConfig,

    /// Request limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8086").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8086".to_string(),
        }
    }
}

/// Where the API groups are mounted: `/{path_prefix}/{app_name}/v{version}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub path_prefix: String,
    pub app_name: String,
}

impl RoutingConfig {
    /// The route prefix shared by both API groups, e.g. `/api/image-builder`.
    pub fn route_prefix(&self) -> String {
        format!("/{}/{}", self.path_prefix, self.app_name)
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            path_prefix: "api".to_string(),
            app_name: "image-builder".to_string(),
        }
    }
}

/// Interface contract source.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ContractConfig {
    /// Path to an OpenAPI document. The bundled document is used when unset.
    pub document_path: Option<String>,
}

/// Optional validation rules, expressed positively.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub schema_format_validation: bool,
    pub schema_pattern_validation: bool,
    pub schema_defaults_validation: bool,
    pub examples_validation: bool,
    pub examples_as_request: bool,
    pub examples_as_response: bool,
}

impl ValidationConfig {
    /// Mutators for every flag that deviates from the defaults.
    ///
    /// A default section yields no mutators, so no bundle gets attached.
    pub fn options(&self) -> Vec<ValidationOption> {
        let mut opts: Vec<ValidationOption> = Vec::new();
        if self.schema_format_validation {
            opts.push(options::enable_schema_format_validation());
        }
        if !self.schema_pattern_validation {
            opts.push(options::disable_schema_pattern_validation());
        }
        if !self.schema_defaults_validation {
            opts.push(options::disable_schema_defaults_validation());
        }
        if !self.examples_validation {
            opts.push(options::disable_examples_validation());
        }
        if self.examples_as_request {
            opts.push(options::validate_examples_as_request());
        }
        if self.examples_as_response {
            opts.push(options::validate_examples_as_response());
        }
        opts
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            schema_format_validation: false,
            schema_pattern_validation: true,
            schema_defaults_validation: true,
            examples_validation: true,
            examples_as_request: false,
            examples_as_response: false,
        }
    }
}

/// Allow-list and distribution catalog sources.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AccessConfig {
    /// JSON allow-list file. An unset path means an empty allow-list.
    pub allow_file: Option<String>,

    /// Directory holding one JSON file per distribution.
    pub distributions_dir: String,

    /// Reload the allow-list file when it changes on disk.
    pub watch_allow_file: bool,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            allow_file: None,
            distributions_dir: "distributions".to_string(),
            watch_allow_file: false,
        }
    }
}

/// Request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_size: 1024 * 1024, // 1MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,

    /// Serve Prometheus metrics on `/metrics`.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
        }
    }
}
