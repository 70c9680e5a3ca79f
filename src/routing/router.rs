//! Operation lookup.
//!
//! # Responsibilities
//! - Compile every contract operation into a path template
//! - Resolve (method, path) to exactly one operation
//! - Report every unresolved request as not found, whatever the method
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Templates with more literal segments are tried first
//! - HEAD falls back to the GET operation of the same path
//! - Explicit errors rather than silent defaults

use std::sync::Arc;

use axum::http::Method;
use thiserror::Error;

use crate::contract::document::{ContractDocument, Operation};
use crate::contract::DocumentError;
use crate::routing::matcher::{PathParams, PathTemplate};

/// Why a request did not resolve to an operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("no route matches {0}")]
    NotFound(String),
}

/// A successfully resolved request.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub operation: Arc<Operation>,
    pub path_params: PathParams,
    pub base_path: String,
}

#[derive(Debug)]
struct CompiledRoute {
    template: PathTemplate,
    operation: Arc<Operation>,
}

/// Maps requests under one or more base paths to contract operations.
#[derive(Debug)]
pub struct OperationRouter {
    base_paths: Vec<String>,
    routes: Vec<CompiledRoute>,
}

impl OperationRouter {
    /// Build a router serving every operation of `document` under each base path.
    ///
    /// Base paths are normalized to a leading slash without a trailing one and
    /// deduplicated, longest first.
    pub fn new(document: &ContractDocument, base_paths: Vec<String>) -> Result<Self, DocumentError> {
        let mut normalized: Vec<String> = base_paths
            .into_iter()
            .map(|p| format!("/{}", p.trim_matches('/')))
            .map(|p| if p == "/" { String::new() } else { p })
            .collect();
        normalized.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        normalized.dedup();
        if normalized.is_empty() {
            return Err(DocumentError::Routing("no base paths configured".to_string()));
        }

        let mut routes = Vec::with_capacity(document.operations().len());
        for operation in document.operations() {
            let template =
                PathTemplate::parse(&operation.path).map_err(|e| DocumentError::InvalidPath {
                    path: operation.path.clone(),
                    reason: e.to_string(),
                })?;
            routes.push(CompiledRoute {
                template,
                operation: Arc::clone(operation),
            });
        }
        routes.sort_by(|a, b| {
            b.template
                .literal_count()
                .cmp(&a.template.literal_count())
                .then_with(|| a.template.as_str().cmp(b.template.as_str()))
        });

        Ok(Self {
            base_paths: normalized,
            routes,
        })
    }

    /// Normalized base paths, longest first.
    pub fn base_paths(&self) -> &[String] {
        &self.base_paths
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    pub fn find_route(&self, method: &Method, path: &str) -> Result<RouteMatch, RouteError> {
        let Some((base_path, rest)) = self.split_base(path) else {
            return Err(RouteError::NotFound(path.to_string()));
        };

        let mut head_fallback = None;
        for route in &self.routes {
            let Some(params) = route.template.match_path(rest) else {
                continue;
            };
            if route.operation.method == *method {
                return Ok(self.matched(route, params, base_path));
            }
            if *method == Method::HEAD && route.operation.method == Method::GET && head_fallback.is_none() {
                head_fallback = Some((route, params));
            }
        }

        if let Some((route, params)) = head_fallback {
            return Ok(self.matched(route, params, base_path));
        }
        Err(RouteError::NotFound(path.to_string()))
    }

    fn matched(&self, route: &CompiledRoute, path_params: PathParams, base_path: &str) -> RouteMatch {
        RouteMatch {
            operation: Arc::clone(&route.operation),
            path_params,
            base_path: base_path.to_string(),
        }
    }

    fn split_base<'a>(&'a self, path: &'a str) -> Option<(&'a str, &'a str)> {
        self.base_paths.iter().find_map(|base| {
            let rest = path.strip_prefix(base.as_str())?;
            rest.starts_with('/').then_some((base.as_str(), rest))
        })
    }
}
