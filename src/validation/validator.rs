//! Request validation against a matched operation.
//!
//! # Responsibilities
//! - Coerce path, query and header values to their declared schema types
//! - Check required parameters and bodies are present
//! - Validate every value and the JSON body against its schema
//! - Reject `readOnly` properties in request bodies
//!
//! # Design Decisions
//! - Compiled validators are cached per schema site and compile flags
//! - Default-flag validators are compiled at construction so a broken
//!   schema fails startup rather than a request
//! - Absent query parameters with a schema `default` are filled in

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::http::HeaderMap;
use dashmap::DashMap;
use jsonschema::Validator;
use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::contract::document::{ContractDocument, Operation, Parameter, ParameterLocation};
use crate::contract::DocumentError;
use crate::routing::matcher::PathParams;
use crate::validation::options::ValidationOptions;
use crate::validation::schema::{collect_violations, CompileFlags, Direction, SchemaCompiler};
use crate::validation::{ValidationFailure, Violation};

/// Everything from the request that takes part in validation.
#[derive(Debug, Clone, Copy)]
pub struct RequestInput<'a> {
    pub path_params: &'a PathParams,
    pub query: Option<&'a str>,
    pub headers: &'a HeaderMap,
    pub body: Option<&'a Value>,
}

/// Parameters and body after coercion and validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedRequest {
    pub path: Map<String, Value>,
    pub query: Map<String, Value>,
    pub headers: Map<String, Value>,
    pub body: Option<Value>,
}

#[derive(Debug, Error)]
pub enum RequestValidationError {
    /// The request does not satisfy the operation's schemas.
    #[error(transparent)]
    Invalid(#[from] ValidationFailure),

    /// A schema could not be compiled for the requested flags.
    #[error("schema at {site} could not be compiled: {reason}")]
    Compile { site: String, reason: String },
}

pub struct RequestValidator {
    compiler: SchemaCompiler,
    cache: DashMap<(String, CompileFlags), Arc<Validator>>,
}

impl std::fmt::Debug for RequestValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestValidator")
            .field("compiled", &self.cache.len())
            .finish()
    }
}

impl RequestValidator {
    /// Build a validator and compile every schema of `document` with default flags.
    pub fn new(document: &ContractDocument) -> Result<Self, DocumentError> {
        let validator = Self {
            compiler: SchemaCompiler::new(document.dialect(), document.raw()),
            cache: DashMap::new(),
        };

        let flags = CompileFlags::default();
        for op in document.operations() {
            for param in &op.parameters {
                let site = param_site(op, param);
                validator
                    .compiled(&site, &param.schema, flags)
                    .map_err(|reason| DocumentError::InvalidSchema { site, reason })?;
            }
            if let Some(schema) = body_schema(op) {
                let site = body_site(op);
                validator
                    .compiled(&site, schema, flags)
                    .map_err(|reason| DocumentError::InvalidSchema { site, reason })?;
            }
        }

        tracing::debug!(compiled = validator.cache.len(), "Request schemas compiled");
        Ok(validator)
    }

    /// Validate `input` against `op` under `options`.
    pub fn validate(
        &self,
        op: &Operation,
        input: &RequestInput<'_>,
        options: &ValidationOptions,
    ) -> Result<ValidatedRequest, RequestValidationError> {
        let flags = CompileFlags::from(options);
        let mut violations = Vec::new();
        let mut validated = ValidatedRequest::default();
        let query = parse_query(input.query);

        for param in &op.parameters {
            let raw: Vec<String> = match param.location {
                ParameterLocation::Path => input.path_params.get(&param.name).cloned().into_iter().collect(),
                ParameterLocation::Query => query.get(&param.name).cloned().unwrap_or_default(),
                ParameterLocation::Header => input
                    .headers
                    .get_all(param.name.as_str())
                    .iter()
                    .filter_map(|v| v.to_str().ok())
                    .map(str::to_string)
                    .collect(),
                // Cookies are not part of this API surface.
                ParameterLocation::Cookie => continue,
            };

            let location = format!("{}.{}", param.location.as_str(), param.name);
            let value = if raw.is_empty() {
                if param.required {
                    violations.push(Violation::new(&location, "value is required but missing"));
                    continue;
                }
                match self.compiler.resolve(&param.schema).get("default") {
                    Some(default) => default.clone(),
                    None => continue,
                }
            } else {
                let value = self.coerce(&raw, &param.schema);
                let validator = self.validator_for(&param_site(op, param), &param.schema, flags)?;
                violations.extend(collect_violations(&validator, &value, &location));
                value
            };

            let target = match param.location {
                ParameterLocation::Path => &mut validated.path,
                ParameterLocation::Query => &mut validated.query,
                _ => &mut validated.headers,
            };
            target.insert(param.name.clone(), value);
        }

        if let Some(body) = &op.request_body {
            match input.body {
                None if body.required => {
                    violations.push(Violation::new("body", "value is required but missing"));
                }
                None => {}
                Some(value) => {
                    if let Some(schema) = body_schema(op) {
                        let validator = self.validator_for(&body_site(op), schema, flags)?;
                        violations.extend(collect_violations(&validator, value, "body"));
                        violations.extend(self.compiler.access_mode_violations(
                            schema,
                            value,
                            Direction::Request,
                            "body",
                        ));
                    }
                    validated.body = Some(value.clone());
                }
            }
        }

        if violations.is_empty() {
            Ok(validated)
        } else {
            Err(ValidationFailure::new(violations).into())
        }
    }

    fn validator_for(
        &self,
        site: &str,
        schema: &Value,
        flags: CompileFlags,
    ) -> Result<Arc<Validator>, RequestValidationError> {
        self.compiled(site, schema, flags)
            .map_err(|reason| RequestValidationError::Compile {
                site: site.to_string(),
                reason,
            })
    }

    fn compiled(&self, site: &str, schema: &Value, flags: CompileFlags) -> Result<Arc<Validator>, String> {
        let key = (site.to_string(), flags);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(Arc::clone(hit.value()));
        }
        let validator = Arc::new(self.compiler.compile(schema, flags)?);
        Ok(Arc::clone(self.cache.entry(key).or_insert(validator).value()))
    }

    /// Turn raw string values into JSON typed by `schema`.
    ///
    /// Values that do not parse stay strings so the schema reports the mismatch.
    fn coerce(&self, raw: &[String], schema: &Value) -> Value {
        let schema = self.compiler.resolve(schema);
        match schema_type(schema) {
            Some("array") => {
                let items = schema.get("items").map(|s| self.compiler.resolve(s));
                let values: Vec<&str> = if raw.len() == 1 {
                    raw[0].split(',').collect()
                } else {
                    raw.iter().map(String::as_str).collect()
                };
                Value::Array(
                    values
                        .into_iter()
                        .map(|v| coerce_scalar(v, items.and_then(schema_type)))
                        .collect(),
                )
            }
            other => coerce_scalar(&raw[0], other),
        }
    }
}

fn param_site(op: &Operation, param: &Parameter) -> String {
    format!("{}#{}.{}", op.operation_id, param.location.as_str(), param.name)
}

fn body_site(op: &Operation) -> String {
    format!("{}#body", op.operation_id)
}

fn body_schema(op: &Operation) -> Option<&Value> {
    op.request_body
        .as_ref()
        .and_then(|b| b.json_media())
        .and_then(|m| m.schema.as_ref())
}

fn schema_type(schema: &Value) -> Option<&str> {
    match schema.get("type") {
        Some(Value::String(t)) => Some(t.as_str()),
        Some(Value::Array(types)) => types.iter().filter_map(Value::as_str).find(|t| *t != "null"),
        _ => None,
    }
}

fn coerce_scalar(raw: &str, ty: Option<&str>) -> Value {
    match ty {
        Some("integer") => raw
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
        Some("number") => raw
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(raw.to_string())),
        Some("boolean") => match raw {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(raw.to_string()),
        },
        _ => Value::String(raw.to_string()),
    }
}

fn parse_query(query: Option<&str>) -> BTreeMap<String, Vec<String>> {
    let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
    if let Some(q) = query {
        for (k, v) in url::form_urlencoded::parse(q.as_bytes()) {
            out.entry(k.into_owned()).or_default().push(v.into_owned());
        }
    }
    out
}
