//! OpenAPI document model.
//!
//! Parses an OpenAPI 3.x document into the operation table the router and
//! the request validator work from, and performs the structural checks that
//! make a malformed document a startup failure.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use axum::http::Method;
use serde::Deserialize;
use serde_json::Value;

use crate::contract::DocumentError;
use crate::routing::matcher::PathTemplate;

/// The OpenAPI document bundled with the service.
pub const BUNDLED_DOCUMENT: &str = include_str!("../../api/openapi.yaml");

/// JSON Schema dialect used for the document's schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaDialect {
    /// OpenAPI 3.0: draft 4 plus `nullable`.
    OpenApi30,
    /// OpenAPI 3.1: JSON Schema 2020-12.
    OpenApi31,
}

/// Where a parameter is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

impl ParameterLocation {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "path" => Some(Self::Path),
            "query" => Some(Self::Query),
            "header" => Some(Self::Header),
            "cookie" => Some(Self::Cookie),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Header => "header",
            Self::Cookie => "cookie",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    pub schema: Value,
    pub example: Option<Value>,
}

#[derive(Debug, Clone, Default)]
pub struct MediaType {
    pub schema: Option<Value>,
    pub example: Option<Value>,
    pub examples: BTreeMap<String, Value>,
}

impl MediaType {
    fn from_value(value: &Value) -> Self {
        let examples = value
            .get("examples")
            .and_then(Value::as_object)
            .map(|m| {
                m.iter()
                    .filter_map(|(name, ex)| ex.get("value").map(|v| (name.clone(), v.clone())))
                    .collect()
            })
            .unwrap_or_default();
        Self {
            schema: value.get("schema").cloned(),
            example: value.get("example").cloned(),
            examples,
        }
    }

    /// Every example attached to this media type.
    pub fn all_examples(&self) -> impl Iterator<Item = (String, &Value)> {
        self.example
            .iter()
            .map(|v| ("example".to_string(), v))
            .chain(self.examples.iter().map(|(k, v)| (format!("examples/{k}"), v)))
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequestBody {
    pub required: bool,
    pub content: BTreeMap<String, MediaType>,
}

impl RequestBody {
    /// The media type used for `application/json` payloads, if declared.
    pub fn json_media(&self) -> Option<&MediaType> {
        self.content
            .iter()
            .find(|(k, _)| is_json_media_type(k))
            .map(|(_, v)| v)
    }
}

/// True for `application/json` with or without parameters.
pub fn is_json_media_type(value: &str) -> bool {
    value
        .split(';')
        .next()
        .map(|essence| essence.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}

/// A response body declared by an operation.
#[derive(Debug, Clone)]
pub struct ResponseContent {
    pub status: String,
    pub media_type: String,
    pub media: MediaType,
}

/// A single method + path entry of the contract.
#[derive(Debug, Clone)]
pub struct Operation {
    pub operation_id: String,
    pub method: Method,
    pub path: String,
    pub parameters: Vec<Parameter>,
    pub request_body: Option<RequestBody>,
    pub responses: Vec<ResponseContent>,
}

impl Operation {
    pub fn parameters_in(&self, location: ParameterLocation) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter(move |p| p.location == location)
    }
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    openapi: Value,
    #[serde(default)]
    info: RawInfo,
    #[serde(default)]
    paths: BTreeMap<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RawInfo {
    #[serde(default)]
    title: String,
    #[serde(default)]
    version: Value,
}

const METHODS: [(&str, Method); 8] = [
    ("get", Method::GET),
    ("put", Method::PUT),
    ("post", Method::POST),
    ("delete", Method::DELETE),
    ("options", Method::OPTIONS),
    ("head", Method::HEAD),
    ("patch", Method::PATCH),
    ("trace", Method::TRACE),
];

/// A parsed and structurally checked OpenAPI document.
#[derive(Debug)]
pub struct ContractDocument {
    title: String,
    version: String,
    dialect: SchemaDialect,
    operations: Vec<Arc<Operation>>,
    raw: Arc<Value>,
}

impl ContractDocument {
    /// The document embedded in the binary.
    pub fn bundled() -> Result<Self, DocumentError> {
        Self::from_yaml(BUNDLED_DOCUMENT)
    }

    pub fn from_path(path: &Path) -> Result<Self, DocumentError> {
        let text = std::fs::read_to_string(path).map_err(|source| DocumentError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    /// Parse YAML (or JSON, which is a YAML subset) and check its structure.
    pub fn from_yaml(text: &str) -> Result<Self, DocumentError> {
        let raw: Value =
            serde_yaml::from_str(text).map_err(|e| DocumentError::Parse(e.to_string()))?;
        Self::from_value(raw)
    }

    pub fn from_value(raw: Value) -> Result<Self, DocumentError> {
        let doc: RawDocument = serde_json::from_value(raw.clone())
            .map_err(|e| DocumentError::Parse(e.to_string()))?;

        let openapi = scalar_to_string(&doc.openapi);
        let dialect = if openapi.starts_with("3.0") {
            SchemaDialect::OpenApi30
        } else if openapi.starts_with("3.1") {
            SchemaDialect::OpenApi31
        } else {
            return Err(DocumentError::UnsupportedVersion(openapi));
        };

        let version = scalar_to_string(&doc.info.version);
        if version.is_empty() {
            return Err(DocumentError::MissingVersion);
        }

        check_local_refs(&raw, &raw, "#")?;

        let mut operations = Vec::new();
        let mut seen_ids = HashSet::new();
        for (path, item) in &doc.paths {
            if !path.starts_with('/') {
                return Err(DocumentError::InvalidPath {
                    path: path.clone(),
                    reason: "must start with '/'".to_string(),
                });
            }
            let template = PathTemplate::parse(path).map_err(|e| DocumentError::InvalidPath {
                path: path.clone(),
                reason: e.to_string(),
            })?;

            let shared = parse_parameters(&raw, item.get("parameters"), path)?;
            for (key, method) in METHODS.iter() {
                let Some(op) = item.get(*key) else {
                    continue;
                };
                let operation = parse_operation(&raw, path, method.clone(), op, &shared)?;
                check_path_parameters(&template, &operation)?;
                if !seen_ids.insert(operation.operation_id.clone()) {
                    return Err(DocumentError::DuplicateOperationId(operation.operation_id));
                }
                operations.push(Arc::new(operation));
            }
        }

        Ok(Self {
            title: doc.info.title,
            version,
            dialect,
            operations,
            raw: Arc::new(raw),
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// `info.version`, e.g. `1.0`.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Leading component of `info.version`, e.g. `1`.
    pub fn major_version(&self) -> &str {
        self.version.split('.').next().unwrap_or(&self.version)
    }

    pub fn dialect(&self) -> SchemaDialect {
        self.dialect
    }

    pub fn operations(&self) -> &[Arc<Operation>] {
        &self.operations
    }

    pub fn operation(&self, operation_id: &str) -> Option<&Arc<Operation>> {
        self.operations.iter().find(|op| op.operation_id == operation_id)
    }

    /// `components.schemas`, or an empty object.
    pub fn component_schemas(&self) -> Value {
        self.raw
            .pointer("/components/schemas")
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default()))
    }

    /// Resolve a local reference such as `#/components/schemas/Foo`.
    pub fn resolve_ref(&self, reference: &str) -> Option<&Value> {
        resolve_local(&self.raw, reference)
    }

    /// The whole document as JSON.
    pub fn as_json(&self) -> &Value {
        &self.raw
    }

    pub(crate) fn raw(&self) -> Arc<Value> {
        Arc::clone(&self.raw)
    }
}

pub(crate) fn resolve_local<'a>(root: &'a Value, reference: &str) -> Option<&'a Value> {
    let pointer = reference.strip_prefix('#')?;
    if pointer.is_empty() {
        return Some(root);
    }
    root.pointer(pointer)
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

/// Follow `$ref` chains for non-schema objects (parameters, request bodies).
fn deref<'a>(root: &'a Value, mut value: &'a Value) -> Result<&'a Value, DocumentError> {
    for _ in 0..32 {
        match value.get("$ref").and_then(Value::as_str) {
            Some(reference) => {
                value = resolve_local(root, reference)
                    .ok_or_else(|| DocumentError::UnresolvedRef(reference.to_string()))?;
            }
            None => return Ok(value),
        }
    }
    Err(DocumentError::UnresolvedRef("reference chain too deep".to_string()))
}

fn check_local_refs(root: &Value, value: &Value, at: &str) -> Result<(), DocumentError> {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(reference)) = map.get("$ref") {
                if !reference.starts_with('#') {
                    return Err(DocumentError::ExternalRef {
                        reference: reference.clone(),
                        at: at.to_string(),
                    });
                }
                if resolve_local(root, reference).is_none() {
                    return Err(DocumentError::UnresolvedRef(format!("{reference} (at {at})")));
                }
            }
            for (key, child) in map {
                let escaped = key.replace('~', "~0").replace('/', "~1");
                check_local_refs(root, child, &format!("{at}/{escaped}"))?;
            }
            Ok(())
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                check_local_refs(root, child, &format!("{at}/{i}"))?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn parse_parameters(
    root: &Value,
    list: Option<&Value>,
    path: &str,
) -> Result<Vec<Parameter>, DocumentError> {
    let Some(list) = list else {
        return Ok(Vec::new());
    };
    let items = list.as_array().ok_or_else(|| DocumentError::InvalidParameter {
        path: path.to_string(),
        reason: "parameters must be a list".to_string(),
    })?;

    let mut params = Vec::with_capacity(items.len());
    for item in items {
        let item = deref(root, item)?;
        let invalid = |reason: String| DocumentError::InvalidParameter {
            path: path.to_string(),
            reason,
        };
        let name = item
            .get("name")
            .and_then(Value::as_str)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| invalid("parameter without a name".to_string()))?;
        let location = item
            .get("in")
            .and_then(Value::as_str)
            .and_then(ParameterLocation::parse)
            .ok_or_else(|| invalid(format!("parameter '{name}' has no valid 'in'")))?;
        let required = item.get("required").and_then(Value::as_bool).unwrap_or(false);
        if location == ParameterLocation::Path && !required {
            return Err(invalid(format!("path parameter '{name}' must be required")));
        }
        params.push(Parameter {
            name: name.to_string(),
            location,
            required,
            schema: item
                .get("schema")
                .cloned()
                .unwrap_or_else(|| Value::Object(Default::default())),
            example: item.get("example").cloned(),
        });
    }
    Ok(params)
}

fn parse_operation(
    root: &Value,
    path: &str,
    method: Method,
    op: &Value,
    shared: &[Parameter],
) -> Result<Operation, DocumentError> {
    let operation_id = op
        .get("operationId")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| DocumentError::MissingOperationId {
            method: method.to_string(),
            path: path.to_string(),
        })?
        .to_string();

    // Operation-level parameters override path-level ones with the same name and location.
    let own = parse_parameters(root, op.get("parameters"), path)?;
    let mut parameters: Vec<Parameter> = shared
        .iter()
        .filter(|s| !own.iter().any(|o| o.name == s.name && o.location == s.location))
        .cloned()
        .collect();
    parameters.extend(own);

    let request_body = match op.get("requestBody") {
        Some(body) => {
            let body = deref(root, body)?;
            let content: BTreeMap<String, MediaType> = body
                .get("content")
                .and_then(Value::as_object)
                .map(|m| m.iter().map(|(k, v)| (k.clone(), MediaType::from_value(v))).collect())
                .unwrap_or_default();
            if content.is_empty() {
                return Err(DocumentError::InvalidRequestBody {
                    operation_id,
                    reason: "requestBody declares no content".to_string(),
                });
            }
            Some(RequestBody {
                required: body.get("required").and_then(Value::as_bool).unwrap_or(false),
                content,
            })
        }
        None => None,
    };

    let mut responses = Vec::new();
    if let Some(map) = op.get("responses").and_then(Value::as_object) {
        for (status, response) in map {
            let response = deref(root, response)?;
            if let Some(content) = response.get("content").and_then(Value::as_object) {
                for (media_type, media) in content {
                    responses.push(ResponseContent {
                        status: status.clone(),
                        media_type: media_type.clone(),
                        media: MediaType::from_value(media),
                    });
                }
            }
        }
    }

    Ok(Operation {
        operation_id,
        method,
        path: path.to_string(),
        parameters,
        request_body,
        responses,
    })
}

fn check_path_parameters(template: &PathTemplate, op: &Operation) -> Result<(), DocumentError> {
    let declared: HashSet<&str> = op
        .parameters_in(ParameterLocation::Path)
        .map(|p| p.name.as_str())
        .collect();
    let in_template: HashSet<&str> = template.param_names().collect();

    if let Some(missing) = in_template.difference(&declared).next() {
        return Err(DocumentError::UndeclaredPathParameter {
            operation_id: op.operation_id.clone(),
            name: missing.to_string(),
        });
    }
    if let Some(extra) = declared.difference(&in_template).next() {
        return Err(DocumentError::UnusedPathParameter {
            operation_id: op.operation_id.clone(),
            name: extra.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
openapi: 3.0.1
info:
  title: test
  version: "2.3"
paths:
  /things/{thingId}:
    parameters:
      - $ref: '#/components/parameters/ThingId'
    get:
      operationId: getThing
      responses:
        '200':
          description: ok
    delete:
      operationId: deleteThing
      parameters:
        - in: header
          name: x-reason
          schema:
            type: string
      responses:
        '204':
          description: gone
components:
  parameters:
    ThingId:
      in: path
      name: thingId
      required: true
      schema:
        type: string
"#;

    #[test]
    fn test_bundled_document_loads() {
        let doc = ContractDocument::bundled().unwrap();
        assert_eq!(doc.version(), "1.0");
        assert_eq!(doc.major_version(), "1");
        assert_eq!(doc.dialect(), SchemaDialect::OpenApi30);
        let compose = doc.operation("composeImage").unwrap();
        assert_eq!(compose.method, Method::POST);
        let body = compose.request_body.as_ref().unwrap();
        assert!(body.required);
        assert!(body.json_media().is_some());
    }

    #[test]
    fn test_shared_parameters_and_refs() {
        let doc = ContractDocument::from_yaml(MINIMAL).unwrap();
        assert_eq!(doc.operations().len(), 2);

        let get = doc.operation("getThing").unwrap();
        assert_eq!(get.parameters.len(), 1);
        assert_eq!(get.parameters[0].name, "thingId");

        let delete = doc.operation("deleteThing").unwrap();
        assert_eq!(delete.parameters_in(ParameterLocation::Header).count(), 1);
        assert_eq!(delete.parameters_in(ParameterLocation::Path).count(), 1);
    }

    #[test]
    fn test_numeric_version_is_accepted() {
        let doc = ContractDocument::from_yaml(&MINIMAL.replace("\"2.3\"", "2.3")).unwrap();
        assert_eq!(doc.version(), "2.3");
        assert_eq!(doc.major_version(), "2");
    }

    #[test]
    fn test_rejects_swagger_2() {
        let err = ContractDocument::from_yaml(&MINIMAL.replace("openapi: 3.0.1", "openapi: 2.0"))
            .unwrap_err();
        assert!(matches!(err, DocumentError::UnsupportedVersion(v) if v == "2.0"));
    }

    #[test]
    fn test_rejects_unparseable_yaml() {
        let err = ContractDocument::from_yaml("openapi: [unterminated").unwrap_err();
        assert!(matches!(err, DocumentError::Parse(_)));
    }

    #[test]
    fn test_rejects_undeclared_path_parameter() {
        let doc = MINIMAL.replace("/things/{thingId}:", "/things/{thingId}/{partId}:");
        let err = ContractDocument::from_yaml(&doc).unwrap_err();
        assert!(
            matches!(err, DocumentError::UndeclaredPathParameter { ref name, .. } if name == "partId")
        );
    }

    #[test]
    fn test_rejects_dangling_ref() {
        let doc = MINIMAL.replace("#/components/parameters/ThingId", "#/components/parameters/Nope");
        let err = ContractDocument::from_yaml(&doc).unwrap_err();
        assert!(matches!(err, DocumentError::UnresolvedRef(_)));
    }

    #[test]
    fn test_rejects_duplicate_operation_id() {
        let doc = MINIMAL.replace("operationId: deleteThing", "operationId: getThing");
        let err = ContractDocument::from_yaml(&doc).unwrap_err();
        assert!(matches!(err, DocumentError::DuplicateOperationId(id) if id == "getThing"));
    }

    #[test]
    fn test_rejects_optional_path_parameter() {
        let doc = MINIMAL.replace("required: true", "required: false");
        let err = ContractDocument::from_yaml(&doc).unwrap_err();
        assert!(matches!(err, DocumentError::InvalidParameter { .. }));
    }

    #[test]
    fn test_json_media_type_matching() {
        assert!(is_json_media_type("application/json"));
        assert!(is_json_media_type("Application/JSON; charset=utf-8"));
        assert!(!is_json_media_type("text/plain"));
        assert!(!is_json_media_type("application/jsonp"));
    }
}
