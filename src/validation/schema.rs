//! Schema compilation for OpenAPI schema objects.
//!
//! # Responsibilities
//! - Rewrite OpenAPI schema objects into plain JSON Schema
//! - Strip `pattern` keywords when pattern validation is disabled
//! - Compile with `jsonschema`, resolving `#/components/...` references
//! - Check `readOnly` / `writeOnly` properties by direction
//!
//! # Design Decisions
//! - The schema under test is wrapped as `{"allOf": [schema], "components": ...}`
//!   so local references resolve against the wrapper root
//! - Normalization is keyword-aware: a property *named* `pattern` survives

use std::sync::Arc;

use jsonschema::{Draft, Validator};
use serde_json::{json, Map, Value};

use crate::contract::document::{resolve_local, SchemaDialect};
use crate::validation::options::ValidationOptions;
use crate::validation::Violation;

/// Options that change the compiled form of a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompileFlags {
    pub formats: bool,
    pub patterns: bool,
}

impl From<&ValidationOptions> for CompileFlags {
    fn from(options: &ValidationOptions) -> Self {
        Self {
            formats: options.schema_format_validation_enabled(),
            patterns: !options.schema_pattern_validation_disabled(),
        }
    }
}

impl Default for CompileFlags {
    fn default() -> Self {
        (&ValidationOptions::default()).into()
    }
}

/// Direction a payload travels in, for `readOnly` / `writeOnly` checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Request,
    Response,
}

/// Compiles schema objects taken from one OpenAPI document.
#[derive(Debug, Clone)]
pub struct SchemaCompiler {
    dialect: SchemaDialect,
    document: Arc<Value>,
}

impl SchemaCompiler {
    pub fn new(dialect: SchemaDialect, document: Arc<Value>) -> Self {
        Self { dialect, document }
    }

    /// Compile `schema` into a validator.
    pub fn compile(&self, schema: &Value, flags: CompileFlags) -> Result<Validator, String> {
        let root = self.wrap(schema, flags);
        let draft = match self.dialect {
            SchemaDialect::OpenApi30 => Draft::Draft4,
            SchemaDialect::OpenApi31 => Draft::Draft202012,
        };

        let mut opts = jsonschema::options();
        opts.with_draft(draft);
        opts.should_validate_formats(flags.formats);
        opts.build(&root).map_err(|e| e.to_string())
    }

    /// Validate `instance` against `schema`, collecting every violation.
    pub fn check(
        &self,
        schema: &Value,
        instance: &Value,
        flags: CompileFlags,
        location: &str,
    ) -> Result<Vec<Violation>, String> {
        let validator = self.compile(schema, flags)?;
        Ok(collect_violations(&validator, instance, location))
    }

    /// Follow `$ref` chains starting at `schema`.
    pub fn resolve<'a>(&'a self, mut schema: &'a Value) -> &'a Value {
        for _ in 0..32 {
            match schema
                .get("$ref")
                .and_then(Value::as_str)
                .and_then(|r| resolve_local(&self.document, r))
            {
                Some(target) => schema = target,
                None => break,
            }
        }
        schema
    }

    /// Properties present in `instance` that may not travel in `direction`.
    pub fn access_mode_violations(
        &self,
        schema: &Value,
        instance: &Value,
        direction: Direction,
        location: &str,
    ) -> Vec<Violation> {
        let mut out = Vec::new();
        self.walk_access_mode(schema, instance, direction, location, &mut out, 0);
        out
    }

    fn walk_access_mode(
        &self,
        schema: &Value,
        instance: &Value,
        direction: Direction,
        location: &str,
        out: &mut Vec<Violation>,
        depth: usize,
    ) {
        if depth > 64 {
            return;
        }
        let schema = self.resolve(schema);

        for key in ["allOf", "anyOf", "oneOf"] {
            if let Some(parts) = schema.get(key).and_then(Value::as_array) {
                for part in parts {
                    self.walk_access_mode(part, instance, direction, location, out, depth + 1);
                }
            }
        }

        match instance {
            Value::Object(fields) => {
                let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
                    return;
                };
                for (name, value) in fields {
                    let Some(prop) = properties.get(name) else {
                        continue;
                    };
                    let prop = self.resolve(prop);
                    let at = format!("{location}/{name}");
                    let flagged = |k: &str| prop.get(k).and_then(Value::as_bool).unwrap_or(false);
                    match direction {
                        Direction::Request if flagged("readOnly") => out.push(Violation::new(
                            &at,
                            format!("readOnly property \"{name}\" in request"),
                        )),
                        Direction::Response if flagged("writeOnly") => out.push(Violation::new(
                            &at,
                            format!("writeOnly property \"{name}\" in response"),
                        )),
                        _ => {}
                    }
                    self.walk_access_mode(prop, value, direction, &at, out, depth + 1);
                }
            }
            Value::Array(items) => {
                if let Some(item_schema) = schema.get("items") {
                    for (i, item) in items.iter().enumerate() {
                        let at = format!("{location}/{i}");
                        self.walk_access_mode(item_schema, item, direction, &at, out, depth + 1);
                    }
                }
            }
            _ => {}
        }
    }

    fn wrap(&self, schema: &Value, flags: CompileFlags) -> Value {
        let schemas = self
            .document
            .pointer("/components/schemas")
            .and_then(Value::as_object)
            .map(|m| normalize_map(m, self.dialect, flags))
            .unwrap_or_default();
        json!({
            "allOf": [normalize(schema, self.dialect, flags)],
            "components": { "schemas": schemas },
        })
    }
}

/// Map `jsonschema` errors to violations rooted at `location`.
pub fn collect_violations(validator: &Validator, instance: &Value, location: &str) -> Vec<Violation> {
    validator
        .iter_errors(instance)
        .map(|e| Violation::new(&format!("{location}{}", e.instance_path), e.to_string()))
        .collect()
}

const SCHEMA_MAP_KEYWORDS: [&str; 5] =
    ["properties", "patternProperties", "definitions", "$defs", "dependentSchemas"];
const SCHEMA_KEYWORDS: [&str; 11] = [
    "items",
    "additionalItems",
    "additionalProperties",
    "not",
    "contains",
    "propertyNames",
    "if",
    "then",
    "else",
    "unevaluatedItems",
    "unevaluatedProperties",
];
const SCHEMA_LIST_KEYWORDS: [&str; 4] = ["allOf", "anyOf", "oneOf", "prefixItems"];

/// Direct subschemas of `schema`, each with its pointer suffix.
pub fn subschemas(schema: &Value) -> Vec<(String, &Value)> {
    let Value::Object(map) = schema else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for (key, value) in map {
        let k = key.as_str();
        if SCHEMA_MAP_KEYWORDS.contains(&k) {
            if let Value::Object(m) = value {
                out.extend(m.iter().map(|(name, s)| (format!("{k}/{name}"), s)));
            }
        } else if SCHEMA_KEYWORDS.contains(&k) || SCHEMA_LIST_KEYWORDS.contains(&k) {
            match value {
                Value::Array(items) => {
                    out.extend(items.iter().enumerate().map(|(i, s)| (format!("{k}/{i}"), s)));
                }
                Value::Object(_) => out.push((k.to_string(), value)),
                _ => {}
            }
        }
    }
    out
}

/// Rewrite an OpenAPI schema object into plain JSON Schema.
pub fn normalize(schema: &Value, dialect: SchemaDialect, flags: CompileFlags) -> Value {
    let Value::Object(map) = schema else {
        return schema.clone();
    };

    let mut out = Map::with_capacity(map.len());
    for (key, value) in map {
        let k = key.as_str();
        if k == "pattern" && !flags.patterns {
            continue;
        }
        if k == "nullable" && dialect == SchemaDialect::OpenApi30 {
            continue;
        }
        let rewritten = if SCHEMA_MAP_KEYWORDS.contains(&k) {
            match value {
                Value::Object(m) => Value::Object(normalize_map(m, dialect, flags)),
                other => other.clone(),
            }
        } else if SCHEMA_KEYWORDS.contains(&k) {
            match value {
                Value::Array(items) => {
                    Value::Array(items.iter().map(|s| normalize(s, dialect, flags)).collect())
                }
                other => normalize(other, dialect, flags),
            }
        } else if SCHEMA_LIST_KEYWORDS.contains(&k) {
            match value {
                Value::Array(items) => {
                    Value::Array(items.iter().map(|s| normalize(s, dialect, flags)).collect())
                }
                other => other.clone(),
            }
        } else {
            value.clone()
        };
        out.insert(key.clone(), rewritten);
    }

    let nullable = map.get("nullable").and_then(Value::as_bool).unwrap_or(false);
    if dialect == SchemaDialect::OpenApi30 && nullable {
        allow_null(&mut out);
    }
    Value::Object(out)
}

fn normalize_map(map: &Map<String, Value>, dialect: SchemaDialect, flags: CompileFlags) -> Map<String, Value> {
    map.iter()
        .map(|(k, v)| (k.clone(), normalize(v, dialect, flags)))
        .collect()
}

fn allow_null(schema: &mut Map<String, Value>) {
    match schema.get_mut("type") {
        Some(Value::String(t)) => {
            let t = std::mem::take(t);
            schema.insert("type".to_string(), json!([t, "null"]));
        }
        Some(Value::Array(types)) => {
            if !types.iter().any(|t| t == "null") {
                types.push(Value::String("null".to_string()));
            }
        }
        _ => {}
    }
    if let Some(Value::Array(values)) = schema.get_mut("enum") {
        if !values.contains(&Value::Null) {
            values.push(Value::Null);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiler() -> SchemaCompiler {
        let doc = json!({
            "components": {
                "schemas": {
                    "Name": { "type": "string", "pattern": "^[a-z]+$" },
                    "Item": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string", "readOnly": true },
                            "secret": { "type": "string", "writeOnly": true },
                            "name": { "$ref": "#/components/schemas/Name" }
                        }
                    }
                }
            }
        });
        SchemaCompiler::new(SchemaDialect::OpenApi30, Arc::new(doc))
    }

    #[test]
    fn test_local_refs_resolve() {
        let c = compiler();
        let schema = json!({ "$ref": "#/components/schemas/Item" });
        let flags = CompileFlags::default();
        assert!(c.check(&schema, &json!({"name": "abc"}), flags, "body").unwrap().is_empty());
        let violations = c.check(&schema, &json!({"name": "ABC"}), flags, "body").unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].location, "body/name");
    }

    #[test]
    fn test_patterns_can_be_stripped() {
        let c = compiler();
        let schema = json!({ "$ref": "#/components/schemas/Name" });
        let flags = CompileFlags { formats: false, patterns: false };
        assert!(c.check(&schema, &json!("ABC"), flags, "body").unwrap().is_empty());
    }

    #[test]
    fn test_property_named_pattern_survives() {
        let schema = json!({
            "type": "object",
            "required": ["pattern"],
            "properties": { "pattern": { "type": "string", "pattern": "^x" } }
        });
        let flags = CompileFlags { formats: false, patterns: false };
        let n = normalize(&schema, SchemaDialect::OpenApi30, flags);
        assert!(n["properties"].get("pattern").is_some());
        assert!(n["properties"]["pattern"].get("pattern").is_none());
    }

    #[test]
    fn test_nullable_becomes_type_union() {
        let schema = json!({ "type": "string", "nullable": true, "enum": ["a"] });
        let n = normalize(&schema, SchemaDialect::OpenApi30, CompileFlags::default());
        assert_eq!(n["type"], json!(["string", "null"]));
        assert_eq!(n["enum"], json!(["a", null]));
        assert!(n.get("nullable").is_none());
    }

    #[test]
    fn test_format_flag() {
        let c = compiler();
        let schema = json!({ "type": "string", "format": "email" });
        let off = CompileFlags { formats: false, patterns: true };
        let on = CompileFlags { formats: true, patterns: true };
        assert!(c.check(&schema, &json!("nope"), off, "body").unwrap().is_empty());
        assert!(!c.check(&schema, &json!("nope"), on, "body").unwrap().is_empty());
    }

    #[test]
    fn test_access_modes() {
        let c = compiler();
        let schema = json!({ "type": "array", "items": { "$ref": "#/components/schemas/Item" } });
        let instance = json!([{ "id": "1", "secret": "s", "name": "n" }]);

        let req = c.access_mode_violations(&schema, &instance, Direction::Request, "body");
        assert_eq!(req.len(), 1);
        assert_eq!(req[0].location, "body/0/id");

        let res = c.access_mode_violations(&schema, &instance, Direction::Response, "body");
        assert_eq!(res.len(), 1);
        assert_eq!(res[0].location, "body/0/secret");
    }
}
