//! Default-value and example checks over a whole document.
//!
//! Every inline schema reachable from the components, parameters, request
//! bodies and responses is visited once. `default` values and `example`s
//! found along the way are validated against the schema that carries them,
//! subject to the active ValidationOptions.

use serde_json::Value;

use crate::contract::document::{ContractDocument, MediaType};
use crate::contract::DocumentError;
use crate::validation::options::ValidationOptions;
use crate::validation::schema::{subschemas, CompileFlags, Direction, SchemaCompiler};
use crate::validation::Violation;

struct Checker<'a> {
    compiler: SchemaCompiler,
    options: &'a ValidationOptions,
    flags: CompileFlags,
}

/// Validate schema defaults and examples of `doc` under `options`.
pub fn check_examples_and_defaults(
    doc: &ContractDocument,
    options: &ValidationOptions,
) -> Result<(), DocumentError> {
    if options.schema_defaults_validation_disabled() && options.examples_validation_disabled() {
        return Ok(());
    }

    let checker = Checker {
        compiler: SchemaCompiler::new(doc.dialect(), doc.raw()),
        options,
        flags: options.into(),
    };

    if let Value::Object(schemas) = doc.component_schemas() {
        for (name, schema) in &schemas {
            checker.walk(schema, &format!("#/components/schemas/{name}"), 0)?;
        }
    }

    for op in doc.operations() {
        for param in &op.parameters {
            let site = format!("{}/parameters/{}", op.operation_id, param.name);
            checker.walk(&param.schema, &site, 0)?;
            if let Some(example) = &param.example {
                checker.example(&param.schema, example, &format!("{site}/example"))?;
            }
        }
        if let Some(body) = &op.request_body {
            for (media_type, media) in &body.content {
                let site = format!("{}/requestBody/{media_type}", op.operation_id);
                checker.media(media, &site)?;
            }
        }
        for response in &op.responses {
            let site = format!(
                "{}/responses/{}/{}",
                op.operation_id, response.status, response.media_type
            );
            checker.media(&response.media, &site)?;
        }
    }

    Ok(())
}

impl Checker<'_> {
    fn media(&self, media: &MediaType, site: &str) -> Result<(), DocumentError> {
        let Some(schema) = &media.schema else {
            return Ok(());
        };
        self.walk(schema, &format!("{site}/schema"), 0)?;
        for (name, example) in media.all_examples() {
            self.example(schema, example, &format!("{site}/{name}"))?;
        }
        Ok(())
    }

    /// Visit `schema` and its inline subschemas. Referenced schemas are
    /// visited through the components instead.
    fn walk(&self, schema: &Value, site: &str, depth: usize) -> Result<(), DocumentError> {
        if depth > 64 || schema.get("$ref").is_some() {
            return Ok(());
        }

        if !self.options.schema_defaults_validation_disabled() {
            if let Some(default) = schema.get("default") {
                let violations = self.run(schema, default, site)?;
                if !violations.is_empty() {
                    return Err(DocumentError::InvalidDefault {
                        site: site.to_string(),
                        details: join(&violations),
                    });
                }
            }
        }

        if let Some(example) = schema.get("example") {
            self.example(schema, example, &format!("{site}/example"))?;
        }

        for (suffix, child) in subschemas(schema) {
            self.walk(child, &format!("{site}/{suffix}"), depth + 1)?;
        }
        Ok(())
    }

    fn example(&self, schema: &Value, example: &Value, site: &str) -> Result<(), DocumentError> {
        if self.options.examples_validation_disabled() {
            return Ok(());
        }

        let mut violations = self.run(schema, example, site)?;
        if self.options.examples_validation_as_req() {
            violations.extend(self.compiler.access_mode_violations(
                schema,
                example,
                Direction::Request,
                "example",
            ));
        }
        if self.options.examples_validation_as_res() {
            violations.extend(self.compiler.access_mode_violations(
                schema,
                example,
                Direction::Response,
                "example",
            ));
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(DocumentError::InvalidExample {
                site: site.to_string(),
                details: join(&violations),
            })
        }
    }

    fn run(&self, schema: &Value, instance: &Value, site: &str) -> Result<Vec<Violation>, DocumentError> {
        self.compiler
            .check(schema, instance, self.flags, "value")
            .map_err(|reason| DocumentError::InvalidSchema {
                site: site.to_string(),
                reason,
            })
    }
}

fn join(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::options::{
        disable_examples_validation, disable_schema_defaults_validation,
        validate_examples_as_request, validate_examples_as_response,
    };

    fn doc_with(schemas: &str) -> ContractDocument {
        let text = format!(
            r#"
openapi: 3.0.3
info:
  title: checks
  version: "1.0"
paths: {{}}
components:
  schemas:
{schemas}
"#
        );
        ContractDocument::from_yaml(&text).unwrap()
    }

    #[test]
    fn test_bundled_document_passes_default_checks() {
        let doc = ContractDocument::bundled().unwrap();
        check_examples_and_defaults(&doc, &ValidationOptions::default()).unwrap();
    }

    #[test]
    fn test_invalid_default_rejected_unless_disabled() {
        let doc = doc_with(
            r#"
    Limit:
      type: integer
      minimum: 1
      default: 0
"#,
        );
        let err = check_examples_and_defaults(&doc, &ValidationOptions::default()).unwrap_err();
        assert!(matches!(err, DocumentError::InvalidDefault { ref site, .. } if site == "#/components/schemas/Limit"));

        let relaxed = ValidationOptions::from_options(&[disable_schema_defaults_validation()]);
        check_examples_and_defaults(&doc, &relaxed).unwrap();
    }

    #[test]
    fn test_nested_invalid_example() {
        let doc = doc_with(
            r#"
    Request:
      type: object
      properties:
        size:
          type: integer
          example: big
"#,
        );
        let err = check_examples_and_defaults(&doc, &ValidationOptions::default()).unwrap_err();
        assert!(
            matches!(err, DocumentError::InvalidExample { ref site, .. } if site == "#/components/schemas/Request/properties/size/example")
        );

        let relaxed = ValidationOptions::from_options(&[disable_examples_validation()]);
        check_examples_and_defaults(&doc, &relaxed).unwrap();
    }

    #[test]
    fn test_examples_direction() {
        let doc = doc_with(
            r#"
    Account:
      type: object
      properties:
        id:
          type: string
          readOnly: true
        password:
          type: string
          writeOnly: true
      example:
        id: abc
"#,
        );
        check_examples_and_defaults(&doc, &ValidationOptions::default()).unwrap();
        check_examples_and_defaults(
            &doc,
            &ValidationOptions::from_options(&[validate_examples_as_response()]),
        )
        .unwrap();

        let err = check_examples_and_defaults(
            &doc,
            &ValidationOptions::from_options(&[validate_examples_as_request()]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("readOnly property \"id\""));
    }
}
