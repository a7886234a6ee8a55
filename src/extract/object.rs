//! Object keywords

use serde_json::{Map, Value};

use super::{count_keyword, schema_keyword, ExtractionPlugin, Extractor};
use crate::error::{LogicError, Result};
use crate::literal::Literal;
use crate::logic::Logic;

/// `properties`, `patternProperties`, `additionalProperties`,
/// `propertyNames`, `required`, `minProperties`, `maxProperties`,
/// `dependentRequired`, `dependentSchemas` and draft-07 `dependencies`
pub struct ObjectExtraction;

fn object<'v>(keyword: &str, value: &'v Value) -> Result<&'v Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| LogicError::InvalidSchema(format!("{} must be an object, found {}", keyword, value)))
}

fn key_list(keyword: &str, value: &Value) -> Result<Vec<String>> {
    let items = value
        .as_array()
        .ok_or_else(|| LogicError::InvalidSchema(format!("{} must be an array of strings", keyword)))?;
    items
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| LogicError::InvalidSchema(format!("{} entries must be strings, found {}", keyword, v)))
        })
        .collect()
}

fn absent(key: &str) -> Logic {
    Logic::lit(Literal::Property {
        key: key.to_string(),
        schema: Value::Bool(false),
    })
}

fn required(keys: Vec<String>) -> Logic {
    Logic::all(keys.into_iter().map(|k| Logic::lit(Literal::Required(k))).collect::<Vec<_>>())
}

impl ExtractionPlugin for ObjectExtraction {
    fn id(&self) -> &str {
        "object"
    }

    fn keywords(&self) -> &[&str] {
        &[
            "properties",
            "patternProperties",
            "additionalProperties",
            "propertyNames",
            "required",
            "minProperties",
            "maxProperties",
            "dependentRequired",
            "dependentSchemas",
            "dependencies",
        ]
    }

    fn extract(&self, schema: &Map<String, Value>, cx: &mut Extractor<'_>) -> Result<Logic> {
        let mut parts = Vec::new();

        let mut keys = Vec::new();
        if let Some(properties) = schema.get("properties") {
            for (key, value) in object("properties", properties)? {
                keys.push(key.clone());
                let value = schema_keyword("properties", value)?;
                if value != &Value::Bool(true) {
                    parts.push(Logic::lit(Literal::Property {
                        key: key.clone(),
                        schema: value.clone(),
                    }));
                }
            }
        }

        let mut patterns = Vec::new();
        if let Some(pattern_properties) = schema.get("patternProperties") {
            for (pattern, value) in object("patternProperties", pattern_properties)? {
                patterns.push(pattern.clone());
                let value = schema_keyword("patternProperties", value)?;
                if value != &Value::Bool(true) {
                    parts.push(Logic::lit(Literal::PatternProperty {
                        pattern: pattern.clone(),
                        schema: value.clone(),
                    }));
                }
            }
        }

        if let Some(additional) = schema.get("additionalProperties") {
            let additional = schema_keyword("additionalProperties", additional)?;
            if additional != &Value::Bool(true) {
                keys.sort();
                patterns.sort();
                parts.push(Logic::lit(Literal::AdditionalProperty {
                    schema: additional.clone(),
                    keys,
                    patterns,
                }));
            }
        }

        if let Some(names) = schema.get("propertyNames") {
            let names = schema_keyword("propertyNames", names)?;
            if names != &Value::Bool(true) {
                parts.push(Logic::lit(Literal::PropertyNames(names.clone())));
            }
        }

        if let Some(list) = schema.get("required") {
            parts.push(required(key_list("required", list)?));
        }

        match count_keyword(schema, "minProperties")? {
            Some(0) | None => {}
            Some(n) => parts.push(Logic::lit(Literal::MinProperties(n))),
        }
        if let Some(n) = count_keyword(schema, "maxProperties")? {
            parts.push(Logic::lit(Literal::MaxProperties(n)));
        }

        // Each dependency holds when its trigger key is absent.
        if let Some(dependent) = schema.get("dependentRequired") {
            for (key, list) in object("dependentRequired", dependent)? {
                parts.push(Logic::any(vec![absent(key), required(key_list("dependentRequired", list)?)]));
            }
        }
        if let Some(dependent) = schema.get("dependentSchemas") {
            for (key, sub) in object("dependentSchemas", dependent)? {
                let sub = cx.split(schema_keyword("dependentSchemas", sub)?)?;
                parts.push(Logic::any(vec![absent(key), sub]));
            }
        }
        if let Some(dependencies) = schema.get("dependencies") {
            for (key, dependency) in object("dependencies", dependencies)? {
                let then = match dependency {
                    Value::Array(_) => required(key_list("dependencies", dependency)?),
                    other => cx.split(schema_keyword("dependencies", other)?)?,
                };
                parts.push(Logic::any(vec![absent(key), then]));
            }
        }

        Ok(Logic::all(parts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::PluginRegistry;
    use crate::resolve::SchemaIndex;
    use serde_json::json;

    fn extract(schema: Value) -> Logic {
        let registry = PluginRegistry::builtin();
        let index = SchemaIndex::new();
        Extractor::new(&registry, &index).split(&schema).unwrap()
    }

    #[test]
    fn test_additional_properties_excludes_named_keys() {
        let logic = extract(json!({
            "properties": {"b": true, "a": {"type": "string"}},
            "patternProperties": {"^x-": true},
            "additionalProperties": false
        }));
        match logic {
            Logic::AllOf(parts) => {
                assert!(parts.contains(&Logic::lit(Literal::AdditionalProperty {
                    schema: json!(false),
                    keys: vec!["a".into(), "b".into()],
                    patterns: vec!["^x-".into()],
                })));
                assert!(parts.contains(&Logic::lit(Literal::Property {
                    key: "a".into(),
                    schema: json!({"type": "string"}),
                })));
                assert_eq!(parts.len(), 2);
            }
            other => panic!("Expected AllOf, got {:?}", other),
        }
    }

    #[test]
    fn test_dependent_required_is_conditional() {
        let logic = extract(json!({"dependentRequired": {"card": ["billing"]}}));
        assert_eq!(
            logic,
            Logic::AnyOf(vec![absent("card"), Logic::lit(Literal::Required("billing".into()))])
        );
    }

    #[test]
    fn test_required_must_be_strings() {
        let registry = PluginRegistry::builtin();
        let index = SchemaIndex::new();
        let result = Extractor::new(&registry, &index).split(&json!({"required": [1]}));
        assert!(matches!(result, Err(LogicError::InvalidSchema(_))));
    }
}
