//! Validator collaborator
//!
//! The engine decides membership of concrete values natively wherever the
//! literal algebra models the keyword. Patterns, formats and caller
//! keywords are delegated to a [`ValidationPlugin`]; the default one is
//! backed by the `jsonschema` crate.

use jsonschema::{Draft, JSONSchema};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::warn;

use crate::registry::BuiltinPlugin;

/// Tests a concrete value against a schema.
pub trait ValidationPlugin: Send + Sync {
    fn id(&self) -> &str;

    /// Built-in plugin this one replaces, if any
    fn overrides(&self) -> Option<BuiltinPlugin> {
        None
    }

    /// `Some(valid)` when this validator can decide, `None` otherwise.
    fn validate(&self, schema: &Value, instance: &Value) -> Option<bool>;
}

/// Keywords the draft 2020-12 validator understands. A schema using
/// anything else is left undecided.
const STANDARD_KEYWORDS: &[&str] = &[
    "$schema", "$id", "$anchor", "$defs", "$comment", "$ref", "title", "description", "default",
    "examples", "deprecated", "readOnly", "writeOnly", "type", "const", "enum", "minimum", "maximum",
    "exclusiveMinimum", "exclusiveMaximum", "multipleOf", "minLength", "maxLength", "pattern", "format",
    "prefixItems", "items", "contains", "minContains", "maxContains", "minItems", "maxItems",
    "uniqueItems", "properties", "patternProperties", "additionalProperties", "propertyNames",
    "required", "minProperties", "maxProperties", "dependentRequired", "dependentSchemas", "allOf",
    "anyOf", "oneOf", "not", "if", "then", "else",
];

fn only_standard_keywords(schema: &Value) -> bool {
    match schema {
        Value::Object(map) => map.iter().all(|(k, v)| {
            STANDARD_KEYWORDS.contains(&k.as_str())
                && match k.as_str() {
                    "const" | "enum" | "examples" | "default" => true,
                    "properties" | "patternProperties" | "$defs" | "dependentSchemas" => v
                        .as_object()
                        .map(|m| m.values().all(only_standard_keywords))
                        .unwrap_or(false),
                    _ => match v {
                        Value::Array(items) => items.iter().all(|i| !i.is_object() || only_standard_keywords(i)),
                        Value::Object(_) => only_standard_keywords(v),
                        _ => true,
                    },
                }
        }),
        _ => true,
    }
}

/// Draft 2020-12 validator with a compiled-schema cache.
#[derive(Default)]
pub struct JsonSchemaValidator {
    cache: Mutex<HashMap<String, Option<Arc<JSONSchema>>>>,
}

impl JsonSchemaValidator {
    pub fn new() -> Self {
        Self::default()
    }

    fn compiled(&self, schema: &Value) -> Option<Arc<JSONSchema>> {
        let key = schema.to_string();
        if let Ok(cache) = self.cache.lock() {
            if let Some(entry) = cache.get(&key) {
                return entry.clone();
            }
        }
        let compiled = match JSONSchema::options().with_draft(Draft::Draft202012).compile(schema) {
            Ok(compiled) => Some(Arc::new(compiled)),
            Err(e) => {
                warn!(schema = %key, error = %e, "schema could not be compiled for validation");
                None
            }
        };
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, compiled.clone());
        }
        compiled
    }
}

impl ValidationPlugin for JsonSchemaValidator {
    fn id(&self) -> &str {
        "jsonschema"
    }

    fn validate(&self, schema: &Value, instance: &Value) -> Option<bool> {
        match schema {
            Value::Bool(b) => return Some(*b),
            Value::Object(_) if only_standard_keywords(schema) => {}
            _ => return None,
        }
        // Unresolved references cannot be followed from here.
        if schema.to_string().contains("\"$ref\"") {
            return None;
        }
        self.compiled(schema).map(|compiled| compiled.is_valid(instance))
    }
}
