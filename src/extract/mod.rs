//! Extraction: schema keywords to logical combinations of literals
//!
//! Each plugin owns a set of keywords. For one schema object every plugin
//! with at least one of its keywords present contributes a `Logic`, and
//! the contributions are conjoined. Nested schemas reached through logical
//! keywords are extracted through [`Extractor::split`]; nested schemas under
//! structural keywords (`items`, `properties`, ...) stay as raw JSON inside
//! their literal and are only examined by the oracles when needed.

mod array;
mod general;
mod number;
mod object;
mod string;

pub use array::ArrayExtraction;
pub use general::{ConstExtraction, LogicExtraction, RefExtraction, TypeExtraction, UnsupportedExtraction};
pub use number::NumberExtraction;
pub use object::ObjectExtraction;
pub use string::StringExtraction;

use serde_json::{Map, Value};

use crate::error::{LogicError, Result};
use crate::literal::Literal;
use crate::logic::Logic;
use crate::registry::{BuiltinPlugin, PluginRegistry};
use crate::resolve::SchemaIndex;

/// Turns the keywords of one schema object into a `Logic`.
pub trait ExtractionPlugin: Send + Sync {
    /// Identifier used in diagnostics
    fn id(&self) -> &str;

    /// Built-in plugin this one replaces, if any
    fn overrides(&self) -> Option<BuiltinPlugin> {
        None
    }

    /// Keywords this plugin consumes
    fn keywords(&self) -> &[&str];

    fn extract(&self, schema: &Map<String, Value>, cx: &mut Extractor<'_>) -> Result<Logic>;
}

/// Recursive extraction state for one top-level extraction.
pub struct Extractor<'a> {
    registry: &'a PluginRegistry,
    index: &'a SchemaIndex,
    /// References currently being inlined on this path
    expanding: Vec<String>,
}

impl<'a> Extractor<'a> {
    pub fn new(registry: &'a PluginRegistry, index: &'a SchemaIndex) -> Self {
        Self {
            registry,
            index,
            expanding: Vec::new(),
        }
    }

    /// Extract a (sub)schema.
    pub fn split(&mut self, schema: &Value) -> Result<Logic> {
        let map = match schema {
            Value::Bool(true) => return Ok(Logic::True),
            Value::Bool(false) => return Ok(Logic::False),
            Value::Object(map) => map,
            other => {
                return Err(LogicError::InvalidSchema(format!(
                    "expected a boolean or an object, found {}",
                    other
                )))
            }
        };

        let registry = self.registry;
        let mut parts = Vec::new();
        for plugin in registry.extraction() {
            if plugin.keywords().iter().any(|k| map.contains_key(*k)) {
                parts.push(plugin.extract(map, self)?);
            }
        }
        Ok(Logic::all(parts))
    }

    /// Inline the target of an absolute reference. A reference already
    /// being inlined further up this path stays an opaque `Ref` literal.
    pub fn expand_ref(&mut self, uri: &str) -> Result<Logic> {
        if self.expanding.iter().any(|u| u == uri) {
            return Ok(Logic::lit(Literal::Ref(uri.to_string())));
        }
        let index = self.index;
        let target = index
            .lookup(uri)
            .ok_or_else(|| LogicError::unresolvable(uri, "schema index"))?;
        self.expanding.push(uri.to_string());
        let result = self.split(target);
        self.expanding.pop();
        result
    }
}

/// Read a non-negative integer keyword.
pub(crate) fn count_keyword(schema: &Map<String, Value>, keyword: &str) -> Result<Option<u64>> {
    match schema.get(keyword) {
        None => Ok(None),
        Some(value) => {
            if let Some(n) = value.as_u64() {
                return Ok(Some(n));
            }
            // 2.0 is a valid count
            match value.as_f64() {
                Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => Ok(Some(f as u64)),
                _ => Err(LogicError::InvalidSchema(format!(
                    "{} must be a non-negative integer, found {}",
                    keyword, value
                ))),
            }
        }
    }
}

/// Check that a keyword value is itself a schema.
pub(crate) fn schema_keyword<'v>(keyword: &str, value: &'v Value) -> Result<&'v Value> {
    match value {
        Value::Bool(_) | Value::Object(_) => Ok(value),
        other => Err(LogicError::InvalidSchema(format!(
            "{} must be a schema, found {}",
            keyword, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{JsonType, TypeSet};
    use serde_json::json;

    fn extract(schema: Value) -> Result<Logic> {
        let registry = PluginRegistry::builtin();
        let index = SchemaIndex::new();
        Extractor::new(&registry, &index).split(&schema)
    }

    #[test]
    fn test_boolean_schemas() {
        assert_eq!(extract(json!(true)).unwrap(), Logic::True);
        assert_eq!(extract(json!(false)).unwrap(), Logic::False);
        assert_eq!(extract(json!({})).unwrap(), Logic::True);
    }

    #[test]
    fn test_keywords_are_conjoined() {
        let logic = extract(json!({"type": "string", "minLength": 2})).unwrap();
        match logic {
            Logic::AllOf(parts) => {
                assert!(parts.contains(&Logic::lit(Literal::Type(TypeSet::single(JsonType::String)))));
                assert!(parts.contains(&Logic::lit(Literal::MinLength(2))));
            }
            other => panic!("Expected AllOf, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_schema_is_rejected() {
        assert!(matches!(extract(json!(3)), Err(LogicError::InvalidSchema(_))));
        assert!(matches!(
            extract(json!({"minLength": -1})),
            Err(LogicError::InvalidSchema(_))
        ));
    }

    #[test]
    fn test_unknown_reference_fails() {
        let err = extract(json!({"$ref": "https://example.com/missing.json"})).unwrap_err();
        assert!(matches!(err, LogicError::UnresolvableReference { .. }));
    }
}
