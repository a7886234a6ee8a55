//! Numeric keywords

use serde_json::{Map, Value};

use super::{ExtractionPlugin, Extractor};
use crate::error::{LogicError, Result};
use crate::literal::Literal;
use crate::logic::Logic;

/// `minimum`, `maximum`, `exclusiveMinimum`, `exclusiveMaximum`, `multipleOf`
pub struct NumberExtraction;

fn number<'v>(keyword: &str, value: &'v Value) -> Result<&'v Value> {
    if value.is_number() {
        Ok(value)
    } else {
        Err(LogicError::InvalidSchema(format!("{} must be a number, found {}", keyword, value)))
    }
}

impl ExtractionPlugin for NumberExtraction {
    fn id(&self) -> &str {
        "number"
    }

    fn keywords(&self) -> &[&str] {
        &["minimum", "maximum", "exclusiveMinimum", "exclusiveMaximum", "multipleOf"]
    }

    fn extract(&self, schema: &Map<String, Value>, _cx: &mut Extractor<'_>) -> Result<Logic> {
        let mut parts = Vec::new();

        if let Some(m) = schema.get("minimum") {
            parts.push(Logic::lit(Literal::Minimum(number("minimum", m)?.clone())));
        }
        if let Some(m) = schema.get("maximum") {
            parts.push(Logic::lit(Literal::Maximum(number("maximum", m)?.clone())));
        }

        // An exclusive bound is the inclusive bound minus the bound itself.
        // The draft-04 boolean form modifies the sibling inclusive bound.
        for (keyword, inclusive) in [("exclusiveMinimum", "minimum"), ("exclusiveMaximum", "maximum")] {
            let bound = match schema.get(keyword) {
                None | Some(Value::Bool(false)) => continue,
                Some(Value::Bool(true)) => match schema.get(inclusive) {
                    Some(m) => m.clone(),
                    None => continue,
                },
                Some(m) => number(keyword, m)?.clone(),
            };
            let literal = if inclusive == "minimum" {
                Literal::Minimum(bound.clone())
            } else {
                Literal::Maximum(bound.clone())
            };
            parts.push(Logic::lit(literal));
            parts.push(Logic::Neg(Literal::Const(bound)));
        }

        if let Some(m) = schema.get("multipleOf") {
            let m = number("multipleOf", m)?;
            if m.as_f64().map(|f| f <= 0.0).unwrap_or(true) {
                return Err(LogicError::InvalidSchema(format!("multipleOf must be positive, found {}", m)));
            }
            parts.push(Logic::lit(Literal::MultipleOf(m.clone())));
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

    fn extract(schema: Value) -> Result<Logic> {
        let registry = PluginRegistry::builtin();
        let index = SchemaIndex::new();
        Extractor::new(&registry, &index).split(&schema)
    }

    #[test]
    fn test_exclusive_minimum_excludes_bound() {
        let logic = extract(json!({"exclusiveMinimum": 5})).unwrap();
        assert_eq!(
            logic,
            Logic::AllOf(vec![
                Logic::lit(Literal::Minimum(json!(5))),
                Logic::Neg(Literal::Const(json!(5))),
            ])
        );
    }

    #[test]
    fn test_draft4_boolean_exclusive_bound() {
        let logic = extract(json!({"maximum": 3, "exclusiveMaximum": true})).unwrap();
        match logic {
            Logic::AllOf(parts) => {
                assert!(parts.contains(&Logic::Neg(Literal::Const(json!(3)))));
            }
            other => panic!("Expected AllOf, got {:?}", other),
        }
    }

    #[test]
    fn test_non_positive_multiple_of_is_invalid() {
        assert!(extract(json!({"multipleOf": 0})).is_err());
        assert!(extract(json!({"multipleOf": "2"})).is_err());
    }
}
