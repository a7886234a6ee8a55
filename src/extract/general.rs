//! Cross-cutting extraction: `type`, `const`/`enum`, `$ref`, the logical
//! keywords, and keywords with no sound model.

use serde_json::{json, Map, Value};

use super::{schema_keyword, ExtractionPlugin, Extractor};
use crate::error::{LogicError, Result};
use crate::literal::Literal;
use crate::logic::Logic;
use crate::types::{JsonType, TypeSet};

/// `type`
pub struct TypeExtraction;

impl ExtractionPlugin for TypeExtraction {
    fn id(&self) -> &str {
        "type"
    }

    fn keywords(&self) -> &[&str] {
        &["type"]
    }

    fn extract(&self, schema: &Map<String, Value>, _cx: &mut Extractor<'_>) -> Result<Logic> {
        let names: Vec<&str> = match schema.get("type") {
            Some(Value::String(name)) => vec![name.as_str()],
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| {
                    v.as_str()
                        .ok_or_else(|| LogicError::InvalidSchema(format!("type entries must be strings, found {}", v)))
                })
                .collect::<Result<_>>()?,
            Some(other) => {
                return Err(LogicError::InvalidSchema(format!("invalid type keyword {}", other)));
            }
            None => return Ok(Logic::True),
        };

        let mut plain = TypeSet::EMPTY;
        let mut integer = false;
        for name in names {
            match (name, JsonType::parse(name)) {
                ("integer", _) => integer = true,
                (_, Some(json_type)) => plain.insert(json_type),
                (_, None) => {
                    return Err(LogicError::InvalidSchema(format!("unknown type name {:?}", name)));
                }
            }
        }

        let mut alternatives = Vec::new();
        if !plain.is_empty() {
            alternatives.push(Logic::lit(Literal::Type(plain)));
        }
        if integer && !plain.contains(JsonType::Number) {
            alternatives.push(Logic::all(vec![
                Logic::lit(Literal::Type(TypeSet::single(JsonType::Number))),
                Logic::lit(Literal::MultipleOf(json!(1))),
            ]));
        }
        Ok(Logic::any(alternatives))
    }
}

/// `const` and `enum`
pub struct ConstExtraction;

impl ExtractionPlugin for ConstExtraction {
    fn id(&self) -> &str {
        "const"
    }

    fn keywords(&self) -> &[&str] {
        &["const", "enum"]
    }

    fn extract(&self, schema: &Map<String, Value>, _cx: &mut Extractor<'_>) -> Result<Logic> {
        let mut parts = Vec::new();
        if let Some(value) = schema.get("const") {
            parts.push(Logic::lit(Literal::Const(value.clone())));
        }
        match schema.get("enum") {
            Some(Value::Array(values)) => parts.push(Logic::any(
                values.iter().map(|v| Logic::lit(Literal::Const(v.clone()))),
            )),
            Some(other) => {
                return Err(LogicError::InvalidSchema(format!("enum must be an array, found {}", other)));
            }
            None => {}
        }
        Ok(Logic::all(parts))
    }
}

/// `$ref`, inlined through the schema index
pub struct RefExtraction;

impl ExtractionPlugin for RefExtraction {
    fn id(&self) -> &str {
        "ref"
    }

    fn keywords(&self) -> &[&str] {
        &["$ref"]
    }

    fn extract(&self, schema: &Map<String, Value>, cx: &mut Extractor<'_>) -> Result<Logic> {
        match schema.get("$ref") {
            Some(Value::String(uri)) => cx.expand_ref(uri),
            Some(other) => Err(LogicError::InvalidSchema(format!("$ref must be a string, found {}", other))),
            None => Ok(Logic::True),
        }
    }
}

/// `not`, `allOf`, `anyOf`, `oneOf`, `if`/`then`/`else`
pub struct LogicExtraction;

fn schema_list<'v>(keyword: &str, value: &'v Value) -> Result<&'v Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| LogicError::InvalidSchema(format!("{} must be an array of schemas", keyword)))
}

impl ExtractionPlugin for LogicExtraction {
    fn id(&self) -> &str {
        "logic"
    }

    fn keywords(&self) -> &[&str] {
        &["not", "allOf", "anyOf", "oneOf", "if"]
    }

    fn extract(&self, schema: &Map<String, Value>, cx: &mut Extractor<'_>) -> Result<Logic> {
        let mut parts = Vec::new();

        if let Some(inner) = schema.get("not") {
            parts.push(Logic::not(cx.split(schema_keyword("not", inner)?)?));
        }

        if let Some(list) = schema.get("allOf") {
            for sub in schema_list("allOf", list)? {
                parts.push(cx.split(sub)?);
            }
        }

        if let Some(list) = schema.get("anyOf") {
            let mut alternatives = Vec::new();
            for sub in schema_list("anyOf", list)? {
                alternatives.push(cx.split(sub)?);
            }
            parts.push(Logic::any(alternatives));
        }

        if let Some(list) = schema.get("oneOf") {
            let branches: Vec<Logic> = schema_list("oneOf", list)?
                .iter()
                .map(|sub| cx.split(sub))
                .collect::<Result<_>>()?;
            // exactly one branch holds
            let exclusive = (0..branches.len()).map(|i| {
                Logic::all(branches.iter().enumerate().map(|(j, branch)| {
                    if i == j {
                        branch.clone()
                    } else {
                        Logic::not(branch.clone())
                    }
                }))
            });
            parts.push(Logic::any(exclusive.collect::<Vec<_>>()));
        }

        if let (Some(condition), true) = (
            schema.get("if"),
            schema.contains_key("then") || schema.contains_key("else"),
        ) {
            let condition = cx.split(schema_keyword("if", condition)?)?;
            let then_branch = match schema.get("then") {
                Some(s) => cx.split(schema_keyword("then", s)?)?,
                None => Logic::True,
            };
            let else_branch = match schema.get("else") {
                Some(s) => cx.split(schema_keyword("else", s)?)?,
                None => Logic::True,
            };
            parts.push(Logic::any(vec![
                Logic::all(vec![condition.clone(), then_branch]),
                Logic::all(vec![Logic::not(condition), else_branch]),
            ]));
        }

        Ok(Logic::all(parts))
    }
}

/// Keywords without a sound model. They become `Unsupported` literals so a
/// contradiction elsewhere in the same schema still wins.
pub struct UnsupportedExtraction;

const UNSUPPORTED: [(&str, Option<JsonType>); 6] = [
    ("unevaluatedItems", Some(JsonType::Array)),
    ("unevaluatedProperties", Some(JsonType::Object)),
    ("$dynamicRef", None),
    ("$dynamicAnchor", None),
    ("$recursiveRef", None),
    ("$recursiveAnchor", None),
];

impl ExtractionPlugin for UnsupportedExtraction {
    fn id(&self) -> &str {
        "unsupported"
    }

    fn keywords(&self) -> &[&str] {
        &[
            "unevaluatedItems",
            "unevaluatedProperties",
            "$dynamicRef",
            "$dynamicAnchor",
            "$recursiveRef",
            "$recursiveAnchor",
        ]
    }

    fn extract(&self, schema: &Map<String, Value>, _cx: &mut Extractor<'_>) -> Result<Logic> {
        let parts = UNSUPPORTED.iter().filter_map(|(keyword, applies_to)| {
            schema.get(*keyword).map(|value| {
                Logic::lit(Literal::Unsupported {
                    keyword: keyword.to_string(),
                    value: value.clone(),
                    applies_to: *applies_to,
                })
            })
        });
        Ok(Logic::all(parts.collect::<Vec<_>>()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::PluginRegistry;
    use crate::resolve::SchemaIndex;

    fn extract(schema: Value) -> Logic {
        let registry = PluginRegistry::builtin();
        let index = SchemaIndex::new();
        Extractor::new(&registry, &index).split(&schema).unwrap()
    }

    #[test]
    fn test_integer_type_is_number_multiple_of_one() {
        let logic = extract(json!({"type": "integer"}));
        assert_eq!(
            logic,
            Logic::AllOf(vec![
                Logic::lit(Literal::Type(TypeSet::single(JsonType::Number))),
                Logic::lit(Literal::MultipleOf(json!(1))),
            ])
        );
    }

    #[test]
    fn test_integer_absorbed_by_number() {
        let logic = extract(json!({"type": ["integer", "number"]}));
        assert_eq!(logic, Logic::lit(Literal::Type(TypeSet::single(JsonType::Number))));
    }

    #[test]
    fn test_enum_is_disjunction_of_consts() {
        let logic = extract(json!({"enum": [1, "a"]}));
        assert_eq!(
            logic,
            Logic::AnyOf(vec![
                Logic::lit(Literal::Const(json!(1))),
                Logic::lit(Literal::Const(json!("a"))),
            ])
        );
        assert_eq!(extract(json!({"enum": []})), Logic::False);
    }

    #[test]
    fn test_if_without_then_or_else_is_trivial() {
        let logic = extract(json!({"if": {"minimum": 1}}));
        assert_eq!(logic, Logic::True);
    }

    #[test]
    fn test_unsupported_keywords_become_literals() {
        let logic = extract(json!({"unevaluatedItems": false}));
        assert!(matches!(logic, Logic::Lit(Literal::Unsupported { ref keyword, .. }) if keyword == "unevaluatedItems"));
    }
}
