//! Atomic literals
//!
//! A literal is one irreducible constraint from a single keyword family.
//! Type-specific literals are guarded: `Minimum` only constrains numbers and
//! holds vacuously for every other value, just like the `minimum` keyword.
//! A negated guarded literal therefore means "of the guarded type and
//! failing the inner constraint".
//!
//! Every literal knows its negation. Where a closed form exists it is
//! expressed with sibling literals (`not minimum m` is
//! `type number ∧ maximum m ∧ not const m`); otherwise the negation is a
//! `Neg` leaf plus the type guard. Negation never produces `Not`, so
//! repeated negation terminates.

use serde_json::{json, Map, Value};
use std::fmt;

use crate::logic::{negate_schema, Logic};
use crate::types::{JsonType, TypeSet};

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Value is one of these types
    Type(TypeSet),
    /// Value equals this constant
    Const(Value),
    /// Recursive reference left unexpanded (absolute URI)
    Ref(String),

    Minimum(Value),
    Maximum(Value),
    MultipleOf(Value),

    MinLength(u64),
    MaxLength(u64),
    Pattern(String),
    Format(String),

    MinItems(u64),
    MaxItems(u64),
    UniqueItems,
    /// The element at `index`, if present, satisfies `schema`
    PrefixItem { index: usize, schema: Value },
    /// Every element at or after `start` satisfies `schema`
    Items { start: usize, schema: Value },
    /// Between `min` and `max` elements satisfy `schema`
    Contains { schema: Value, min: u64, max: Option<u64> },

    Required(String),
    /// Property `key`, if present, satisfies `schema`
    Property { key: String, schema: Value },
    /// Every property whose key matches `pattern` satisfies `schema`
    PatternProperty { pattern: String, schema: Value },
    /// Every property not named in `keys` and not matching `patterns`
    /// satisfies `schema`
    AdditionalProperty { schema: Value, keys: Vec<String>, patterns: Vec<String> },
    /// Every key satisfies `schema`
    PropertyNames(Value),
    MinProperties(u64),
    MaxProperties(u64),

    /// A caller-defined keyword, opaque to the built-in plugins
    Keyword { keyword: String, value: Value, applies_to: Option<JsonType> },
    /// A keyword with no sound model; surfaces as an error unless the
    /// conjunction holding it is contradictory anyway
    Unsupported { keyword: String, value: Value, applies_to: Option<JsonType> },
}

/// Grouping tag for literals inside a conjunction
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LiteralKind {
    Type,
    Const,
    Ref,
    Minimum,
    Maximum,
    MultipleOf,
    MinLength,
    MaxLength,
    Pattern,
    Format,
    MinItems,
    MaxItems,
    UniqueItems,
    PrefixItem,
    Items,
    Contains,
    Required,
    Property,
    PatternProperty,
    AdditionalProperty,
    PropertyNames,
    MinProperties,
    MaxProperties,
    Keyword(String),
    Unsupported,
}

fn guarded(json_type: JsonType, parts: Vec<Logic>) -> Logic {
    let mut all = vec![Logic::lit(Literal::Type(TypeSet::single(json_type)))];
    all.extend(parts);
    Logic::all(all)
}

/// "More than `n`", false when no count exceeds `n`
fn above(n: u64, bound: fn(u64) -> Literal) -> Logic {
    n.checked_add(1).map_or(Logic::False, |next| Logic::lit(bound(next)))
}

fn padding(count: usize) -> Vec<Value> {
    vec![Value::Bool(true); count]
}

impl Literal {
    pub fn kind(&self) -> LiteralKind {
        match self {
            Literal::Type(_) => LiteralKind::Type,
            Literal::Const(_) => LiteralKind::Const,
            Literal::Ref(_) => LiteralKind::Ref,
            Literal::Minimum(_) => LiteralKind::Minimum,
            Literal::Maximum(_) => LiteralKind::Maximum,
            Literal::MultipleOf(_) => LiteralKind::MultipleOf,
            Literal::MinLength(_) => LiteralKind::MinLength,
            Literal::MaxLength(_) => LiteralKind::MaxLength,
            Literal::Pattern(_) => LiteralKind::Pattern,
            Literal::Format(_) => LiteralKind::Format,
            Literal::MinItems(_) => LiteralKind::MinItems,
            Literal::MaxItems(_) => LiteralKind::MaxItems,
            Literal::UniqueItems => LiteralKind::UniqueItems,
            Literal::PrefixItem { .. } => LiteralKind::PrefixItem,
            Literal::Items { .. } => LiteralKind::Items,
            Literal::Contains { .. } => LiteralKind::Contains,
            Literal::Required(_) => LiteralKind::Required,
            Literal::Property { .. } => LiteralKind::Property,
            Literal::PatternProperty { .. } => LiteralKind::PatternProperty,
            Literal::AdditionalProperty { .. } => LiteralKind::AdditionalProperty,
            Literal::PropertyNames(_) => LiteralKind::PropertyNames,
            Literal::MinProperties(_) => LiteralKind::MinProperties,
            Literal::MaxProperties(_) => LiteralKind::MaxProperties,
            Literal::Keyword { keyword, .. } => LiteralKind::Keyword(keyword.clone()),
            Literal::Unsupported { .. } => LiteralKind::Unsupported,
        }
    }

    /// The JSON type this literal constrains, or `None` for literals that
    /// constrain every value.
    pub fn applies_to(&self) -> Option<JsonType> {
        match self {
            Literal::Type(_) | Literal::Const(_) | Literal::Ref(_) => None,
            Literal::Minimum(_) | Literal::Maximum(_) | Literal::MultipleOf(_) => Some(JsonType::Number),
            Literal::MinLength(_) | Literal::MaxLength(_) | Literal::Pattern(_) | Literal::Format(_) => {
                Some(JsonType::String)
            }
            Literal::MinItems(_)
            | Literal::MaxItems(_)
            | Literal::UniqueItems
            | Literal::PrefixItem { .. }
            | Literal::Items { .. }
            | Literal::Contains { .. } => Some(JsonType::Array),
            Literal::Required(_)
            | Literal::Property { .. }
            | Literal::PatternProperty { .. }
            | Literal::AdditionalProperty { .. }
            | Literal::PropertyNames(_)
            | Literal::MinProperties(_)
            | Literal::MaxProperties(_) => Some(JsonType::Object),
            Literal::Keyword { applies_to, .. } | Literal::Unsupported { applies_to, .. } => *applies_to,
        }
    }

    /// Logical negation, built only from literals, `Neg` leaves and
    /// `AllOf`/`AnyOf`.
    pub fn negate(&self) -> Logic {
        use JsonType::*;
        match self {
            Literal::Type(set) => {
                let rest = set.complement();
                if rest.is_empty() {
                    Logic::False
                } else {
                    Logic::lit(Literal::Type(rest))
                }
            }
            Literal::Const(_) | Literal::Ref(_) => Logic::Neg(self.clone()),

            Literal::Minimum(m) => guarded(
                Number,
                vec![
                    Logic::lit(Literal::Maximum(m.clone())),
                    Logic::Neg(Literal::Const(m.clone())),
                ],
            ),
            Literal::Maximum(m) => guarded(
                Number,
                vec![
                    Logic::lit(Literal::Minimum(m.clone())),
                    Logic::Neg(Literal::Const(m.clone())),
                ],
            ),
            Literal::MultipleOf(_) => guarded(Number, vec![Logic::Neg(self.clone())]),

            Literal::MinLength(0) => Logic::False,
            Literal::MinLength(n) => guarded(String, vec![Logic::lit(Literal::MaxLength(n - 1))]),
            Literal::MaxLength(n) => guarded(String, vec![above(*n, Literal::MinLength)]),
            Literal::Pattern(_) | Literal::Format(_) => guarded(String, vec![Logic::Neg(self.clone())]),

            Literal::MinItems(0) => Logic::False,
            Literal::MinItems(n) => guarded(Array, vec![Logic::lit(Literal::MaxItems(n - 1))]),
            Literal::MaxItems(n) => guarded(Array, vec![above(*n, Literal::MinItems)]),
            Literal::UniqueItems => guarded(Array, vec![Logic::Neg(Literal::UniqueItems)]),
            Literal::PrefixItem { index, schema } => guarded(
                Array,
                vec![
                    Logic::lit(Literal::MinItems(*index as u64 + 1)),
                    Logic::lit(Literal::PrefixItem {
                        index: *index,
                        schema: negate_schema(schema),
                    }),
                ],
            ),
            Literal::Items { .. } => guarded(Array, vec![Logic::Neg(self.clone())]),
            Literal::Contains { schema, min, max } => {
                let mut alternatives = Vec::new();
                if *min > 0 {
                    alternatives.push(Logic::lit(Literal::Contains {
                        schema: schema.clone(),
                        min: 0,
                        max: Some(min - 1),
                    }));
                }
                if let Some(above_max) = max.and_then(|max| max.checked_add(1)) {
                    alternatives.push(Logic::lit(Literal::Contains {
                        schema: schema.clone(),
                        min: above_max,
                        max: None,
                    }));
                }
                guarded(Array, vec![Logic::any(alternatives)])
            }

            Literal::Required(key) => guarded(
                Object,
                vec![Logic::lit(Literal::Property {
                    key: key.clone(),
                    schema: Value::Bool(false),
                })],
            ),
            Literal::Property { key, schema } => guarded(
                Object,
                vec![
                    Logic::lit(Literal::Required(key.clone())),
                    Logic::lit(Literal::Property {
                        key: key.clone(),
                        schema: negate_schema(schema),
                    }),
                ],
            ),
            Literal::PatternProperty { .. } | Literal::AdditionalProperty { .. } | Literal::PropertyNames(_) => {
                guarded(Object, vec![Logic::Neg(self.clone())])
            }
            Literal::MinProperties(0) => Logic::False,
            Literal::MinProperties(n) => guarded(Object, vec![Logic::lit(Literal::MaxProperties(n - 1))]),
            Literal::MaxProperties(n) => guarded(Object, vec![above(*n, Literal::MinProperties)]),

            Literal::Keyword { applies_to, .. } | Literal::Unsupported { applies_to, .. } => match applies_to {
                Some(json_type) => guarded(*json_type, vec![Logic::Neg(self.clone())]),
                None => Logic::Neg(self.clone()),
            },
        }
    }

    /// Lossless JSON Schema rendering of the positive literal.
    pub fn to_json_schema(&self) -> Value {
        match self {
            Literal::Type(set) if set.is_empty() => Value::Bool(false),
            Literal::Type(set) => json!({ "type": set.to_json() }),
            Literal::Const(value) => json!({ "const": value }),
            Literal::Ref(uri) => json!({ "$ref": uri }),
            Literal::Minimum(m) => json!({ "minimum": m }),
            Literal::Maximum(m) => json!({ "maximum": m }),
            Literal::MultipleOf(m) => json!({ "multipleOf": m }),
            Literal::MinLength(n) => json!({ "minLength": n }),
            Literal::MaxLength(n) => json!({ "maxLength": n }),
            Literal::Pattern(p) => json!({ "pattern": p }),
            Literal::Format(f) => json!({ "format": f }),
            Literal::MinItems(n) => json!({ "minItems": n }),
            Literal::MaxItems(n) => json!({ "maxItems": n }),
            Literal::UniqueItems => json!({ "uniqueItems": true }),
            Literal::PrefixItem { index, schema } => {
                let mut prefix = padding(*index);
                prefix.push(schema.clone());
                json!({ "prefixItems": prefix })
            }
            Literal::Items { start: 0, schema } => json!({ "items": schema }),
            Literal::Items { start, schema } => json!({ "prefixItems": padding(*start), "items": schema }),
            Literal::Contains { schema, min, max } => {
                let mut map = Map::new();
                map.insert("contains".into(), schema.clone());
                if *min != 1 {
                    map.insert("minContains".into(), json!(min));
                }
                if let Some(max) = max {
                    map.insert("maxContains".into(), json!(max));
                }
                Value::Object(map)
            }
            Literal::Required(key) => json!({ "required": [key] }),
            Literal::Property { key, schema } => json!({ "properties": { key.clone(): schema } }),
            Literal::PatternProperty { pattern, schema } => {
                json!({ "patternProperties": { pattern.clone(): schema } })
            }
            Literal::AdditionalProperty { schema, keys, patterns } => {
                let mut map = Map::new();
                if !keys.is_empty() {
                    let props: Map<String, Value> = keys.iter().map(|k| (k.clone(), Value::Bool(true))).collect();
                    map.insert("properties".into(), Value::Object(props));
                }
                if !patterns.is_empty() {
                    let pats: Map<String, Value> =
                        patterns.iter().map(|p| (p.clone(), Value::Bool(true))).collect();
                    map.insert("patternProperties".into(), Value::Object(pats));
                }
                map.insert("additionalProperties".into(), schema.clone());
                Value::Object(map)
            }
            Literal::PropertyNames(schema) => json!({ "propertyNames": schema }),
            Literal::MinProperties(n) => json!({ "minProperties": n }),
            Literal::MaxProperties(n) => json!({ "maxProperties": n }),
            Literal::Keyword { keyword, value, .. } | Literal::Unsupported { keyword, value, .. } => {
                json!({ keyword.clone(): value })
            }
        }
    }

    /// JSON Schema for the negated literal
    pub fn to_negated_json_schema(&self) -> Value {
        negate_schema(&self.to_json_schema())
    }

    /// Canonical identity used to deduplicate literals and to spot a
    /// literal occurring both positively and negated.
    pub fn identity(&self) -> String {
        format!("{:?}:{}", self.kind(), self.to_json_schema())
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json_schema())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimum_negation_is_closed_form() {
        let negated = Literal::Minimum(json!(3)).negate();
        match negated {
            Logic::AllOf(parts) => {
                assert!(parts.contains(&Logic::lit(Literal::Type(TypeSet::single(JsonType::Number)))));
                assert!(parts.contains(&Logic::lit(Literal::Maximum(json!(3)))));
                assert!(parts.contains(&Logic::Neg(Literal::Const(json!(3)))));
            }
            other => panic!("Expected AllOf, got {:?}", other),
        }
    }

    #[test]
    fn test_trivial_bounds_negate_to_false() {
        assert_eq!(Literal::MinLength(0).negate(), Logic::False);
        assert_eq!(Literal::MinItems(0).negate(), Logic::False);
        assert_eq!(Literal::Type(TypeSet::ALL).negate(), Logic::False);
    }

    #[test]
    fn test_largest_upper_bounds_negate_to_false() {
        assert_eq!(Literal::MaxLength(u64::MAX).negate(), Logic::False);
        assert_eq!(Literal::MaxItems(u64::MAX).negate(), Logic::False);
        assert_eq!(Literal::MaxProperties(u64::MAX).negate(), Logic::False);
        let contains = Literal::Contains {
            schema: json!({"type": "string"}),
            min: 0,
            max: Some(u64::MAX),
        };
        assert_eq!(contains.negate(), Logic::False);
    }

    #[test]
    fn test_required_negates_to_absent_property() {
        let negated = Literal::Required("id".into()).negate();
        let expected = Logic::lit(Literal::Property {
            key: "id".into(),
            schema: json!(false),
        });
        match negated {
            Logic::AllOf(parts) => assert!(parts.contains(&expected)),
            other => panic!("Expected AllOf, got {:?}", other),
        }
    }

    #[test]
    fn test_contains_negation_splits_bounds() {
        let literal = Literal::Contains {
            schema: json!({"type": "string"}),
            min: 2,
            max: Some(4),
        };
        let negated = literal.negate().to_json_schema();
        let text = negated.to_string();
        assert!(text.contains("\"maxContains\":1"));
        assert!(text.contains("\"minContains\":5"));
    }

    #[test]
    fn test_schema_rendering() {
        let literal = Literal::Items {
            start: 2,
            schema: json!({"type": "string"}),
        };
        assert_eq!(
            literal.to_json_schema(),
            json!({"prefixItems": [true, true], "items": {"type": "string"}})
        );
        let literal = Literal::AdditionalProperty {
            schema: json!(false),
            keys: vec!["a".into()],
            patterns: Vec::new(),
        };
        assert_eq!(
            literal.to_json_schema(),
            json!({"properties": {"a": true}, "additionalProperties": false})
        );
    }
}
