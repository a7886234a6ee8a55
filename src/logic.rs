//! Logical combinations of literals
//!
//! A `Logic` tree is what extraction produces for a schema. `Not` is the
//! only node the raw-DNF converter has to eliminate; `Neg` is a negated
//! leaf that survives into conjunctions.

use serde_json::{json, Value};

use crate::literal::Literal;

#[derive(Debug, Clone, PartialEq)]
pub enum Logic {
    True,
    False,
    /// A positive literal
    Lit(Literal),
    /// A negated literal with no closed-form negation
    Neg(Literal),
    Not(Box<Logic>),
    AllOf(Vec<Logic>),
    AnyOf(Vec<Logic>),
}

impl Logic {
    pub fn lit(literal: Literal) -> Self {
        Logic::Lit(literal)
    }

    pub fn not(inner: Logic) -> Self {
        match inner {
            Logic::True => Logic::False,
            Logic::False => Logic::True,
            other => Logic::Not(Box::new(other)),
        }
    }

    /// Conjunction with constant folding and flattening.
    pub fn all(children: impl IntoIterator<Item = Logic>) -> Self {
        let mut flat = Vec::new();
        for child in children {
            match child {
                Logic::True => {}
                Logic::False => return Logic::False,
                Logic::AllOf(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Logic::True,
            1 => flat.pop().unwrap_or(Logic::True),
            _ => Logic::AllOf(flat),
        }
    }

    /// Disjunction with constant folding and flattening.
    pub fn any(children: impl IntoIterator<Item = Logic>) -> Self {
        let mut flat = Vec::new();
        for child in children {
            match child {
                Logic::False => {}
                Logic::True => return Logic::True,
                Logic::AnyOf(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Logic::False,
            1 => flat.pop().unwrap_or(Logic::False),
            _ => Logic::AnyOf(flat),
        }
    }

    /// Push one level of negation into this node.
    ///
    /// The result contains `Not` only directly above children of the
    /// original node, so applying it recursively terminates.
    pub fn negate(self) -> Logic {
        match self {
            Logic::True => Logic::False,
            Logic::False => Logic::True,
            Logic::Lit(literal) => literal.negate(),
            Logic::Neg(literal) => Logic::Lit(literal),
            Logic::Not(inner) => *inner,
            Logic::AllOf(children) => Logic::any(children.into_iter().map(Logic::not)),
            Logic::AnyOf(children) => Logic::all(children.into_iter().map(Logic::not)),
        }
    }

    /// Equivalent JSON Schema.
    pub fn to_json_schema(&self) -> Value {
        match self {
            Logic::True => Value::Bool(true),
            Logic::False => Value::Bool(false),
            Logic::Lit(literal) => literal.to_json_schema(),
            Logic::Neg(literal) => json!({ "not": literal.to_json_schema() }),
            Logic::Not(inner) => negate_schema(&inner.to_json_schema()),
            Logic::AllOf(children) => {
                json!({ "allOf": children.iter().map(Logic::to_json_schema).collect::<Vec<_>>() })
            }
            Logic::AnyOf(children) => {
                json!({ "anyOf": children.iter().map(Logic::to_json_schema).collect::<Vec<_>>() })
            }
        }
    }
}

/// `{"not": schema}`, collapsing boolean schemas and double negation.
pub fn negate_schema(schema: &Value) -> Value {
    match schema {
        Value::Bool(b) => Value::Bool(!b),
        Value::Object(map) if map.len() == 1 => match map.get("not") {
            Some(inner) => inner.clone(),
            None => json!({ "not": schema }),
        },
        _ => json!({ "not": schema }),
    }
}

/// `{"allOf": schemas}`, collapsing trivial cases.
pub fn all_of_schema(mut schemas: Vec<Value>) -> Value {
    schemas.retain(|s| s != &Value::Bool(true) && s != &json!({}));
    if schemas.iter().any(|s| s == &Value::Bool(false)) {
        return Value::Bool(false);
    }
    match schemas.len() {
        0 => Value::Bool(true),
        1 => schemas.pop().unwrap_or(Value::Bool(true)),
        _ => json!({ "allOf": schemas }),
    }
}
