//! Simplification: one conjunction, one JSON type, one canonical fragment
//!
//! The driver resolves what needs no plugin (a pinned `const`, the finite
//! `null` and `boolean` domains), then runs the plugins registered for the
//! branch type in order. Each plugin merges the literal kinds it handles
//! into the shared [`Fragment`] and reports a [`Verdict`]. Literals no
//! plugin handles are kept verbatim in the fragment's `allOf` list.

mod array;
mod number;
mod object;
mod string;

pub use array::ArraySimplification;
pub use number::NumberSimplification;
pub use object::ObjectSimplification;
pub use string::StringSimplification;

use serde_json::{json, Map, Value};
use std::collections::HashSet;
use tracing::trace;

use crate::dnf::Conjunction;
use crate::error::{LogicError, Result};
use crate::literal::{Literal, LiteralKind};
use crate::oracle::Engine;
use crate::registry::BuiltinPlugin;
use crate::types::{json_eq, JsonType};

/// Merges the literals of one JSON type.
pub trait SimplificationPlugin: Send + Sync {
    fn id(&self) -> &str;

    /// Built-in plugin this one replaces, if any
    fn overrides(&self) -> Option<BuiltinPlugin> {
        None
    }

    fn json_type(&self) -> JsonType;

    /// Literal kinds this plugin consumes
    fn handles(&self) -> Vec<LiteralKind>;

    /// Output keywords this plugin writes
    fn claims(&self) -> &[&'static str];

    fn simplify(&self, conjunction: &Conjunction, fragment: &mut Fragment, engine: &Engine<'_>) -> Result<Verdict>;
}

/// What a plugin could prove about its share of the branch
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// No value satisfies the literals
    Empty,
    /// Exactly this value satisfies the literals
    Single(Value),
    /// At least one value satisfies the literals
    Inhabited,
    Unknown,
}

/// Canonical keywords for one type plus the constraints that did not merge
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    pub keywords: Map<String, Value>,
    pub all_of: Vec<Value>,
}

impl Fragment {
    /// JSON Schema for this fragment restricted to `json_type`.
    pub fn to_json_schema(&self, json_type: JsonType) -> Value {
        let mut map = Map::new();
        if !self.keywords.contains_key("type") {
            map.insert("type".into(), json!(json_type.name()));
        }
        map.extend(self.keywords.clone());
        if !self.all_of.is_empty() {
            map.insert("allOf".into(), Value::Array(self.all_of.clone()));
        }
        Value::Object(map)
    }

    /// Whether the fragment is the bare type
    pub fn is_unconstrained(&self) -> bool {
        self.keywords.is_empty() && self.all_of.is_empty()
    }

    /// Record values excluded from this branch as `not: {enum}`.
    pub fn exclude(&mut self, values: &[Value]) {
        match values {
            [] => {}
            [single] => {
                self.keywords.insert("not".into(), json!({ "const": single }));
            }
            many => {
                self.keywords.insert("not".into(), json!({ "enum": many }));
            }
        }
    }

    pub fn push_literal(&mut self, positive: bool, literal: &Literal) {
        self.all_of.push(if positive {
            literal.to_json_schema()
        } else {
            literal.to_negated_json_schema()
        });
    }
}

/// Result of simplifying one branch for one type
#[derive(Debug, Clone, PartialEq)]
pub enum Simplified {
    Empty,
    /// The branch is exactly these values
    Values(Vec<Value>),
    Fragment {
        json_type: JsonType,
        fragment: Fragment,
        /// Proven to admit at least one value
        inhabited: bool,
    },
}

impl Simplified {
    /// `Some(true)` empty, `Some(false)` inhabited, `None` unknown
    pub fn emptiness(&self) -> Option<bool> {
        match self {
            Simplified::Empty => Some(true),
            Simplified::Values(values) => Some(values.is_empty()),
            Simplified::Fragment { inhabited: true, .. } => Some(false),
            Simplified::Fragment { .. } => None,
        }
    }
}

/// Values of `json_type` excluded by negated consts on this branch.
pub fn excluded_consts(conjunction: &Conjunction, json_type: JsonType) -> Vec<Value> {
    let mut values: Vec<Value> = Vec::new();
    for literal in conjunction.negated(&LiteralKind::Const) {
        if let Literal::Const(value) = literal {
            if JsonType::of(value) == json_type && !values.iter().any(|v| json_eq(v, value)) {
                values.push(value.clone());
            }
        }
    }
    values
}

/// Simplify `conjunction` restricted to values of `json_type`.
pub fn simplify_branch(conjunction: &Conjunction, json_type: JsonType, engine: &Engine<'_>) -> Result<Simplified> {
    if !conjunction.types.contains(json_type) {
        return Ok(Simplified::Empty);
    }

    let mut applicable = Vec::new();
    for (positive, literal) in conjunction.literals() {
        match (literal, literal.applies_to()) {
            // a failed guard of another type cannot hold here
            (_, Some(t)) if t != json_type && !positive => return Ok(Simplified::Empty),
            (_, Some(t)) if t != json_type => {}
            (Literal::Const(value), _) if !positive && JsonType::of(value) != json_type => {}
            _ => applicable.push((positive, literal)),
        }
    }

    let result = simplify_applicable(conjunction, json_type, &applicable, engine)?;
    trace!(json_type = %json_type, result = ?result.emptiness(), "simplified branch");

    // A contradiction outranks an unmodelled keyword.
    if result != Simplified::Empty {
        let unsupported = applicable.iter().find_map(|(_, literal)| match literal {
            Literal::Unsupported { keyword, .. } => Some(keyword.clone()),
            _ => None,
        });
        if let Some(keyword) = unsupported {
            return Err(LogicError::UnsupportedKeyword { keyword });
        }
    }
    Ok(result)
}

fn simplify_applicable(
    conjunction: &Conjunction,
    json_type: JsonType,
    applicable: &[(bool, &Literal)],
    engine: &Engine<'_>,
) -> Result<Simplified> {
    if let Some(pinned) = conjunction.pinned() {
        return Ok(check_candidates(json_type, vec![pinned.clone()], applicable, engine));
    }
    match json_type {
        JsonType::Null => return Ok(check_candidates(json_type, vec![Value::Null], applicable, engine)),
        JsonType::Boolean => {
            return Ok(check_candidates(
                json_type,
                vec![Value::Bool(true), Value::Bool(false)],
                applicable,
                engine,
            ))
        }
        _ => {}
    }

    let mut fragment = Fragment::default();
    let mut handled: HashSet<LiteralKind> = HashSet::new();
    let mut verdicts = Vec::new();
    let present: HashSet<LiteralKind> = applicable.iter().map(|(_, l)| l.kind()).collect();

    for plugin in engine.registry().simplifiers_for(json_type) {
        let kinds = plugin.handles();
        if !kinds.iter().any(|k| present.contains(k)) {
            continue;
        }
        let verdict = plugin.simplify(conjunction, &mut fragment, engine)?;
        trace!(plugin = plugin.id(), verdict = ?verdict, "simplification plugin");
        if verdict == Verdict::Empty {
            return Ok(Simplified::Empty);
        }
        verdicts.push(verdict);
        handled.extend(kinds);
    }

    let mut residual = false;
    for (positive, literal) in applicable {
        if !handled.contains(&literal.kind()) {
            fragment.push_literal(*positive, literal);
            residual = true;
        }
    }

    if let Some(single) = verdicts.iter().find_map(|v| match v {
        Verdict::Single(value) => Some(value.clone()),
        _ => None,
    }) {
        return Ok(match accepts_all(&single, applicable, engine) {
            Some(true) => Simplified::Values(vec![single]),
            Some(false) => Simplified::Empty,
            None => Simplified::Fragment {
                json_type,
                fragment,
                inhabited: false,
            },
        });
    }

    // Independent proofs from two plugins do not combine.
    let inhabited = !residual && verdicts.len() <= 1 && verdicts.iter().all(|v| *v == Verdict::Inhabited);
    Ok(Simplified::Fragment {
        json_type,
        fragment,
        inhabited,
    })
}

/// Kleene conjunction of every literal on one concrete value.
fn accepts_all(value: &Value, literals: &[(bool, &Literal)], engine: &Engine<'_>) -> Option<bool> {
    let mut known = true;
    for (positive, literal) in literals {
        match engine.literal_accepts(literal, value).map(|ok| ok == *positive) {
            Some(false) => return Some(false),
            Some(true) => {}
            None => known = false,
        }
    }
    if known {
        Some(true)
    } else {
        None
    }
}

fn check_candidates(
    json_type: JsonType,
    candidates: Vec<Value>,
    literals: &[(bool, &Literal)],
    engine: &Engine<'_>,
) -> Simplified {
    let mut accepted = Vec::new();
    let mut undecided = false;
    let single = candidates.len() == 1;
    let mut pinned = None;
    for candidate in candidates {
        match accepts_all(&candidate, literals, engine) {
            Some(true) => accepted.push(candidate),
            Some(false) => {}
            None => {
                undecided = true;
                pinned = Some(candidate);
            }
        }
    }

    if !undecided {
        return if accepted.is_empty() {
            Simplified::Empty
        } else {
            Simplified::Values(accepted)
        };
    }

    let mut fragment = Fragment::default();
    if let (true, Some(value)) = (single, pinned) {
        fragment.keywords.insert("const".into(), value);
    }
    for (positive, literal) in literals {
        if literal.kind() != LiteralKind::Const || !positive {
            fragment.push_literal(*positive, literal);
        }
    }
    Simplified::Fragment {
        json_type,
        fragment,
        inhabited: !accepted.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_rendering() {
        let mut fragment = Fragment::default();
        fragment.keywords.insert("minLength".into(), json!(2));
        fragment.exclude(&[json!("ab")]);
        fragment.all_of.push(json!({"pattern": "^a"}));
        assert_eq!(
            fragment.to_json_schema(JsonType::String),
            json!({
                "type": "string",
                "minLength": 2,
                "not": {"const": "ab"},
                "allOf": [{"pattern": "^a"}]
            })
        );
    }

    #[test]
    fn test_integer_type_is_kept() {
        let mut fragment = Fragment::default();
        fragment.keywords.insert("type".into(), json!("integer"));
        assert_eq!(fragment.to_json_schema(JsonType::Number), json!({"type": "integer"}));
    }

    #[test]
    fn test_emptiness_of_results() {
        assert_eq!(Simplified::Empty.emptiness(), Some(true));
        assert_eq!(Simplified::Values(vec![json!(1)]).emptiness(), Some(false));
        let unknown = Simplified::Fragment {
            json_type: JsonType::String,
            fragment: Fragment::default(),
            inhabited: false,
        };
        assert_eq!(unknown.emptiness(), None);
    }
}
