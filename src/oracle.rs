//! Oracles: emptiness, subsumption, equivalence and canonical DNF
//!
//! Every query runs the same pipeline: extraction, raw DNF, then one
//! simplification per (conjunction, reachable type). Simplification may
//! call back into the engine to compare nested schemas; such nested
//! queries are ordinary recursive calls. A query that re-enters itself
//! (possible through recursive `$ref`s) answers "unknown".

use serde::{Serialize, Serializer};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, trace};

use crate::dnf::{raw_dnf, RawDnf};
use crate::error::{LogicError, Result};
use crate::extract::Extractor;
use crate::literal::Literal;
use crate::logic::{all_of_schema, negate_schema, Logic};
use crate::rational::Rational;
use crate::registry::PluginRegistry;
use crate::resolve::SchemaIndex;
use crate::simplify::{simplify_branch, Fragment, Simplified};
use crate::types::{json_eq, JsonType};

/// One branch of a canonical DNF
#[derive(Debug, Clone, PartialEq)]
pub enum Disjunct {
    /// Exactly one value
    Const(Value),
    Null(Fragment),
    Boolean(Fragment),
    Number(Fragment),
    String(Fragment),
    Array(Fragment),
    Object(Fragment),
}

impl Disjunct {
    pub fn typed(json_type: JsonType, fragment: Fragment) -> Self {
        match json_type {
            JsonType::Null => Disjunct::Null(fragment),
            JsonType::Boolean => Disjunct::Boolean(fragment),
            JsonType::Number => Disjunct::Number(fragment),
            JsonType::String => Disjunct::String(fragment),
            JsonType::Array => Disjunct::Array(fragment),
            JsonType::Object => Disjunct::Object(fragment),
        }
    }

    pub fn json_type(&self) -> JsonType {
        match self {
            Disjunct::Const(value) => JsonType::of(value),
            Disjunct::Null(_) => JsonType::Null,
            Disjunct::Boolean(_) => JsonType::Boolean,
            Disjunct::Number(_) => JsonType::Number,
            Disjunct::String(_) => JsonType::String,
            Disjunct::Array(_) => JsonType::Array,
            Disjunct::Object(_) => JsonType::Object,
        }
    }

    /// The canonical fragment, `None` for a const
    pub fn fragment(&self) -> Option<&Fragment> {
        match self {
            Disjunct::Const(_) => None,
            Disjunct::Null(f)
            | Disjunct::Boolean(f)
            | Disjunct::Number(f)
            | Disjunct::String(f)
            | Disjunct::Array(f)
            | Disjunct::Object(f) => Some(f),
        }
    }

    pub fn to_json_schema(&self) -> Value {
        match self.fragment() {
            Some(fragment) => fragment.to_json_schema(self.json_type()),
            None => match self {
                Disjunct::Const(value) => json!({ "const": value }),
                _ => Value::Bool(false),
            },
        }
    }

    /// The whole type with no further constraint
    fn is_unconstrained(&self) -> bool {
        self.fragment().map_or(false, Fragment::is_unconstrained)
    }
}

/// Canonical disjunctive normal form of a schema
#[derive(Debug, Clone, PartialEq)]
pub enum Dnf {
    True,
    False,
    AnyOf(Vec<Disjunct>),
}

impl Dnf {
    pub fn to_json_schema(&self) -> Value {
        match self {
            Dnf::True => Value::Bool(true),
            Dnf::False => Value::Bool(false),
            Dnf::AnyOf(disjuncts) => {
                json!({ "anyOf": disjuncts.iter().map(Disjunct::to_json_schema).collect::<Vec<_>>() })
            }
        }
    }

    pub fn disjuncts(&self) -> &[Disjunct] {
        match self {
            Dnf::AnyOf(disjuncts) => disjuncts,
            _ => &[],
        }
    }
}

impl Serialize for Dnf {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json_schema().serialize(serializer)
    }
}

impl fmt::Display for Dnf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json_schema())
    }
}

/// Query state for one top-level call
pub struct Engine<'a> {
    registry: &'a PluginRegistry,
    index: &'a SchemaIndex,
    /// Queries currently on the call stack
    in_progress: RefCell<HashSet<String>>,
}

impl<'a> Engine<'a> {
    pub fn new(registry: &'a PluginRegistry, index: &'a SchemaIndex) -> Self {
        Self {
            registry,
            index,
            in_progress: RefCell::new(HashSet::new()),
        }
    }

    pub fn registry(&self) -> &'a PluginRegistry {
        self.registry
    }

    pub fn index(&self) -> &'a SchemaIndex {
        self.index
    }

    pub fn extract(&self, schema: &Value) -> Result<Logic> {
        Extractor::new(self.registry, self.index).split(schema)
    }

    pub fn raw_dnf(&self, schema: &Value) -> Result<RawDnf> {
        let dnf = raw_dnf(self.extract(schema)?);
        debug!(conjunctions = dnf.len(), "raw dnf");
        Ok(dnf)
    }

    /// Run `f` unless the same query is already running further up.
    fn guarded<T>(&self, key: String, f: impl FnOnce() -> T) -> Option<T> {
        if !self.in_progress.borrow_mut().insert(key.clone()) {
            trace!(query = %key, "re-entrant query left undecided");
            return None;
        }
        let result = f();
        self.in_progress.borrow_mut().remove(&key);
        Some(result)
    }

    /// `Some(true)` if no value satisfies `schema`, `Some(false)` if some
    /// value provably does, `None` if undecided.
    pub fn describes_empty(&self, schema: &Value) -> Result<Option<bool>> {
        Ok(self
            .guarded(format!("empty:{}", schema), || self.emptiness(schema))
            .transpose()?
            .flatten())
    }

    fn emptiness(&self, schema: &Value) -> Result<Option<bool>> {
        let dnf = self.raw_dnf(schema)?;
        // An unmodelled keyword must surface no matter which branch is met first.
        let exhaustive = dnf.has_unsupported();
        let mut inhabited = false;
        let mut unknown = false;
        for conjunction in &dnf.conjunctions {
            for json_type in conjunction.types.iter() {
                match simplify_branch(conjunction, json_type, self)?.emptiness() {
                    Some(true) => {}
                    Some(false) if !exhaustive => return Ok(Some(false)),
                    Some(false) => inhabited = true,
                    None => unknown = true,
                }
            }
        }
        Ok(if inhabited {
            Some(false)
        } else if unknown {
            None
        } else {
            Some(true)
        })
    }

    /// `a ⊆ b`, decided as emptiness of `a ∧ ¬b`.
    pub fn describes_subset(&self, a: &Value, b: &Value) -> Result<Option<bool>> {
        self.describes_empty(&all_of_schema(vec![a.clone(), negate_schema(b)]))
    }

    pub fn are_equivalent(&self, a: &Value, b: &Value) -> Result<Option<bool>> {
        let forward = self.describes_subset(a, b)?;
        if forward == Some(false) {
            return Ok(Some(false));
        }
        let backward = self.describes_subset(b, a)?;
        Ok(match (forward, backward) {
            (_, Some(false)) => Some(false),
            (Some(true), Some(true)) => Some(true),
            _ => None,
        })
    }

    /// Emptiness of a nested schema. An unmodelled keyword down there only
    /// makes the answer unknown.
    pub fn probe_empty(&self, schema: &Value) -> Result<Option<bool>> {
        undecided_if_unsupported(self.describes_empty(schema))
    }

    pub fn probe_subset(&self, a: &Value, b: &Value) -> Result<Option<bool>> {
        undecided_if_unsupported(self.describes_subset(a, b))
    }

    /// Every value `schema` admits, when that set is finite and known.
    pub fn finite_values(&self, schema: &Value) -> Result<Option<Vec<Value>>> {
        let dnf = match self.guarded(format!("values:{}", schema), || self.to_dnf(schema)) {
            None => return Ok(None),
            Some(Err(LogicError::UnsupportedKeyword { .. })) => return Ok(None),
            Some(result) => result?,
        };
        Ok(match dnf {
            Dnf::True => None,
            Dnf::False => Some(Vec::new()),
            Dnf::AnyOf(disjuncts) => {
                let mut values: Vec<Value> = Vec::new();
                for disjunct in disjuncts {
                    match disjunct {
                        Disjunct::Const(value) => {
                            if !values.iter().any(|v| json_eq(v, &value)) {
                                values.push(value);
                            }
                        }
                        _ => return Ok(None),
                    }
                }
                Some(values)
            }
        })
    }

    /// Canonical DNF with redundant conjuncts and disjuncts pruned.
    pub fn to_dnf(&self, schema: &Value) -> Result<Dnf> {
        let raw = self.raw_dnf(schema)?;
        let mut disjuncts: Vec<Disjunct> = Vec::new();
        let mut push = |disjunct: Disjunct| {
            let rendered = disjunct.to_json_schema();
            if !disjuncts.iter().any(|d| d.to_json_schema() == rendered) {
                disjuncts.push(disjunct);
            }
        };
        for conjunction in &raw.conjunctions {
            for json_type in conjunction.types.iter() {
                match simplify_branch(conjunction, json_type, self)? {
                    Simplified::Empty => {}
                    Simplified::Values(values) => values.into_iter().map(Disjunct::Const).for_each(&mut push),
                    Simplified::Fragment { json_type, fragment, .. } => push(Disjunct::typed(json_type, fragment)),
                }
            }
        }

        let mut disjuncts = disjuncts
            .into_iter()
            .map(|d| self.prune_conjuncts(d))
            .collect::<Result<Vec<_>>>()?;
        let before = disjuncts.len();
        disjuncts = self.prune_disjuncts(disjuncts)?;
        debug!(disjuncts = disjuncts.len(), pruned = before - disjuncts.len(), "dnf");

        if disjuncts.is_empty() {
            return Ok(Dnf::False);
        }
        if covers_everything(&disjuncts) {
            return Ok(Dnf::True);
        }
        Ok(Dnf::AnyOf(disjuncts))
    }

    /// Drop residual `allOf` entries implied by the keywords or by a
    /// sibling entry.
    fn prune_conjuncts(&self, disjunct: Disjunct) -> Result<Disjunct> {
        let json_type = disjunct.json_type();
        let Some(fragment) = disjunct.fragment() else {
            return Ok(disjunct);
        };
        if fragment.all_of.is_empty() {
            return Ok(disjunct);
        }
        let base = Fragment {
            keywords: fragment.keywords.clone(),
            all_of: Vec::new(),
        }
        .to_json_schema(json_type);

        let entries = &fragment.all_of;
        let mut removed = vec![false; entries.len()];
        for i in 0..entries.len() {
            if self.probe_subset(&base, &entries[i])? == Some(true) {
                removed[i] = true;
                continue;
            }
            for j in 0..entries.len() {
                if i != j && !removed[j] && self.probe_subset(&entries[j], &entries[i])? == Some(true) {
                    removed[i] = true;
                    break;
                }
            }
        }
        let all_of = entries
            .iter()
            .zip(&removed)
            .filter(|(_, gone)| !**gone)
            .map(|(e, _)| e.clone())
            .collect();
        Ok(Disjunct::typed(
            json_type,
            Fragment {
                keywords: fragment.keywords.clone(),
                all_of,
            },
        ))
    }

    /// Drop disjuncts contained in a sibling disjunct.
    fn prune_disjuncts(&self, disjuncts: Vec<Disjunct>) -> Result<Vec<Disjunct>> {
        let schemas: Vec<Value> = disjuncts.iter().map(Disjunct::to_json_schema).collect();
        let mut removed = vec![false; disjuncts.len()];
        for i in 0..disjuncts.len() {
            for j in 0..disjuncts.len() {
                if i == j || removed[j] || disjuncts[i].json_type() != disjuncts[j].json_type() {
                    continue;
                }
                let contained = match &disjuncts[i] {
                    Disjunct::Const(value) => self.accepts(&schemas[j], value),
                    _ => self.probe_subset(&schemas[i], &schemas[j])?,
                };
                if contained == Some(true) {
                    removed[i] = true;
                    break;
                }
            }
        }
        Ok(disjuncts
            .into_iter()
            .zip(removed)
            .filter(|(_, gone)| !gone)
            .map(|(d, _)| d)
            .collect())
    }

    /// Three-valued membership of a concrete value.
    pub fn accepts(&self, schema: &Value, instance: &Value) -> Option<bool> {
        match self.extract(schema) {
            Ok(logic) => self.logic_accepts(&logic, instance),
            Err(e) => {
                trace!(error = %e, "membership left undecided");
                None
            }
        }
    }

    fn logic_accepts(&self, logic: &Logic, instance: &Value) -> Option<bool> {
        match logic {
            Logic::True => Some(true),
            Logic::False => Some(false),
            Logic::Lit(literal) => self.literal_accepts(literal, instance),
            Logic::Neg(literal) => self.literal_accepts(literal, instance).map(|ok| !ok),
            Logic::Not(inner) => self.logic_accepts(inner, instance).map(|ok| !ok),
            Logic::AllOf(children) => kleene_all(children.iter().map(|c| self.logic_accepts(c, instance))),
            Logic::AnyOf(children) => {
                kleene_all(children.iter().map(|c| self.logic_accepts(c, instance).map(|ok| !ok))).map(|ok| !ok)
            }
        }
    }

    /// Three-valued membership of a concrete value in one positive literal.
    pub fn literal_accepts(&self, literal: &Literal, instance: &Value) -> Option<bool> {
        if let Some(json_type) = literal.applies_to() {
            if JsonType::of(instance) != json_type {
                return Some(true);
            }
        }
        match literal {
            Literal::Type(set) => Some(set.contains(JsonType::of(instance))),
            Literal::Const(value) => Some(json_eq(value, instance)),
            Literal::Ref(uri) => {
                let target = self.index.lookup(uri)?;
                self.guarded(format!("accepts:{}:{}", uri, instance), || self.accepts(target, instance))
                    .flatten()
            }

            Literal::Minimum(m) => compare(instance, m).map(|o| o != Ordering::Less),
            Literal::Maximum(m) => compare(instance, m).map(|o| o != Ordering::Greater),
            Literal::MultipleOf(m) => {
                let step = Rational::from_value(m)?;
                Rational::from_value(instance)?.is_multiple_of(&step)
            }

            Literal::MinLength(n) => Some(char_count(instance) >= *n),
            Literal::MaxLength(n) => Some(char_count(instance) <= *n),
            Literal::Pattern(pattern) => self.pattern_matches(pattern, instance.as_str()?),
            Literal::Format(format) => self.registry.validate(&json!({ "format": format }), instance),

            Literal::MinItems(n) => Some(items(instance).len() as u64 >= *n),
            Literal::MaxItems(n) => Some(items(instance).len() as u64 <= *n),
            Literal::UniqueItems => {
                let items = items(instance);
                Some(
                    items
                        .iter()
                        .enumerate()
                        .all(|(i, a)| items[i + 1..].iter().all(|b| !json_eq(a, b))),
                )
            }
            Literal::PrefixItem { index, schema } => match items(instance).get(*index) {
                Some(item) => self.accepts(schema, item),
                None => Some(true),
            },
            Literal::Items { start, schema } => kleene_all(
                items(instance)
                    .iter()
                    .skip(*start)
                    .map(|item| self.accepts(schema, item)),
            ),
            Literal::Contains { schema, min, max } => {
                let (mut sure, mut maybe) = (0u64, 0u64);
                for item in items(instance) {
                    match self.accepts(schema, item) {
                        Some(true) => sure += 1,
                        Some(false) => {}
                        None => maybe += 1,
                    }
                }
                if sure >= *min && max.map_or(true, |m| sure + maybe <= m) {
                    Some(true)
                } else if sure + maybe < *min || max.map_or(false, |m| sure > m) {
                    Some(false)
                } else {
                    None
                }
            }

            Literal::Required(key) => Some(instance.get(key).is_some()),
            Literal::Property { key, schema } => match instance.get(key) {
                Some(value) => self.accepts(schema, value),
                None => Some(true),
            },
            Literal::PatternProperty { pattern, schema } => {
                kleene_all(properties(instance).map(|(key, value)| match self.pattern_matches(pattern, key) {
                    Some(false) => Some(true),
                    Some(true) => self.accepts(schema, value),
                    // accepted either way, or undecided
                    None => self.accepts(schema, value).filter(|ok| *ok),
                }))
            }
            Literal::AdditionalProperty { schema, keys, patterns } => {
                kleene_all(properties(instance).map(|(key, value)| {
                    if keys.iter().any(|k| k == key) {
                        return Some(true);
                    }
                    let matched = kleene_all(patterns.iter().map(|p| self.pattern_matches(p, key).map(|m| !m)))
                        .map(|none| !none);
                    match matched {
                        Some(true) => Some(true),
                        Some(false) => self.accepts(schema, value),
                        None => self.accepts(schema, value).filter(|ok| *ok),
                    }
                }))
            }
            Literal::PropertyNames(schema) => {
                kleene_all(properties(instance).map(|(key, _)| self.accepts(schema, &json!(key))))
            }
            Literal::MinProperties(n) => Some(properties(instance).count() as u64 >= *n),
            Literal::MaxProperties(n) => Some(properties(instance).count() as u64 <= *n),

            Literal::Keyword { keyword, value, .. } => {
                self.registry.validate(&json!({ keyword.clone(): value }), instance)
            }
            Literal::Unsupported { .. } => None,
        }
    }

    /// Whether `key` matches the ECMA-262 `pattern`, decided by the validators.
    pub fn pattern_matches(&self, pattern: &str, key: &str) -> Option<bool> {
        self.registry
            .validate(&json!({ "pattern": pattern }), &Value::String(key.to_string()))
    }

    pub fn validate(&self, schema: &Value, instance: &Value) -> Option<bool> {
        self.registry.validate(schema, instance)
    }
}

fn undecided_if_unsupported(result: Result<Option<bool>>) -> Result<Option<bool>> {
    match result {
        Err(LogicError::UnsupportedKeyword { keyword }) => {
            trace!(keyword = %keyword, "nested query hit an unsupported keyword");
            Ok(None)
        }
        other => other,
    }
}

/// Kleene conjunction: any `false` wins, then any unknown.
fn kleene_all(results: impl Iterator<Item = Option<bool>>) -> Option<bool> {
    let mut known = true;
    for result in results {
        match result {
            Some(false) => return Some(false),
            Some(true) => {}
            None => known = false,
        }
    }
    known.then_some(true)
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (Rational::from_value(a), Rational::from_value(b)) {
        (Some(x), Some(y)) => Some(x.cmp(&y)),
        _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
    }
}

fn char_count(value: &Value) -> u64 {
    value.as_str().map_or(0, |s| s.chars().count() as u64)
}

fn items(value: &Value) -> &[Value] {
    value.as_array().map(Vec::as_slice).unwrap_or(&[])
}

fn properties(value: &Value) -> impl Iterator<Item = (&String, &Value)> {
    value.as_object().into_iter().flat_map(|map| map.iter())
}

/// Every value of every type, with nothing excluded
fn covers_everything(disjuncts: &[Disjunct]) -> bool {
    let has_const = |value: Value| {
        disjuncts
            .iter()
            .any(|d| matches!(d, Disjunct::Const(c) if json_eq(c, &value)))
    };
    let open = |json_type: JsonType| {
        disjuncts
            .iter()
            .any(|d| d.json_type() == json_type && d.is_unconstrained())
    };
    (has_const(Value::Null) || open(JsonType::Null))
        && ((has_const(Value::Bool(true)) && has_const(Value::Bool(false))) || open(JsonType::Boolean))
        && [JsonType::Number, JsonType::String, JsonType::Array, JsonType::Object]
            .into_iter()
            .all(open)
}
