//! Object merge
//!
//! The effective schema of a property value mixes `properties`, every
//! matching `patternProperties` entry and the `additionalProperties`
//! fallthrough. Required keys and negated property families are
//! obligations: each needs a property whose key and value can satisfy it,
//! and together they must fit under `maxProperties`.

use serde_json::{json, Map, Value};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::{excluded_consts, Fragment, SimplificationPlugin, Verdict};
use crate::dnf::Conjunction;
use crate::error::Result;
use crate::literal::{Literal, LiteralKind};
use crate::logic::{all_of_schema, negate_schema};
use crate::oracle::Engine;
use crate::types::{json_eq, JsonType};

pub struct ObjectSimplification;

/// Extra keys tried when building a witness object
const SPARE_KEYS: usize = 64;

/// Resolves the effective value schema of a key, with a per-key cache.
struct KeyResolver<'c, 'e, 'a> {
    properties: BTreeMap<&'c str, Vec<Value>>,
    patterns: Vec<(&'c str, &'c Value)>,
    additional: Vec<(&'c Value, &'c [String], &'c [String])>,
    names: Vec<&'c Value>,
    engine: &'e Engine<'a>,
    cache: RefCell<HashMap<String, (Value, bool)>>,
}

impl<'c, 'e, 'a> KeyResolver<'c, 'e, 'a> {
    fn new(conjunction: &'c Conjunction, engine: &'e Engine<'a>) -> Self {
        let mut properties: BTreeMap<&str, Vec<Value>> = BTreeMap::new();
        for literal in conjunction.positive(&LiteralKind::Property) {
            if let Literal::Property { key, schema } = literal {
                properties.entry(key.as_str()).or_default().push(schema.clone());
            }
        }
        let patterns = conjunction
            .positive(&LiteralKind::PatternProperty)
            .iter()
            .filter_map(|l| match l {
                Literal::PatternProperty { pattern, schema } => Some((pattern.as_str(), schema)),
                _ => None,
            })
            .collect();
        let additional = conjunction
            .positive(&LiteralKind::AdditionalProperty)
            .iter()
            .filter_map(|l| match l {
                Literal::AdditionalProperty { schema, keys, patterns } => {
                    Some((schema, keys.as_slice(), patterns.as_slice()))
                }
                _ => None,
            })
            .collect();
        let names = conjunction
            .positive(&LiteralKind::PropertyNames)
            .iter()
            .filter_map(|l| match l {
                Literal::PropertyNames(schema) => Some(schema),
                _ => None,
            })
            .collect();
        Self {
            properties,
            patterns,
            additional,
            names,
            engine,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Whether some pattern in `patterns` matches `key`
    fn any_match(&self, patterns: &[String], key: &str) -> Option<bool> {
        let mut result = Some(false);
        for pattern in patterns {
            match self.engine.pattern_matches(pattern, key) {
                Some(true) => return Some(true),
                Some(false) => {}
                None => result = None,
            }
        }
        result
    }

    /// Effective value schema of `key`, and whether every pattern question
    /// on the way was decided. An undecided match leaves its schema out, so
    /// the result is never stronger than the truth.
    fn value_schema(&self, key: &str) -> (Value, bool) {
        if let Some(hit) = self.cache.borrow().get(key) {
            return hit.clone();
        }
        let mut parts = self.properties.get(key).cloned().unwrap_or_default();
        let mut exact = true;
        for (pattern, schema) in &self.patterns {
            match self.engine.pattern_matches(pattern, key) {
                Some(true) => parts.push((*schema).clone()),
                Some(false) => {}
                None => exact = false,
            }
        }
        for (schema, keys, patterns) in &self.additional {
            if keys.iter().any(|k| k == key) {
                continue;
            }
            match self.any_match(patterns, key) {
                Some(false) => parts.push((*schema).clone()),
                Some(true) => {}
                None => exact = false,
            }
        }
        let resolved = (all_of_schema(parts), exact);
        self.cache.borrow_mut().insert(key.to_string(), resolved.clone());
        resolved
    }

    fn name_allowed(&self, key: &str) -> Option<bool> {
        let mut result = Some(true);
        for names in &self.names {
            match self.engine.accepts(names, &json!(key)) {
                Some(false) => return Some(false),
                Some(true) => {}
                None => result = None,
            }
        }
        result
    }

    /// Whether `key` can host a property and some value for it exists.
    fn usable(&self, key: &str) -> Result<Option<bool>> {
        if self.name_allowed(key) == Some(false) {
            return Ok(Some(false));
        }
        let (schema, _) = self.value_schema(key);
        Ok(self.engine.probe_empty(&schema)?.map(|empty| !empty))
    }

    /// Like [`usable`](Self::usable) but only `Some(true)` when a value of
    /// that key is certainly accepted by every object keyword.
    fn certainly_usable(&self, key: &str) -> Result<bool> {
        let (schema, exact) = self.value_schema(key);
        Ok(exact && self.name_allowed(key) == Some(true) && self.engine.probe_empty(&schema)? == Some(false))
    }
}

/// Whether a required key could discharge a negated obligation; `Some(false)`
/// when it provably cannot.
fn discharges(resolver: &KeyResolver<'_, '_, '_>, obligation: &Literal, key: &str) -> Result<Option<bool>> {
    let engine = resolver.engine;
    let failing_value = |schema: &Value| -> Result<Option<bool>> {
        let (value, _) = resolver.value_schema(key);
        let both = all_of_schema(vec![value, negate_schema(schema)]);
        Ok(engine.probe_empty(&both)?.map(|empty| !empty))
    };
    match obligation {
        Literal::PatternProperty { pattern, schema } => match engine.pattern_matches(pattern, key) {
            Some(false) => Ok(Some(false)),
            _ => failing_value(schema),
        },
        Literal::AdditionalProperty { schema, keys, patterns } => {
            if keys.iter().any(|k| k == key) || resolver.any_match(patterns, key) == Some(true) {
                return Ok(Some(false));
            }
            failing_value(schema)
        }
        Literal::PropertyNames(schema) => Ok(engine.accepts(schema, &json!(key)).map(|ok| !ok)),
        _ => Ok(None),
    }
}

/// Schema of the keys able to discharge a negated property family
fn failing_keys(obligation: &Literal) -> Option<Value> {
    match obligation {
        Literal::PatternProperty { pattern, .. } => Some(json!({ "type": "string", "pattern": pattern })),
        Literal::AdditionalProperty { keys, patterns, .. } => {
            let mut named: Vec<Value> = patterns.iter().map(|p| json!({ "pattern": p })).collect();
            if !keys.is_empty() {
                named.push(json!({ "enum": keys }));
            }
            if named.is_empty() {
                return Some(json!({ "type": "string" }));
            }
            Some(json!({ "type": "string", "not": { "anyOf": named } }))
        }
        Literal::PropertyNames(schema) => Some(all_of_schema(vec![json!({ "type": "string" }), negate_schema(schema)])),
        _ => None,
    }
}

/// Keys `a`, `b`, ..., `z`, `aa`, `ab`, ...
fn spare_key(mut index: usize) -> String {
    let mut key = Vec::new();
    loop {
        key.push(b'a' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    key.reverse();
    String::from_utf8_lossy(&key).into_owned()
}

impl SimplificationPlugin for ObjectSimplification {
    fn id(&self) -> &str {
        "object"
    }

    fn json_type(&self) -> JsonType {
        JsonType::Object
    }

    fn handles(&self) -> Vec<LiteralKind> {
        vec![
            LiteralKind::Required,
            LiteralKind::Property,
            LiteralKind::PatternProperty,
            LiteralKind::AdditionalProperty,
            LiteralKind::PropertyNames,
            LiteralKind::MinProperties,
            LiteralKind::MaxProperties,
            LiteralKind::Const,
        ]
    }

    fn claims(&self) -> &[&'static str] {
        &[
            "required",
            "properties",
            "patternProperties",
            "additionalProperties",
            "propertyNames",
            "minProperties",
            "maxProperties",
            "not",
        ]
    }

    fn simplify(&self, conjunction: &Conjunction, fragment: &mut Fragment, engine: &Engine<'_>) -> Result<Verdict> {
        let explicit_lo = conjunction
            .positive(&LiteralKind::MinProperties)
            .iter()
            .filter_map(|l| match l {
                Literal::MinProperties(n) => Some(*n),
                _ => None,
            })
            .max()
            .unwrap_or(0);
        let mut hi = conjunction
            .positive(&LiteralKind::MaxProperties)
            .iter()
            .filter_map(|l| match l {
                Literal::MaxProperties(n) => Some(*n),
                _ => None,
            })
            .min();
        let too_small = |lo: u64, hi: Option<u64>| hi.map_or(false, |h| lo > h);
        if too_small(explicit_lo, hi) {
            return Ok(Verdict::Empty);
        }

        let resolver = KeyResolver::new(conjunction, engine);
        let required: BTreeSet<&str> = conjunction
            .positive(&LiteralKind::Required)
            .iter()
            .filter_map(|l| match l {
                Literal::Required(key) => Some(key.as_str()),
                _ => None,
            })
            .collect();
        for key in &required {
            if resolver.usable(key)? == Some(false) {
                return Ok(Verdict::Empty);
            }
        }
        let mut lo = explicit_lo.max(required.len() as u64);
        if too_small(lo, hi) {
            return Ok(Verdict::Empty);
        }

        let negated: Vec<&Literal> = [
            LiteralKind::PatternProperty,
            LiteralKind::AdditionalProperty,
            LiteralKind::PropertyNames,
        ]
        .iter()
        .flat_map(|kind| conjunction.negated(kind).iter())
        .collect();

        // A positive literal over the same keys whose schema is contained
        // in the negated one leaves no failing property.
        for obligation in &negated {
            for positive in conjunction.positive(&obligation.kind()) {
                let covered = match (obligation, positive) {
                    (
                        Literal::PatternProperty { pattern: p, schema: s },
                        Literal::PatternProperty { pattern: q, schema: t },
                    ) if p == q => engine.probe_subset(t, s)?,
                    (
                        Literal::AdditionalProperty { schema: s, keys: k1, patterns: p1 },
                        Literal::AdditionalProperty { schema: t, keys: k2, patterns: p2 },
                    ) if k1 == k2 && p1 == p2 => engine.probe_subset(t, s)?,
                    (Literal::PropertyNames(s), Literal::PropertyNames(t)) => engine.probe_subset(t, s)?,
                    _ => None,
                };
                if covered == Some(true) {
                    return Ok(Verdict::Empty);
                }
            }
        }

        if !negated.is_empty() {
            // Obligations no required key can discharge need keys of their
            // own; pairwise disjoint key sets need one key each.
            let mut blocked = Vec::new();
            for obligation in &negated {
                let mut free = false;
                for key in &required {
                    if discharges(&resolver, obligation, key)? != Some(false) {
                        free = true;
                        break;
                    }
                }
                if !free {
                    blocked.push(*obligation);
                }
            }
            let mut distinct: Vec<Value> = Vec::new();
            for obligation in blocked {
                let Some(keys) = failing_keys(obligation) else { continue };
                let mut disjoint = true;
                for other in &distinct {
                    if engine.probe_empty(&all_of_schema(vec![keys.clone(), other.clone()]))? != Some(true) {
                        disjoint = false;
                        break;
                    }
                }
                if disjoint {
                    distinct.push(keys);
                }
            }
            lo = lo.max(required.len() as u64 + distinct.len() as u64).max(1);
            if too_small(lo, hi) {
                return Ok(Verdict::Empty);
            }
        }

        // Closed objects admit only their named keys.
        for (schema, keys, patterns) in &resolver.additional {
            if !patterns.is_empty() || engine.probe_empty(schema)? != Some(true) {
                continue;
            }
            let mut allowed = 0u64;
            for key in keys.iter() {
                if resolver.usable(key)? != Some(false) {
                    allowed += 1;
                }
            }
            hi = Some(hi.map_or(allowed, |h| h.min(allowed)));
        }
        for names in &resolver.names {
            if engine.probe_empty(names)? == Some(true) {
                hi = Some(0);
            }
        }
        if too_small(lo, hi) {
            return Ok(Verdict::Empty);
        }

        let excluded = excluded_consts(conjunction, JsonType::Object);
        if hi == Some(0) {
            return Ok(if excluded.iter().any(|v| json_eq(v, &json!({}))) {
                Verdict::Empty
            } else {
                Verdict::Single(json!({}))
            });
        }

        let verdict = if !negated.is_empty() || !excluded.is_empty() {
            Verdict::Unknown
        } else {
            witness(&resolver, &required, lo)?
        };

        render(fragment, conjunction, &resolver, &required, explicit_lo, hi, &negated, &excluded);
        Ok(verdict)
    }
}

/// An object with every required key plus spare keys up to `lo`, each
/// holding some value of its effective schema.
fn witness(resolver: &KeyResolver<'_, '_, '_>, required: &BTreeSet<&str>, lo: u64) -> Result<Verdict> {
    for key in required {
        if !resolver.certainly_usable(key)? {
            return Ok(Verdict::Unknown);
        }
    }
    let mut count = required.len() as u64;
    let mut index = 0;
    while count < lo {
        if index >= usize::try_from(lo).unwrap_or(usize::MAX).saturating_add(SPARE_KEYS) {
            return Ok(Verdict::Unknown);
        }
        let key = spare_key(index);
        index += 1;
        if !required.contains(key.as_str()) && resolver.certainly_usable(&key)? {
            count += 1;
        }
    }
    Ok(Verdict::Inhabited)
}

#[allow(clippy::too_many_arguments)]
fn render(
    fragment: &mut Fragment,
    conjunction: &Conjunction,
    resolver: &KeyResolver<'_, '_, '_>,
    required: &BTreeSet<&str>,
    lo: u64,
    hi: Option<u64>,
    negated: &[&Literal],
    excluded: &[Value],
) {
    if !required.is_empty() {
        fragment.keywords.insert("required".into(), json!(required));
    }

    let mut properties: Map<String, Value> = resolver
        .properties
        .iter()
        .map(|(k, schemas)| (k.to_string(), all_of_schema(schemas.clone())))
        .collect();
    let mut pattern_properties: Map<String, Value> = Map::new();
    for (pattern, schema) in &resolver.patterns {
        let merged = match pattern_properties.remove(*pattern) {
            Some(existing) => all_of_schema(vec![existing, (*schema).clone()]),
            None => (*schema).clone(),
        };
        pattern_properties.insert(pattern.to_string(), merged);
    }

    // One `additionalProperties` can sit beside the keys and patterns it excludes.
    match resolver.additional.as_slice() {
        [(schema, keys, patterns)]
            if properties.keys().all(|k| keys.contains(k))
                && pattern_properties.keys().all(|p| patterns.contains(p)) =>
        {
            for key in keys.iter() {
                properties.entry(key.clone()).or_insert(Value::Bool(true));
            }
            for pattern in patterns.iter() {
                pattern_properties.entry(pattern.clone()).or_insert(Value::Bool(true));
            }
            fragment.keywords.insert("additionalProperties".into(), (*schema).clone());
        }
        _ => {
            for literal in conjunction.positive(&LiteralKind::AdditionalProperty) {
                fragment.push_literal(true, literal);
            }
        }
    }

    if !properties.is_empty() {
        fragment.keywords.insert("properties".into(), Value::Object(properties));
    }
    if !pattern_properties.is_empty() {
        fragment.keywords.insert("patternProperties".into(), Value::Object(pattern_properties));
    }
    if !resolver.names.is_empty() {
        let names = all_of_schema(resolver.names.iter().map(|s| (*s).clone()).collect());
        fragment.keywords.insert("propertyNames".into(), names);
    }
    if lo > 0 {
        fragment.keywords.insert("minProperties".into(), json!(lo));
    }
    if let Some(hi) = hi {
        fragment.keywords.insert("maxProperties".into(), json!(hi));
    }
    for literal in negated {
        fragment.push_literal(false, literal);
    }
    fragment.exclude(excluded);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spare_keys() {
        assert_eq!(spare_key(0), "a");
        assert_eq!(spare_key(25), "z");
        assert_eq!(spare_key(26), "aa");
        assert_eq!(spare_key(27), "ab");
        assert_eq!(spare_key(26 + 26 * 26), "aaa");
    }

    #[test]
    fn test_failing_keys() {
        let names = Literal::PropertyNames(json!({"maxLength": 1}));
        assert_eq!(
            failing_keys(&names),
            Some(json!({"allOf": [{"type": "string"}, {"not": {"maxLength": 1}}]}))
        );
        let closed = Literal::AdditionalProperty {
            schema: json!(false),
            keys: Vec::new(),
            patterns: Vec::new(),
        };
        assert_eq!(failing_keys(&closed), Some(json!({"type": "string"})));
        assert_eq!(failing_keys(&Literal::MinProperties(1)), None);
    }
}
