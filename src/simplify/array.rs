//! Array merge
//!
//! Positional constraints (`prefixItems` slots and `items` tails) merge into
//! one schema per position. `contains` obligations, and negated `items`
//! ("some element from `start` on fails the schema"), are checked against
//! the positions able to host a match. Sub-schema questions are answered by
//! re-entering the oracles.

use serde_json::{json, Value};
use std::collections::BTreeMap;

use super::{excluded_consts, Fragment, SimplificationPlugin, Verdict};
use crate::dnf::Conjunction;
use crate::error::Result;
use crate::literal::{Literal, LiteralKind};
use crate::logic::{all_of_schema, negate_schema};
use crate::oracle::Engine;
use crate::types::{json_eq, JsonType};

pub struct ArraySimplification;

/// "At least `min` and at most `max` elements at or after `from` match `schema`"
struct Obligation {
    schema: Value,
    min: u64,
    max: Option<u64>,
    from: usize,
    /// The literal it came from, for rendering
    source: (bool, Literal),
    /// Every match sits on a known prefix slot and was conjoined into it
    pinned: bool,
}

/// Per-position merged schemas
struct Layout {
    slots: BTreeMap<usize, Vec<Value>>,
    tails: Vec<(usize, Value)>,
}

impl Layout {
    /// First position from which every position has the same schema
    fn boundary(&self) -> usize {
        let slot_end = self.slots.keys().next_back().map_or(0, |i| i + 1);
        let tail_start = self.tails.iter().map(|(start, _)| *start).max().unwrap_or(0);
        slot_end.max(tail_start)
    }

    fn position(&self, index: usize) -> Value {
        let mut parts: Vec<Value> = self.slots.get(&index).cloned().unwrap_or_default();
        parts.extend(
            self.tails
                .iter()
                .filter(|(start, _)| *start <= index)
                .map(|(_, schema)| schema.clone()),
        );
        all_of_schema(parts)
    }

    fn tail(&self) -> Value {
        self.position(self.boundary())
    }
}

fn count_to_u64(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

impl SimplificationPlugin for ArraySimplification {
    fn id(&self) -> &str {
        "array"
    }

    fn json_type(&self) -> JsonType {
        JsonType::Array
    }

    fn handles(&self) -> Vec<LiteralKind> {
        vec![
            LiteralKind::MinItems,
            LiteralKind::MaxItems,
            LiteralKind::UniqueItems,
            LiteralKind::PrefixItem,
            LiteralKind::Items,
            LiteralKind::Contains,
            LiteralKind::Const,
        ]
    }

    fn claims(&self) -> &[&'static str] {
        &[
            "prefixItems",
            "items",
            "contains",
            "minContains",
            "maxContains",
            "minItems",
            "maxItems",
            "uniqueItems",
            "not",
        ]
    }

    fn simplify(&self, conjunction: &Conjunction, fragment: &mut Fragment, engine: &Engine<'_>) -> Result<Verdict> {
        let explicit_lo = conjunction
            .positive(&LiteralKind::MinItems)
            .iter()
            .filter_map(|l| match l {
                Literal::MinItems(n) => Some(*n),
                _ => None,
            })
            .max()
            .unwrap_or(0);
        let mut hi = conjunction
            .positive(&LiteralKind::MaxItems)
            .iter()
            .filter_map(|l| match l {
                Literal::MaxItems(n) => Some(*n),
                _ => None,
            })
            .min();
        let unique = !conjunction.positive(&LiteralKind::UniqueItems).is_empty();
        let not_unique = !conjunction.negated(&LiteralKind::UniqueItems).is_empty();
        // two equal elements need two elements
        let mut lo = if not_unique { explicit_lo.max(2) } else { explicit_lo };

        let mut layout = Layout {
            slots: BTreeMap::new(),
            tails: Vec::new(),
        };
        for literal in conjunction.positive(&LiteralKind::PrefixItem) {
            if let Literal::PrefixItem { index, schema } = literal {
                layout.slots.entry(*index).or_default().push(schema.clone());
            }
        }
        for literal in conjunction.positive(&LiteralKind::Items) {
            if let Literal::Items { start, schema } = literal {
                layout.tails.push((*start, schema.clone()));
            }
        }

        let mut obligations = Vec::new();
        for literal in conjunction.positive(&LiteralKind::Contains) {
            if let Literal::Contains { schema, min, max } = literal {
                match (min, max) {
                    // nothing may match: every element fails the schema
                    (0, Some(0)) => layout.tails.push((0, negate_schema(schema))),
                    (0, None) => {}
                    _ => obligations.push(Obligation {
                        schema: schema.clone(),
                        min: *min,
                        max: *max,
                        from: 0,
                        source: (true, literal.clone()),
                        pinned: false,
                    }),
                }
            }
        }
        for literal in conjunction.negated(&LiteralKind::Items) {
            if let Literal::Items { start, schema } = literal {
                obligations.push(Obligation {
                    schema: negate_schema(schema),
                    min: 1,
                    max: None,
                    from: *start,
                    source: (false, literal.clone()),
                    pinned: false,
                });
            }
        }

        // Obligations with exactly as many host slots as matches pin those
        // slots, which may empty other positions; repeat until stable.
        let mut pinned_lo = 0u64;
        let (boundary, tail) = loop {
            let boundary = layout.boundary();
            let tail = layout.tail();

            // An unsatisfiable position caps the length before it.
            for p in 0..=boundary {
                if hi.map_or(false, |h| count_to_u64(p) >= h) {
                    break;
                }
                let schema = if p == boundary { tail.clone() } else { layout.position(p) };
                if engine.probe_empty(&schema)? == Some(true) {
                    hi = Some(count_to_u64(p));
                    break;
                }
            }
            if hi.map_or(false, |h| lo > h) {
                return Ok(Verdict::Empty);
            }

            let mut narrowed = false;
            for obligation in obligations.iter_mut().filter(|o| o.min > 0 && !o.pinned) {
                let first_tail = obligation.from.max(boundary);
                let tail_hosts = hi.map_or(true, |h| h > count_to_u64(first_tail)) && {
                    let both = all_of_schema(vec![tail.clone(), obligation.schema.clone()]);
                    engine.probe_empty(&both)? != Some(true)
                };

                let mut hosts = Vec::new();
                for p in obligation.from..boundary {
                    if hi.map_or(false, |h| count_to_u64(p) >= h) {
                        break;
                    }
                    if tail_hosts && count_to_u64(hosts.len()) >= obligation.min {
                        break;
                    }
                    let both = all_of_schema(vec![layout.position(p), obligation.schema.clone()]);
                    if engine.probe_empty(&both)? != Some(true) {
                        hosts.push(p);
                    }
                }

                let found = count_to_u64(hosts.len());
                let last_host = hosts.last().map_or(0, |p| count_to_u64(*p) + 1);
                let needed_length = if found >= obligation.min {
                    last_host
                } else if tail_hosts {
                    count_to_u64(first_tail).saturating_add(obligation.min - found)
                } else {
                    return Ok(Verdict::Empty);
                };
                if !tail_hosts && found == obligation.min {
                    for p in &hosts {
                        layout.slots.entry(*p).or_default().push(obligation.schema.clone());
                    }
                    obligation.pinned = true;
                    pinned_lo = pinned_lo.max(last_host);
                    narrowed = true;
                }
                lo = lo.max(needed_length);
                if hi.map_or(false, |h| lo > h) {
                    return Ok(Verdict::Empty);
                }
            }
            if !narrowed {
                break (boundary, tail);
            }
        };

        // Positions that always match cannot exceed `maxContains`.
        for obligation in &obligations {
            let Some(max) = obligation.max else { continue };
            let mut forced = 0u64;
            let present = usize::try_from(lo).unwrap_or(usize::MAX);
            for p in obligation.from..present.min(boundary) {
                if engine.probe_subset(&layout.position(p), &obligation.schema)? == Some(true) {
                    forced += 1;
                }
            }
            // every present tail position behaves alike
            let first_tail = count_to_u64(obligation.from.max(boundary));
            if lo > first_tail && engine.probe_subset(&tail, &obligation.schema)? == Some(true) {
                forced = forced.saturating_add(lo - first_tail);
            }
            if forced > max {
                return Ok(Verdict::Empty);
            }
        }

        // Pairwise: every match of `a` is a match of `b`.
        for a in &obligations {
            for b in &obligations {
                let Some(b_max) = b.max else { continue };
                if std::ptr::eq(a, b) || a.min <= b_max || b.from > a.from {
                    continue;
                }
                if engine.probe_subset(&a.schema, &b.schema)? == Some(true) {
                    return Ok(Verdict::Empty);
                }
            }
        }

        // Distinct elements drawn from finite value sets.
        if unique && lo >= 2 {
            if forced_collision(&layout, lo, boundary, engine)? {
                return Ok(Verdict::Empty);
            }
            if let Some(cap) = unique_capacity(&layout, boundary, &tail, engine)? {
                hi = Some(hi.map_or(cap, |h| h.min(cap)));
                if lo > cap {
                    return Ok(Verdict::Empty);
                }
            }
        }

        // Pinned slots carry their matches from here on.
        obligations.retain(|o| !(o.pinned && o.max.is_none()));
        let explicit_lo = explicit_lo.max(pinned_lo);

        let excluded = excluded_consts(conjunction, JsonType::Array);
        if hi == Some(0) {
            return Ok(if excluded.iter().any(|v| json_eq(v, &json!([]))) {
                Verdict::Empty
            } else {
                Verdict::Single(json!([]))
            });
        }

        let verdict = if !excluded.is_empty() || not_unique || obligations.iter().any(|o| o.max.is_some()) {
            Verdict::Unknown
        } else {
            witness(explicit_lo, hi, unique, &layout, boundary, &tail, &obligations, engine)?
        };

        render(fragment, explicit_lo, hi, unique, not_unique, &layout, boundary, &obligations, &excluded);
        Ok(verdict)
    }
}

/// Upper bound on the length of a unique array whose elements come from
/// finite value sets.
fn unique_capacity(layout: &Layout, boundary: usize, tail: &Value, engine: &Engine<'_>) -> Result<Option<u64>> {
    let Some(tail_values) = engine.finite_values(tail)? else {
        return Ok(None);
    };
    let mut cap = count_to_u64(boundary) + count_to_u64(tail_values.len());

    let mut union: Vec<Value> = tail_values;
    for p in 0..boundary {
        match engine.finite_values(&layout.position(p))? {
            Some(values) => {
                for value in values {
                    if !union.iter().any(|u| json_eq(u, &value)) {
                        union.push(value);
                    }
                }
            }
            None => return Ok(Some(cap)),
        }
    }
    cap = cap.min(count_to_u64(union.len()));
    Ok(Some(cap))
}

/// Whether the prefix positions every array must have draw from finite sets
/// with fewer distinct values than positions.
fn forced_collision(layout: &Layout, lo: u64, boundary: usize, engine: &Engine<'_>) -> Result<bool> {
    let present = usize::try_from(lo).unwrap_or(usize::MAX).min(boundary);
    let mut finite = 0usize;
    let mut union: Vec<Value> = Vec::new();
    for p in 0..present {
        if let Some(values) = engine.finite_values(&layout.position(p))? {
            finite += 1;
            for value in values {
                if !union.iter().any(|u| json_eq(u, &value)) {
                    union.push(value);
                }
            }
        }
    }
    Ok(finite > union.len())
}

/// Try to prove the branch inhabited by laying out a concrete shape:
/// `base` unconstrained elements, then `min` matches per obligation in
/// the tail.
#[allow(clippy::too_many_arguments)]
fn witness(
    lo: u64,
    hi: Option<u64>,
    unique: bool,
    layout: &Layout,
    boundary: usize,
    tail: &Value,
    obligations: &[Obligation],
    engine: &Engine<'_>,
) -> Result<Verdict> {
    let base = if obligations.is_empty() {
        lo
    } else {
        let from = obligations.iter().map(|o| o.from).max().unwrap_or(0);
        lo.max(count_to_u64(boundary)).max(count_to_u64(from))
    };
    let matches = obligations.iter().fold(0u64, |sum, o| sum.saturating_add(o.min));
    let length = base.saturating_add(matches);
    if hi.map_or(false, |h| length > h) {
        return Ok(Verdict::Unknown);
    }

    let explicit = usize::try_from(base).unwrap_or(usize::MAX).min(boundary);
    for p in 0..explicit {
        let schema = layout.position(p);
        if engine.probe_empty(&schema)? != Some(false) {
            return Ok(Verdict::Unknown);
        }
        if unique && length > 1 && schema != Value::Bool(true) {
            return Ok(Verdict::Unknown);
        }
    }
    if base > count_to_u64(boundary) {
        if engine.probe_empty(tail)? != Some(false) {
            return Ok(Verdict::Unknown);
        }
        if unique && length > 1 && tail != &Value::Bool(true) {
            return Ok(Verdict::Unknown);
        }
    }
    if unique && length > 1 && !obligations.is_empty() {
        return Ok(Verdict::Unknown);
    }
    for obligation in obligations {
        let both = all_of_schema(vec![tail.clone(), obligation.schema.clone()]);
        if engine.probe_empty(&both)? != Some(false) {
            return Ok(Verdict::Unknown);
        }
    }
    Ok(Verdict::Inhabited)
}

#[allow(clippy::too_many_arguments)]
fn render(
    fragment: &mut Fragment,
    lo: u64,
    hi: Option<u64>,
    unique: bool,
    not_unique: bool,
    layout: &Layout,
    boundary: usize,
    obligations: &[Obligation],
    excluded: &[Value],
) {
    let visible = hi.map_or(boundary, |h| boundary.min(usize::try_from(h).unwrap_or(usize::MAX)));
    if visible > 0 {
        let prefix: Vec<Value> = (0..visible).map(|p| layout.position(p)).collect();
        fragment.keywords.insert("prefixItems".into(), Value::Array(prefix));
    }
    if !layout.tails.is_empty() && hi.map_or(true, |h| h > count_to_u64(boundary)) {
        fragment.keywords.insert("items".into(), layout.tail());
    }
    if lo > 0 {
        fragment.keywords.insert("minItems".into(), json!(lo));
    }
    if let Some(hi) = hi {
        fragment.keywords.insert("maxItems".into(), json!(hi));
    }
    if unique {
        fragment.keywords.insert("uniqueItems".into(), json!(true));
    }

    let mut contains_written = false;
    for obligation in obligations {
        match &obligation.source {
            (true, Literal::Contains { schema, min, max }) if !contains_written => {
                fragment.keywords.insert("contains".into(), schema.clone());
                if *min != 1 {
                    fragment.keywords.insert("minContains".into(), json!(min));
                }
                if let Some(max) = max {
                    fragment.keywords.insert("maxContains".into(), json!(max));
                }
                contains_written = true;
            }
            (positive, literal) => fragment.push_literal(*positive, literal),
        }
    }
    if not_unique {
        fragment.push_literal(false, &Literal::UniqueItems);
    }
    fragment.exclude(excluded);
}
