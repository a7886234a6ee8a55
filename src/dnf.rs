//! Raw disjunctive normal form
//!
//! Negation is pushed down to the literals, then conjunction is distributed
//! over disjunction until the tree is a flat union of conjunctions. Each
//! conjunction groups its literals by kind and tracks the JSON types still
//! reachable on that branch. Branches that are contradictory on their face
//! (a literal both asserted and negated, two different consts, no type
//! left) are dropped here; everything else is left to simplification.
//!
//! There is no cap on the product expansion.

use serde_json::Value;
use std::collections::BTreeMap;
use std::collections::HashSet;

use crate::literal::{Literal, LiteralKind};
use crate::logic::{all_of_schema, Logic};
use crate::types::{json_eq, JsonType, TypeSet};

/// Positive and negated instances of one literal kind
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Group {
    pub positive: Vec<Literal>,
    pub negated: Vec<Literal>,
}

/// A conjunction of (possibly negated) literals
#[derive(Debug, Clone, PartialEq)]
pub struct Conjunction {
    /// Types still reachable on this branch
    pub types: TypeSet,
    groups: BTreeMap<LiteralKind, Group>,
}

impl Conjunction {
    /// Build a conjunction, or `None` if it is trivially contradictory.
    pub fn from_literals(literals: Vec<(bool, Literal)>) -> Option<Self> {
        let mut types = TypeSet::ALL;
        let mut groups: BTreeMap<LiteralKind, Group> = BTreeMap::new();
        let mut seen: HashSet<(bool, String)> = HashSet::new();

        for (positive, literal) in literals {
            match (&literal, positive) {
                (Literal::Type(set), true) => {
                    types = types.intersect(*set);
                    continue;
                }
                (Literal::Type(set), false) => {
                    types = types.intersect(set.complement());
                    continue;
                }
                (Literal::Const(value), true) => types = types.intersect(TypeSet::single(JsonType::of(value))),
                _ => {}
            }
            // A failed guarded literal needs a value of the guarded type.
            if !positive {
                if let Some(json_type) = literal.applies_to() {
                    types = types.intersect(TypeSet::single(json_type));
                }
            }

            let identity = literal.identity();
            if seen.contains(&(!positive, identity.clone())) {
                return None;
            }
            if !seen.insert((positive, identity)) {
                continue;
            }
            let group = groups.entry(literal.kind()).or_default();
            if positive {
                group.positive.push(literal);
            } else {
                group.negated.push(literal);
            }
        }

        if let Some(consts) = groups.get(&LiteralKind::Const) {
            let values: Vec<&Value> = consts.positive.iter().filter_map(const_value).collect();
            if let Some(first) = values.first() {
                if values.iter().any(|v| !json_eq(first, v)) {
                    return None;
                }
                if consts.negated.iter().filter_map(const_value).any(|v| json_eq(first, v)) {
                    return None;
                }
            }
        }

        if types.is_empty() {
            return None;
        }
        Some(Self { types, groups })
    }

    pub fn positive(&self, kind: &LiteralKind) -> &[Literal] {
        self.groups.get(kind).map(|g| g.positive.as_slice()).unwrap_or(&[])
    }

    pub fn negated(&self, kind: &LiteralKind) -> &[Literal] {
        self.groups.get(kind).map(|g| g.negated.as_slice()).unwrap_or(&[])
    }

    pub fn groups(&self) -> impl Iterator<Item = (&LiteralKind, &Group)> {
        self.groups.iter()
    }

    /// Every literal with its polarity
    pub fn literals(&self) -> impl Iterator<Item = (bool, &Literal)> {
        self.groups.values().flat_map(|g| {
            g.positive
                .iter()
                .map(|l| (true, l))
                .chain(g.negated.iter().map(|l| (false, l)))
        })
    }

    pub fn has_unsupported(&self) -> bool {
        self.groups.contains_key(&LiteralKind::Unsupported)
    }

    /// The positive const pinned on this branch, if any
    pub fn pinned(&self) -> Option<&Value> {
        self.positive(&LiteralKind::Const).first().and_then(const_value)
    }

    /// Equivalent JSON Schema, before any simplification
    pub fn to_json_schema(&self) -> Value {
        let mut parts = Vec::new();
        if !self.types.is_all() {
            parts.push(Literal::Type(self.types).to_json_schema());
        }
        for (positive, literal) in self.literals() {
            parts.push(if positive {
                literal.to_json_schema()
            } else {
                literal.to_negated_json_schema()
            });
        }
        all_of_schema(parts)
    }
}

fn const_value(literal: &Literal) -> Option<&Value> {
    match literal {
        Literal::Const(value) => Some(value),
        _ => None,
    }
}

/// Union of conjunctions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawDnf {
    pub conjunctions: Vec<Conjunction>,
}

impl RawDnf {
    pub fn len(&self) -> usize {
        self.conjunctions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conjunctions.is_empty()
    }

    pub fn has_unsupported(&self) -> bool {
        self.conjunctions.iter().any(Conjunction::has_unsupported)
    }
}

/// Convert a logic tree to raw DNF.
pub fn raw_dnf(logic: Logic) -> RawDnf {
    let conjunctions = distribute(to_nnf(logic))
        .into_iter()
        .filter_map(Conjunction::from_literals)
        .collect();
    RawDnf { conjunctions }
}

/// Negation normal form: no `Not` nodes remain.
pub fn to_nnf(logic: Logic) -> Logic {
    match logic {
        Logic::Not(inner) => to_nnf(inner.negate()),
        Logic::AllOf(children) => Logic::all(children.into_iter().map(to_nnf).collect::<Vec<_>>()),
        Logic::AnyOf(children) => Logic::any(children.into_iter().map(to_nnf).collect::<Vec<_>>()),
        other => other,
    }
}

/// Distribute an NNF tree into a list of literal bags.
fn distribute(logic: Logic) -> Vec<Vec<(bool, Literal)>> {
    match logic {
        Logic::True => vec![Vec::new()],
        Logic::False => Vec::new(),
        Logic::Lit(literal) => vec![vec![(true, literal)]],
        Logic::Neg(literal) => vec![vec![(false, literal)]],
        Logic::Not(inner) => distribute(to_nnf(Logic::Not(inner))),
        Logic::AnyOf(children) => children.into_iter().flat_map(distribute).collect(),
        Logic::AllOf(children) => {
            let mut product = vec![Vec::new()];
            for child in children {
                let branches = distribute(child);
                if branches.is_empty() {
                    return Vec::new();
                }
                let mut next = Vec::with_capacity(product.len() * branches.len());
                for prefix in &product {
                    for branch in &branches {
                        let mut bag: Vec<(bool, Literal)> = prefix.clone();
                        bag.extend(branch.iter().cloned());
                        next.push(bag);
                    }
                }
                product = next;
            }
            product
        }
    }
}
