//! Numeric merge: bounds, steps and exact counting
//!
//! Inside a finite range with a `multipleOf` step the candidates are the
//! multiples `k * step` for `k` in `[first, last]`. A negated step `n`
//! removes exactly the `k` divisible by the numerator of `n / step`, so the
//! excluded count is an inclusion–exclusion sum over arithmetic
//! progressions; excluded consts are counted on top.

use serde_json::{json, Value};

use super::{excluded_consts, Fragment, SimplificationPlugin, Verdict};
use crate::dnf::Conjunction;
use crate::error::Result;
use crate::literal::{Literal, LiteralKind};
use crate::oracle::Engine;
use crate::rational::Rational;
use crate::types::JsonType;

/// Largest range scanned for the single surviving value
const SURVIVOR_SCAN: i128 = 4096;

pub struct NumberSimplification;

/// A merged number together with the JSON it came from
type Sourced = (Rational, Value);

fn gcd(a: i128, b: i128) -> i128 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Multiples of `m` in `[first, last]`
fn multiples_in(first: i128, last: i128, m: i128) -> Option<i128> {
    let below = first.checked_sub(1)?.div_euclid(m);
    Some(last.div_euclid(m).checked_sub(below)?.max(0))
}

/// `|{k in [first, last] : some p divides k}|`
fn union_count(first: i128, last: i128, divisors: &[i128]) -> Option<i128> {
    fn walk(first: i128, last: i128, divisors: &[i128], lcm: i128, depth: usize, total: &mut i128) -> Option<()> {
        for (i, p) in divisors.iter().enumerate() {
            let next = (lcm / gcd(lcm, *p)).checked_mul(*p)?;
            let count = multiples_in(first, last, next)?;
            *total = if depth % 2 == 0 {
                total.checked_add(count)?
            } else {
                total.checked_sub(count)?
            };
            walk(first, last, &divisors[i + 1..], next, depth + 1, total)?;
        }
        Some(())
    }
    let mut total = 0;
    walk(first, last, divisors, 1, 0, &mut total)?;
    Some(total)
}

fn parse_into(literal: &Literal, value: &Value, fragment: &mut Fragment, exact: &mut bool, positive: bool) -> Option<Rational> {
    let parsed = Rational::from_value(value);
    if parsed.is_none() {
        fragment.push_literal(positive, literal);
        *exact = false;
    }
    parsed
}

impl SimplificationPlugin for NumberSimplification {
    fn id(&self) -> &str {
        "number"
    }

    fn json_type(&self) -> JsonType {
        JsonType::Number
    }

    fn handles(&self) -> Vec<LiteralKind> {
        vec![
            LiteralKind::Minimum,
            LiteralKind::Maximum,
            LiteralKind::MultipleOf,
            LiteralKind::Const,
        ]
    }

    fn claims(&self) -> &[&'static str] {
        &[
            "type",
            "minimum",
            "maximum",
            "exclusiveMinimum",
            "exclusiveMaximum",
            "multipleOf",
            "not",
        ]
    }

    fn simplify(&self, conjunction: &Conjunction, fragment: &mut Fragment, _engine: &Engine<'_>) -> Result<Verdict> {
        let mut exact = true;

        let mut lo: Option<Sourced> = None;
        for literal in conjunction.positive(&LiteralKind::Minimum) {
            if let Literal::Minimum(m) = literal {
                if let Some(r) = parse_into(literal, m, fragment, &mut exact, true) {
                    if lo.as_ref().map_or(true, |(cur, _)| r > *cur) {
                        lo = Some((r, m.clone()));
                    }
                }
            }
        }
        let mut hi: Option<Sourced> = None;
        for literal in conjunction.positive(&LiteralKind::Maximum) {
            if let Literal::Maximum(m) = literal {
                if let Some(r) = parse_into(literal, m, fragment, &mut exact, true) {
                    if hi.as_ref().map_or(true, |(cur, _)| r < *cur) {
                        hi = Some((r, m.clone()));
                    }
                }
            }
        }

        let mut step: Option<Sourced> = None;
        for literal in conjunction.positive(&LiteralKind::MultipleOf) {
            if let Literal::MultipleOf(m) = literal {
                let Some(r) = parse_into(literal, m, fragment, &mut exact, true) else {
                    continue;
                };
                step = match step {
                    None => Some((r, m.clone())),
                    Some((s, source)) => match s.lcm(&r) {
                        Some(l) if l == s => Some((s, source)),
                        Some(l) if l == r => Some((r, m.clone())),
                        Some(l) => Some((l, l.to_json())),
                        None => {
                            fragment.push_literal(true, literal);
                            exact = false;
                            Some((s, source))
                        }
                    },
                };
            }
        }

        let mut excluded_steps: Vec<Sourced> = Vec::new();
        for literal in conjunction.negated(&LiteralKind::MultipleOf) {
            if let Literal::MultipleOf(n) = literal {
                if let Some(r) = parse_into(literal, n, fragment, &mut exact, false) {
                    if let Some((s, _)) = &step {
                        // every multiple of the step is a multiple of n
                        if s.is_multiple_of(&r) == Some(true) {
                            return Ok(Verdict::Empty);
                        }
                    }
                    excluded_steps.push((r, n.clone()));
                }
            }
        }

        if let (Some((l, _)), Some((h, _))) = (&lo, &hi) {
            if l > h {
                return Ok(Verdict::Empty);
            }
        }

        // Only excluded values that could otherwise occur matter.
        let mut consts: Vec<Sourced> = Vec::new();
        let mut opaque_consts = Vec::new();
        for value in excluded_consts(conjunction, JsonType::Number) {
            let Some(r) = Rational::from_value(&value) else {
                opaque_consts.push(value);
                exact = false;
                continue;
            };
            let in_range = lo.as_ref().map_or(true, |(l, _)| r >= *l) && hi.as_ref().map_or(true, |(h, _)| r <= *h);
            let on_step = step.as_ref().map_or(Some(true), |(s, _)| r.is_multiple_of(s));
            let already = excluded_steps.iter().any(|(n, _)| r.is_multiple_of(n) == Some(true));
            match (in_range, on_step) {
                (true, Some(true)) if !already => consts.push((r, value)),
                (true, None) => {
                    opaque_consts.push(value);
                    exact = false;
                }
                _ => {}
            }
        }

        let verdict = match (&lo, &hi, &step) {
            (Some((l, _)), Some((h, _)), Some((s, _))) => count_survivors(l, h, s, &excluded_steps, &consts),
            (Some((l, source)), Some((h, _)), None) if l == h => {
                let removed = consts.iter().any(|(c, _)| c == l)
                    || excluded_steps.iter().any(|(n, _)| l.is_multiple_of(n) == Some(true));
                if removed {
                    Verdict::Empty
                } else {
                    Verdict::Single(source.clone())
                }
            }
            // an interval of reals, or an unbounded progression, minus a
            // finite set and some sparser progressions
            _ => Verdict::Inhabited,
        };
        if verdict == Verdict::Empty {
            return Ok(Verdict::Empty);
        }

        render(fragment, lo, hi, step, &excluded_steps, consts, opaque_consts);

        Ok(match verdict {
            Verdict::Inhabited | Verdict::Single(_) if !exact => Verdict::Unknown,
            other => other,
        })
    }
}

fn count_survivors(lo: &Rational, hi: &Rational, step: &Rational, excluded_steps: &[Sourced], consts: &[Sourced]) -> Verdict {
    let (Some(first), Some(last)) = (lo.div_ceil(step), hi.div_floor(step)) else {
        return Verdict::Unknown;
    };
    if last < first {
        return Verdict::Empty;
    }
    let Some(total) = last.checked_sub(first).and_then(|span| span.checked_add(1)) else {
        return Verdict::Unknown;
    };

    // k * step is a multiple of n exactly when p | k, p = numerator(n / step)
    let mut divisors = Vec::new();
    for (n, _) in excluded_steps {
        let ratio = n
            .numer()
            .checked_mul(step.denom())
            .zip(n.denom().checked_mul(step.numer()))
            .and_then(|(num, den)| Rational::new(num, den));
        match ratio {
            Some(r) => {
                let p = r.numer().abs();
                if !divisors.contains(&p) {
                    divisors.push(p);
                }
            }
            None => return Verdict::Unknown,
        }
    }
    let Some(removed) = union_count(first, last, &divisors) else {
        return Verdict::Unknown;
    };
    let Some(remaining) = total
        .checked_sub(removed)
        .and_then(|rest| rest.checked_sub(consts.len() as i128))
    else {
        return Verdict::Unknown;
    };

    match remaining {
        r if r <= 0 => Verdict::Empty,
        1 if total <= SURVIVOR_SCAN => (first..=last)
            .filter(|k| !divisors.iter().any(|p| k % p == 0))
            .filter_map(|k| step.checked_mul_int(k))
            .find(|v| !consts.iter().any(|(c, _)| c == v))
            .map(|v| Verdict::Single(v.to_json()))
            .unwrap_or(Verdict::Unknown),
        _ => Verdict::Inhabited,
    }
}

fn render(
    fragment: &mut Fragment,
    lo: Option<Sourced>,
    hi: Option<Sourced>,
    step: Option<Sourced>,
    excluded_steps: &[Sourced],
    mut consts: Vec<Sourced>,
    opaque_consts: Vec<Value>,
) {
    for (bound, inclusive, exclusive) in [(lo, "minimum", "exclusiveMinimum"), (hi, "maximum", "exclusiveMaximum")] {
        if let Some((value, source)) = bound {
            match consts.iter().position(|(c, _)| *c == value) {
                Some(i) => {
                    consts.remove(i);
                    fragment.keywords.insert(exclusive.into(), source);
                }
                None => {
                    fragment.keywords.insert(inclusive.into(), source);
                }
            }
        }
    }

    if let Some((value, source)) = step {
        if value.is_integer() {
            fragment.keywords.insert("type".into(), json!("integer"));
            if value != Rational::ONE {
                fragment.keywords.insert("multipleOf".into(), source);
            }
        } else {
            fragment.keywords.insert("multipleOf".into(), source);
        }
    }

    for (_, source) in excluded_steps {
        fragment.all_of.push(json!({ "not": { "multipleOf": source } }));
    }

    let mut excluded: Vec<Value> = consts.into_iter().map(|(_, v)| v).collect();
    excluded.extend(opaque_consts);
    fragment.exclude(&excluded);
}
