//! String merge
//!
//! Lengths merge by max/min. Patterns and formats are never compared with
//! each other; they stay as keywords or residual `allOf` entries and make
//! the branch's inhabitation unknown.

use serde_json::{json, Value};

use super::{excluded_consts, Fragment, SimplificationPlugin, Verdict};
use crate::dnf::Conjunction;
use crate::error::Result;
use crate::literal::{Literal, LiteralKind};
use crate::oracle::Engine;
use crate::types::JsonType;

pub struct StringSimplification;

impl SimplificationPlugin for StringSimplification {
    fn id(&self) -> &str {
        "string"
    }

    fn json_type(&self) -> JsonType {
        JsonType::String
    }

    fn handles(&self) -> Vec<LiteralKind> {
        vec![
            LiteralKind::MinLength,
            LiteralKind::MaxLength,
            LiteralKind::Pattern,
            LiteralKind::Format,
            LiteralKind::Const,
        ]
    }

    fn claims(&self) -> &[&'static str] {
        &["minLength", "maxLength", "pattern", "format", "not"]
    }

    fn simplify(&self, conjunction: &Conjunction, fragment: &mut Fragment, _engine: &Engine<'_>) -> Result<Verdict> {
        let lo = conjunction
            .positive(&LiteralKind::MinLength)
            .iter()
            .filter_map(|l| match l {
                Literal::MinLength(n) => Some(*n),
                _ => None,
            })
            .max()
            .unwrap_or(0);
        let hi = conjunction
            .positive(&LiteralKind::MaxLength)
            .iter()
            .filter_map(|l| match l {
                Literal::MaxLength(n) => Some(*n),
                _ => None,
            })
            .min();

        if hi.map_or(false, |hi| lo > hi) {
            return Ok(Verdict::Empty);
        }

        let excluded: Vec<Value> = excluded_consts(conjunction, JsonType::String)
            .into_iter()
            .filter(|v| {
                let len = v.as_str().map(|s| s.chars().count() as u64).unwrap_or(0);
                len >= lo && hi.map_or(true, |hi| len <= hi)
            })
            .collect();

        let mut opaque = false;
        for (kind, keyword) in [(LiteralKind::Pattern, "pattern"), (LiteralKind::Format, "format")] {
            for (i, literal) in conjunction.positive(&kind).iter().enumerate() {
                opaque = true;
                match literal {
                    Literal::Pattern(text) | Literal::Format(text) if i == 0 => {
                        fragment.keywords.insert(keyword.into(), json!(text));
                    }
                    _ => fragment.push_literal(true, literal),
                }
            }
            for literal in conjunction.negated(&kind) {
                opaque = true;
                fragment.push_literal(false, literal);
            }
        }

        if lo > 0 {
            fragment.keywords.insert("minLength".into(), json!(lo));
        }
        if let Some(hi) = hi {
            fragment.keywords.insert("maxLength".into(), json!(hi));
        }
        fragment.exclude(&excluded);

        if hi == Some(0) {
            // only the empty string is left
            return Ok(if excluded.is_empty() {
                Verdict::Single(json!(""))
            } else {
                Verdict::Empty
            });
        }
        Ok(if opaque { Verdict::Unknown } else { Verdict::Inhabited })
    }
}
