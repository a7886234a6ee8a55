//! Array keywords

use serde_json::{Map, Value};

use super::{count_keyword, schema_keyword, ExtractionPlugin, Extractor};
use crate::error::{LogicError, Result};
use crate::literal::Literal;
use crate::logic::Logic;

/// `prefixItems`, `items`, `additionalItems`, `contains` with its bounds,
/// `minItems`, `maxItems`, `uniqueItems`
pub struct ArrayExtraction;

fn slot_literals(prefix: &[Value], parts: &mut Vec<Logic>) -> Result<()> {
    for (index, schema) in prefix.iter().enumerate() {
        let schema = schema_keyword("prefixItems", schema)?;
        if schema != &Value::Bool(true) {
            parts.push(Logic::lit(Literal::PrefixItem {
                index,
                schema: schema.clone(),
            }));
        }
    }
    Ok(())
}

impl ExtractionPlugin for ArrayExtraction {
    fn id(&self) -> &str {
        "array"
    }

    fn keywords(&self) -> &[&str] {
        &[
            "prefixItems",
            "items",
            "additionalItems",
            "contains",
            "minItems",
            "maxItems",
            "uniqueItems",
        ]
    }

    fn extract(&self, schema: &Map<String, Value>, _cx: &mut Extractor<'_>) -> Result<Logic> {
        let mut parts = Vec::new();

        let prefix_len = match schema.get("prefixItems") {
            Some(Value::Array(prefix)) => {
                slot_literals(prefix, &mut parts)?;
                prefix.len()
            }
            Some(other) => {
                return Err(LogicError::InvalidSchema(format!("prefixItems must be an array, found {}", other)));
            }
            None => 0,
        };

        // Draft-07 tuple form: `items` is the prefix and `additionalItems`
        // covers the tail.
        let tail = match schema.get("items") {
            Some(Value::Array(prefix)) if !schema.contains_key("prefixItems") => {
                slot_literals(prefix, &mut parts)?;
                schema
                    .get("additionalItems")
                    .map(|s| schema_keyword("additionalItems", s).map(|s| (prefix.len(), s)))
                    .transpose()?
            }
            Some(items) => Some((prefix_len, schema_keyword("items", items)?)),
            None => None,
        };
        if let Some((start, tail)) = tail {
            if tail != &Value::Bool(true) {
                parts.push(Logic::lit(Literal::Items {
                    start,
                    schema: tail.clone(),
                }));
            }
        }

        if let Some(contains) = schema.get("contains") {
            let contains = schema_keyword("contains", contains)?;
            let min = count_keyword(schema, "minContains")?.unwrap_or(1);
            let max = count_keyword(schema, "maxContains")?;
            if min > 0 || max.is_some() {
                parts.push(Logic::lit(Literal::Contains {
                    schema: contains.clone(),
                    min,
                    max,
                }));
            }
        }

        match count_keyword(schema, "minItems")? {
            Some(0) | None => {}
            Some(n) => parts.push(Logic::lit(Literal::MinItems(n))),
        }
        if let Some(n) = count_keyword(schema, "maxItems")? {
            parts.push(Logic::lit(Literal::MaxItems(n)));
        }
        match schema.get("uniqueItems") {
            Some(Value::Bool(true)) => parts.push(Logic::lit(Literal::UniqueItems)),
            Some(Value::Bool(false)) | None => {}
            Some(other) => {
                return Err(LogicError::InvalidSchema(format!("uniqueItems must be a boolean, found {}", other)));
            }
        }

        Ok(Logic::all(parts))
    }
}
