//! String keywords

use serde_json::{Map, Value};

use super::{count_keyword, ExtractionPlugin, Extractor};
use crate::error::{LogicError, Result};
use crate::literal::Literal;
use crate::logic::Logic;

/// `minLength`, `maxLength`, `pattern`, `format`
pub struct StringExtraction;

impl ExtractionPlugin for StringExtraction {
    fn id(&self) -> &str {
        "string"
    }

    fn keywords(&self) -> &[&str] {
        &["minLength", "maxLength", "pattern", "format"]
    }

    fn extract(&self, schema: &Map<String, Value>, _cx: &mut Extractor<'_>) -> Result<Logic> {
        let mut parts = Vec::new();

        match count_keyword(schema, "minLength")? {
            Some(0) | None => {}
            Some(n) => parts.push(Logic::lit(Literal::MinLength(n))),
        }
        if let Some(n) = count_keyword(schema, "maxLength")? {
            parts.push(Logic::lit(Literal::MaxLength(n)));
        }

        for (keyword, make) in [
            ("pattern", Literal::Pattern as fn(String) -> Literal),
            ("format", Literal::Format as fn(String) -> Literal),
        ] {
            match schema.get(keyword) {
                Some(Value::String(text)) => parts.push(Logic::lit(make(text.clone()))),
                Some(other) => {
                    return Err(LogicError::InvalidSchema(format!("{} must be a string, found {}", keyword, other)));
                }
                None => {}
            }
        }

        Ok(Logic::all(parts))
    }
}
