//! JSON value types and type sets

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// One of the six concrete JSON types.
///
/// `integer` is not a separate type: it is `number` constrained by
/// `multipleOf: 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    Null,
    Boolean,
    Number,
    String,
    Array,
    Object,
}

impl JsonType {
    pub const ALL: [JsonType; 6] = [
        JsonType::Null,
        JsonType::Boolean,
        JsonType::Number,
        JsonType::String,
        JsonType::Array,
        JsonType::Object,
    ];

    /// Keyword spelling used in `type`
    pub fn name(&self) -> &'static str {
        match self {
            JsonType::Null => "null",
            JsonType::Boolean => "boolean",
            JsonType::Number => "number",
            JsonType::String => "string",
            JsonType::Array => "array",
            JsonType::Object => "object",
        }
    }

    /// Parse a `type` keyword entry. `integer` maps to `Number`.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "null" => Some(JsonType::Null),
            "boolean" => Some(JsonType::Boolean),
            "number" | "integer" => Some(JsonType::Number),
            "string" => Some(JsonType::String),
            "array" => Some(JsonType::Array),
            "object" => Some(JsonType::Object),
            _ => None,
        }
    }

    /// The type of a concrete JSON value
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => JsonType::Null,
            Value::Bool(_) => JsonType::Boolean,
            Value::Number(_) => JsonType::Number,
            Value::String(_) => JsonType::String,
            Value::Array(_) => JsonType::Array,
            Value::Object(_) => JsonType::Object,
        }
    }

    fn bit(&self) -> u8 {
        1 << (*self as u8)
    }
}

impl fmt::Display for JsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A set of JSON types, stored as a bitset.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeSet(u8);

impl TypeSet {
    pub const EMPTY: TypeSet = TypeSet(0);
    pub const ALL: TypeSet = TypeSet(0b11_1111);

    pub fn single(json_type: JsonType) -> Self {
        TypeSet(json_type.bit())
    }

    pub fn contains(&self, json_type: JsonType) -> bool {
        self.0 & json_type.bit() != 0
    }

    pub fn insert(&mut self, json_type: JsonType) {
        self.0 |= json_type.bit();
    }

    pub fn intersect(&self, other: TypeSet) -> TypeSet {
        TypeSet(self.0 & other.0)
    }

    pub fn complement(&self) -> TypeSet {
        TypeSet(!self.0 & Self::ALL.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn is_all(&self) -> bool {
        self.0 == Self::ALL.0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = JsonType> + '_ {
        JsonType::ALL.into_iter().filter(move |t| self.contains(*t))
    }

    /// `type` keyword value: a single name or an array of names
    pub fn to_json(&self) -> Value {
        let names: Vec<Value> = self.iter().map(|t| Value::from(t.name())).collect();
        if names.len() == 1 {
            names.into_iter().next().unwrap_or(Value::Null)
        } else {
            Value::Array(names)
        }
    }
}

impl FromIterator<JsonType> for TypeSet {
    fn from_iter<I: IntoIterator<Item = JsonType>>(iter: I) -> Self {
        let mut set = TypeSet::EMPTY;
        for json_type in iter {
            set.insert(json_type);
        }
        set
    }
}

impl fmt::Debug for TypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// JSON equality with numeric comparison (`1` equals `1.0`).
pub fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if x == y {
                return true;
            }
            match (crate::rational::Rational::from_number(x), crate::rational::Rational::from_number(y)) {
                (Some(p), Some(q)) => p == q,
                _ => x.as_f64() == y.as_f64(),
            }
        }
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| json_eq(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).map(|y| json_eq(x, y)).unwrap_or(false))
        }
        _ => a == b,
    }
}
