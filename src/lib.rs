//! Familiar Schema Logic
//!
//! Treats JSON Schema documents as predicates over JSON values and answers
//! logical questions about them:
//!
//! - **Emptiness**: does any value satisfy the schema?
//! - **Subsumption**: does every value of `A` satisfy `B`?
//! - **Equivalence**: subsumption both ways
//! - **Canonical DNF**: an equivalent `anyOf` of per-type canonical fragments
//!
//! Answers are three-valued. `Some(true)` and `Some(false)` are only given
//! when provable; `None` marks the places where the reasoning is
//! deliberately incomplete (regular-expression overlap, for one).
//!
//! ## Pipeline
//!
//! ```text
//! schema ──resolve──▶ absolute $refs
//!        ──extract──▶ Logic (AllOf / AnyOf / Not over literals)
//!        ──raw_dnf──▶ conjunctions of (possibly negated) literals
//!        ──simplify─▶ one canonical fragment per (conjunction, type)
//!        ──oracle───▶ tri-state answer or pruned DNF
//! ```
//!
//! ## Example
//!
//! ```
//! use familiar_schema_logic::{schema_describes_subset, Options};
//! use serde_json::json;
//!
//! let narrow = json!({"type": "integer", "minimum": 10, "maximum": 30, "multipleOf": 5});
//! let wide = json!({"anyOf": [{"multipleOf": 3}, {"multipleOf": 20}, {"enum": [10, 25]}]});
//! assert_eq!(schema_describes_subset(&narrow, &wide, &Options::default()).unwrap(), Some(true));
//! ```

pub mod compatibility;
pub mod config;
pub mod dnf;
pub mod error;
pub mod extract;
pub mod literal;
pub mod logic;
pub mod oracle;
pub mod rational;
pub mod registry;
pub mod resolve;
pub mod simplify;
pub mod types;
pub mod validator;

pub use compatibility::{CompatibilityChecker, CompatibilityResult, CompatibilityVerdict};
pub use config::LogicConfig;
pub use error::{LogicError, Result};
pub use literal::{Literal, LiteralKind};
pub use logic::Logic;
pub use oracle::{Disjunct, Dnf, Engine};
pub use registry::{BuiltinPlugin, Plugin, PluginRegistry};
pub use resolve::SchemaIndex;
pub use simplify::Fragment;
pub use types::{JsonType, TypeSet};

use serde_json::Value;
use std::collections::BTreeMap;

/// Options for one top-level call
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Base URI for the input schemas
    pub base_uri: Option<String>,
    /// Shared schemas reachable by `$ref`, keyed by absolute URI
    pub definitions: BTreeMap<String, Value>,
    /// Caller plugins, in declaration order
    pub plugins: Vec<Plugin>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_uri(mut self, base_uri: impl Into<String>) -> Self {
        self.base_uri = Some(base_uri.into());
        self
    }

    pub fn with_definition(mut self, uri: impl Into<String>, schema: Value) -> Self {
        self.definitions.insert(uri.into(), schema);
        self
    }

    pub fn with_plugin(mut self, plugin: Plugin) -> Self {
        self.plugins.push(plugin);
        self
    }
}

/// Build the registry and index for one call, returning the rewritten inputs.
fn prepare(schemas: &[&Value], options: &Options) -> Result<(PluginRegistry, SchemaIndex, Vec<Value>)> {
    let registry = PluginRegistry::build(&options.plugins)?;
    let mut index = SchemaIndex::new();
    for (uri, schema) in &options.definitions {
        index.add_definition(uri, schema)?;
    }
    let documents = schemas
        .iter()
        .map(|schema| index.add_document(schema, options.base_uri.as_deref()))
        .collect::<Result<Vec<_>>>()?;
    Ok((registry, index, documents))
}

/// Canonical DNF of `schema`.
pub fn to_dnf(schema: &Value, options: &Options) -> Result<Dnf> {
    let (registry, index, documents) = prepare(&[schema], options)?;
    Engine::new(&registry, &index).to_dnf(&documents[0])
}

/// Whether `schema` admits no value at all.
pub fn schema_describes_empty_set(schema: &Value, options: &Options) -> Result<Option<bool>> {
    let (registry, index, documents) = prepare(&[schema], options)?;
    Engine::new(&registry, &index).describes_empty(&documents[0])
}

/// Whether every value satisfying `a` also satisfies `b`.
pub fn schema_describes_subset(a: &Value, b: &Value, options: &Options) -> Result<Option<bool>> {
    let (registry, index, documents) = prepare(&[a, b], options)?;
    Engine::new(&registry, &index).describes_subset(&documents[0], &documents[1])
}

/// Whether `a` and `b` admit exactly the same values.
pub fn schemas_are_equivalent(a: &Value, b: &Value, options: &Options) -> Result<Option<bool>> {
    let (registry, index, documents) = prepare(&[a, b], options)?;
    Engine::new(&registry, &index).are_equivalent(&documents[0], &documents[1])
}
