//! Plugin registry
//!
//! Composes the built-in plugins with caller-supplied ones. A caller plugin
//! either replaces exactly one built-in slot (`overrides`) or is appended
//! after the built-ins of its kind. Validation plugins without an override
//! are consulted before the default validator.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::error::{LogicError, Result};
use crate::extract::{
    ArrayExtraction, ConstExtraction, ExtractionPlugin, LogicExtraction, NumberExtraction, ObjectExtraction,
    RefExtraction, StringExtraction, TypeExtraction, UnsupportedExtraction,
};
use crate::simplify::{
    ArraySimplification, NumberSimplification, ObjectSimplification, SimplificationPlugin, StringSimplification,
};
use crate::types::JsonType;
use crate::validator::{JsonSchemaValidator, ValidationPlugin};

/// Identifiers of the built-in plugin slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BuiltinPlugin {
    TypeExtraction,
    ConstExtraction,
    RefExtraction,
    LogicExtraction,
    NumberExtraction,
    StringExtraction,
    ArrayExtraction,
    ObjectExtraction,
    UnsupportedExtraction,
    NumberSimplification,
    StringSimplification,
    ArraySimplification,
    ObjectSimplification,
    JsonSchemaValidation,
}

impl fmt::Display for BuiltinPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A caller-supplied plugin
#[derive(Clone)]
pub enum Plugin {
    Validation(Arc<dyn ValidationPlugin>),
    Extraction(Arc<dyn ExtractionPlugin>),
    Simplification(Arc<dyn SimplificationPlugin>),
}

impl Plugin {
    pub fn validation(plugin: impl ValidationPlugin + 'static) -> Self {
        Plugin::Validation(Arc::new(plugin))
    }

    pub fn extraction(plugin: impl ExtractionPlugin + 'static) -> Self {
        Plugin::Extraction(Arc::new(plugin))
    }

    pub fn simplification(plugin: impl SimplificationPlugin + 'static) -> Self {
        Plugin::Simplification(Arc::new(plugin))
    }

    fn id(&self) -> &str {
        match self {
            Plugin::Validation(p) => p.id(),
            Plugin::Extraction(p) => p.id(),
            Plugin::Simplification(p) => p.id(),
        }
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Plugin").field(&self.id()).finish()
    }
}

/// Ordered plugin slots of one kind
struct Slots<T: ?Sized> {
    entries: Vec<(Option<BuiltinPlugin>, Arc<T>)>,
    overridden: Vec<BuiltinPlugin>,
}

impl<T: ?Sized> Slots<T> {
    fn new(builtins: Vec<(BuiltinPlugin, Arc<T>)>) -> Self {
        Self {
            entries: builtins.into_iter().map(|(id, p)| (Some(id), p)).collect(),
            overridden: Vec::new(),
        }
    }

    fn replace(&mut self, target: BuiltinPlugin, plugin: Arc<T>, id: &str) -> Result<()> {
        if self.overridden.contains(&target) {
            return Err(LogicError::PluginConfiguration(format!(
                "{} overrides {} which is already overridden",
                id, target
            )));
        }
        let slot = self
            .entries
            .iter_mut()
            .find(|(slot, _)| *slot == Some(target))
            .ok_or_else(|| {
                LogicError::PluginConfiguration(format!("{} overrides {}, which is not a plugin of the same kind", id, target))
            })?;
        slot.1 = plugin;
        self.overridden.push(target);
        Ok(())
    }

    fn into_plugins(self) -> Vec<Arc<T>> {
        self.entries.into_iter().map(|(_, p)| p).collect()
    }
}

/// The composed plugin set for one top-level call
pub struct PluginRegistry {
    extraction: Vec<Arc<dyn ExtractionPlugin>>,
    simplification: Vec<Arc<dyn SimplificationPlugin>>,
    validation: Vec<Arc<dyn ValidationPlugin>>,
}

fn extraction_slot(
    id: BuiltinPlugin,
    plugin: impl ExtractionPlugin + 'static,
) -> (BuiltinPlugin, Arc<dyn ExtractionPlugin>) {
    (id, Arc::new(plugin))
}

fn simplification_slot(
    id: BuiltinPlugin,
    plugin: impl SimplificationPlugin + 'static,
) -> (BuiltinPlugin, Arc<dyn SimplificationPlugin>) {
    (id, Arc::new(plugin))
}

fn builtin_extraction() -> Vec<(BuiltinPlugin, Arc<dyn ExtractionPlugin>)> {
    vec![
        extraction_slot(BuiltinPlugin::TypeExtraction, TypeExtraction),
        extraction_slot(BuiltinPlugin::ConstExtraction, ConstExtraction),
        extraction_slot(BuiltinPlugin::RefExtraction, RefExtraction),
        extraction_slot(BuiltinPlugin::LogicExtraction, LogicExtraction),
        extraction_slot(BuiltinPlugin::NumberExtraction, NumberExtraction),
        extraction_slot(BuiltinPlugin::StringExtraction, StringExtraction),
        extraction_slot(BuiltinPlugin::ArrayExtraction, ArrayExtraction),
        extraction_slot(BuiltinPlugin::ObjectExtraction, ObjectExtraction),
        extraction_slot(BuiltinPlugin::UnsupportedExtraction, UnsupportedExtraction),
    ]
}

fn builtin_simplification() -> Vec<(BuiltinPlugin, Arc<dyn SimplificationPlugin>)> {
    vec![
        simplification_slot(BuiltinPlugin::NumberSimplification, NumberSimplification),
        simplification_slot(BuiltinPlugin::StringSimplification, StringSimplification),
        simplification_slot(BuiltinPlugin::ArraySimplification, ArraySimplification),
        simplification_slot(BuiltinPlugin::ObjectSimplification, ObjectSimplification),
    ]
}

impl PluginRegistry {
    /// Built-in plugins only
    pub fn builtin() -> Self {
        let default_validator: Arc<dyn ValidationPlugin> = Arc::new(JsonSchemaValidator::new());
        Self {
            extraction: builtin_extraction().into_iter().map(|(_, p)| p).collect(),
            simplification: builtin_simplification().into_iter().map(|(_, p)| p).collect(),
            validation: vec![default_validator],
        }
    }

    /// Compose the built-ins with caller plugins, in declaration order.
    pub fn build(plugins: &[Plugin]) -> Result<Self> {
        let mut extraction = Slots::new(builtin_extraction());
        let mut simplification = Slots::new(builtin_simplification());
        let default_validator: Arc<dyn ValidationPlugin> = Arc::new(JsonSchemaValidator::new());
        let mut validation = Slots::new(vec![(BuiltinPlugin::JsonSchemaValidation, default_validator)]);
        let mut leading_validators = Vec::new();

        for plugin in plugins {
            match plugin {
                Plugin::Extraction(p) => match p.overrides() {
                    Some(target) => extraction.replace(target, p.clone(), p.id())?,
                    None => extraction.entries.push((None, p.clone())),
                },
                Plugin::Simplification(p) => match p.overrides() {
                    Some(target) => simplification.replace(target, p.clone(), p.id())?,
                    None => simplification.entries.push((None, p.clone())),
                },
                Plugin::Validation(p) => match p.overrides() {
                    Some(target) => validation.replace(target, p.clone(), p.id())?,
                    None => leading_validators.push(p.clone()),
                },
            }
        }

        let simplification = simplification.into_plugins();
        check_claims(&simplification)?;

        leading_validators.extend(validation.into_plugins());
        debug!(plugins = plugins.len(), "built plugin registry");
        Ok(Self {
            extraction: extraction.into_plugins(),
            simplification,
            validation: leading_validators,
        })
    }

    pub fn extraction(&self) -> &[Arc<dyn ExtractionPlugin>] {
        &self.extraction
    }

    /// Simplification plugins for one JSON type, in registration order
    pub fn simplifiers_for(&self, json_type: JsonType) -> impl Iterator<Item = &Arc<dyn SimplificationPlugin>> {
        self.simplification
            .iter()
            .filter(move |p| p.json_type() == json_type)
    }

    /// Ask the validation plugins in order; the first decided answer wins.
    pub fn validate(&self, schema: &serde_json::Value, instance: &serde_json::Value) -> Option<bool> {
        self.validation.iter().find_map(|v| v.validate(schema, instance))
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Two simplification plugins may not write the same keyword for the same type.
fn check_claims(plugins: &[Arc<dyn SimplificationPlugin>]) -> Result<()> {
    let mut owners: BTreeMap<(JsonType, &str), &str> = BTreeMap::new();
    for plugin in plugins {
        for keyword in plugin.claims() {
            if let Some(owner) = owners.insert((plugin.json_type(), *keyword), plugin.id()) {
                return Err(LogicError::PluginConfiguration(format!(
                    "{} and {} both claim {} for {}",
                    owner,
                    plugin.id(),
                    keyword,
                    plugin.json_type()
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dnf::Conjunction;
    use crate::literal::LiteralKind;
    use crate::oracle::Engine;
    use crate::simplify::{Fragment, Verdict};
    use serde_json::Value;

    struct EvenNumbers {
        overrides: Option<BuiltinPlugin>,
    }

    impl SimplificationPlugin for EvenNumbers {
        fn id(&self) -> &str {
            "even"
        }

        fn overrides(&self) -> Option<BuiltinPlugin> {
            self.overrides
        }

        fn json_type(&self) -> JsonType {
            JsonType::Number
        }

        fn handles(&self) -> Vec<LiteralKind> {
            vec![LiteralKind::Keyword("x-even".into())]
        }

        fn claims(&self) -> &[&'static str] {
            &["multipleOf"]
        }

        fn simplify(&self, _: &Conjunction, _: &mut Fragment, _: &Engine<'_>) -> Result<Verdict> {
            Ok(Verdict::Unknown)
        }
    }

    struct Never;

    impl ValidationPlugin for Never {
        fn id(&self) -> &str {
            "never"
        }

        fn validate(&self, _: &Value, _: &Value) -> Option<bool> {
            Some(false)
        }
    }

    #[test]
    fn test_conflicting_claims_are_rejected() {
        let result = PluginRegistry::build(&[Plugin::simplification(EvenNumbers { overrides: None })]);
        assert!(matches!(result, Err(LogicError::PluginConfiguration(_))));
    }

    #[test]
    fn test_override_replaces_slot() {
        let registry = PluginRegistry::build(&[Plugin::simplification(EvenNumbers {
            overrides: Some(BuiltinPlugin::NumberSimplification),
        })])
        .unwrap();
        let ids: Vec<&str> = registry.simplifiers_for(JsonType::Number).map(|p| p.id()).collect();
        assert_eq!(ids, vec!["even"]);
    }

    #[test]
    fn test_double_override_is_rejected() {
        let plugin = || {
            Plugin::simplification(EvenNumbers {
                overrides: Some(BuiltinPlugin::NumberSimplification),
            })
        };
        assert!(PluginRegistry::build(&[plugin(), plugin()]).is_err());
    }

    #[test]
    fn test_override_of_other_kind_is_rejected() {
        let result = PluginRegistry::build(&[Plugin::simplification(EvenNumbers {
            overrides: Some(BuiltinPlugin::TypeExtraction),
        })]);
        assert!(result.is_err());
    }

    #[test]
    fn test_caller_validators_come_first() {
        let registry = PluginRegistry::build(&[Plugin::validation(Never)]).unwrap();
        assert_eq!(registry.validate(&serde_json::json!({}), &serde_json::json!(1)), Some(false));
    }
}
