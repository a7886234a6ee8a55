//! Schema compatibility checking
//!
//! A change from `old` to `new` is backward compatible when every value the
//! old schema accepted is still accepted (`old ⊆ new`), and forward
//! compatible when the reverse holds. Both directions are tri-state, so a
//! check can also end up undetermined.

use semver::Version;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::CompatibilityConfig;
use crate::error::{LogicError, Result};
use crate::{schema_describes_subset, Options};

/// Overall classification of a schema change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompatibilityVerdict {
    /// Every old value is still valid
    Compatible,
    /// Some old value is no longer valid
    Breaking,
    /// Neither could be proven
    Undetermined,
}

/// Result of a compatibility check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatibilityResult {
    /// `old ⊆ new`
    pub backward: Option<bool>,
    /// `new ⊆ old`
    pub forward: Option<bool>,
    pub verdict: CompatibilityVerdict,
    /// Human-readable summary
    pub summary: String,
}

impl CompatibilityResult {
    fn new(backward: Option<bool>, forward: Option<bool>, treat_unknown_as_breaking: bool) -> Self {
        let verdict = match backward {
            Some(true) => CompatibilityVerdict::Compatible,
            Some(false) => CompatibilityVerdict::Breaking,
            None if treat_unknown_as_breaking => CompatibilityVerdict::Breaking,
            None => CompatibilityVerdict::Undetermined,
        };
        let summary = match (backward, forward) {
            (Some(true), Some(true)) => "Schemas are equivalent".to_string(),
            (Some(true), _) => "New schema accepts every old value".to_string(),
            (Some(false), _) => "Some values valid under the old schema are rejected".to_string(),
            (None, _) if treat_unknown_as_breaking => {
                "Compatibility could not be proven; treated as breaking".to_string()
            }
            (None, _) => "Compatibility could not be decided".to_string(),
        };
        Self {
            backward,
            forward,
            verdict,
            summary,
        }
    }

    pub fn is_breaking(&self) -> bool {
        self.verdict == CompatibilityVerdict::Breaking
    }
}

/// Compatibility checker for schema versions
pub struct CompatibilityChecker {
    options: Options,
    treat_unknown_as_breaking: bool,
    require_major_bump: bool,
}

impl Default for CompatibilityChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl CompatibilityChecker {
    /// Create a new compatibility checker
    pub fn new() -> Self {
        Self {
            options: Options::default(),
            treat_unknown_as_breaking: false,
            require_major_bump: true,
        }
    }

    pub fn from_config(config: &CompatibilityConfig) -> Self {
        Self {
            options: Options::default(),
            treat_unknown_as_breaking: config.treat_unknown_as_breaking,
            require_major_bump: config.require_major_bump_on_breaking,
        }
    }

    /// Strict mode: an undecided check counts as breaking
    pub fn strict(mut self) -> Self {
        self.treat_unknown_as_breaking = true;
        self
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Check compatibility between two schemas
    pub fn check(&self, old: &Value, new: &Value) -> Result<CompatibilityResult> {
        let backward = schema_describes_subset(old, new, &self.options)?;
        let forward = schema_describes_subset(new, old, &self.options)?;
        debug!(?backward, ?forward, "compatibility check");
        Ok(CompatibilityResult::new(backward, forward, self.treat_unknown_as_breaking))
    }

    /// Check compatibility and that the version bump matches it
    pub fn check_versioned(
        &self,
        old: &Value,
        old_version: &Version,
        new: &Value,
        new_version: &Version,
    ) -> Result<CompatibilityResult> {
        if new_version <= old_version {
            return Err(LogicError::IncompatibleChange(format!(
                "new version {} must be greater than {}",
                new_version, old_version
            )));
        }
        let result = self.check(old, new)?;
        if result.is_breaking() && self.require_major_bump && !is_major_bump(old_version, new_version) {
            return Err(LogicError::IncompatibleChange(format!(
                "{} → {} is not a major version bump: {}",
                old_version, new_version, result.summary
            )));
        }
        info!(old = %old_version, new = %new_version, verdict = ?result.verdict, "versioned compatibility check");
        Ok(result)
    }
}

/// A bump that may break consumers; below 1.0 a minor bump counts.
fn is_major_bump(old: &Version, new: &Version) -> bool {
    if old.major == 0 && new.major == 0 {
        new.minor > old.minor
    } else {
        new.major > old.major
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn v(text: &str) -> Version {
        Version::parse(text).unwrap()
    }

    #[test]
    fn test_widening_is_compatible() {
        let old = json!({"type": "object", "required": ["id", "name"]});
        let new = json!({"type": "object", "required": ["id"]});
        let result = CompatibilityChecker::new().check(&old, &new).unwrap();
        assert_eq!(result.verdict, CompatibilityVerdict::Compatible);
        assert_eq!(result.backward, Some(true));
        assert_eq!(result.forward, Some(false));
    }

    #[test]
    fn test_new_required_property_is_breaking() {
        let old = json!({"type": "object"});
        let new = json!({"type": "object", "required": ["id"]});
        let result = CompatibilityChecker::new().check(&old, &new).unwrap();
        assert!(result.is_breaking());
    }

    #[test]
    fn test_equivalent_schemas() {
        let old = json!({"type": "integer"});
        let new = json!({"type": "number", "multipleOf": 1});
        let result = CompatibilityChecker::new().check(&old, &new).unwrap();
        assert_eq!(result.summary, "Schemas are equivalent");
    }

    #[test]
    fn test_undecided_patterns() {
        let old = json!({"type": "string", "pattern": "^[abc]{3}$"});
        let new = json!({"type": "string", "pattern": "^[abc]{2,3}$"});
        let result = CompatibilityChecker::new().check(&old, &new).unwrap();
        assert_eq!(result.verdict, CompatibilityVerdict::Undetermined);
        let strict = CompatibilityChecker::new().strict().check(&old, &new).unwrap();
        assert!(strict.is_breaking());
    }

    #[test]
    fn test_breaking_change_needs_major_bump() {
        let old = json!({"type": "string"});
        let new = json!({"type": "string", "maxLength": 10});
        let checker = CompatibilityChecker::new();
        assert!(checker.check_versioned(&old, &v("1.2.0"), &new, &v("1.3.0")).is_err());
        assert!(checker.check_versioned(&old, &v("1.2.0"), &new, &v("2.0.0")).is_ok());
        assert!(checker.check_versioned(&old, &v("0.2.0"), &new, &v("0.3.0")).is_ok());
    }

    #[test]
    fn test_version_must_increase() {
        let schema = json!({"type": "string"});
        let result = CompatibilityChecker::new().check_versioned(&schema, &v("1.0.0"), &schema, &v("1.0.0"));
        assert!(matches!(result, Err(LogicError::IncompatibleChange(_))));
    }
}
