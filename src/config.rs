//! Configuration management for the schema logic tools
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (schema-logic.toml)
//! - Environment variables (SCHEMA_LOGIC__*)
//!
//! ## Example config file (schema-logic.toml):
//! ```toml
//! [resolution]
//! base_uri = "https://schemas.familiar.dev/"
//! definitions_dir = "./schemas"
//!
//! [output]
//! format = "pretty"
//!
//! [compatibility]
//! require_major_bump_on_breaking = true
//! treat_unknown_as_breaking = false
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use url::Url;
use walkdir::WalkDir;

use crate::error::{LogicError, Result};
use crate::Options;

/// Main configuration for the schema logic tools
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogicConfig {
    /// Reference resolution settings
    #[serde(default)]
    pub resolution: ResolutionConfig,

    /// Output settings
    #[serde(default)]
    pub output: OutputConfig,

    /// Compatibility checking settings
    #[serde(default)]
    pub compatibility: CompatibilityConfig,
}

/// Reference resolution configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolutionConfig {
    /// Base URI for input schemas without an `$id`
    #[serde(default)]
    pub base_uri: Option<String>,

    /// Directory of shared `*.json` schemas reachable by `$ref`
    #[serde(default)]
    pub definitions_dir: Option<PathBuf>,
}

/// Output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output format (pretty or compact)
    #[serde(default)]
    pub format: OutputFormat,
}

/// Output format for JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Compact,
}

impl OutputFormat {
    pub fn render(&self, value: &Value) -> Result<String> {
        Ok(match self {
            OutputFormat::Pretty => serde_json::to_string_pretty(value)?,
            OutputFormat::Compact => serde_json::to_string(value)?,
        })
    }
}

/// Compatibility checking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatibilityConfig {
    /// A breaking change must come with a major version bump
    #[serde(default = "default_true")]
    pub require_major_bump_on_breaking: bool,

    /// Report undecided checks as breaking
    #[serde(default)]
    pub treat_unknown_as_breaking: bool,
}

fn default_true() -> bool {
    true
}

impl Default for CompatibilityConfig {
    fn default() -> Self {
        Self {
            require_major_bump_on_breaking: true,
            treat_unknown_as_breaking: false,
        }
    }
}

impl LogicConfig {
    /// Load configuration from default locations
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, adding a specific file on top of the defaults
    pub fn load_from(config_path: Option<&str>) -> std::result::Result<Self, ConfigError> {
        let mut builder = Config::builder();

        for location in ["schema-logic.toml", ".schema-logic.toml", "config/schema-logic.toml"] {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(dirs) = directories::ProjectDirs::from("dev", "familiar", "schema-logic") {
            let xdg_config = dirs.config_dir().join("schema-logic.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("SCHEMA_LOGIC")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Serialize back to TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| LogicError::Config(e.to_string()))
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Engine options: base URI plus every definition under `definitions_dir`
    pub fn to_options(&self) -> Result<Options> {
        let mut options = Options::new();
        if let Some(base_uri) = &self.resolution.base_uri {
            options = options.with_base_uri(base_uri.clone());
        }
        if let Some(dir) = &self.resolution.definitions_dir {
            for (uri, schema) in load_definitions(dir)? {
                options = options.with_definition(uri, schema);
            }
        }
        Ok(options)
    }
}

/// Every `*.json` file under `dir`, keyed by its `$id` or its `file://` URL.
pub fn load_definitions(dir: &Path) -> Result<Vec<(String, Value)>> {
    let mut definitions = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let schema: Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        let uri = match schema.get("$id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => {
                let absolute = path.canonicalize()?;
                match Url::from_file_path(&absolute) {
                    Ok(url) => url.to_string(),
                    Err(()) => {
                        warn!(path = %path.display(), "skipping definition without a usable URI");
                        continue;
                    }
                }
            }
        };
        debug!(uri = %uri, "loaded definition");
        definitions.push((uri, schema));
    }
    Ok(definitions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = LogicConfig::default();
        assert!(config.compatibility.require_major_bump_on_breaking);
        assert!(!config.compatibility.treat_unknown_as_breaking);
        assert_eq!(config.output.format, OutputFormat::Pretty);
    }

    #[test]
    fn test_serialize_config() {
        let config = LogicConfig::default();
        let toml_str = config.to_toml().unwrap();
        assert!(toml_str.contains("[output]"));
        assert!(toml_str.contains("[compatibility]"));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[output]\nformat = \"compact\"\n\n[compatibility]\ntreat_unknown_as_breaking = true\n").unwrap();

        let config = LogicConfig::load_from(path.to_str()).unwrap();
        assert_eq!(config.output.format, OutputFormat::Compact);
        assert!(config.compatibility.treat_unknown_as_breaking);
        assert!(config.compatibility.require_major_bump_on_breaking);
    }

    #[test]
    fn test_missing_explicit_file_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");
        let err = LogicConfig::load_from(path.to_str()).unwrap_err();
        assert!(matches!(LogicError::from(err), LogicError::Config(_)));
    }

    #[test]
    fn test_definitions_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(
            dir.path().join("id.json"),
            r#"{"$id": "https://example.com/id.json", "type": "string"}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("nested/count.json"), r#"{"type": "integer"}"#).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let config = LogicConfig {
            resolution: ResolutionConfig {
                base_uri: Some("https://example.com/root.json".into()),
                definitions_dir: Some(dir.path().to_path_buf()),
            },
            ..LogicConfig::default()
        };
        let options = config.to_options().unwrap();
        assert_eq!(options.base_uri.as_deref(), Some("https://example.com/root.json"));
        assert_eq!(options.definitions.len(), 2);
        assert!(options.definitions.contains_key("https://example.com/id.json"));
        assert!(options.definitions.keys().any(|k| k.starts_with("file://") && k.ends_with("count.json")));
    }
}
