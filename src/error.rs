//! Error types for the schema logic engine

use thiserror::Error;

/// Result type for schema logic operations
pub type Result<T> = std::result::Result<T, LogicError>;

/// Schema logic errors
///
/// Indeterminacy is never an error: the oracles answer `None` when they
/// cannot prove a result. These variants are hard failures.
#[derive(Error, Debug)]
pub enum LogicError {
    #[error("Unsupported keyword: {keyword} has no sound logical model")]
    UnsupportedKeyword { keyword: String },

    #[error("Unresolvable reference: {reference} (base: {base})")]
    UnresolvableReference { reference: String, base: String },

    #[error("Plugin configuration error: {0}")]
    PluginConfiguration(String),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Incompatible change: {0}")]
    IncompatibleChange(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<config_crate::ConfigError> for LogicError {
    fn from(e: config_crate::ConfigError) -> Self {
        LogicError::Config(e.to_string())
    }
}

impl LogicError {
    pub(crate) fn unresolvable(reference: impl Into<String>, base: impl Into<String>) -> Self {
        LogicError::UnresolvableReference {
            reference: reference.into(),
            base: base.into(),
        }
    }
}
