//! Error types for rulecheck

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// rulecheck errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("Variable `{name}` is not in the variable catalog")]
    MissingVariable { name: String },

    #[error("Invalid variable {name}: {reason}")]
    InvalidVariable { name: String, reason: String },

    #[error("Invalid criterion {criterion_id}: {reason}")]
    InvalidCriterion {
        criterion_id: String,
        reason: String,
    },

    #[error("Rule not found: {0}")]
    RuleNotFound(String),

    #[error("Criterion not found: {0}")]
    CriterionNotFound(String),

    #[error("Rule format error: {0}")]
    RuleFormat(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Analysis cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_norway::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}
