//! Error types for Beacon

use thiserror::Error;

use crate::Namespace;

/// Core Beacon errors
#[derive(Error, Debug)]
pub enum BeaconError {
    // Provider configuration errors
    #[error("Provider is missing its required data mapping")]
    MissingProviderData,

    #[error("Provider data must be a mapping, got {found}")]
    InvalidProviderData { found: &'static str },

    #[error("Namespace must be a string, got {found}")]
    InvalidNamespace { found: &'static str },

    // Subscriber configuration errors
    #[error("Subscriber must wrap exactly one child, got {found}")]
    ChildCount { found: usize },

    #[error("Required keys must be null, a string or a list of strings")]
    InvalidRequiredKeys,

    // Setup errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Tracing setup failed: {0}")]
    Tracing(String),
}

/// Structural comparison failed on pathological input
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ComparisonError {
    #[error("Comparison of namespace {namespace} exceeded nesting depth {limit}")]
    DepthExceeded { namespace: Namespace, limit: usize },
}

impl ComparisonError {
    pub fn namespace(&self) -> &Namespace {
        match self {
            ComparisonError::DepthExceeded { namespace, .. } => namespace,
        }
    }
}

/// Result type for Beacon operations
pub type BeaconResult<T> = Result<T, BeaconError>;

/// Short name of a JSON value's kind, for error messages
pub fn value_kind(value: &serde_json::Value) -> &'static str {
    use serde_json::Value;
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
