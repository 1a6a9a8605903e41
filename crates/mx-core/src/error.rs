//! Error types for mx-core

use thiserror::Error;

/// Core error type for Metrix
#[derive(Error, Debug)]
pub enum CoreError {
    /// E001: Configuration file not found
    #[error("[E001] Config file not found: {path}")]
    ConfigNotFound { path: String },

    /// E002: Failed to parse configuration file
    #[error("[E002] Failed to parse config: {message}")]
    ConfigParseError { message: String },

    /// E003: Invalid configuration value
    #[error("[E003] Invalid config: {message}")]
    ConfigInvalid { message: String },

    /// E004: A metric, variant, or pre-aggregation document failed validation
    #[error("[E004] Invalid {kind} definition in {path}: {message}")]
    DefinitionInvalid {
        kind: String,
        path: String,
        message: String,
    },

    /// E005: Two definitions share the same id
    #[error("[E005] Duplicate definition id '{id}' in {path1} and {path2}")]
    DuplicateDefinition {
        id: String,
        path1: String,
        path2: String,
    },

    /// E006: Pre-aggregation status change that the lifecycle does not allow
    #[error("[E006] Pre-aggregation '{spec_id}' cannot move from {from} to {to}")]
    InvalidStatusTransition {
        spec_id: String,
        from: String,
        to: String,
    },

    /// E007: Empty identifier where a name is required
    #[error("[E007] Empty name not allowed: {context}")]
    EmptyName { context: String },

    /// E014: IO error
    #[error("[E014] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// E016: IO error with file path context
    #[error("[E016] Failed to read '{path}': {source}")]
    IoWithPath {
        path: String,
        source: std::io::Error,
    },

    /// E015: YAML parse error
    #[error("[E015] YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;
