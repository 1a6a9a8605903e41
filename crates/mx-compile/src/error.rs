//! Error types for mx-compile

use mx_core::ComponentCategory;
use thiserror::Error;

fn hint(suggestion: &Option<String>) -> String {
    suggestion
        .as_deref()
        .map(|s| format!(" (did you mean '{}'?)", s))
        .unwrap_or_default()
}

/// Variant and metric compilation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    /// C001: The variant chain revisits an id
    #[error("[C001] Circular variant reference: {}", .chain.join(" -> "))]
    CircularReference { chain: Vec<String> },

    /// C002: The variant chain is longer than allowed
    #[error("[C002] Variant chain depth {depth} exceeds maximum {max}: {}", .chain.join(" -> "))]
    MaxDepthExceeded {
        depth: usize,
        max: usize,
        chain: Vec<String>,
    },

    /// C003: A variant pins an environment or data model its source does not have
    #[error("[C003] Variant '{variant}' expects {field} '{variant_value}' but source '{source_id}' has {}", .source_value.as_deref().unwrap_or("none"))]
    IncompatibleSource {
        variant: String,
        source_id: String,
        field: String,
        variant_value: String,
        source_value: Option<String>,
    },

    /// C004: A dimension, join, or table reference outside the metric's join graph
    #[error("[C004] Invalid {} '{name}' in {context}: {message}{}", .category.singular(), hint(.suggestion))]
    InvalidJoinDimension {
        category: ComponentCategory,
        name: String,
        context: String,
        message: String,
        suggestion: Option<String>,
    },

    /// C005: A measure name that does not exist
    #[error("[C005] Measure '{name}' not found in {context}{}", hint(.suggestion))]
    MeasureNotFound {
        name: String,
        context: String,
        suggestion: Option<String>,
    },

    /// C006: Derived measure or added component is inconsistent
    #[error("[C006] Invalid derivation '{name}': {message}")]
    InvalidDerivation { name: String, message: String },

    /// C007: The source id is neither a metric nor a variant
    #[error("[C007] Source '{id}' referenced by '{referenced_by}' not found{}", hint(.suggestion))]
    SourceNotFound {
        id: String,
        referenced_by: String,
        suggestion: Option<String>,
    },

    /// C008: A filter, join, parameter, or derived measure name that does not exist
    #[error("[C008] {} '{name}' not found in {context}{}", .category.singular(), hint(.suggestion))]
    ReferenceNotFound {
        category: ComponentCategory,
        name: String,
        context: String,
        suggestion: Option<String>,
    },

    /// C009: Compilation was cancelled
    #[error("[C009] Compilation cancelled")]
    Cancelled,
}

impl CompileError {
    /// Short machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            CompileError::CircularReference { .. } => "circular_reference",
            CompileError::MaxDepthExceeded { .. } => "max_depth_exceeded",
            CompileError::IncompatibleSource { .. } => "incompatible_source",
            CompileError::InvalidJoinDimension { .. } => "invalid_join_dimension",
            CompileError::MeasureNotFound { .. } => "measure_not_found",
            CompileError::InvalidDerivation { .. } => "invalid_derivation",
            CompileError::SourceNotFound { .. } => "source_not_found",
            CompileError::ReferenceNotFound { .. } => "reference_not_found",
            CompileError::Cancelled => "cancelled",
        }
    }

    /// Closest-name suggestion carried by the error, if any
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            CompileError::InvalidJoinDimension { suggestion, .. }
            | CompileError::MeasureNotFound { suggestion, .. }
            | CompileError::SourceNotFound { suggestion, .. }
            | CompileError::ReferenceNotFound { suggestion, .. } => suggestion.as_deref(),
            _ => None,
        }
    }

    /// Build the "name not found" error for a component category
    pub(crate) fn not_found(
        category: ComponentCategory,
        name: &str,
        context: String,
        suggestion: Option<String>,
    ) -> Self {
        match category {
            ComponentCategory::Measures => CompileError::MeasureNotFound {
                name: name.to_string(),
                context,
                suggestion,
            },
            ComponentCategory::Dimensions => CompileError::InvalidJoinDimension {
                category,
                name: name.to_string(),
                context,
                message: "dimension not found".to_string(),
                suggestion,
            },
            _ => CompileError::ReferenceNotFound {
                category,
                name: name.to_string(),
                context,
                suggestion,
            },
        }
    }
}

/// Result type alias for CompileError
pub type CompileResult<T> = Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_include_hint() {
        let err = CompileError::not_found(
            ComponentCategory::Measures,
            "revenu",
            "variant 'v' inclusion".into(),
            Some("revenue".into()),
        );
        assert_eq!(
            err.to_string(),
            "[C005] Measure 'revenu' not found in variant 'v' inclusion (did you mean 'revenue'?)"
        );
        assert_eq!(err.suggestion(), Some("revenue"));

        let err = CompileError::not_found(
            ComponentCategory::Filters,
            "regon",
            "variant 'v' exclude".into(),
            None,
        );
        assert_eq!(err.kind(), "reference_not_found");
        assert_eq!(err.to_string(), "[C008] filter 'regon' not found in variant 'v' exclude");
    }

    #[test]
    fn test_cycle_message() {
        let err = CompileError::CircularReference {
            chain: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "[C001] Circular variant reference: a -> b -> a");
    }
}
