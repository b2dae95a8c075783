//! Evaluator error types

/// Genuine evaluator failures.
///
/// Rule violations are not errors; they are reported as messages. These
/// variants describe rule configurations the evaluator cannot run.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EvaluateError {
    /// A `format` rule carries a pattern that does not compile.
    #[error("Invalid pattern for field '{field}': {message}")]
    InvalidPattern {
        /// Field the rule belongs to.
        field: String,
        /// Compiler diagnostic.
        message: String,
    },

    /// A `type` rule names a type the evaluator does not know.
    #[error("Unknown type '{type_name}' for field '{field}'")]
    UnknownType {
        /// Field the rule belongs to.
        field: String,
        /// The unknown type name.
        type_name: String,
    },

    /// A `datetime` rule carries a bound that is not a date.
    #[error("Invalid date bound '{bound}' for field '{field}'")]
    InvalidDateBound {
        /// Field the rule belongs to.
        field: String,
        /// The unparseable bound.
        bound: String,
    },
}

impl EvaluateError {
    /// Returns the field the failing rule belongs to.
    pub fn field(&self) -> &str {
        match self {
            Self::InvalidPattern { field, .. }
            | Self::UnknownType { field, .. }
            | Self::InvalidDateBound { field, .. } => field,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_and_display() {
        let err = EvaluateError::UnknownType {
            field: "color".to_string(),
            type_name: "hex".to_string(),
        };
        assert_eq!(err.field(), "color");
        assert_eq!(err.to_string(), "Unknown type 'hex' for field 'color'");
    }
}
