use std::fmt;

use thiserror::Error;

/// How the client runtime should classify a failure for its own retry and
/// reporting logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Connection,
    Statement,
    Transaction,
    Unknown,
}

/// A translated engine failure: human description, raw engine message,
/// category, and the engine's numeric code rendered as decimal text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredError {
    pub description: String,
    pub engine_message: String,
    pub category: ErrorCategory,
    pub native_code: String,
}

impl fmt::Display for StructuredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.engine_message.is_empty() {
            write!(f, "{}", self.description)
        } else {
            write!(f, "{}: {}", self.description, self.engine_message)
        }
    }
}

/// Wrap an engine error message and numeric code into a structured error.
///
/// The duckdb crate already hands us UTF-8 `String` messages, so the character
/// decoding step of the original driver collapses to a pass-through here.
pub fn translate(
    description: &str,
    engine_message: &str,
    category: ErrorCategory,
    native_code: i32,
) -> StructuredError {
    StructuredError {
        description: description.to_string(),
        engine_message: engine_message.to_string(),
        category,
        native_code: native_code.to_string(),
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DuckdbDriverError {
    #[error("connection error: {0}")]
    Connection(StructuredError),

    #[error("statement error: {0}")]
    Statement(StructuredError),

    #[error("transaction error: {0}")]
    Transaction(StructuredError),

    #[error("database error: {0}")]
    Unknown(StructuredError),
}

impl DuckdbDriverError {
    pub fn category(&self) -> ErrorCategory {
        self.structured().category
    }

    pub fn structured(&self) -> &StructuredError {
        match self {
            Self::Connection(e) | Self::Statement(e) | Self::Transaction(e) | Self::Unknown(e) => e,
        }
    }

    pub(crate) fn from_structured(error: StructuredError) -> Self {
        match error.category {
            ErrorCategory::Connection => Self::Connection(error),
            ErrorCategory::Statement => Self::Statement(error),
            ErrorCategory::Transaction => Self::Transaction(error),
            ErrorCategory::Unknown => Self::Unknown(error),
        }
    }

    /// Translate a raw engine failure at the point it crossed the boundary.
    pub(crate) fn from_engine(
        description: &str,
        category: ErrorCategory,
        error: &duckdb::Error,
    ) -> Self {
        Self::from_structured(translate(description, &error.to_string(), category, -1))
    }

    pub(crate) fn statement(description: &str, engine_message: &str) -> Self {
        Self::Statement(translate(
            description,
            engine_message,
            ErrorCategory::Statement,
            -1,
        ))
    }

    pub(crate) fn connection(description: &str, engine_message: &str) -> Self {
        Self::Connection(translate(
            description,
            engine_message,
            ErrorCategory::Connection,
            -1,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translate_records_category_and_decimal_code() {
        let e = translate("Unable to fetch row", "No query", ErrorCategory::Connection, 7);
        assert_eq!(e.category, ErrorCategory::Connection);
        assert_eq!(e.native_code, "7");
        assert_eq!(e.to_string(), "Unable to fetch row: No query");
    }

    #[test]
    fn empty_engine_message_is_not_rendered() {
        let e = translate("Parameter count mismatch", "", ErrorCategory::Statement, -1);
        assert_eq!(e.to_string(), "Parameter count mismatch");
    }

    #[test]
    fn error_enum_follows_category() {
        let e = DuckdbDriverError::from_structured(translate(
            "Unable to begin transaction",
            "locked",
            ErrorCategory::Transaction,
            -1,
        ));
        assert!(matches!(e, DuckdbDriverError::Transaction(_)));
        assert_eq!(e.category(), ErrorCategory::Transaction);
    }
}
