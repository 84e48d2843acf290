//! Error types for Quill queries.

use std::fmt;

/// Result type alias for Quill operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for query construction and execution.
///
/// Only syntax-level misuse surfaces as an error; expression evaluation
/// faults degrade to absent values and never reach this type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// A clause keyword outside the grammar's alphabet.
    UnknownKeyword {
        keyword: String,
    },
    /// The accumulated keyword sentence does not match the query grammar.
    SyntaxMismatch {
        sentence: String,
        expected: String,
    },
    /// ON declared with no preceding JOIN.
    OnWithoutJoin,
    /// ON declared but the last JOIN already has a condition.
    OnAlreadyDefined,
    /// A grammar-mandated clause carrier was never supplied.
    MissingClause {
        keyword: String,
    },
    /// Invalid operation.
    InvalidOperation {
        message: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnknownKeyword { keyword } => {
                write!(f, "Unknown keyword {}", keyword)
            }
            Error::SyntaxMismatch { sentence, expected } => {
                write!(
                    f,
                    "Keyword sequence `{}` does not match syntax `{}`",
                    sentence, expected
                )
            }
            Error::OnWithoutJoin => {
                write!(f, "ON clause without JOIN statement")
            }
            Error::OnAlreadyDefined => {
                write!(f, "ON clause already defined for last JOIN")
            }
            Error::MissingClause { keyword } => {
                write!(f, "Missing {} clause", keyword)
            }
            Error::InvalidOperation { message } => {
                write!(f, "Invalid operation: {}", message)
            }
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Creates an unknown keyword error.
    pub fn unknown_keyword(keyword: impl Into<String>) -> Self {
        Error::UnknownKeyword {
            keyword: keyword.into(),
        }
    }

    /// Creates a syntax mismatch error.
    pub fn syntax_mismatch(sentence: impl Into<String>, expected: impl Into<String>) -> Self {
        Error::SyntaxMismatch {
            sentence: sentence.into(),
            expected: expected.into(),
        }
    }

    /// Creates a missing clause error.
    pub fn missing_clause(keyword: impl Into<String>) -> Self {
        Error::MissingClause {
            keyword: keyword.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Error::InvalidOperation {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::unknown_keyword("FETCH");
        assert!(err.to_string().contains("FETCH"));

        let err = Error::syntax_mismatch("SELECT WHERE FROM", "SELECT FROM [WHERE]");
        assert!(err.to_string().contains("SELECT WHERE FROM"));
        assert!(err.to_string().contains("SELECT FROM [WHERE]"));

        let err = Error::missing_clause("FROM");
        assert!(err.to_string().contains("FROM"));
    }

    #[test]
    fn test_error_constructors() {
        let err = Error::unknown_keyword("limit");
        match err {
            Error::UnknownKeyword { keyword } => assert_eq!(keyword, "limit"),
            _ => panic!("Wrong error type"),
        }
    }
}
