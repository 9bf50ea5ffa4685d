//! Binding Error Module
//!
//! This module defines the error type shared by the connection and statement
//! layers. Two reporting styles coexist: expected runtime conditions are
//! returned as values (`execute` yields `false`, `step` yields
//! `StepResult::Busy` or `StepResult::Error`), while usage bugs surface as
//! one of the variants below.
use thiserror::Error;

/// Error type for the sqlite3-db binding.
///
/// Programmer errors (bad ordinals, wrong statement state, closed handles)
/// each get their own variant so callers can match on them. Engine failures
/// that are not part of the status-return contract are wrapped in
/// `Database`.
#[derive(Error, Debug)]
pub enum BindingError {
    /// The database could not be opened or is not a valid database file
    #[error("Open error: {name}: {message}")]
    Open { name: String, message: String },

    /// SQL text could not be compiled into a statement
    #[error("Prepare error: {0}")]
    Prepare(String),

    /// A parameter ordinal or column index outside the valid range
    #[error("Range error: {what} {index} out of range (count is {count})")]
    Range {
        what: &'static str,
        index: usize,
        count: usize,
    },

    /// The statement is not in a state that allows the operation
    #[error("State error: {0}")]
    State(String),

    /// The statement has been finalized
    #[error("Statement finalized")]
    Finalized,

    /// The connection has been closed
    #[error("Connection closed")]
    Closed,

    /// Engine errors outside the status-return contract
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BindingError {
    /// Builds a `Range` error for a 1-based parameter ordinal.
    pub(crate) fn parameter_range(index: usize, count: usize) -> Self {
        BindingError::Range {
            what: "parameter ordinal",
            index,
            count,
        }
    }

    /// Builds a `Range` error for a 0-based column index.
    pub(crate) fn column_range(index: usize, count: usize) -> Self {
        BindingError::Range {
            what: "column index",
            index,
            count,
        }
    }
}

/// Extracts the engine's own message from a rusqlite error, falling back to
/// the error's display text when the engine supplied none.
pub(crate) fn engine_message(err: &rusqlite::Error) -> String {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(message)) => message.clone(),
        other => other.to_string(),
    }
}

/// Type alias for Result to use BindingError as the error type.
pub type Result<T> = std::result::Result<T, BindingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let db_err = BindingError::Database(rusqlite::Error::ExecuteReturnedResults);
        assert!(db_err.to_string().contains("Database error"));

        let prepare_err = BindingError::Prepare("near \"selec\": syntax error".to_string());
        assert!(prepare_err.to_string().contains("Prepare error"));

        let range_err = BindingError::parameter_range(4, 3);
        assert_eq!(
            range_err.to_string(),
            "Range error: parameter ordinal 4 out of range (count is 3)"
        );

        assert_eq!(BindingError::Closed.to_string(), "Connection closed");
    }

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: BindingError = io_err.into();
        match err {
            BindingError::Io(_) => {}
            _ => panic!("Expected IO error"),
        }

        let err: BindingError = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, BindingError::Database(_)));
    }

    #[test]
    fn test_engine_message_prefers_engine_text() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
            Some("no such table: missing".to_string()),
        );
        assert_eq!(engine_message(&err), "no such table: missing");

        let err = rusqlite::Error::InvalidQuery;
        assert!(!engine_message(&err).is_empty());
    }
}
