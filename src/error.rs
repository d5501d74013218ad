//! Error types shared by the loader, the transformers and the pipeline steps.
//!
//! Every failure mode of a run maps to one variant of [`Error`]. Nothing is
//! recovered locally: components return the error, the step boundary in
//! [`crate::pipeline`] logs it once, and the run aborts.
//!
//! ```
//! use tabprep::error::Error;
//!
//! fn describe(err: &Error) -> &'static str {
//!     match err {
//!         Error::ColumnNotFound { .. } => "schema",
//!         Error::Parse { .. } => "data",
//!         Error::Connection { .. } | Error::Query { .. } => "database",
//!         _ => "other",
//!     }
//! }
//! # let _ = describe;
//! ```

use thiserror::Error;

/// Main error type for tabprep operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The data source could not be reached or rejected the credentials.
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// A query against a table failed. Carries the driver's message verbatim.
    #[error("Query error on table '{table}': {message}")]
    Query { table: String, message: String },

    /// An operation was called in the wrong lifecycle state.
    #[error("State error: {0}")]
    State(String),

    /// A requested column is absent from the table.
    #[error("Column not found: '{column}'")]
    ColumnNotFound { column: String },

    /// A date value did not match the configured format.
    #[error("Parse error in column '{column}' at row {row}: '{value}' does not match format '{format}'")]
    Parse {
        column: String,
        row: usize,
        value: String,
        format: String,
    },

    /// A table identifier failed validation and was never sent to the database.
    #[error("Invalid table identifier: '{0}'")]
    InvalidIdentifier(String),

    /// A transform tried to introduce a column that already exists.
    #[error("Column '{column}' already exists")]
    ColumnCollision { column: String },

    /// A column has a type the operation cannot handle.
    #[error("Column '{column}' has type {found}, expected {expected}")]
    TypeMismatch {
        column: String,
        expected: String,
        found: String,
    },

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors (config files, output sinks, encoder state).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors raised by polars while building or writing frames.
    #[error("Data processing error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON (de)serialization errors.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn column_not_found(column: impl Into<String>) -> Self {
        Self::ColumnNotFound {
            column: column.into(),
        }
    }

    pub(crate) fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }
}

/// Result type alias for tabprep operations.
pub type Result<T> = std::result::Result<T, Error>;
