// Error types for the import adapters

use thiserror::Error;

/// Errors raised while parsing or mapping an import file
#[derive(Debug, Error)]
pub enum ImportError {
    /// File has no header row
    #[error("Import file is empty")]
    EmptyInput,

    /// A quoted field was still open at end of input
    #[error("Unterminated quoted field starting on line {line}")]
    UnterminatedQuote { line: usize },

    /// A column every row needs is absent from the header
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// Import request itself is malformed
    #[error("Invalid import request: {0}")]
    InvalidRequest(String),

    /// Text cleanup pattern failed to compile
    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

/// Result type alias for import operations
pub type ImportResult<T> = Result<T, ImportError>;

impl From<validator::ValidationErrors> for ImportError {
    fn from(err: validator::ValidationErrors) -> Self {
        ImportError::InvalidRequest(err.to_string())
    }
}
