// Error types for the loyalty engine
// Covers settings, ledger postings, redemption rules and storage

use thiserror::Error;
use uuid::Uuid;

/// Main error type for points, ledger and member level operations
#[derive(Debug, Error)]
pub enum LoyaltyError {
    /// Member does not exist in the member store
    #[error("Member not found: {0}")]
    MemberNotFound(Uuid),

    /// Settings or level table failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Ledger record violates the sign rules for its type, or is otherwise malformed
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    /// Debit would take the balance below zero
    #[error("Insufficient points: balance {balance}, requested {requested}")]
    InsufficientPoints { balance: i64, requested: i64 },

    /// Redemption request breaks a redemption rule (minimum, max percentage)
    #[error("Redemption rejected: {0}")]
    RedemptionRejected(String),

    /// Arithmetic produced a value that cannot be stored as points
    #[error("Calculation error: {0}")]
    CalculationError(String),

    /// Points program is switched off
    #[error("Loyalty program is disabled")]
    ProgramDisabled,

    /// Database operation errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// Settings file could not be parsed
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Settings file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for loyalty operations
pub type LoyaltyResult<T> = Result<T, LoyaltyError>;

impl From<validator::ValidationErrors> for LoyaltyError {
    fn from(err: validator::ValidationErrors) -> Self {
        LoyaltyError::InvalidConfiguration(err.to_string())
    }
}
