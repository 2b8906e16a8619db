// Error types for the promotion engine

use thiserror::Error;
use uuid::Uuid;

use crate::loyalty::LoyaltyError;

/// Errors raised while managing promotions or pricing a cart
#[derive(Debug, Error)]
pub enum PromotionError {
    /// Referenced promotion does not exist
    #[error("Promotion not found: {0}")]
    NotFound(Uuid),

    /// Promotion definition failed validation
    #[error("Invalid promotion: {0}")]
    InvalidPromotion(String),

    /// Cart payload failed validation
    #[error("Invalid cart: {0}")]
    InvalidCart(String),

    /// Another promotion already uses this code
    #[error("Promotion code already in use: {0}")]
    DuplicateCode(String),

    /// Resolving the acting member's level failed
    #[error("Member lookup failed: {0}")]
    MemberLookup(String),

    /// Database operation errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Result type alias for promotion operations
pub type PromotionResult<T> = Result<T, PromotionError>;

impl From<LoyaltyError> for PromotionError {
    fn from(err: LoyaltyError) -> Self {
        PromotionError::MemberLookup(err.to_string())
    }
}
