// Validation utilities module
// Custom validator functions for money and rate fields

use rust_decimal::Decimal;
use validator::ValidationError;

/// Largest monetary amount a request may carry
pub const MAX_MONEY_AMOUNT: Decimal = Decimal::from_parts(0xD4A5_1000, 0xE8, 0, false, 0); // 1_000_000_000_000

/// Validates that a monetary amount is not negative and at most MAX_MONEY_AMOUNT
pub fn validate_money_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        Err(ValidationError::new("amount_must_be_non_negative"))
    } else if *amount > MAX_MONEY_AMOUNT {
        Err(ValidationError::new("amount_too_large"))
    } else {
        Ok(())
    }
}

/// Validates that a percentage lies within 0..=100
pub fn validate_percentage(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO || *value > Decimal::ONE_HUNDRED {
        Err(ValidationError::new("percentage_out_of_range"))
    } else {
        Ok(())
    }
}

/// Validates that a code-like identifier has no surrounding whitespace and is non-empty
pub fn validate_identifier(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() || value.trim() != value {
        Err(ValidationError::new("invalid_identifier"))
    } else {
        Ok(())
    }
}
