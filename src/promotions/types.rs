// Promotion enums shared by the calculator, the repositories and the HTTP layer

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of discount a promotion grants
///
/// Determines how the promotion's `value` is interpreted when it is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PromotionType {
    /// Percentage of the running total (e.g., 10 = 10% off)
    Percentage,

    /// Fixed amount off the running total, never more than the total itself
    Fixed,

    /// Buy X get Y: the cheapest units in the cart become free
    BuyXGetY,

    /// Free shipping flag, no monetary discount on the cart
    FreeShipping,
}

impl fmt::Display for PromotionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromotionType::Percentage => write!(f, "percentage"),
            PromotionType::Fixed => write!(f, "fixed"),
            PromotionType::BuyXGetY => write!(f, "buy_x_get_y"),
            PromotionType::FreeShipping => write!(f, "free_shipping"),
        }
    }
}

/// Publication status of a promotion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PromotionStatus {
    Draft,
    Active,
    Expired,
}

impl Default for PromotionStatus {
    fn default() -> Self {
        PromotionStatus::Draft
    }
}

impl fmt::Display for PromotionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromotionStatus::Draft => write!(f, "draft"),
            PromotionStatus::Active => write!(f, "active"),
            PromotionStatus::Expired => write!(f, "expired"),
        }
    }
}

impl std::str::FromStr for PromotionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(PromotionStatus::Draft),
            "active" => Ok(PromotionStatus::Active),
            "expired" => Ok(PromotionStatus::Expired),
            _ => Err(format!("Invalid promotion status: {}", s)),
        }
    }
}
