use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::promotions::types::{PromotionStatus, PromotionType};
use crate::validation::{validate_money_amount, validate_identifier};

/// Quantities for a buy-X-get-Y promotion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct BuyXGetY {
    #[validate(range(min = 1))]
    pub buy_quantity: u32,
    #[validate(range(min = 1))]
    pub get_quantity: u32,
}

impl Default for BuyXGetY {
    fn default() -> Self {
        Self {
            buy_quantity: 2,
            get_quantity: 1,
        }
    }
}

/// A discount rule with eligibility conditions, stackability and priority
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Promotion {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub promotion_type: PromotionType,
    pub value: Decimal,
    pub buy_x_get_y: Option<BuyXGetY>,
    pub min_purchase: Option<Decimal>,
    pub applicable_products: Vec<String>,
    pub applicable_categories: Vec<String>,
    pub applicable_member_levels: Vec<String>,
    pub stackable: bool,
    pub priority: i32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: PromotionStatus,
    pub usage_limit: Option<i64>,
    pub used_count: i64,
    pub vendor_id: Option<String>,
    pub code: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Promotion {
    /// Create an active, non-stackable, site-wide promotion with no conditions
    pub fn new(
        name: impl Into<String>,
        promotion_type: PromotionType,
        value: Decimal,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            promotion_type,
            value,
            buy_x_get_y: None,
            min_purchase: None,
            applicable_products: Vec::new(),
            applicable_categories: Vec::new(),
            applicable_member_levels: Vec::new(),
            stackable: false,
            priority: 0,
            start_date,
            end_date,
            status: PromotionStatus::Active,
            usage_limit: None,
            used_count: 0,
            vendor_id: None,
            code: None,
            created_at: Utc::now(),
        }
    }

    /// Whether the promotion only applies when its code is entered
    pub fn is_coded(&self) -> bool {
        self.code
            .as_deref()
            .map(|c| !c.trim().is_empty())
            .unwrap_or(false)
    }

    /// Codes compare trimmed and case-insensitively
    pub fn matches_code(&self, code: &str) -> bool {
        match self.code.as_deref() {
            Some(own) if !own.trim().is_empty() => {
                own.trim().eq_ignore_ascii_case(code.trim())
            }
            _ => false,
        }
    }

    /// Buy-X-get-Y quantities, falling back to buy 2 get 1
    pub fn buy_x_get_y_rule(&self) -> BuyXGetY {
        self.buy_x_get_y.unwrap_or_default()
    }
}

/// One line of the shopper's cart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct CartItem {
    #[validate(length(min = 1))]
    pub product_id: String,
    pub variant_id: Option<String>,
    #[validate(range(min = 1))]
    pub quantity: u32,
    #[validate(custom = "validate_money_amount")]
    pub unit_price: Decimal,
    #[serde(default)]
    pub category_ids: Vec<String>,
}

impl CartItem {
    pub fn new(product_id: impl Into<String>, quantity: u32, unit_price: Decimal) -> Self {
        Self {
            product_id: product_id.into(),
            variant_id: None,
            quantity,
            unit_price,
            category_ids: Vec::new(),
        }
    }

    pub fn with_categories(mut self, category_ids: &[&str]) -> Self {
        self.category_ids = category_ids.iter().map(|c| c.to_string()).collect();
        self
    }

    /// unit_price × quantity, saturating at Decimal::MAX
    pub fn line_total(&self) -> Decimal {
        self.unit_price.saturating_mul(Decimal::from(self.quantity))
    }
}

/// Everything the calculator needs to know about the cart and who is buying
#[derive(Debug, Clone, Default)]
pub struct CartContext {
    pub items: Vec<CartItem>,
    pub member_level: Option<String>,
    pub vendor_id: Option<String>,
    pub promo_code: Option<String>,
}

/// A promotion that changed the cart, with the amount it took off
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedPromotion {
    pub promotion_id: Uuid,
    pub promotion_name: String,
    pub promotion_type: PromotionType,
    pub discount_amount: Decimal,
}

/// Result of pricing a cart against the promotion catalogue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountResult {
    pub original_total: Decimal,
    pub discounted_total: Decimal,
    pub total_discount: Decimal,
    pub applied_promotions: Vec<AppliedPromotion>,
    pub free_shipping: bool,
}

/// Request DTO for pricing a cart
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CartDiscountRequest {
    #[validate]
    #[validate(length(min = 1))]
    pub items: Vec<CartItem>,
    pub user_id: Option<Uuid>,
    pub vendor_id: Option<String>,
    pub promo_code: Option<String>,
}

/// Request DTO for creating a promotion
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[validate(schema(function = "validate_promotion_request"))]
pub struct CreatePromotionRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
    pub promotion_type: PromotionType,
    #[validate(custom = "validate_money_amount")]
    #[serde(default)]
    pub value: Decimal,
    #[validate]
    pub buy_x_get_y: Option<BuyXGetY>,
    #[validate(custom = "validate_money_amount")]
    pub min_purchase: Option<Decimal>,
    #[serde(default)]
    pub applicable_products: Vec<String>,
    #[serde(default)]
    pub applicable_categories: Vec<String>,
    #[serde(default)]
    pub applicable_member_levels: Vec<String>,
    #[serde(default)]
    pub stackable: bool,
    #[serde(default)]
    pub priority: i32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub status: PromotionStatus,
    #[validate(range(min = 1))]
    pub usage_limit: Option<i64>,
    pub vendor_id: Option<String>,
    #[validate(custom = "validate_identifier")]
    pub code: Option<String>,
}

/// Cross-field rules that the derive attributes cannot express
fn validate_promotion_request(request: &CreatePromotionRequest) -> Result<(), ValidationError> {
    if request.end_date < request.start_date {
        return Err(ValidationError::new("end_date_before_start_date"));
    }
    if request.promotion_type == PromotionType::Percentage && request.value > Decimal::ONE_HUNDRED {
        return Err(ValidationError::new("percentage_exceeds_100"));
    }
    Ok(())
}

impl CreatePromotionRequest {
    /// Build the stored promotion, assigning id and creation time
    pub fn into_promotion(self) -> Promotion {
        let buy_x_get_y = match self.promotion_type {
            PromotionType::BuyXGetY => Some(self.buy_x_get_y.unwrap_or_default()),
            _ => None,
        };

        Promotion {
            id: Uuid::new_v4(),
            name: self.name,
            description: self.description,
            promotion_type: self.promotion_type,
            value: self.value,
            buy_x_get_y,
            min_purchase: self.min_purchase,
            applicable_products: self.applicable_products,
            applicable_categories: self.applicable_categories,
            applicable_member_levels: self.applicable_member_levels,
            stackable: self.stackable,
            priority: self.priority,
            start_date: self.start_date,
            end_date: self.end_date,
            status: self.status,
            usage_limit: self.usage_limit,
            used_count: 0,
            vendor_id: self.vendor_id,
            code: self.code.filter(|c| !c.trim().is_empty()),
            created_at: Utc::now(),
        }
    }
}

/// Request DTO for changing a promotion's status
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpdatePromotionStatusRequest {
    pub status: PromotionStatus,
}
