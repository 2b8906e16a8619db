use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::loyalty::member_levels::LevelChange;
use crate::loyalty::points_engine::{PointsCalculation, PointsOrderItem};
use crate::loyalty::ledger::PointTransaction;
use crate::models::OrderStatus;
use crate::validation::validate_money_amount;

/// An order that reached a completed status
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CompletedOrder {
    #[validate(length(min = 1))]
    pub order_id: String,
    pub member_id: Uuid,
    #[validate]
    #[serde(default)]
    pub items: Vec<PointsOrderItem>,
    #[validate(custom = "validate_money_amount")]
    pub order_amount: Decimal,
    #[validate(custom = "validate_money_amount")]
    #[serde(default)]
    pub shipping_amount: Decimal,
}

/// Status change reported by the order system
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct OrderStatusChangeRequest {
    #[validate(length(min = 1))]
    pub order_id: String,
    /// Guest orders carry no member and earn nothing
    pub member_id: Option<Uuid>,
    pub previous_status: Option<OrderStatus>,
    pub status: OrderStatus,
    #[validate]
    #[serde(default)]
    pub items: Vec<PointsOrderItem>,
    #[validate(custom = "validate_money_amount")]
    pub order_amount: Decimal,
    #[validate(custom = "validate_money_amount")]
    #[serde(default)]
    pub shipping_amount: Decimal,
}

impl OrderStatusChangeRequest {
    /// The completed order this change describes, when a member placed it
    pub fn completed_order(&self) -> Option<CompletedOrder> {
        self.member_id.map(|member_id| CompletedOrder {
            order_id: self.order_id.clone(),
            member_id,
            items: self.items.clone(),
            order_amount: self.order_amount,
            shipping_amount: self.shipping_amount,
        })
    }
}

/// What processing a completed order changed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCompletionOutcome {
    pub order_id: String,
    pub member_id: Uuid,
    /// Order had been processed before; nothing changed
    pub already_processed: bool,
    pub points_awarded: i64,
    pub level_change: Option<LevelChange>,
}

/// Result of awarding points for one order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointsAward {
    pub points: i64,
    pub calculation: Option<PointsCalculation>,
    pub transaction: Option<PointTransaction>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct RedeemPointsRequest {
    #[validate(range(min = 1))]
    pub points: i64,
    /// Order total the points are paying towards
    #[validate(custom = "validate_money_amount")]
    pub order_amount: Decimal,
    pub order_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct AdjustPointsRequest {
    #[validate(custom = "validate_non_zero")]
    pub delta: i64,
    #[validate(length(min = 1))]
    pub operator_id: String,
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

fn validate_non_zero(value: i64) -> Result<(), ValidationError> {
    if value == 0 {
        Err(ValidationError::new("must_be_non_zero"))
    } else {
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct RefundOrderRequest {
    pub member_id: Uuid,
}

/// Current balance with the member's level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointsBalance {
    pub member_id: Uuid,
    pub balance: i64,
    pub member_level: Option<String>,
    pub total_spent: Decimal,
    pub transactions: Vec<PointTransaction>,
}
