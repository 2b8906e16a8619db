// Points Engine
//
// Calculates loyalty points for an order.
// Regular lines earn at the configured rate scaled by member and campaign
// multipliers; discounted lines earn a fixed percentage of their subtotal.
// All intermediate values are floored to whole points.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::loyalty::error::{LoyaltyError, LoyaltyResult};
use crate::loyalty::price_utils::is_discounted_product;
use crate::loyalty::settings::LoyaltySettings;
use crate::validation::validate_money_amount;

/// Order line as seen by the points engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct PointsOrderItem {
    pub product_id: String,
    #[validate(range(min = 1))]
    pub quantity: u32,
    /// Unit price actually charged
    #[validate(custom = "validate_money_amount")]
    pub price: Decimal,
    /// Unit price before any product discount
    #[validate(custom = "validate_money_amount")]
    pub original_price: Option<Decimal>,
    #[serde(default)]
    pub is_discounted: bool,
}

impl PointsOrderItem {
    pub fn new(product_id: impl Into<String>, quantity: u32, price: Decimal) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            price,
            original_price: None,
            is_discounted: false,
        }
    }

    /// Mark the line as sold below `original_price`
    pub fn discounted_from(mut self, original_price: Decimal) -> Self {
        self.original_price = Some(original_price);
        self.is_discounted = true;
        self
    }

    /// price × quantity, `None` on overflow
    pub fn line_subtotal(&self) -> Option<Decimal> {
        self.price.checked_mul(Decimal::from(self.quantity))
    }

    /// Subtotal at original price, or at the charged price when no original is known
    pub fn full_price_subtotal(&self) -> Option<Decimal> {
        let unit = self.original_price.unwrap_or(self.price).max(self.price);
        unit.checked_mul(Decimal::from(self.quantity))
    }

    /// Flagged as discounted, or charged below its original price
    pub fn counts_as_discounted(&self) -> bool {
        self.is_discounted || is_discounted_product(self.price, self.original_price, None)
    }
}

/// Per-source split of the points total
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointsBreakdown {
    pub regular_items: i64,
    pub discounted_items: i64,
    pub shipping: i64,
    pub member_multiplier: Decimal,
    pub campaign_multiplier: Decimal,
}

/// Result of a points calculation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointsCalculation {
    pub total_points: i64,
    pub breakdown: PointsBreakdown,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Points Engine
///
/// Pure calculator; settings, multipliers and `now` are passed in.
pub struct PointsEngine;

impl PointsEngine {
    /// Calculate points for an order
    ///
    /// Returns `None` when the program is disabled.
    pub fn calculate(
        settings: &LoyaltySettings,
        items: &[PointsOrderItem],
        shipping_amount: Decimal,
        member_multiplier: Decimal,
        now: DateTime<Utc>,
    ) -> LoyaltyResult<Option<PointsCalculation>> {
        if !settings.enabled {
            return Ok(None);
        }

        let campaign_multiplier = settings.campaign_multiplier(now);
        let mut regular_items = 0i64;
        let mut discounted_items = 0i64;

        for item in items {
            let subtotal = item
                .line_subtotal()
                .ok_or_else(|| out_of_range("line subtotal", &item.product_id))?;
            if item.counts_as_discounted() {
                let full_price = item
                    .full_price_subtotal()
                    .ok_or_else(|| out_of_range("full price subtotal", &item.product_id))?;
                let points = Self::discounted_points(
                    settings,
                    subtotal,
                    full_price,
                    member_multiplier,
                    campaign_multiplier,
                )?;
                discounted_items = add_points(discounted_items, points)?;
            } else {
                let points =
                    Self::regular_points(settings, subtotal, member_multiplier, campaign_multiplier)?;
                regular_items = add_points(regular_items, points)?;
            }
        }

        let shipping = if !settings.advanced.exclude_shipping && shipping_amount > Decimal::ZERO {
            Self::regular_points(settings, shipping_amount, member_multiplier, campaign_multiplier)?
        } else {
            0
        };

        Ok(Some(PointsCalculation {
            total_points: add_points(add_points(regular_items, discounted_items)?, shipping)?,
            breakdown: PointsBreakdown {
                regular_items,
                discounted_items,
                shipping,
                member_multiplier,
                campaign_multiplier,
            },
            expires_at: settings.expires_at(now)?,
        }))
    }

    /// floor(floor(amount / points_per_amount) × points_earned × member × campaign)
    pub fn regular_points(
        settings: &LoyaltySettings,
        amount: Decimal,
        member_multiplier: Decimal,
        campaign_multiplier: Decimal,
    ) -> LoyaltyResult<i64> {
        if amount <= Decimal::ZERO {
            return Ok(0);
        }
        let units = amount
            .checked_div(settings.points_per_amount)
            .ok_or_else(|| out_of_range("earn units", amount))?
            .floor();
        let points = units
            .checked_mul(Decimal::from(settings.points_earned))
            .and_then(|base| base.checked_mul(member_multiplier))
            .and_then(|base| base.checked_mul(campaign_multiplier))
            .ok_or_else(|| out_of_range("regular points", amount))?;
        to_points(points)
    }

    /// Fixed-percentage points for a discounted line, capped at its full-price regular points
    pub fn discounted_points(
        settings: &LoyaltySettings,
        subtotal: Decimal,
        full_price_subtotal: Decimal,
        member_multiplier: Decimal,
        campaign_multiplier: Decimal,
    ) -> LoyaltyResult<i64> {
        if subtotal <= Decimal::ZERO {
            return Ok(0);
        }
        let rule = &settings.discount_product_rule;
        let mut points = to_points(
            subtotal
                .checked_mul(rule.fixed_percentage / Decimal::ONE_HUNDRED)
                .ok_or_else(|| out_of_range("discounted points", subtotal))?,
        )?;
        if rule.apply_campaign_multiplier {
            points = to_points(
                Decimal::from(points)
                    .checked_mul(campaign_multiplier)
                    .ok_or_else(|| out_of_range("campaign points", points))?,
            )?;
        }

        let cap = Self::regular_points(
            settings,
            full_price_subtotal,
            member_multiplier,
            campaign_multiplier,
        )?;
        Ok(points.min(cap))
    }
}

fn out_of_range(what: &str, input: impl std::fmt::Display) -> LoyaltyError {
    LoyaltyError::CalculationError(format!("{} out of range for {}", what, input))
}

fn add_points(a: i64, b: i64) -> LoyaltyResult<i64> {
    a.checked_add(b)
        .ok_or_else(|| LoyaltyError::CalculationError("points total overflow".to_string()))
}

fn to_points(value: Decimal) -> LoyaltyResult<i64> {
    value
        .floor()
        .to_i64()
        .ok_or_else(|| LoyaltyError::CalculationError(format!("points out of range: {}", value)))
}
