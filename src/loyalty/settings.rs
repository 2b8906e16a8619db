// Loyalty Settings
//
// Site-wide points rules: earn rate, redemption limits, discounted-product
// rule, campaign multiplier and expiry. Missing fields fall back to defaults.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::loyalty::error::{LoyaltyError, LoyaltyResult};

/// Longest expiry the program accepts (100 years)
pub const MAX_POINTS_EXPIRE_DAYS: i64 = 36_500;

/// Points rule for products sold below their original price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscountProductRule {
    /// Percentage of the line subtotal returned as points
    pub fixed_percentage: Decimal,
    pub apply_campaign_multiplier: bool,
}

impl Default for DiscountProductRule {
    fn default() -> Self {
        Self {
            fixed_percentage: Decimal::ONE,
            apply_campaign_multiplier: true,
        }
    }
}

/// Time-boxed points multiplier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Campaign {
    pub enabled: bool,
    pub multiplier: Decimal,
    pub name: Option<String>,
    /// First day of the campaign (inclusive)
    pub start_date: Option<NaiveDate>,
    /// Last day of the campaign (inclusive, to end of day)
    pub end_date: Option<NaiveDate>,
}

impl Default for Campaign {
    fn default() -> Self {
        Self {
            enabled: false,
            multiplier: Decimal::ONE,
            name: None,
            start_date: None,
            end_date: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvancedSettings {
    /// Days until earned points expire, 0 disables expiry
    pub points_expire_days: i64,
    /// Largest share of an order (percent) that points may pay for
    pub max_redeem_percentage: Decimal,
    pub exclude_shipping: bool,
}

impl Default for AdvancedSettings {
    fn default() -> Self {
        Self {
            points_expire_days: 365,
            max_redeem_percentage: Decimal::ONE_HUNDRED,
            exclude_shipping: true,
        }
    }
}

/// Loyalty program configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoyaltySettings {
    pub enabled: bool,
    /// Spend needed for one earning unit
    pub points_per_amount: Decimal,
    /// Points per earning unit
    pub points_earned: i64,
    /// Money value of one point when redeemed
    pub point_value: Decimal,
    pub min_points_to_redeem: i64,
    pub discount_product_rule: DiscountProductRule,
    pub campaign: Campaign,
    pub advanced: AdvancedSettings,
}

impl Default for LoyaltySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            points_per_amount: Decimal::ONE_HUNDRED,
            points_earned: 1,
            point_value: Decimal::ONE,
            min_points_to_redeem: 100,
            discount_product_rule: DiscountProductRule::default(),
            campaign: Campaign::default(),
            advanced: AdvancedSettings::default(),
        }
    }
}

impl LoyaltySettings {
    /// Load settings from a JSON file
    pub async fn load_from_file(path: impl AsRef<Path>) -> LoyaltyResult<Self> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        let settings: LoyaltySettings = serde_json::from_str(&raw)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check that every rate and limit is usable
    pub fn validate(&self) -> LoyaltyResult<()> {
        if self.points_per_amount <= Decimal::ZERO {
            return Err(LoyaltyError::InvalidConfiguration(
                "points_per_amount must be positive".to_string(),
            ));
        }
        if self.points_earned < 0 {
            return Err(LoyaltyError::InvalidConfiguration(
                "points_earned cannot be negative".to_string(),
            ));
        }
        if self.point_value < Decimal::ZERO {
            return Err(LoyaltyError::InvalidConfiguration(
                "point_value cannot be negative".to_string(),
            ));
        }
        if self.min_points_to_redeem < 0 {
            return Err(LoyaltyError::InvalidConfiguration(
                "min_points_to_redeem cannot be negative".to_string(),
            ));
        }
        if !is_percentage(self.discount_product_rule.fixed_percentage) {
            return Err(LoyaltyError::InvalidConfiguration(
                "discount_product_rule.fixed_percentage must be between 0 and 100".to_string(),
            ));
        }
        if self.campaign.multiplier < Decimal::ZERO {
            return Err(LoyaltyError::InvalidConfiguration(
                "campaign.multiplier cannot be negative".to_string(),
            ));
        }
        if let (Some(start), Some(end)) = (self.campaign.start_date, self.campaign.end_date) {
            if end < start {
                return Err(LoyaltyError::InvalidConfiguration(
                    "campaign.end_date is before campaign.start_date".to_string(),
                ));
            }
        }
        if self.advanced.points_expire_days < 0 {
            return Err(LoyaltyError::InvalidConfiguration(
                "advanced.points_expire_days cannot be negative".to_string(),
            ));
        }
        if self.advanced.points_expire_days > MAX_POINTS_EXPIRE_DAYS {
            return Err(LoyaltyError::InvalidConfiguration(format!(
                "advanced.points_expire_days cannot exceed {}",
                MAX_POINTS_EXPIRE_DAYS
            )));
        }
        if !is_percentage(self.advanced.max_redeem_percentage) {
            return Err(LoyaltyError::InvalidConfiguration(
                "advanced.max_redeem_percentage must be between 0 and 100".to_string(),
            ));
        }
        Ok(())
    }

    /// Multiplier in effect at `now`, 1 outside an enabled campaign window
    pub fn campaign_multiplier(&self, now: DateTime<Utc>) -> Decimal {
        if !self.campaign.enabled {
            return Decimal::ONE;
        }

        let today = now.date_naive();
        if let Some(start) = self.campaign.start_date {
            if today < start {
                return Decimal::ONE;
            }
        }
        if let Some(end) = self.campaign.end_date {
            if today > end {
                return Decimal::ONE;
            }
        }

        self.campaign.multiplier
    }

    /// Expiry timestamp for points earned at `now`
    pub fn expires_at(&self, now: DateTime<Utc>) -> LoyaltyResult<Option<DateTime<Utc>>> {
        let days = self.advanced.points_expire_days;
        if days <= 0 {
            return Ok(None);
        }

        Duration::try_days(days)
            .and_then(|span| now.checked_add_signed(span))
            .map(Some)
            .ok_or_else(|| {
                LoyaltyError::CalculationError(format!("expiry of {} days is out of range", days))
            })
    }
}

fn is_percentage(value: Decimal) -> bool {
    value >= Decimal::ZERO && value <= Decimal::ONE_HUNDRED
}
