// Member Levels
//
// Tier table derived from cumulative spend and order count.
// Levels are kept sorted by ascending min_spent; resolution picks the
// highest level whose threshold is met.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::loyalty::error::{LoyaltyError, LoyaltyResult};
use crate::models::DEFAULT_MEMBER_LEVEL;

/// How spend and order-count thresholds combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeLogic {
    /// Either threshold is enough
    Or,
    /// Both thresholds must be met
    And,
    SpentOnly,
    OrdersOnly,
}

impl Default for UpgradeLogic {
    fn default() -> Self {
        UpgradeLogic::SpentOnly
    }
}

/// One tier of the membership program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberLevel {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub min_spent: Decimal,
    #[serde(default)]
    pub min_orders: i64,
    #[serde(default)]
    pub upgrade_logic: UpgradeLogic,
    #[serde(default)]
    pub discount_percent: Decimal,
    #[serde(default = "default_points_multiplier")]
    pub points_multiplier: Decimal,
    pub free_shipping_threshold: Option<Decimal>,
    #[serde(default)]
    pub birthday_bonus: i64,
    #[serde(default)]
    pub is_default: bool,
}

fn default_points_multiplier() -> Decimal {
    Decimal::ONE
}

impl MemberLevel {
    fn basic(code: &str, name: &str, order: i32, min_spent: Decimal) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            order,
            min_spent,
            min_orders: 0,
            upgrade_logic: UpgradeLogic::SpentOnly,
            discount_percent: Decimal::ZERO,
            points_multiplier: Decimal::ONE,
            free_shipping_threshold: None,
            birthday_bonus: 0,
            is_default: false,
        }
    }

    /// Whether a member with this spend and order count meets the level's thresholds
    pub fn qualifies(&self, total_spent: Decimal, total_orders: i64) -> bool {
        let spent_ok = total_spent >= self.min_spent;
        let orders_ok = total_orders >= self.min_orders;
        match self.upgrade_logic {
            UpgradeLogic::Or => spent_ok || orders_ok,
            UpgradeLogic::And => spent_ok && orders_ok,
            UpgradeLogic::SpentOnly => spent_ok,
            UpgradeLogic::OrdersOnly => orders_ok,
        }
    }
}

/// Outcome of recomputing a member's level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelChange {
    pub old_level: Option<String>,
    pub new_level: String,
    pub changed: bool,
    /// New level ranks above the old one
    pub upgraded: bool,
}

/// Validated, ordered set of member levels
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelTable {
    levels: Vec<MemberLevel>,
}

impl LevelTable {
    /// Build a table, sorting by min_spent then display order
    pub fn new(mut levels: Vec<MemberLevel>) -> LoyaltyResult<Self> {
        if levels.is_empty() {
            return Err(LoyaltyError::InvalidConfiguration(
                "at least one member level is required".to_string(),
            ));
        }

        let mut codes = HashSet::new();
        for level in &levels {
            if level.code.trim().is_empty() {
                return Err(LoyaltyError::InvalidConfiguration(
                    "member level code cannot be empty".to_string(),
                ));
            }
            if !codes.insert(level.code.as_str()) {
                return Err(LoyaltyError::InvalidConfiguration(format!(
                    "duplicate member level code: {}",
                    level.code
                )));
            }
            if level.min_spent < Decimal::ZERO || level.min_orders < 0 {
                return Err(LoyaltyError::InvalidConfiguration(format!(
                    "member level {} has a negative threshold",
                    level.code
                )));
            }
            if level.points_multiplier < Decimal::ZERO {
                return Err(LoyaltyError::InvalidConfiguration(format!(
                    "member level {} has a negative points multiplier",
                    level.code
                )));
            }
        }

        levels.sort_by(|a, b| {
            a.min_spent
                .cmp(&b.min_spent)
                .then_with(|| a.order.cmp(&b.order))
        });
        Ok(Self { levels })
    }

    /// bronze 0, silver 500, gold 2000, vip 5000
    pub fn default_table() -> Self {
        let mut bronze = MemberLevel::basic(DEFAULT_MEMBER_LEVEL, "Bronze", 0, Decimal::ZERO);
        bronze.is_default = true;
        Self {
            levels: vec![
                bronze,
                MemberLevel::basic("silver", "Silver", 1, Decimal::from(500)),
                MemberLevel::basic("gold", "Gold", 2, Decimal::from(2000)),
                MemberLevel::basic("vip", "VIP", 3, Decimal::from(5000)),
            ],
        }
    }

    /// Levels in ascending threshold order
    pub fn levels(&self) -> &[MemberLevel] {
        &self.levels
    }

    pub fn find(&self, code: &str) -> Option<&MemberLevel> {
        self.levels.iter().find(|l| l.code == code)
    }

    /// Position in ascending threshold order
    pub fn rank(&self, code: &str) -> Option<usize> {
        self.levels.iter().position(|l| l.code == code)
    }

    /// Points multiplier for a level code, 1 when unknown or absent
    pub fn points_multiplier(&self, code: Option<&str>) -> Decimal {
        code.and_then(|c| self.find(c))
            .map(|l| l.points_multiplier)
            .unwrap_or(Decimal::ONE)
    }

    /// Highest level whose thresholds are met
    ///
    /// Falls back to the level flagged default, then to the lowest threshold.
    pub fn resolve(&self, total_spent: Decimal, total_orders: i64) -> &MemberLevel {
        if let Some(level) = self
            .levels
            .iter()
            .rev()
            .find(|l| l.qualifies(total_spent, total_orders))
        {
            return level;
        }

        self.levels
            .iter()
            .find(|l| l.is_default)
            .unwrap_or(&self.levels[0])
    }

    /// Compare the member's current level with the one their totals resolve to
    pub fn evaluate(
        &self,
        current: Option<&str>,
        total_spent: Decimal,
        total_orders: i64,
    ) -> LevelChange {
        let target = self.resolve(total_spent, total_orders);
        let changed = current != Some(target.code.as_str());
        let upgraded = changed
            && match current.and_then(|c| self.rank(c)) {
                Some(old_rank) => self.rank(&target.code).map(|r| r > old_rank).unwrap_or(false),
                None => true,
            };

        LevelChange {
            old_level: current.map(str::to_string),
            new_level: target.code.clone(),
            changed,
            upgraded,
        }
    }
}

impl Default for LevelTable {
    fn default() -> Self {
        Self::default_table()
    }
}
