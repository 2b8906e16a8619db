// Points Ledger
//
// Append-only record of every points movement. A member's balance is the
// sum of their records; balance_after is stamped on each record when it is
// appended and is never edited afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::loyalty::error::{LoyaltyError, LoyaltyResult};

/// Kind of ledger record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Earn,
    Redeem,
    ManualAdd,
    ManualDeduct,
    Expired,
    Bonus,
    Refund,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Earn => "earn",
            TransactionType::Redeem => "redeem",
            TransactionType::ManualAdd => "manual_add",
            TransactionType::ManualDeduct => "manual_deduct",
            TransactionType::Expired => "expired",
            TransactionType::Bonus => "bonus",
            TransactionType::Refund => "refund",
        }
    }

    /// Credits carry positive amounts, everything else is a debit
    pub fn is_credit(&self) -> bool {
        matches!(
            self,
            TransactionType::Earn | TransactionType::ManualAdd | TransactionType::Bonus
        )
    }

    /// Refund clawbacks may leave the member owing points
    pub fn allows_negative_balance(&self) -> bool {
        matches!(self, TransactionType::Refund)
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A record waiting to be appended
#[derive(Debug, Clone, PartialEq)]
pub struct NewPointTransaction {
    pub member_id: Uuid,
    pub transaction_type: TransactionType,
    /// Signed amount: positive for credits, negative for debits
    pub amount: i64,
    pub description: String,
    pub order_id: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Earn record an `expired` record closes out
    pub source_transaction: Option<Uuid>,
    pub operator_id: Option<String>,
}

impl NewPointTransaction {
    fn base(member_id: Uuid, transaction_type: TransactionType, amount: i64, description: String) -> Self {
        Self {
            member_id,
            transaction_type,
            amount,
            description,
            order_id: None,
            expires_at: None,
            source_transaction: None,
            operator_id: None,
        }
    }

    /// Points earned from an order
    pub fn earn(
        member_id: Uuid,
        points: i64,
        order_id: &str,
        expires_at: Option<DateTime<Utc>>,
        description: String,
    ) -> Self {
        let mut tx = Self::base(member_id, TransactionType::Earn, points, description);
        tx.order_id = Some(order_id.to_string());
        tx.expires_at = expires_at;
        tx
    }

    /// Points spent on an order; `points` is the positive number redeemed
    pub fn redeem(member_id: Uuid, points: i64, order_id: Option<&str>) -> Self {
        let description = match order_id {
            Some(order_id) => format!("Redeemed {} points on order #{}", points, order_id),
            None => format!("Redeemed {} points", points),
        };
        let mut tx = Self::base(member_id, TransactionType::Redeem, -points, description);
        tx.order_id = order_id.map(str::to_string);
        tx
    }

    /// Claw back points earned on a refunded order
    pub fn refund(member_id: Uuid, points: i64, order_id: &str) -> Self {
        let mut tx = Self::base(
            member_id,
            TransactionType::Refund,
            -points,
            format!("Points deducted for refund of order #{}", order_id),
        );
        tx.order_id = Some(order_id.to_string());
        tx
    }

    /// Operator adjustment; sign of `delta` picks manual_add or manual_deduct
    pub fn manual(member_id: Uuid, delta: i64, operator_id: &str, reason: &str) -> Self {
        let transaction_type = if delta >= 0 {
            TransactionType::ManualAdd
        } else {
            TransactionType::ManualDeduct
        };
        let mut tx = Self::base(member_id, transaction_type, delta, reason.to_string());
        tx.operator_id = Some(operator_id.to_string());
        tx
    }

    /// Expire what is left of an earn record; `points` is the positive number removed
    pub fn expired(member_id: Uuid, points: i64, source: &PointTransaction) -> Self {
        let mut tx = Self::base(
            member_id,
            TransactionType::Expired,
            -points,
            format!("{} points expired", points),
        );
        tx.order_id = source.order_id.clone();
        tx.source_transaction = Some(source.id);
        tx
    }

    /// Amount must be non-zero and carry the sign of its type
    pub fn validate(&self) -> LoyaltyResult<()> {
        if self.amount == 0 {
            return Err(LoyaltyError::InvalidTransaction(
                "amount cannot be zero".to_string(),
            ));
        }
        if self.transaction_type.is_credit() && self.amount < 0 {
            return Err(LoyaltyError::InvalidTransaction(format!(
                "{} must be positive",
                self.transaction_type
            )));
        }
        if !self.transaction_type.is_credit() && self.amount > 0 {
            return Err(LoyaltyError::InvalidTransaction(format!(
                "{} must be negative",
                self.transaction_type
            )));
        }
        Ok(())
    }

    /// Stamp id, balance and time onto the record
    pub fn into_record(self, balance_after: i64, created_at: DateTime<Utc>) -> PointTransaction {
        PointTransaction {
            id: Uuid::new_v4(),
            member_id: self.member_id,
            transaction_type: self.transaction_type,
            amount: self.amount,
            balance_after,
            description: self.description,
            order_id: self.order_id,
            expires_at: self.expires_at,
            source_transaction: self.source_transaction,
            operator_id: self.operator_id,
            created_at,
        }
    }
}

/// Stored ledger record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PointTransaction {
    pub id: Uuid,
    pub member_id: Uuid,
    pub transaction_type: TransactionType,
    pub amount: i64,
    pub balance_after: i64,
    pub description: String,
    pub order_id: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub source_transaction: Option<Uuid>,
    pub operator_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Balance after appending `tx` to a ledger whose balance is `current`
pub fn next_balance(current: i64, tx: &NewPointTransaction) -> LoyaltyResult<i64> {
    tx.validate()?;

    let next = current.checked_add(tx.amount).ok_or_else(|| {
        LoyaltyError::CalculationError("points balance overflow".to_string())
    })?;

    if next < 0 && !tx.transaction_type.allows_negative_balance() {
        return Err(LoyaltyError::InsufficientPoints {
            balance: current,
            requested: -tx.amount,
        });
    }
    Ok(next)
}

/// Sum of all record amounts
pub fn balance_of(records: &[PointTransaction]) -> i64 {
    records.iter().map(|r| r.amount).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn member() -> Uuid {
        Uuid::new_v4()
    }

    #[test]
    fn test_sign_rules() {
        let m = member();
        assert!(NewPointTransaction::earn(m, 10, "o1", None, "earn".into()).validate().is_ok());
        assert!(NewPointTransaction::earn(m, -10, "o1", None, "earn".into()).validate().is_err());
        assert!(NewPointTransaction::earn(m, 0, "o1", None, "earn".into()).validate().is_err());
        assert!(NewPointTransaction::redeem(m, 10, None).validate().is_ok());
        assert!(NewPointTransaction::redeem(m, -10, None).validate().is_err());
        assert!(NewPointTransaction::manual(m, -5, "admin", "fix").validate().is_ok());
        assert_eq!(
            NewPointTransaction::manual(m, -5, "admin", "fix").transaction_type,
            TransactionType::ManualDeduct
        );
        assert_eq!(
            NewPointTransaction::manual(m, 5, "admin", "fix").transaction_type,
            TransactionType::ManualAdd
        );
    }

    #[test]
    fn test_next_balance_rejects_overdraft() {
        let m = member();
        let redeem = NewPointTransaction::redeem(m, 150, Some("o1"));
        let err = next_balance(100, &redeem).unwrap_err();
        assert!(matches!(
            err,
            LoyaltyError::InsufficientPoints {
                balance: 100,
                requested: 150
            }
        ));
        assert_eq!(next_balance(150, &redeem).unwrap(), 0);
    }

    #[test]
    fn test_refund_may_go_negative() {
        let refund = NewPointTransaction::refund(member(), 80, "o1");
        assert_eq!(next_balance(30, &refund).unwrap(), -50);
    }

    #[test]
    fn test_transaction_type_serialization() {
        let json = serde_json::to_string(&TransactionType::ManualDeduct).unwrap();
        assert_eq!(json, "\"manual_deduct\"");
        assert_eq!(TransactionType::Expired.to_string(), "expired");
    }

    #[test]
    fn test_expired_links_source() {
        let m = member();
        let earn = NewPointTransaction::earn(m, 40, "o9", None, "earn".into()).into_record(40, Utc::now());
        let expired = NewPointTransaction::expired(m, 40, &earn);
        assert_eq!(expired.amount, -40);
        assert_eq!(expired.source_transaction, Some(earn.id));
        assert_eq!(expired.order_id.as_deref(), Some("o9"));
    }

    proptest! {
        #[test]
        fn prop_balance_after_matches_running_sum(deltas in prop::collection::vec(-200i64..200, 0..40)) {
            let m = member();
            let mut records: Vec<PointTransaction> = Vec::new();
            let mut balance = 0i64;

            for delta in deltas {
                let tx = if delta > 0 {
                    NewPointTransaction::earn(m, delta, "o", None, "earn".into())
                } else {
                    NewPointTransaction::redeem(m, -delta, None)
                };
                if let Ok(next) = next_balance(balance, &tx) {
                    balance = next;
                    records.push(tx.into_record(next, Utc::now()));
                }
            }

            prop_assert_eq!(balance_of(&records), balance);
            prop_assert!(balance >= 0);
            if let Some(last) = records.last() {
                prop_assert_eq!(last.balance_after, balance_of(&records));
            }
        }
    }
}
