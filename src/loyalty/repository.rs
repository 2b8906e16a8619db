use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::loyalty::error::{LoyaltyError, LoyaltyResult};
use crate::loyalty::ledger::{next_balance, NewPointTransaction, PointTransaction, TransactionType};

/// Member account with cumulative spend, as tracked by the loyalty program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Member {
    pub id: Uuid,
    pub member_level: Option<String>,
    pub total_spent: Decimal,
    pub total_orders: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Member {
    pub fn new(id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id,
            member_level: None,
            total_spent: Decimal::ZERO,
            total_orders: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Storage port for member accounts
#[async_trait]
pub trait MemberRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> LoyaltyResult<Option<Member>>;

    /// Fetch the member, creating an empty account on first sight
    async fn ensure(&self, id: Uuid) -> LoyaltyResult<Member>;

    /// Add a completed order's amount to the member's totals
    ///
    /// Each order id is counted once; `None` means it was already recorded.
    async fn record_completed_order(
        &self,
        member_id: Uuid,
        order_id: &str,
        amount: Decimal,
    ) -> LoyaltyResult<Option<Member>>;

    async fn set_level(&self, member_id: Uuid, level: &str) -> LoyaltyResult<Member>;
}

/// Storage port for the points ledger
#[async_trait]
pub trait LedgerRepository: Send + Sync {
    /// Append a record, stamping balance_after under a per-member lock
    async fn append(&self, tx: NewPointTransaction) -> LoyaltyResult<PointTransaction>;

    /// Append unless a record of the same type already exists for the same order
    ///
    /// Returns `None` when the order already has such a record.
    async fn append_once_per_order(
        &self,
        tx: NewPointTransaction,
    ) -> LoyaltyResult<Option<PointTransaction>>;

    /// Sum of the member's record amounts
    async fn balance(&self, member_id: Uuid) -> LoyaltyResult<i64>;

    /// All of the member's records, oldest first
    async fn list_for_member(&self, member_id: Uuid) -> LoyaltyResult<Vec<PointTransaction>>;

    async fn find_for_order(
        &self,
        order_id: &str,
        transaction_type: TransactionType,
    ) -> LoyaltyResult<Option<PointTransaction>>;

    /// Expire what is left of an earn record, at most once per record
    ///
    /// The earlier-expiry check, the balance read and the append share one
    /// lock. Removes `min(source.amount, balance)`; `None` when the record
    /// already expired or the balance has nothing left to remove.
    async fn expire_earn(&self, source: &PointTransaction) -> LoyaltyResult<Option<PointTransaction>>;
}

/// Member store kept in process memory
#[derive(Default)]
pub struct InMemoryMemberRepository {
    members: RwLock<HashMap<Uuid, Member>>,
    recorded_orders: RwLock<HashSet<String>>,
}

impl InMemoryMemberRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemberRepository for InMemoryMemberRepository {
    async fn find_by_id(&self, id: Uuid) -> LoyaltyResult<Option<Member>> {
        Ok(self.members.read().await.get(&id).cloned())
    }

    async fn ensure(&self, id: Uuid) -> LoyaltyResult<Member> {
        let mut members = self.members.write().await;
        Ok(members.entry(id).or_insert_with(|| Member::new(id)).clone())
    }

    async fn record_completed_order(
        &self,
        member_id: Uuid,
        order_id: &str,
        amount: Decimal,
    ) -> LoyaltyResult<Option<Member>> {
        let mut members = self.members.write().await;
        let member = members
            .get_mut(&member_id)
            .ok_or(LoyaltyError::MemberNotFound(member_id))?;

        let mut recorded = self.recorded_orders.write().await;
        if !recorded.insert(order_id.to_string()) {
            return Ok(None);
        }

        member.total_spent += amount;
        member.total_orders += 1;
        member.updated_at = Utc::now();
        Ok(Some(member.clone()))
    }

    async fn set_level(&self, member_id: Uuid, level: &str) -> LoyaltyResult<Member> {
        let mut members = self.members.write().await;
        let member = members
            .get_mut(&member_id)
            .ok_or(LoyaltyError::MemberNotFound(member_id))?;
        member.member_level = Some(level.to_string());
        member.updated_at = Utc::now();
        Ok(member.clone())
    }
}

/// Ledger kept in process memory
///
/// A single write lock serializes appends, which covers the per-member lock.
#[derive(Default)]
pub struct InMemoryLedgerRepository {
    records: RwLock<Vec<PointTransaction>>,
}

impl InMemoryLedgerRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn balance_in(records: &[PointTransaction], member_id: Uuid) -> i64 {
        records
            .iter()
            .filter(|r| r.member_id == member_id)
            .map(|r| r.amount)
            .sum()
    }

    fn push(records: &mut Vec<PointTransaction>, tx: NewPointTransaction) -> LoyaltyResult<PointTransaction> {
        let current = Self::balance_in(records, tx.member_id);
        let balance_after = next_balance(current, &tx)?;
        let record = tx.into_record(balance_after, Utc::now());
        records.push(record.clone());
        Ok(record)
    }
}

#[async_trait]
impl LedgerRepository for InMemoryLedgerRepository {
    async fn append(&self, tx: NewPointTransaction) -> LoyaltyResult<PointTransaction> {
        let mut records = self.records.write().await;
        Self::push(&mut records, tx)
    }

    async fn append_once_per_order(
        &self,
        tx: NewPointTransaction,
    ) -> LoyaltyResult<Option<PointTransaction>> {
        let mut records = self.records.write().await;
        let exists = records.iter().any(|r| {
            r.transaction_type == tx.transaction_type
                && r.order_id.is_some()
                && r.order_id == tx.order_id
        });
        if exists {
            return Ok(None);
        }
        Self::push(&mut records, tx).map(Some)
    }

    async fn balance(&self, member_id: Uuid) -> LoyaltyResult<i64> {
        let records = self.records.read().await;
        Ok(Self::balance_in(&records, member_id))
    }

    async fn list_for_member(&self, member_id: Uuid) -> LoyaltyResult<Vec<PointTransaction>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| r.member_id == member_id)
            .cloned()
            .collect())
    }

    async fn find_for_order(
        &self,
        order_id: &str,
        transaction_type: TransactionType,
    ) -> LoyaltyResult<Option<PointTransaction>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .find(|r| {
                r.transaction_type == transaction_type && r.order_id.as_deref() == Some(order_id)
            })
            .cloned())
    }

    async fn expire_earn(&self, source: &PointTransaction) -> LoyaltyResult<Option<PointTransaction>> {
        let mut records = self.records.write().await;
        let already_expired = records.iter().any(|r| {
            r.transaction_type == TransactionType::Expired && r.source_transaction == Some(source.id)
        });
        if already_expired {
            return Ok(None);
        }

        let points = source.amount.min(Self::balance_in(&records, source.member_id));
        if points <= 0 {
            return Ok(None);
        }
        Self::push(
            &mut records,
            NewPointTransaction::expired(source.member_id, points, source),
        )
        .map(Some)
    }
}

const MEMBER_COLUMNS: &str =
    "id, member_level, total_spent, total_orders, created_at, updated_at";

const TRANSACTION_COLUMNS: &str = r#"
    id, member_id, transaction_type, amount, balance_after, description,
    order_id, expires_at, source_transaction, operator_id, created_at
"#;

/// PostgreSQL-backed member store
#[derive(Clone)]
pub struct PgMemberRepository {
    pool: PgPool,
}

impl PgMemberRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MemberRepository for PgMemberRepository {
    async fn find_by_id(&self, id: Uuid) -> LoyaltyResult<Option<Member>> {
        let sql = format!("SELECT {} FROM members WHERE id = $1", MEMBER_COLUMNS);
        let member = sqlx::query_as::<_, Member>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(member)
    }

    async fn ensure(&self, id: Uuid) -> LoyaltyResult<Member> {
        sqlx::query("INSERT INTO members (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
            .bind(id)
            .execute(&self.pool)
            .await?;

        self.find_by_id(id)
            .await?
            .ok_or(LoyaltyError::MemberNotFound(id))
    }

    async fn record_completed_order(
        &self,
        member_id: Uuid,
        order_id: &str,
        amount: Decimal,
    ) -> LoyaltyResult<Option<Member>> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO member_orders (order_id, member_id, amount)
            VALUES ($1, $2, $3)
            ON CONFLICT (order_id) DO NOTHING
            "#,
        )
        .bind(order_id)
        .bind(member_id)
        .bind(amount)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let sql = format!(
            r#"
            UPDATE members
            SET total_spent = total_spent + $1, total_orders = total_orders + 1, updated_at = NOW()
            WHERE id = $2
            RETURNING {}
            "#,
            MEMBER_COLUMNS
        );
        let member = sqlx::query_as::<_, Member>(&sql)
            .bind(amount)
            .bind(member_id)
            .fetch_optional(&mut *tx)
            .await?;

        match member {
            Some(member) => {
                tx.commit().await?;
                Ok(Some(member))
            }
            None => {
                tx.rollback().await?;
                Err(LoyaltyError::MemberNotFound(member_id))
            }
        }
    }

    async fn set_level(&self, member_id: Uuid, level: &str) -> LoyaltyResult<Member> {
        let sql = format!(
            "UPDATE members SET member_level = $1, updated_at = NOW() WHERE id = $2 RETURNING {}",
            MEMBER_COLUMNS
        );
        sqlx::query_as::<_, Member>(&sql)
            .bind(level)
            .bind(member_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(LoyaltyError::MemberNotFound(member_id))
    }
}

/// PostgreSQL-backed ledger
///
/// Appends take a transaction-scoped advisory lock on the member so
/// concurrent postings see each other's balance.
#[derive(Clone)]
pub struct PgLedgerRepository {
    pool: PgPool,
}

impl PgLedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn append_locked(
        &self,
        tx: NewPointTransaction,
        once_per_order: bool,
    ) -> LoyaltyResult<Option<PointTransaction>> {
        let mut db_tx = self.pool.begin().await?;
        lock_member(&mut db_tx, tx.member_id).await?;

        if once_per_order {
            if let Some(order_id) = tx.order_id.as_deref() {
                let (exists,): (bool,) = sqlx::query_as(
                    r#"
                    SELECT EXISTS (
                        SELECT 1 FROM point_transactions
                        WHERE order_id = $1 AND transaction_type = $2
                    )
                    "#,
                )
                .bind(order_id)
                .bind(tx.transaction_type)
                .fetch_one(&mut *db_tx)
                .await?;

                if exists {
                    db_tx.rollback().await?;
                    return Ok(None);
                }
            }
        }

        let current = locked_balance(&mut db_tx, tx.member_id).await?;
        let stored = insert_record(&mut db_tx, current, tx).await?;

        db_tx.commit().await?;
        Ok(Some(stored))
    }
}

/// Transaction-scoped advisory lock serializing one member's postings
async fn lock_member(conn: &mut PgConnection, member_id: Uuid) -> LoyaltyResult<()> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1::text))")
        .bind(member_id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn locked_balance(conn: &mut PgConnection, member_id: Uuid) -> LoyaltyResult<i64> {
    let (balance,): (i64,) = sqlx::query_as(
        "SELECT COALESCE(SUM(amount), 0)::BIGINT FROM point_transactions WHERE member_id = $1",
    )
    .bind(member_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(balance)
}

/// Stamp balance_after onto `tx` and insert it; caller holds the member lock
async fn insert_record(
    conn: &mut PgConnection,
    current: i64,
    tx: NewPointTransaction,
) -> LoyaltyResult<PointTransaction> {
    let balance_after = next_balance(current, &tx)?;
    let record = tx.into_record(balance_after, Utc::now());

    let sql = format!(
        r#"
        INSERT INTO point_transactions (
            id, member_id, transaction_type, amount, balance_after, description,
            order_id, expires_at, source_transaction, operator_id, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING {}
        "#,
        TRANSACTION_COLUMNS
    );
    let stored = sqlx::query_as::<_, PointTransaction>(&sql)
        .bind(record.id)
        .bind(record.member_id)
        .bind(record.transaction_type)
        .bind(record.amount)
        .bind(record.balance_after)
        .bind(&record.description)
        .bind(&record.order_id)
        .bind(record.expires_at)
        .bind(record.source_transaction)
        .bind(&record.operator_id)
        .bind(record.created_at)
        .fetch_one(&mut *conn)
        .await?;
    Ok(stored)
}

#[async_trait]
impl LedgerRepository for PgLedgerRepository {
    async fn append(&self, tx: NewPointTransaction) -> LoyaltyResult<PointTransaction> {
        let member_id = tx.member_id;
        self.append_locked(tx, false).await?.ok_or_else(|| {
            LoyaltyError::InvalidTransaction(format!("append for member {} was skipped", member_id))
        })
    }

    async fn append_once_per_order(
        &self,
        tx: NewPointTransaction,
    ) -> LoyaltyResult<Option<PointTransaction>> {
        self.append_locked(tx, true).await
    }

    async fn balance(&self, member_id: Uuid) -> LoyaltyResult<i64> {
        let (balance,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(amount), 0)::BIGINT FROM point_transactions WHERE member_id = $1",
        )
        .bind(member_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(balance)
    }

    async fn list_for_member(&self, member_id: Uuid) -> LoyaltyResult<Vec<PointTransaction>> {
        let sql = format!(
            "SELECT {} FROM point_transactions WHERE member_id = $1 ORDER BY created_at ASC, seq ASC",
            TRANSACTION_COLUMNS
        );
        let records = sqlx::query_as::<_, PointTransaction>(&sql)
            .bind(member_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    async fn find_for_order(
        &self,
        order_id: &str,
        transaction_type: TransactionType,
    ) -> LoyaltyResult<Option<PointTransaction>> {
        let sql = format!(
            "SELECT {} FROM point_transactions WHERE order_id = $1 AND transaction_type = $2 ORDER BY seq ASC LIMIT 1",
            TRANSACTION_COLUMNS
        );
        let record = sqlx::query_as::<_, PointTransaction>(&sql)
            .bind(order_id)
            .bind(transaction_type)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }
    async fn expire_earn(&self, source: &PointTransaction) -> LoyaltyResult<Option<PointTransaction>> {
        let mut db_tx = self.pool.begin().await?;
        lock_member(&mut db_tx, source.member_id).await?;

        let (already_expired,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM point_transactions
                WHERE source_transaction = $1 AND transaction_type = $2
            )
            "#,
        )
        .bind(source.id)
        .bind(TransactionType::Expired)
        .fetch_one(&mut *db_tx)
        .await?;

        let current = locked_balance(&mut db_tx, source.member_id).await?;
        let points = source.amount.min(current);
        if already_expired || points <= 0 {
            db_tx.rollback().await?;
            return Ok(None);
        }

        let tx = NewPointTransaction::expired(source.member_id, points, source);
        let stored = insert_record(&mut db_tx, current, tx).await?;
        db_tx.commit().await?;
        Ok(Some(stored))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_member_ensure_is_stable() {
        let repo = InMemoryMemberRepository::new();
        let id = Uuid::new_v4();
        assert!(repo.find_by_id(id).await.unwrap().is_none());

        let first = repo.ensure(id).await.unwrap();
        let second = repo.ensure(id).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.total_spent, dec!(0));
    }

    #[tokio::test]
    async fn test_completed_order_recorded_once() {
        let repo = InMemoryMemberRepository::new();
        let id = Uuid::new_v4();
        repo.ensure(id).await.unwrap();

        let member = repo
            .record_completed_order(id, "o1", dec!(120.50))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(member.total_spent, dec!(120.50));
        assert_eq!(member.total_orders, 1);

        assert!(repo
            .record_completed_order(id, "o1", dec!(120.50))
            .await
            .unwrap()
            .is_none());
        let member = repo.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(member.total_orders, 1);
    }

    #[tokio::test]
    async fn test_unknown_member_errors() {
        let repo = InMemoryMemberRepository::new();
        let id = Uuid::new_v4();
        assert!(matches!(
            repo.record_completed_order(id, "o1", dec!(1)).await,
            Err(LoyaltyError::MemberNotFound(_))
        ));
        assert!(matches!(
            repo.set_level(id, "gold").await,
            Err(LoyaltyError::MemberNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_ledger_stamps_balance_after() {
        let ledger = InMemoryLedgerRepository::new();
        let m = Uuid::new_v4();
        let other = Uuid::new_v4();

        ledger
            .append(NewPointTransaction::earn(m, 100, "o1", None, "earn".into()))
            .await
            .unwrap();
        ledger
            .append(NewPointTransaction::earn(other, 7, "o2", None, "earn".into()))
            .await
            .unwrap();
        let redeem = ledger
            .append(NewPointTransaction::redeem(m, 30, Some("o3")))
            .await
            .unwrap();

        assert_eq!(redeem.balance_after, 70);
        assert_eq!(ledger.balance(m).await.unwrap(), 70);
        assert_eq!(ledger.balance(other).await.unwrap(), 7);
        assert_eq!(ledger.list_for_member(m).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_ledger_rejects_overdraft() {
        let ledger = InMemoryLedgerRepository::new();
        let m = Uuid::new_v4();
        let err = ledger
            .append(NewPointTransaction::redeem(m, 1, None))
            .await
            .unwrap_err();
        assert!(matches!(err, LoyaltyError::InsufficientPoints { .. }));
        assert!(ledger.list_for_member(m).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_once_per_order() {
        let ledger = InMemoryLedgerRepository::new();
        let m = Uuid::new_v4();

        let first = ledger
            .append_once_per_order(NewPointTransaction::earn(m, 10, "o1", None, "earn".into()))
            .await
            .unwrap();
        assert!(first.is_some());

        let second = ledger
            .append_once_per_order(NewPointTransaction::earn(m, 10, "o1", None, "earn".into()))
            .await
            .unwrap();
        assert!(second.is_none());
        assert_eq!(ledger.balance(m).await.unwrap(), 10);

        let found = ledger.find_for_order("o1", TransactionType::Earn).await.unwrap();
        assert_eq!(found.map(|r| r.amount), Some(10));
        assert!(ledger
            .find_for_order("o1", TransactionType::Refund)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_expire_earn_once_and_capped_by_balance() {
        let ledger = InMemoryLedgerRepository::new();
        let m = Uuid::new_v4();

        let earn = ledger
            .append(NewPointTransaction::earn(m, 50, "o1", None, "earn".into()))
            .await
            .unwrap();
        ledger
            .append(NewPointTransaction::redeem(m, 20, None))
            .await
            .unwrap();

        let expired = ledger.expire_earn(&earn).await.unwrap().unwrap();
        assert_eq!(expired.amount, -30);
        assert_eq!(expired.balance_after, 0);
        assert_eq!(expired.source_transaction, Some(earn.id));

        assert!(ledger.expire_earn(&earn).await.unwrap().is_none());
        assert_eq!(ledger.balance(m).await.unwrap(), 0);
    }
}
