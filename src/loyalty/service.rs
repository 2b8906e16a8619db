// Loyalty Service
//
// Orchestrates the points engine, ledger and member levels:
// awarding points when orders complete, clawing them back on refunds,
// redemptions, operator adjustments, expiry sweeps and level recompute.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::loyalty::config_store::LoyaltyConfigStore;
use crate::loyalty::error::{LoyaltyError, LoyaltyResult};
use crate::loyalty::ledger::{NewPointTransaction, PointTransaction, TransactionType};
use crate::loyalty::member_levels::{LevelChange, LevelTable, MemberLevel};
use crate::loyalty::models::{
    AdjustPointsRequest, CompletedOrder, OrderCompletionOutcome, OrderStatusChangeRequest,
    PointsAward, PointsBalance, RedeemPointsRequest,
};
use crate::loyalty::points_engine::{PointsCalculation, PointsEngine, PointsOrderItem};
use crate::loyalty::repository::{LedgerRepository, MemberRepository};
use crate::loyalty::settings::LoyaltySettings;
use crate::metrics::{EngineMetrics, Operation};
use crate::models::OrderStatus;

/// Loyalty Service
#[derive(Clone)]
pub struct LoyaltyService {
    members: Arc<dyn MemberRepository>,
    ledger: Arc<dyn LedgerRepository>,
    config: Arc<LoyaltyConfigStore>,
    metrics: EngineMetrics,
}

impl LoyaltyService {
    pub fn new(
        members: Arc<dyn MemberRepository>,
        ledger: Arc<dyn LedgerRepository>,
        config: Arc<LoyaltyConfigStore>,
        metrics: EngineMetrics,
    ) -> Self {
        Self {
            members,
            ledger,
            config,
            metrics,
        }
    }

    /// Points the order would earn, without touching the ledger
    ///
    /// `None` when the program is disabled.
    pub async fn calculate_order_points(
        &self,
        member_id: Uuid,
        items: &[PointsOrderItem],
        shipping_amount: Decimal,
    ) -> LoyaltyResult<Option<PointsCalculation>> {
        let settings = self.config.settings().await;
        let levels = self.config.levels().await;
        let member = self.members.find_by_id(member_id).await?;
        let member_multiplier =
            levels.points_multiplier(member.as_ref().and_then(|m| m.member_level.as_deref()));

        PointsEngine::calculate(&settings, items, shipping_amount, member_multiplier, Utc::now())
    }

    /// Post an earn record for the order
    ///
    /// Idempotent per order: a second award for the same order posts nothing.
    pub async fn award_order_points(
        &self,
        member_id: Uuid,
        order_id: &str,
        items: &[PointsOrderItem],
        shipping_amount: Decimal,
    ) -> LoyaltyResult<PointsAward> {
        let _timer = self.metrics.start(Operation::PointsAward);

        let calculation = match self
            .calculate_order_points(member_id, items, shipping_amount)
            .await?
        {
            Some(calculation) if calculation.total_points > 0 => calculation,
            other => {
                tracing::debug!("No points to award for order {}", order_id);
                return Ok(PointsAward {
                    points: 0,
                    calculation: other,
                    transaction: None,
                });
            }
        };

        let description = if calculation.breakdown.campaign_multiplier > Decimal::ONE {
            format!(
                "Points earned on order #{} ({}x campaign)",
                order_id,
                calculation.breakdown.campaign_multiplier.normalize()
            )
        } else {
            format!("Points earned on order #{}", order_id)
        };

        let tx = NewPointTransaction::earn(
            member_id,
            calculation.total_points,
            order_id,
            calculation.expires_at,
            description,
        );

        match self.ledger.append_once_per_order(tx).await? {
            Some(record) => {
                tracing::info!(
                    "Awarded {} points to member {} for order {}",
                    record.amount,
                    member_id,
                    order_id
                );
                Ok(PointsAward {
                    points: record.amount,
                    calculation: Some(calculation),
                    transaction: Some(record),
                })
            }
            None => {
                tracing::info!("Order {} already earned points, skipping", order_id);
                Ok(PointsAward {
                    points: 0,
                    calculation: Some(calculation),
                    transaction: None,
                })
            }
        }
    }

    /// Deduct the points an order earned; runs at most once per order
    ///
    /// Returns the number of points deducted.
    pub async fn deduct_refund_points(&self, member_id: Uuid, order_id: &str) -> LoyaltyResult<i64> {
        let earned = match self.ledger.find_for_order(order_id, TransactionType::Earn).await? {
            Some(earned) if earned.member_id == member_id => earned,
            Some(_) => {
                return Err(LoyaltyError::InvalidTransaction(format!(
                    "order {} belongs to another member",
                    order_id
                )))
            }
            None => return Ok(0),
        };

        let tx = NewPointTransaction::refund(member_id, earned.amount, order_id);
        match self.ledger.append_once_per_order(tx).await? {
            Some(record) => {
                tracing::info!(
                    "Deducted {} points from member {} for refund of order {}",
                    -record.amount,
                    member_id,
                    order_id
                );
                Ok(-record.amount)
            }
            None => Ok(0),
        }
    }

    /// Spend points against an order
    pub async fn redeem_points(
        &self,
        member_id: Uuid,
        request: RedeemPointsRequest,
    ) -> LoyaltyResult<PointTransaction> {
        request.validate()?;
        let settings = self.config.settings().await;
        if !settings.enabled {
            return Err(LoyaltyError::ProgramDisabled);
        }
        check_redemption(&settings, request.points, request.order_amount)?;

        self.members
            .find_by_id(member_id)
            .await?
            .ok_or(LoyaltyError::MemberNotFound(member_id))?;

        let tx = NewPointTransaction::redeem(member_id, request.points, request.order_id.as_deref());
        let record = self.ledger.append(tx).await?;
        tracing::info!("Member {} redeemed {} points", member_id, request.points);
        Ok(record)
    }

    /// Operator credit or debit
    pub async fn adjust_points(
        &self,
        member_id: Uuid,
        request: AdjustPointsRequest,
    ) -> LoyaltyResult<PointTransaction> {
        request.validate()?;
        self.members
            .find_by_id(member_id)
            .await?
            .ok_or(LoyaltyError::MemberNotFound(member_id))?;

        let tx = NewPointTransaction::manual(
            member_id,
            request.delta,
            &request.operator_id,
            &request.reason,
        );
        let record = self.ledger.append(tx).await?;
        tracing::info!(
            "Operator {} adjusted member {} points by {}",
            request.operator_id,
            member_id,
            request.delta
        );
        Ok(record)
    }

    /// Expire earn records whose expiry has passed
    ///
    /// Each earn record expires once, for at most what is left of the balance;
    /// the ledger enforces both under the member lock.
    pub async fn expire_points(
        &self,
        member_id: Uuid,
        now: DateTime<Utc>,
    ) -> LoyaltyResult<Vec<PointTransaction>> {
        let records = self.ledger.list_for_member(member_id).await?;
        let already_expired: HashSet<Uuid> = records
            .iter()
            .filter(|r| r.transaction_type == TransactionType::Expired)
            .filter_map(|r| r.source_transaction)
            .collect();

        let mut due: Vec<&PointTransaction> = records
            .iter()
            .filter(|r| r.transaction_type == TransactionType::Earn)
            .filter(|r| r.expires_at.map(|at| at <= now).unwrap_or(false))
            .filter(|r| !already_expired.contains(&r.id))
            .collect();
        due.sort_by_key(|r| r.expires_at);

        let mut expired = Vec::new();
        for earn in due {
            if let Some(record) = self.ledger.expire_earn(earn).await? {
                expired.push(record);
            }
        }

        if !expired.is_empty() {
            tracing::info!(
                "Expired {} earn records for member {}",
                expired.len(),
                member_id
            );
        }
        Ok(expired)
    }

    /// Balance, level and history for a member
    pub async fn balance(&self, member_id: Uuid) -> LoyaltyResult<PointsBalance> {
        let member = self
            .members
            .find_by_id(member_id)
            .await?
            .ok_or(LoyaltyError::MemberNotFound(member_id))?;
        let transactions = self.ledger.list_for_member(member_id).await?;

        Ok(PointsBalance {
            member_id,
            balance: crate::loyalty::ledger::balance_of(&transactions),
            member_level: member.member_level,
            total_spent: member.total_spent,
            transactions,
        })
    }

    pub async fn history(&self, member_id: Uuid) -> LoyaltyResult<Vec<PointTransaction>> {
        self.ledger.list_for_member(member_id).await
    }

    /// Move the member to the level their totals resolve to
    pub async fn recompute_member_level(&self, member_id: Uuid) -> LoyaltyResult<LevelChange> {
        let _timer = self.metrics.start(Operation::LevelRecompute);

        let member = self
            .members
            .find_by_id(member_id)
            .await?
            .ok_or(LoyaltyError::MemberNotFound(member_id))?;
        let levels = self.config.levels().await;
        let change = levels.evaluate(
            member.member_level.as_deref(),
            member.total_spent,
            member.total_orders,
        );

        if change.changed {
            self.members.set_level(member_id, &change.new_level).await?;
            tracing::info!(
                "Member {} level {} -> {}",
                member_id,
                change.old_level.as_deref().unwrap_or("none"),
                change.new_level
            );
        }
        Ok(change)
    }

    /// Award points, record spend and recompute level for a completed order
    ///
    /// The award goes first and is idempotent per order, so a failure after it
    /// leaves the order unrecorded and a retry finishes the job. Reprocessing a
    /// fully recorded order changes nothing.
    pub async fn process_order_completion(
        &self,
        order: CompletedOrder,
    ) -> LoyaltyResult<OrderCompletionOutcome> {
        order.validate()?;
        self.members.ensure(order.member_id).await?;

        let award = self
            .award_order_points(
                order.member_id,
                &order.order_id,
                &order.items,
                order.shipping_amount,
            )
            .await?;

        let recorded = self
            .members
            .record_completed_order(order.member_id, &order.order_id, order.order_amount)
            .await?;
        let level_change = self.recompute_member_level(order.member_id).await?;

        if recorded.is_none() {
            tracing::info!("Order {} already processed, skipping", order.order_id);
            return Ok(OrderCompletionOutcome {
                order_id: order.order_id,
                member_id: order.member_id,
                already_processed: true,
                points_awarded: award.points,
                level_change: Some(level_change).filter(|change| change.changed),
            });
        }

        Ok(OrderCompletionOutcome {
            order_id: order.order_id,
            member_id: order.member_id,
            already_processed: false,
            points_awarded: award.points,
            level_change: Some(level_change),
        })
    }

    /// React to an order status change
    ///
    /// Only a move from a non-completed status into a completed one is processed;
    /// a move into `refunded` claws back the order's points.
    pub async fn handle_status_change(
        &self,
        request: OrderStatusChangeRequest,
    ) -> LoyaltyResult<Option<OrderCompletionOutcome>> {
        request.validate()?;

        if request.status == OrderStatus::Refunded && request.previous_status != Some(OrderStatus::Refunded) {
            if let Some(member_id) = request.member_id {
                self.deduct_refund_points(member_id, &request.order_id).await?;
            }
            return Ok(None);
        }

        if !OrderStatus::completes_order(request.previous_status, request.status) {
            tracing::debug!(
                "Order {} status {} does not complete the order",
                request.order_id,
                request.status
            );
            return Ok(None);
        }

        match request.completed_order() {
            Some(order) => self.process_order_completion(order).await.map(Some),
            None => {
                tracing::debug!("Guest order {} earns no points", request.order_id);
                Ok(None)
            }
        }
    }

    pub async fn settings(&self) -> LoyaltySettings {
        self.config.settings().await
    }

    pub async fn update_settings(&self, settings: LoyaltySettings) -> LoyaltyResult<LoyaltySettings> {
        self.config.update_settings(settings).await
    }

    pub async fn levels(&self) -> LevelTable {
        self.config.levels().await
    }

    pub async fn update_levels(&self, levels: Vec<MemberLevel>) -> LoyaltyResult<LevelTable> {
        self.config.update_levels(levels).await
    }
}

/// Minimum points, and the cap on how much of the order points may cover
fn check_redemption(settings: &LoyaltySettings, points: i64, order_amount: Decimal) -> LoyaltyResult<()> {
    if points < settings.min_points_to_redeem {
        return Err(LoyaltyError::RedemptionRejected(format!(
            "at least {} points are required",
            settings.min_points_to_redeem
        )));
    }

    let value = Decimal::from(points) * settings.point_value;
    let cap = order_amount * settings.advanced.max_redeem_percentage / Decimal::ONE_HUNDRED;
    if value > cap {
        return Err(LoyaltyError::RedemptionRejected(format!(
            "points worth {} exceed the redeemable limit of {}",
            value, cap
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loyalty::repository::{InMemoryLedgerRepository, InMemoryMemberRepository};
    use async_trait::async_trait;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// In-memory ledger whose next once-per-order append fails
    struct FlakyLedger {
        inner: InMemoryLedgerRepository,
        fail_next: AtomicBool,
    }

    impl FlakyLedger {
        fn failing_once() -> Self {
            Self {
                inner: InMemoryLedgerRepository::new(),
                fail_next: AtomicBool::new(true),
            }
        }
    }

    #[async_trait]
    impl LedgerRepository for FlakyLedger {
        async fn append(&self, tx: NewPointTransaction) -> LoyaltyResult<PointTransaction> {
            self.inner.append(tx).await
        }

        async fn append_once_per_order(
            &self,
            tx: NewPointTransaction,
        ) -> LoyaltyResult<Option<PointTransaction>> {
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(LoyaltyError::CalculationError("ledger unavailable".to_string()));
            }
            self.inner.append_once_per_order(tx).await
        }

        async fn balance(&self, member_id: Uuid) -> LoyaltyResult<i64> {
            self.inner.balance(member_id).await
        }

        async fn list_for_member(&self, member_id: Uuid) -> LoyaltyResult<Vec<PointTransaction>> {
            self.inner.list_for_member(member_id).await
        }

        async fn find_for_order(
            &self,
            order_id: &str,
            transaction_type: TransactionType,
        ) -> LoyaltyResult<Option<PointTransaction>> {
            self.inner.find_for_order(order_id, transaction_type).await
        }

        async fn expire_earn(
            &self,
            source: &PointTransaction,
        ) -> LoyaltyResult<Option<PointTransaction>> {
            self.inner.expire_earn(source).await
        }
    }

    fn service() -> LoyaltyService {
        LoyaltyService::new(
            Arc::new(InMemoryMemberRepository::new()),
            Arc::new(InMemoryLedgerRepository::new()),
            Arc::new(LoyaltyConfigStore::default()),
            EngineMetrics::new(),
        )
    }

    fn order(member_id: Uuid, order_id: &str, amount: Decimal) -> CompletedOrder {
        CompletedOrder {
            order_id: order_id.to_string(),
            member_id,
            items: vec![PointsOrderItem::new("p1", 1, amount)],
            order_amount: amount,
            shipping_amount: dec!(0),
        }
    }

    #[tokio::test]
    async fn test_order_completion_awards_and_upgrades() {
        let svc = service();
        let member = Uuid::new_v4();

        let outcome = svc.process_order_completion(order(member, "o1", dec!(600))).await.unwrap();
        assert!(!outcome.already_processed);
        assert_eq!(outcome.points_awarded, 6);
        let change = outcome.level_change.unwrap();
        assert_eq!(change.new_level, "silver");
        assert!(change.upgraded);

        let balance = svc.balance(member).await.unwrap();
        assert_eq!(balance.balance, 6);
        assert_eq!(balance.member_level.as_deref(), Some("silver"));
        assert_eq!(balance.total_spent, dec!(600));
    }

    #[tokio::test]
    async fn test_order_completion_is_idempotent() {
        let svc = service();
        let member = Uuid::new_v4();

        svc.process_order_completion(order(member, "o1", dec!(300))).await.unwrap();
        let again = svc.process_order_completion(order(member, "o1", dec!(300))).await.unwrap();
        assert!(again.already_processed);
        assert_eq!(again.points_awarded, 0);

        let balance = svc.balance(member).await.unwrap();
        assert_eq!(balance.balance, 3);
        assert_eq!(balance.total_spent, dec!(300));
        assert_eq!(balance.transactions.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_award_leaves_order_retryable() {
        let svc = LoyaltyService::new(
            Arc::new(InMemoryMemberRepository::new()),
            Arc::new(FlakyLedger::failing_once()),
            Arc::new(LoyaltyConfigStore::default()),
            EngineMetrics::new(),
        );
        let member = Uuid::new_v4();

        let first = svc.process_order_completion(order(member, "o1", dec!(600))).await;
        assert!(matches!(first, Err(LoyaltyError::CalculationError(_))));
        let untouched = svc.members.find_by_id(member).await.unwrap().unwrap();
        assert_eq!(untouched.total_spent, dec!(0));
        assert_eq!(untouched.total_orders, 0);

        let retry = svc.process_order_completion(order(member, "o1", dec!(600))).await.unwrap();
        assert!(!retry.already_processed);
        assert_eq!(retry.points_awarded, 6);
        assert_eq!(retry.level_change.map(|c| c.new_level).as_deref(), Some("silver"));

        let balance = svc.balance(member).await.unwrap();
        assert_eq!(balance.balance, 6);
        assert_eq!(balance.total_spent, dec!(600));
    }

    #[tokio::test]
    async fn test_award_is_idempotent_per_order() {
        let svc = service();
        let member = Uuid::new_v4();
        svc.members.ensure(member).await.unwrap();
        let items = vec![PointsOrderItem::new("p1", 1, dec!(1000))];

        let first = svc.award_order_points(member, "o1", &items, dec!(0)).await.unwrap();
        let second = svc.award_order_points(member, "o1", &items, dec!(0)).await.unwrap();
        assert_eq!(first.points, 10);
        assert_eq!(second.points, 0);
        assert_eq!(svc.balance(member).await.unwrap().balance, 10);
    }

    #[tokio::test]
    async fn test_status_change_only_on_transition_into_completed() {
        let svc = service();
        let member = Uuid::new_v4();
        let mut request = OrderStatusChangeRequest {
            order_id: "o1".to_string(),
            member_id: Some(member),
            previous_status: Some(OrderStatus::Pending),
            status: OrderStatus::Processing,
            items: vec![PointsOrderItem::new("p1", 1, dec!(500))],
            order_amount: dec!(500),
            shipping_amount: dec!(0),
        };
        assert!(svc.handle_status_change(request.clone()).await.unwrap().is_none());

        request.previous_status = Some(OrderStatus::Processing);
        request.status = OrderStatus::Completed;
        let outcome = svc.handle_status_change(request.clone()).await.unwrap().unwrap();
        assert_eq!(outcome.points_awarded, 5);

        // completed -> delivered is not a new completion
        request.previous_status = Some(OrderStatus::Completed);
        request.status = OrderStatus::Delivered;
        assert!(svc.handle_status_change(request).await.unwrap().is_none());
        assert_eq!(svc.balance(member).await.unwrap().balance, 5);
    }

    #[tokio::test]
    async fn test_refund_deducts_once_and_may_go_negative() {
        let svc = service();
        let member = Uuid::new_v4();
        svc.process_order_completion(order(member, "o1", dec!(500))).await.unwrap();
        svc.adjust_points(
            member,
            AdjustPointsRequest {
                delta: -3,
                operator_id: "admin".to_string(),
                reason: "correction".to_string(),
            },
        )
        .await
        .unwrap();

        assert_eq!(svc.deduct_refund_points(member, "o1").await.unwrap(), 5);
        assert_eq!(svc.deduct_refund_points(member, "o1").await.unwrap(), 0);
        assert_eq!(svc.balance(member).await.unwrap().balance, -3);

        // No earn record: nothing to deduct
        assert_eq!(svc.deduct_refund_points(member, "unknown").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_redeem_rules() {
        let svc = service();
        let member = Uuid::new_v4();
        svc.process_order_completion(order(member, "o1", dec!(30000))).await.unwrap();
        assert_eq!(svc.balance(member).await.unwrap().balance, 300);

        let below_minimum = svc
            .redeem_points(member, RedeemPointsRequest { points: 50, order_amount: dec!(1000), order_id: None })
            .await;
        assert!(matches!(below_minimum, Err(LoyaltyError::RedemptionRejected(_))));

        let over_balance = svc
            .redeem_points(member, RedeemPointsRequest { points: 400, order_amount: dec!(1000), order_id: None })
            .await;
        assert!(matches!(over_balance, Err(LoyaltyError::InsufficientPoints { .. })));

        let over_cap = svc
            .redeem_points(member, RedeemPointsRequest { points: 200, order_amount: dec!(150), order_id: None })
            .await;
        assert!(matches!(over_cap, Err(LoyaltyError::RedemptionRejected(_))));

        let record = svc
            .redeem_points(
                member,
                RedeemPointsRequest { points: 200, order_amount: dec!(500), order_id: Some("o2".to_string()) },
            )
            .await
            .unwrap();
        assert_eq!(record.amount, -200);
        assert_eq!(record.balance_after, 100);
    }

    #[tokio::test]
    async fn test_redeem_disabled_program() {
        let svc = service();
        let mut settings = svc.settings().await;
        settings.enabled = false;
        svc.update_settings(settings).await.unwrap();

        let result = svc
            .redeem_points(Uuid::new_v4(), RedeemPointsRequest { points: 100, order_amount: dec!(100), order_id: None })
            .await;
        assert!(matches!(result, Err(LoyaltyError::ProgramDisabled)));
    }

    #[tokio::test]
    async fn test_adjust_unknown_member() {
        let svc = service();
        let result = svc
            .adjust_points(
                Uuid::new_v4(),
                AdjustPointsRequest {
                    delta: 10,
                    operator_id: "admin".to_string(),
                    reason: "welcome".to_string(),
                },
            )
            .await;
        assert!(matches!(result, Err(LoyaltyError::MemberNotFound(_))));
    }

    #[tokio::test]
    async fn test_expire_points_once_and_capped_by_balance() {
        let svc = service();
        let member = Uuid::new_v4();
        svc.process_order_completion(order(member, "o1", dec!(1000))).await.unwrap();

        let mut settings = svc.settings().await;
        settings.min_points_to_redeem = 1;
        svc.update_settings(settings).await.unwrap();
        svc.redeem_points(member, RedeemPointsRequest { points: 4, order_amount: dec!(100), order_id: None })
            .await
            .unwrap();

        // Not yet due
        assert!(svc.expire_points(member, Utc::now()).await.unwrap().is_empty());

        let later = Utc::now() + Duration::days(366);
        let expired = svc.expire_points(member, later).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].amount, -6);
        assert_eq!(svc.balance(member).await.unwrap().balance, 0);

        assert!(svc.expire_points(member, later).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_overlapping_expiry_sweeps_expire_once() {
        let svc = service();
        let member = Uuid::new_v4();
        svc.process_order_completion(order(member, "o1", dec!(1000))).await.unwrap();

        let later = Utc::now() + Duration::days(366);
        let (a, b) = tokio::join!(
            svc.expire_points(member, later),
            svc.expire_points(member, later)
        );
        assert_eq!(a.unwrap().len() + b.unwrap().len(), 1);

        let records = svc.history(member).await.unwrap();
        let expired: Vec<_> = records
            .iter()
            .filter(|r| r.transaction_type == TransactionType::Expired)
            .collect();
        assert_eq!(expired.len(), 1);
        assert_eq!(svc.balance(member).await.unwrap().balance, 0);
    }

    #[tokio::test]
    async fn test_recompute_is_idempotent() {
        let svc = service();
        let member = Uuid::new_v4();
        svc.process_order_completion(order(member, "o1", dec!(2500))).await.unwrap();

        let first = svc.recompute_member_level(member).await.unwrap();
        let second = svc.recompute_member_level(member).await.unwrap();
        assert_eq!(first.new_level, "gold");
        assert_eq!(second.new_level, "gold");
        assert!(!second.changed);
    }

    #[tokio::test]
    async fn test_level_multiplier_applies_to_points() {
        let svc = service();
        let member = Uuid::new_v4();
        let mut levels = svc.levels().await.levels().to_vec();
        for level in levels.iter_mut() {
            if level.code == "bronze" {
                level.points_multiplier = dec!(2);
            }
        }
        svc.update_levels(levels).await.unwrap();

        svc.members.ensure(member).await.unwrap();
        svc.members.set_level(member, "bronze").await.unwrap();
        let calc = svc
            .calculate_order_points(member, &[PointsOrderItem::new("p1", 1, dec!(300))], dec!(0))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(calc.total_points, 6);
    }
}
