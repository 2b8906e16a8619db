// Promotion Service
//
// Loads promotions from storage, resolves who is buying and hands both to
// the discount calculator. Also owns promotion management.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::loyalty::repository::MemberRepository;
use crate::metrics::{EngineMetrics, Operation};
use crate::promotions::calculator::DiscountCalculator;
use crate::promotions::error::{PromotionError, PromotionResult};
use crate::promotions::models::{
    CartContext, CartDiscountRequest, CreatePromotionRequest, DiscountResult, Promotion,
};
use crate::promotions::repository::PromotionRepository;
use crate::promotions::types::PromotionStatus;

#[derive(Clone)]
pub struct PromotionService {
    repository: Arc<dyn PromotionRepository>,
    members: Arc<dyn MemberRepository>,
    metrics: EngineMetrics,
}

impl PromotionService {
    pub fn new(
        repository: Arc<dyn PromotionRepository>,
        members: Arc<dyn MemberRepository>,
        metrics: EngineMetrics,
    ) -> Self {
        Self {
            repository,
            members,
            metrics,
        }
    }

    /// Price a cart against every active promotion
    pub async fn calculate_cart_discount(
        &self,
        request: CartDiscountRequest,
    ) -> PromotionResult<DiscountResult> {
        request
            .validate()
            .map_err(|e| PromotionError::InvalidCart(e.to_string()))?;
        if request.items.is_empty() {
            return Err(PromotionError::InvalidCart("cart is empty".to_string()));
        }

        let ctx = self.cart_context(request).await?;
        let promotions = self.repository.list_active().await?;

        let _timer = self.metrics.start(Operation::DiscountCalculation);
        let result = DiscountCalculator::calculate(&promotions, &ctx, Utc::now());

        tracing::debug!(
            "Cart of {} items: {} promotions applied, discount {}",
            ctx.items.len(),
            result.applied_promotions.len(),
            result.total_discount
        );
        Ok(result)
    }

    /// Price the cart and count one use of every promotion applied
    pub async fn apply_cart_discount(
        &self,
        request: CartDiscountRequest,
    ) -> PromotionResult<DiscountResult> {
        let result = self.calculate_cart_discount(request).await?;

        for applied in &result.applied_promotions {
            self.repository.increment_usage(applied.promotion_id).await?;
        }
        if !result.applied_promotions.is_empty() {
            tracing::info!(
                "Recorded usage for {} promotions",
                result.applied_promotions.len()
            );
        }
        Ok(result)
    }

    async fn cart_context(&self, request: CartDiscountRequest) -> PromotionResult<CartContext> {
        let member_level = match request.user_id {
            Some(user_id) => self
                .members
                .find_by_id(user_id)
                .await?
                .and_then(|member| member.member_level),
            None => None,
        };

        Ok(CartContext {
            items: request.items,
            member_level,
            vendor_id: request.vendor_id,
            promo_code: request.promo_code,
        })
    }

    pub async fn create_promotion(
        &self,
        request: CreatePromotionRequest,
    ) -> PromotionResult<Promotion> {
        request
            .validate()
            .map_err(|e| PromotionError::InvalidPromotion(e.to_string()))?;

        if let Some(code) = request.code.as_deref() {
            if self.repository.find_by_code(code).await?.is_some() {
                return Err(PromotionError::DuplicateCode(code.to_string()));
            }
        }

        let promotion = self.repository.insert(request.into_promotion()).await?;
        tracing::info!(
            "Created {} promotion {} ({})",
            promotion.promotion_type,
            promotion.name,
            promotion.id
        );
        Ok(promotion)
    }

    pub async fn get_promotion(&self, id: Uuid) -> PromotionResult<Promotion> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or(PromotionError::NotFound(id))
    }

    pub async fn list_promotions(&self) -> PromotionResult<Vec<Promotion>> {
        self.repository.list().await
    }

    pub async fn set_status(
        &self,
        id: Uuid,
        status: PromotionStatus,
    ) -> PromotionResult<Promotion> {
        let promotion = self
            .repository
            .update_status(id, status)
            .await?
            .ok_or(PromotionError::NotFound(id))?;
        tracing::info!("Promotion {} is now {:?}", id, status);
        Ok(promotion)
    }
}
