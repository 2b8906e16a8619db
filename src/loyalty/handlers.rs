// HTTP handlers for points, member levels and order events

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::ApiError;
use crate::loyalty::{
    ledger::PointTransaction,
    member_levels::{LevelChange, MemberLevel},
    models::{
        AdjustPointsRequest, OrderCompletionOutcome, OrderStatusChangeRequest, PointsBalance,
        RedeemPointsRequest, RefundOrderRequest,
    },
    points_engine::{PointsCalculation, PointsOrderItem},
    settings::LoyaltySettings,
};
use crate::validation::validate_money_amount;
use crate::AppState;

/// Request DTO for a points quote
#[derive(Debug, Deserialize, Validate)]
pub struct CalculatePointsRequest {
    #[validate]
    pub items: Vec<PointsOrderItem>,
    #[validate(custom = "validate_money_amount")]
    #[serde(default)]
    pub shipping_amount: Decimal,
}

/// Response DTO for an order status change
#[derive(Debug, Serialize)]
pub struct StatusChangeResponse {
    pub order_id: String,
    /// False when the change needed no loyalty processing
    pub processed: bool,
    pub outcome: Option<OrderCompletionOutcome>,
}

/// Response DTO for a refund clawback
#[derive(Debug, Serialize)]
pub struct RefundResponse {
    pub order_id: String,
    pub member_id: Uuid,
    pub points_deducted: i64,
}

/// GET /api/members/:id/points
pub async fn get_points_handler(
    State(state): State<AppState>,
    Path(member_id): Path<Uuid>,
) -> Result<Json<PointsBalance>, ApiError> {
    let balance = state.loyalty_service.balance(member_id).await?;
    Ok(Json(balance))
}

/// GET /api/members/:id/points/history
pub async fn get_points_history_handler(
    State(state): State<AppState>,
    Path(member_id): Path<Uuid>,
) -> Result<Json<Vec<PointTransaction>>, ApiError> {
    let history = state.loyalty_service.history(member_id).await?;
    Ok(Json(history))
}

/// Quote the points an order would earn
/// POST /api/members/:id/points/calculate
pub async fn calculate_points_handler(
    State(state): State<AppState>,
    Path(member_id): Path<Uuid>,
    Json(request): Json<CalculatePointsRequest>,
) -> Result<Json<Option<PointsCalculation>>, ApiError> {
    request.validate()?;
    let calculation = state
        .loyalty_service
        .calculate_order_points(member_id, &request.items, request.shipping_amount)
        .await?;
    Ok(Json(calculation))
}

/// POST /api/members/:id/points/redeem
pub async fn redeem_points_handler(
    State(state): State<AppState>,
    Path(member_id): Path<Uuid>,
    Json(request): Json<RedeemPointsRequest>,
) -> Result<(StatusCode, Json<PointTransaction>), ApiError> {
    request.validate()?;
    let record = state.loyalty_service.redeem_points(member_id, request).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Operator adjustment
/// POST /api/members/:id/points/adjust
pub async fn adjust_points_handler(
    State(state): State<AppState>,
    Path(member_id): Path<Uuid>,
    Json(request): Json<AdjustPointsRequest>,
) -> Result<(StatusCode, Json<PointTransaction>), ApiError> {
    request.validate()?;
    let record = state.loyalty_service.adjust_points(member_id, request).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// POST /api/members/:id/points/expire
pub async fn expire_points_handler(
    State(state): State<AppState>,
    Path(member_id): Path<Uuid>,
) -> Result<Json<Vec<PointTransaction>>, ApiError> {
    let expired = state
        .loyalty_service
        .expire_points(member_id, Utc::now())
        .await?;
    Ok(Json(expired))
}

/// POST /api/members/:id/level/recompute
pub async fn recompute_level_handler(
    State(state): State<AppState>,
    Path(member_id): Path<Uuid>,
) -> Result<Json<LevelChange>, ApiError> {
    let change = state
        .loyalty_service
        .recompute_member_level(member_id)
        .await?;
    Ok(Json(change))
}

/// Order system reports a status change
/// POST /api/orders/status
pub async fn order_status_handler(
    State(state): State<AppState>,
    Json(request): Json<OrderStatusChangeRequest>,
) -> Result<Json<StatusChangeResponse>, ApiError> {
    request.validate()?;
    let order_id = request.order_id.clone();
    let outcome = state.loyalty_service.handle_status_change(request).await?;

    Ok(Json(StatusChangeResponse {
        order_id,
        processed: outcome.is_some(),
        outcome,
    }))
}

/// POST /api/orders/:order_id/refund
pub async fn refund_order_handler(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Json(request): Json<RefundOrderRequest>,
) -> Result<Json<RefundResponse>, ApiError> {
    let points_deducted = state
        .loyalty_service
        .deduct_refund_points(request.member_id, &order_id)
        .await?;

    Ok(Json(RefundResponse {
        order_id,
        member_id: request.member_id,
        points_deducted,
    }))
}

/// GET /api/loyalty/settings
pub async fn get_settings_handler(State(state): State<AppState>) -> Json<LoyaltySettings> {
    Json(state.loyalty_service.settings().await)
}

/// PUT /api/loyalty/settings
pub async fn update_settings_handler(
    State(state): State<AppState>,
    Json(settings): Json<LoyaltySettings>,
) -> Result<Json<LoyaltySettings>, ApiError> {
    let settings = state.loyalty_service.update_settings(settings).await?;
    Ok(Json(settings))
}

/// GET /api/member-levels
pub async fn get_levels_handler(State(state): State<AppState>) -> Json<Vec<MemberLevel>> {
    Json(state.loyalty_service.levels().await.levels().to_vec())
}

/// PUT /api/member-levels
pub async fn update_levels_handler(
    State(state): State<AppState>,
    Json(levels): Json<Vec<MemberLevel>>,
) -> Result<Json<Vec<MemberLevel>>, ApiError> {
    let table = state.loyalty_service.update_levels(levels).await?;
    Ok(Json(table.levels().to_vec()))
}
