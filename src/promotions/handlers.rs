// HTTP handlers for cart pricing and promotion management

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::error::ApiError;
use crate::promotions::models::{
    CartDiscountRequest, CreatePromotionRequest, DiscountResult, Promotion,
    UpdatePromotionStatusRequest,
};
use crate::AppState;

/// Price a cart without recording promotion usage
/// POST /api/cart/discount
pub async fn calculate_discount_handler(
    State(state): State<AppState>,
    Json(request): Json<CartDiscountRequest>,
) -> Result<Json<DiscountResult>, ApiError> {
    request.validate()?;
    let result = state.promotion_service.calculate_cart_discount(request).await?;
    Ok(Json(result))
}

/// Price a cart at checkout and count promotion usage
/// POST /api/cart/discount/apply
pub async fn apply_discount_handler(
    State(state): State<AppState>,
    Json(request): Json<CartDiscountRequest>,
) -> Result<Json<DiscountResult>, ApiError> {
    request.validate()?;
    let result = state.promotion_service.apply_cart_discount(request).await?;
    Ok(Json(result))
}

/// GET /api/promotions
pub async fn list_promotions_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<Promotion>>, ApiError> {
    let promotions = state.promotion_service.list_promotions().await?;
    Ok(Json(promotions))
}

/// POST /api/promotions
pub async fn create_promotion_handler(
    State(state): State<AppState>,
    Json(request): Json<CreatePromotionRequest>,
) -> Result<(StatusCode, Json<Promotion>), ApiError> {
    request.validate()?;
    let promotion = state.promotion_service.create_promotion(request).await?;
    Ok((StatusCode::CREATED, Json(promotion)))
}

/// GET /api/promotions/:id
pub async fn get_promotion_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Promotion>, ApiError> {
    let promotion = state.promotion_service.get_promotion(id).await?;
    Ok(Json(promotion))
}

/// PUT /api/promotions/:id/status
pub async fn update_promotion_status_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdatePromotionStatusRequest>,
) -> Result<Json<Promotion>, ApiError> {
    let promotion = state
        .promotion_service
        .set_status(id, request.status)
        .await?;
    Ok(Json(promotion))
}
