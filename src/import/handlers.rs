// HTTP handlers for import previews and plans
//
// Nothing here writes to storage; callers get back what an import would do.

use axum::{extract::State, Json};
use std::collections::HashSet;
use validator::Validate;

use crate::error::ApiError;
use crate::import::{
    csv::parse_csv,
    orders::{
        prepare_order_import, preview_order_import, OrderImportReport, OrderImportRequest,
        OrderPreview, OrderPreviewRequest,
    },
    products::{
        merge_rows_to_products, parse_product_export, plan_product_import, preview_product_import,
        ProductImportPlan, ProductImportRequest, ProductPreview, ProductPreviewRequest,
    },
};
use crate::metrics::Operation;
use crate::AppState;

/// POST /api/import/products/preview
pub async fn preview_products_handler(
    State(state): State<AppState>,
    Json(request): Json<ProductPreviewRequest>,
) -> Result<Json<ProductPreview>, ApiError> {
    request.validate()?;
    let _timer = state.metrics.start(Operation::Import);

    let document = parse_product_export(&request.csv)?;
    Ok(Json(preview_product_import(&document)))
}

/// POST /api/import/products/plan
pub async fn plan_products_handler(
    State(state): State<AppState>,
    Json(request): Json<ProductImportRequest>,
) -> Result<Json<ProductImportPlan>, ApiError> {
    request.validate()?;
    let _timer = state.metrics.start(Operation::Import);

    let document = parse_product_export(&request.csv)?;
    let products = merge_rows_to_products(&document.rows);
    let existing: HashSet<String> = request.existing_slugs.into_iter().collect();

    let plan = plan_product_import(
        &products,
        &existing,
        &request.vendor_id,
        request.skip_existing,
    )?;
    Ok(Json(plan))
}

/// POST /api/import/orders/preview
pub async fn preview_orders_handler(
    State(state): State<AppState>,
    Json(request): Json<OrderPreviewRequest>,
) -> Result<Json<OrderPreview>, ApiError> {
    request.validate()?;
    let _timer = state.metrics.start(Operation::Import);

    let document = parse_csv(&request.csv)?;
    Ok(Json(preview_order_import(
        &document,
        request.source,
        request.limit,
    )))
}

/// POST /api/import/orders/plan
pub async fn plan_orders_handler(
    State(state): State<AppState>,
    Json(request): Json<OrderImportRequest>,
) -> Result<Json<OrderImportReport>, ApiError> {
    request.validate()?;
    let _timer = state.metrics.start(Operation::Import);

    let document = parse_csv(&request.csv)?;
    let existing: HashSet<String> = request.existing_order_ids.into_iter().collect();

    Ok(Json(prepare_order_import(
        &document.rows,
        request.source,
        &existing,
    )))
}
