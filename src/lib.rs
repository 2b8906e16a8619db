// Storefront Engine
//
// Promotion stacking, loyalty points with an append-only ledger, member
// levels and import adapters, served over an axum JSON API.

pub mod config;
pub mod db;
pub mod error;
pub mod import;
pub mod loyalty;
pub mod metrics;
pub mod models;
pub mod promotions;
pub mod validation;

use axum::{
    extract::State,
    routing::{get, post, put},
    Json, Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::loyalty::{
    InMemoryLedgerRepository, InMemoryMemberRepository, LedgerRepository, LoyaltyConfigStore,
    LoyaltyService, MemberRepository, PgLedgerRepository, PgMemberRepository,
};
use crate::metrics::{EngineMetrics, MetricsSummary};
use crate::promotions::{
    InMemoryPromotionRepository, PgPromotionRepository, PromotionRepository, PromotionService,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub promotion_service: PromotionService,
    pub loyalty_service: LoyaltyService,
    pub metrics: EngineMetrics,
}

impl AppState {
    /// State backed by PostgreSQL
    pub fn with_pool(pool: PgPool, config: Arc<LoyaltyConfigStore>) -> Self {
        Self::from_repositories(
            Arc::new(PgPromotionRepository::new(pool.clone())),
            Arc::new(PgMemberRepository::new(pool.clone())),
            Arc::new(PgLedgerRepository::new(pool)),
            config,
        )
    }

    /// State kept in process memory; nothing survives a restart
    pub fn in_memory(config: Arc<LoyaltyConfigStore>) -> Self {
        Self::from_repositories(
            Arc::new(InMemoryPromotionRepository::new()),
            Arc::new(InMemoryMemberRepository::new()),
            Arc::new(InMemoryLedgerRepository::new()),
            config,
        )
    }

    pub fn from_repositories(
        promotions: Arc<dyn PromotionRepository>,
        members: Arc<dyn MemberRepository>,
        ledger: Arc<dyn LedgerRepository>,
        config: Arc<LoyaltyConfigStore>,
    ) -> Self {
        let metrics = EngineMetrics::new();
        Self {
            promotion_service: PromotionService::new(promotions, members.clone(), metrics.clone()),
            loyalty_service: LoyaltyService::new(members, ledger, config, metrics.clone()),
            metrics,
        }
    }
}

/// GET /api/metrics
async fn metrics_handler(State(state): State<AppState>) -> Json<MetricsSummary> {
    Json(state.metrics.summary())
}

/// Creates the application router
/// Maps all API endpoints to their handlers and adds tracing and CORS layers
pub fn create_router(state: AppState) -> Router {
    use crate::import::handlers as import;
    use crate::loyalty::handlers as loyalty;
    use crate::promotions::handlers as promotions;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Cart pricing
        .route("/api/cart/discount", post(promotions::calculate_discount_handler))
        .route("/api/cart/discount/apply", post(promotions::apply_discount_handler))
        // Promotion management
        .route(
            "/api/promotions",
            get(promotions::list_promotions_handler).post(promotions::create_promotion_handler),
        )
        .route("/api/promotions/:id", get(promotions::get_promotion_handler))
        .route(
            "/api/promotions/:id/status",
            put(promotions::update_promotion_status_handler),
        )
        // Member points and levels
        .route("/api/members/:id/points", get(loyalty::get_points_handler))
        .route(
            "/api/members/:id/points/history",
            get(loyalty::get_points_history_handler),
        )
        .route(
            "/api/members/:id/points/calculate",
            post(loyalty::calculate_points_handler),
        )
        .route("/api/members/:id/points/redeem", post(loyalty::redeem_points_handler))
        .route("/api/members/:id/points/adjust", post(loyalty::adjust_points_handler))
        .route("/api/members/:id/points/expire", post(loyalty::expire_points_handler))
        .route(
            "/api/members/:id/level/recompute",
            post(loyalty::recompute_level_handler),
        )
        // Order events
        .route("/api/orders/status", post(loyalty::order_status_handler))
        .route("/api/orders/:order_id/refund", post(loyalty::refund_order_handler))
        // Loyalty configuration
        .route(
            "/api/loyalty/settings",
            get(loyalty::get_settings_handler).put(loyalty::update_settings_handler),
        )
        .route(
            "/api/member-levels",
            get(loyalty::get_levels_handler).put(loyalty::update_levels_handler),
        )
        // Imports
        .route("/api/import/products/preview", post(import::preview_products_handler))
        .route("/api/import/products/plan", post(import::plan_products_handler))
        .route("/api/import/orders/preview", post(import::preview_orders_handler))
        .route("/api/import/orders/plan", post(import::plan_orders_handler))
        .route("/api/metrics", get(metrics_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests;
