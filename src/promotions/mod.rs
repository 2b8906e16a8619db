// Promotion engine
// Eligibility filtering, stacked discount calculation and promotion storage

pub mod calculator;
pub mod eligibility;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod service;
pub mod types;

pub use calculator::DiscountCalculator;
pub use eligibility::{cart_subtotal, is_promotion_applicable};
pub use error::{PromotionError, PromotionResult};
pub use models::{
    AppliedPromotion, BuyXGetY, CartContext, CartDiscountRequest, CartItem,
    CreatePromotionRequest, DiscountResult, Promotion, UpdatePromotionStatusRequest,
};
pub use repository::{InMemoryPromotionRepository, PgPromotionRepository, PromotionRepository};
pub use service::PromotionService;
pub use types::{PromotionStatus, PromotionType};
