// Loyalty engine
// Points calculation, the append-only points ledger and member levels

pub mod config_store;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod member_levels;
pub mod models;
pub mod points_engine;
pub mod price_utils;
pub mod repository;
pub mod service;
pub mod settings;

pub use config_store::LoyaltyConfigStore;
pub use error::{LoyaltyError, LoyaltyResult};
pub use ledger::{NewPointTransaction, PointTransaction, TransactionType};
pub use member_levels::{LevelChange, LevelTable, MemberLevel, UpgradeLogic};
pub use models::{
    AdjustPointsRequest, CompletedOrder, OrderCompletionOutcome, OrderStatusChangeRequest,
    PointsAward, PointsBalance, RedeemPointsRequest, RefundOrderRequest,
};
pub use points_engine::{PointsBreakdown, PointsCalculation, PointsEngine, PointsOrderItem};
pub use repository::{
    InMemoryLedgerRepository, InMemoryMemberRepository, LedgerRepository, Member,
    MemberRepository, PgLedgerRepository, PgMemberRepository,
};
pub use service::LoyaltyService;
pub use settings::LoyaltySettings;
