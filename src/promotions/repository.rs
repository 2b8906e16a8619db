use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::promotions::error::{PromotionError, PromotionResult};
use crate::promotions::models::{BuyXGetY, Promotion};
use crate::promotions::types::{PromotionStatus, PromotionType};

/// Storage port for promotions
#[async_trait]
pub trait PromotionRepository: Send + Sync {
    /// All promotions, oldest first
    async fn list(&self) -> PromotionResult<Vec<Promotion>>;

    /// Promotions whose status is `active`
    async fn list_active(&self) -> PromotionResult<Vec<Promotion>>;

    async fn find_by_id(&self, id: Uuid) -> PromotionResult<Option<Promotion>>;

    /// Case-insensitive lookup by promo code
    async fn find_by_code(&self, code: &str) -> PromotionResult<Option<Promotion>>;

    async fn insert(&self, promotion: Promotion) -> PromotionResult<Promotion>;

    async fn update_status(
        &self,
        id: Uuid,
        status: PromotionStatus,
    ) -> PromotionResult<Option<Promotion>>;

    /// Add one to `used_count`
    async fn increment_usage(&self, id: Uuid) -> PromotionResult<()>;
}

/// Promotion store kept in process memory
#[derive(Default)]
pub struct InMemoryPromotionRepository {
    promotions: RwLock<HashMap<Uuid, Promotion>>,
}

impl InMemoryPromotionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PromotionRepository for InMemoryPromotionRepository {
    async fn list(&self) -> PromotionResult<Vec<Promotion>> {
        let promotions = self.promotions.read().await;
        let mut all: Vec<Promotion> = promotions.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(all)
    }

    async fn list_active(&self) -> PromotionResult<Vec<Promotion>> {
        let all = self.list().await?;
        Ok(all
            .into_iter()
            .filter(|p| p.status == PromotionStatus::Active)
            .collect())
    }

    async fn find_by_id(&self, id: Uuid) -> PromotionResult<Option<Promotion>> {
        Ok(self.promotions.read().await.get(&id).cloned())
    }

    async fn find_by_code(&self, code: &str) -> PromotionResult<Option<Promotion>> {
        let promotions = self.promotions.read().await;
        Ok(promotions.values().find(|p| p.matches_code(code)).cloned())
    }

    async fn insert(&self, promotion: Promotion) -> PromotionResult<Promotion> {
        let mut promotions = self.promotions.write().await;
        if let Some(code) = promotion.code.as_deref() {
            if promotions.values().any(|p| p.matches_code(code)) {
                return Err(PromotionError::DuplicateCode(code.to_string()));
            }
        }
        promotions.insert(promotion.id, promotion.clone());
        Ok(promotion)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: PromotionStatus,
    ) -> PromotionResult<Option<Promotion>> {
        let mut promotions = self.promotions.write().await;
        Ok(promotions.get_mut(&id).map(|p| {
            p.status = status;
            p.clone()
        }))
    }

    async fn increment_usage(&self, id: Uuid) -> PromotionResult<()> {
        let mut promotions = self.promotions.write().await;
        match promotions.get_mut(&id) {
            Some(p) => {
                p.used_count += 1;
                Ok(())
            }
            None => Err(PromotionError::NotFound(id)),
        }
    }
}

/// Database row for the `promotions` table
#[derive(Debug, sqlx::FromRow)]
struct PromotionRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    promotion_type: PromotionType,
    value: Decimal,
    buy_quantity: Option<i32>,
    get_quantity: Option<i32>,
    min_purchase: Option<Decimal>,
    applicable_products: Vec<String>,
    applicable_categories: Vec<String>,
    applicable_member_levels: Vec<String>,
    stackable: bool,
    priority: i32,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    status: PromotionStatus,
    usage_limit: Option<i64>,
    used_count: i64,
    vendor_id: Option<String>,
    code: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<PromotionRow> for Promotion {
    fn from(row: PromotionRow) -> Self {
        let buy_x_get_y = match (row.buy_quantity, row.get_quantity) {
            (Some(buy), Some(get)) => Some(BuyXGetY {
                buy_quantity: u32::try_from(buy.max(1)).unwrap_or(1),
                get_quantity: u32::try_from(get.max(1)).unwrap_or(1),
            }),
            _ => None,
        };

        Promotion {
            id: row.id,
            name: row.name,
            description: row.description,
            promotion_type: row.promotion_type,
            value: row.value,
            buy_x_get_y,
            min_purchase: row.min_purchase,
            applicable_products: row.applicable_products,
            applicable_categories: row.applicable_categories,
            applicable_member_levels: row.applicable_member_levels,
            stackable: row.stackable,
            priority: row.priority,
            start_date: row.start_date,
            end_date: row.end_date,
            status: row.status,
            usage_limit: row.usage_limit,
            used_count: row.used_count,
            vendor_id: row.vendor_id,
            code: row.code,
            created_at: row.created_at,
        }
    }
}

const PROMOTION_COLUMNS: &str = r#"
    id, name, description, promotion_type, value, buy_quantity, get_quantity,
    min_purchase, applicable_products, applicable_categories, applicable_member_levels,
    stackable, priority, start_date, end_date, status, usage_limit, used_count,
    vendor_id, code, created_at
"#;

/// PostgreSQL-backed promotion store
#[derive(Clone)]
pub struct PgPromotionRepository {
    pool: PgPool,
}

impl PgPromotionRepository {
    /// Create a new PgPromotionRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PromotionRepository for PgPromotionRepository {
    async fn list(&self) -> PromotionResult<Vec<Promotion>> {
        let sql = format!(
            "SELECT {} FROM promotions ORDER BY created_at ASC, id ASC",
            PROMOTION_COLUMNS
        );
        let rows = sqlx::query_as::<_, PromotionRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Promotion::from).collect())
    }

    async fn list_active(&self) -> PromotionResult<Vec<Promotion>> {
        let sql = format!(
            "SELECT {} FROM promotions WHERE status = 'active' ORDER BY priority DESC, created_at ASC, id ASC",
            PROMOTION_COLUMNS
        );
        let rows = sqlx::query_as::<_, PromotionRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Promotion::from).collect())
    }

    async fn find_by_id(&self, id: Uuid) -> PromotionResult<Option<Promotion>> {
        let sql = format!("SELECT {} FROM promotions WHERE id = $1", PROMOTION_COLUMNS);
        let row = sqlx::query_as::<_, PromotionRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Promotion::from))
    }

    async fn find_by_code(&self, code: &str) -> PromotionResult<Option<Promotion>> {
        let sql = format!(
            "SELECT {} FROM promotions WHERE LOWER(TRIM(code)) = LOWER(TRIM($1)) LIMIT 1",
            PROMOTION_COLUMNS
        );
        let row = sqlx::query_as::<_, PromotionRow>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Promotion::from))
    }

    async fn insert(&self, promotion: Promotion) -> PromotionResult<Promotion> {
        let (buy_quantity, get_quantity) = match promotion.buy_x_get_y {
            Some(rule) => (
                Some(i32::try_from(rule.buy_quantity).unwrap_or(i32::MAX)),
                Some(i32::try_from(rule.get_quantity).unwrap_or(i32::MAX)),
            ),
            None => (None, None),
        };

        let sql = format!(
            r#"
            INSERT INTO promotions (
                id, name, description, promotion_type, value, buy_quantity, get_quantity,
                min_purchase, applicable_products, applicable_categories, applicable_member_levels,
                stackable, priority, start_date, end_date, status, usage_limit, used_count,
                vendor_id, code, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21)
            RETURNING {}
            "#,
            PROMOTION_COLUMNS
        );

        let result = sqlx::query_as::<_, PromotionRow>(&sql)
            .bind(promotion.id)
            .bind(&promotion.name)
            .bind(&promotion.description)
            .bind(promotion.promotion_type)
            .bind(promotion.value)
            .bind(buy_quantity)
            .bind(get_quantity)
            .bind(promotion.min_purchase)
            .bind(&promotion.applicable_products)
            .bind(&promotion.applicable_categories)
            .bind(&promotion.applicable_member_levels)
            .bind(promotion.stackable)
            .bind(promotion.priority)
            .bind(promotion.start_date)
            .bind(promotion.end_date)
            .bind(promotion.status)
            .bind(promotion.usage_limit)
            .bind(promotion.used_count)
            .bind(&promotion.vendor_id)
            .bind(&promotion.code)
            .bind(promotion.created_at)
            .fetch_one(&self.pool)
            .await;

        match result {
            Ok(row) => Ok(Promotion::from(row)),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(
                PromotionError::DuplicateCode(promotion.code.unwrap_or_default()),
            ),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: PromotionStatus,
    ) -> PromotionResult<Option<Promotion>> {
        let sql = format!(
            "UPDATE promotions SET status = $1 WHERE id = $2 RETURNING {}",
            PROMOTION_COLUMNS
        );
        let row = sqlx::query_as::<_, PromotionRow>(&sql)
            .bind(status)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Promotion::from))
    }

    async fn increment_usage(&self, id: Uuid) -> PromotionResult<()> {
        let result = sqlx::query("UPDATE promotions SET used_count = used_count + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PromotionError::NotFound(id));
        }
        Ok(())
    }
}
