// Promotion Eligibility
//
// Decides whether a single promotion may take part in pricing a cart.
// All filters must pass; an empty restriction list means "no restriction".

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::models::DEFAULT_MEMBER_LEVEL;
use crate::promotions::models::{CartContext, CartItem, Promotion};
use crate::promotions::types::PromotionStatus;

/// Sum of every line's unit price × quantity, saturating at Decimal::MAX
pub fn cart_subtotal(items: &[CartItem]) -> Decimal {
    items
        .iter()
        .map(CartItem::line_total)
        .fold(Decimal::ZERO, Decimal::saturating_add)
}

/// Check whether `promotion` is eligible for the cart at `now`
///
/// Filters, in order:
/// - active status
/// - `now` within [start_date, end_date]
/// - usage cap not reached
/// - vendor scope (only when the caller supplies a vendor)
/// - member level allow-list, guests count as bronze
/// - minimum purchase against the cart subtotal
/// - at least one cart line matching the product / category lists
pub fn is_promotion_applicable(
    promotion: &Promotion,
    ctx: &CartContext,
    subtotal: Decimal,
    now: DateTime<Utc>,
) -> bool {
    if promotion.status != PromotionStatus::Active {
        return false;
    }

    if now < promotion.start_date || now > promotion.end_date {
        return false;
    }

    if let Some(limit) = promotion.usage_limit {
        if promotion.used_count >= limit {
            return false;
        }
    }

    if let (Some(promo_vendor), Some(cart_vendor)) = (&promotion.vendor_id, &ctx.vendor_id) {
        if promo_vendor != cart_vendor {
            return false;
        }
    }

    if !promotion.applicable_member_levels.is_empty() {
        let level = ctx
            .member_level
            .as_deref()
            .filter(|l| !l.is_empty())
            .unwrap_or(DEFAULT_MEMBER_LEVEL);
        if !promotion.applicable_member_levels.iter().any(|l| l == level) {
            return false;
        }
    }

    if let Some(min_purchase) = promotion.min_purchase {
        if subtotal < min_purchase {
            return false;
        }
    }

    if !promotion.applicable_products.is_empty() {
        let has_product = ctx
            .items
            .iter()
            .any(|item| promotion.applicable_products.contains(&item.product_id));
        if !has_product {
            return false;
        }
    }

    if !promotion.applicable_categories.is_empty() {
        let has_category = ctx.items.iter().any(|item| {
            item.category_ids
                .iter()
                .any(|c| promotion.applicable_categories.contains(c))
        });
        if !has_category {
            return false;
        }
    }

    true
}
