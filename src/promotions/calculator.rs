// Discount Calculator
//
// Prices a cart against the promotion catalogue.
// Eligible promotions are applied one after another to a running total in
// priority order until a non-stackable promotion ends the chain.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::cmp::Ordering;

use crate::models::round_money;
use crate::promotions::eligibility::{cart_subtotal, is_promotion_applicable};
use crate::promotions::models::{AppliedPromotion, CartContext, CartItem, DiscountResult, Promotion};
use crate::promotions::types::PromotionType;

/// Discount Calculator
///
/// Stateless; everything it needs arrives through its arguments, including `now`.
pub struct DiscountCalculator;

impl DiscountCalculator {
    /// Calculate the discount for a cart
    ///
    /// 1. Filter promotions by eligibility
    /// 2. Select coded / uncoded promotions according to the promo code
    /// 3. Order by priority, then creation time, then id
    /// 4. Apply each discount to the running total, stopping after a non-stackable one
    pub fn calculate(
        promotions: &[Promotion],
        ctx: &CartContext,
        now: DateTime<Utc>,
    ) -> DiscountResult {
        let original_total = cart_subtotal(&ctx.items);
        let selected = Self::select(promotions, ctx, original_total, now);

        let mut running_total = original_total;
        let mut free_shipping = false;
        let mut applied_promotions = Vec::new();

        for promotion in selected {
            if promotion.promotion_type == PromotionType::FreeShipping {
                free_shipping = true;
                applied_promotions.push(AppliedPromotion {
                    promotion_id: promotion.id,
                    promotion_name: promotion.name.clone(),
                    promotion_type: promotion.promotion_type,
                    discount_amount: Decimal::ZERO,
                });
            } else {
                let discount = Self::discount_for(promotion, running_total, &ctx.items);
                if discount > Decimal::ZERO {
                    running_total -= discount;
                    applied_promotions.push(AppliedPromotion {
                        promotion_id: promotion.id,
                        promotion_name: promotion.name.clone(),
                        promotion_type: promotion.promotion_type,
                        discount_amount: discount,
                    });
                }
            }

            if !promotion.stackable {
                break;
            }
        }

        DiscountResult {
            original_total,
            discounted_total: running_total,
            total_discount: original_total - running_total,
            applied_promotions,
            free_shipping,
        }
    }

    /// Eligible promotions that take part in this calculation, in application order
    ///
    /// A matching promo code brings in its promotion plus every eligible stackable
    /// uncoded promotion. Without a match only uncoded promotions are considered.
    pub fn select<'a>(
        promotions: &'a [Promotion],
        ctx: &CartContext,
        subtotal: Decimal,
        now: DateTime<Utc>,
    ) -> Vec<&'a Promotion> {
        let mut eligible: Vec<&Promotion> = promotions
            .iter()
            .filter(|p| is_promotion_applicable(p, ctx, subtotal, now))
            .collect();
        Self::sort_for_application(&mut eligible);

        let code = ctx
            .promo_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());

        let coded = code.and_then(|code| eligible.iter().copied().find(|p| p.matches_code(code)));

        let mut selected: Vec<&Promotion> = match coded {
            Some(coded) => eligible
                .iter()
                .copied()
                .filter(|p| p.id == coded.id || (!p.is_coded() && p.stackable))
                .collect(),
            None => eligible.into_iter().filter(|p| !p.is_coded()).collect(),
        };
        Self::sort_for_application(&mut selected);
        selected
    }

    /// Sort by priority descending, then creation time ascending, then id
    pub fn sort_for_application(promotions: &mut [&Promotion]) {
        promotions.sort_by(|a, b| application_order(a, b));
    }

    /// Monetary discount one promotion takes off `running_total`
    ///
    /// Rounded to cents and never more than the running total.
    pub fn discount_for(promotion: &Promotion, running_total: Decimal, items: &[CartItem]) -> Decimal {
        if running_total <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let raw = match promotion.promotion_type {
            PromotionType::Percentage => running_total
                .checked_mul(promotion.value / Decimal::ONE_HUNDRED)
                .unwrap_or(running_total),
            PromotionType::Fixed => promotion.value.min(running_total),
            PromotionType::BuyXGetY => {
                let rule = promotion.buy_x_get_y_rule();
                buy_x_get_y_discount(items, rule.buy_quantity, rule.get_quantity)
            }
            PromotionType::FreeShipping => Decimal::ZERO,
        };

        round_money(raw).max(Decimal::ZERO).min(running_total)
    }
}

fn application_order(a: &Promotion, b: &Promotion) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Value of the free units: floor(total_qty / (buy + get)) × get, cheapest units first
fn buy_x_get_y_discount(items: &[CartItem], buy: u32, get: u32) -> Decimal {
    let group = u64::from(buy) + u64::from(get);
    if group == 0 {
        return Decimal::ZERO;
    }

    let total_quantity: u64 = items.iter().map(|i| u64::from(i.quantity)).sum();
    let mut free_remaining = (total_quantity / group) * u64::from(get);

    let mut lines: Vec<(Decimal, u64)> = items
        .iter()
        .map(|i| (i.unit_price, u64::from(i.quantity)))
        .collect();
    lines.sort_by(|a, b| a.0.cmp(&b.0));

    let mut discount = Decimal::ZERO;
    for (price, quantity) in lines {
        if free_remaining == 0 {
            break;
        }
        let take = quantity.min(free_remaining);
        discount = discount.saturating_add(price.saturating_mul(Decimal::from(take)));
        free_remaining -= take;
    }
    discount
}
