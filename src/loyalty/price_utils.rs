// Product price helpers used when turning order lines into points inputs

use rust_decimal::Decimal;

/// A product counts as discounted when its sale price or current price is below the original
pub fn is_discounted_product(
    price: Decimal,
    original_price: Option<Decimal>,
    sale_price: Option<Decimal>,
) -> bool {
    let original = match original_price {
        Some(original) if original > Decimal::ZERO => original,
        _ => return false,
    };

    if let Some(sale) = sale_price {
        if sale > Decimal::ZERO && sale < original {
            return true;
        }
    }

    price < original
}
