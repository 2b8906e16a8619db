// Order Import
//
// Column mappings for order exports from EasyStore and Shopify. Mapping is
// pure; the report says what a write would do against the known order ids.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use validator::Validate;

use crate::import::csv::{CsvDocument, CsvRecord};
use crate::import::products::PlannedAction;
use crate::models::OrderStatus;

const DEFAULT_CURRENCY: &str = "TWD";
const DEFAULT_COUNTRY: &str = "TW";
/// Spreadsheet row number of the first data row (row 1 is the header)
const FIRST_DATA_ROW: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportSource {
    #[default]
    Easystore,
    Shopify,
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub first_name: String,
    pub last_name: String,
    pub line1: String,
    pub line2: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub phone: String,
}

impl ShippingAddress {
    fn present(self) -> Option<Self> {
        if self.line1.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}

/// An external order in internal shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedOrder {
    pub external_order_id: String,
    pub order_number: Option<String>,
    pub customer_email: Option<String>,
    /// Order total in cents of `currency`, `None` when it does not fit
    pub amount_cents: Option<i64>,
    pub currency: String,
    pub status: OrderStatus,
    pub shipping_address: Option<ShippingAddress>,
    /// Line items as they appeared in the export
    pub external_items: Vec<Value>,
    pub created_at: Option<String>,
    pub imported_from: ImportSource,
}

/// Whole-unit amount to integer cents, `None` when out of range
pub fn to_cents(amount: Decimal) -> Option<i64> {
    amount
        .checked_mul(Decimal::ONE_HUNDRED)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

fn optional(value: Option<&str>) -> Option<String> {
    value.map(str::to_string)
}

fn easystore_status(raw: &str) -> OrderStatus {
    let raw = raw.to_lowercase();
    let paid = raw.contains("paid") && !raw.contains("unpaid");

    if paid || raw.contains("已付款") || raw.contains("completed") {
        OrderStatus::Completed
    } else if raw.contains("refund") || raw.contains("退款") {
        OrderStatus::Refunded
    } else if raw.contains("cancel") || raw.contains("取消") {
        OrderStatus::Cancelled
    } else {
        OrderStatus::Processing
    }
}

fn shopify_status(raw: &str) -> OrderStatus {
    match raw.to_lowercase().as_str() {
        "paid" => OrderStatus::Completed,
        "refunded" => OrderStatus::Refunded,
        "voided" => OrderStatus::Cancelled,
        _ => OrderStatus::Processing,
    }
}

fn quantity(record: &CsvRecord, columns: &[&str]) -> i64 {
    record
        .first_of(columns)
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(1)
}

/// Items column holds JSON; anything else becomes a single item built from the row
fn easystore_items(record: &CsvRecord) -> Vec<Value> {
    let Some(raw) = record.first_of(&["Items", "Line Items"]) else {
        return Vec::new();
    };

    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => items,
        Ok(item) => vec![item],
        Err(_) => vec![json!({
            "name": record.text(&["Product", "商品名稱"]),
            "sku": record.text(&["SKU", "商品編號"]),
            "quantity": quantity(record, &["Quantity", "數量"]),
            "price": record.decimal(&["Price", "單價"]),
        })],
    }
}

pub fn map_easystore_order(record: &CsvRecord) -> MappedOrder {
    let external_order_id = record.text(&["Order ID", "訂單編號", "id"]);
    let order_number = record
        .first_of(&["Order Number", "訂單號", "order_number"])
        .map(str::to_string)
        .or_else(|| Some(external_order_id.clone()).filter(|id| !id.is_empty()));

    let shipping_address = ShippingAddress {
        first_name: record.text(&["Shipping First Name", "收件人名", "First Name"]),
        last_name: record.text(&["Shipping Last Name", "收件人姓", "Last Name"]),
        line1: record.text(&["Shipping Address1", "收件地址1", "Address"]),
        line2: record.text(&["Shipping Address2", "收件地址2"]),
        city: record.text(&["Shipping City", "城市"]),
        state: record.text(&["Shipping State", "縣市", "Province"]),
        postal_code: record.text(&["Shipping Zip", "郵遞區號", "Postal Code"]),
        country: record
            .first_of(&["Shipping Country", "國家"])
            .unwrap_or(DEFAULT_COUNTRY)
            .to_string(),
        phone: record.text(&["Shipping Phone", "電話", "Phone"]),
    };

    MappedOrder {
        external_order_id,
        order_number,
        customer_email: optional(record.first_of(&["Email", "email", "客戶信箱"])),
        amount_cents: to_cents(record.decimal(&["Total", "總金額", "total_price"])),
        currency: record
            .first_of(&["Currency", "幣別"])
            .unwrap_or(DEFAULT_CURRENCY)
            .to_string(),
        status: easystore_status(&record.text(&["Financial Status", "付款狀態", "Status"])),
        shipping_address: shipping_address.present(),
        external_items: easystore_items(record),
        created_at: optional(record.first_of(&["Created At", "建立時間", "Order Date"])),
        imported_from: ImportSource::Easystore,
    }
}

pub fn map_shopify_order(record: &CsvRecord) -> MappedOrder {
    let external_order_id = record.text(&["Name", "Order ID"]);

    let shipping_name = record.text(&["Shipping Name"]);
    let mut name_parts = shipping_name.split(' ');
    let first_name = name_parts.next().unwrap_or_default().to_string();
    let last_name = name_parts.collect::<Vec<_>>().join(" ");

    let shipping_address = ShippingAddress {
        first_name,
        last_name,
        line1: record.text(&["Shipping Street", "Shipping Address1"]),
        line2: record.text(&["Shipping Address2"]),
        city: record.text(&["Shipping City"]),
        state: record.text(&["Shipping Province"]),
        postal_code: record.text(&["Shipping Zip"]),
        country: record.text(&["Shipping Country"]),
        phone: record.text(&["Shipping Phone"]),
    };

    let item = json!({
        "name": record.text(&["Lineitem name"]),
        "sku": record.text(&["Lineitem sku"]),
        "quantity": quantity(record, &["Lineitem quantity"]),
        "price": record.decimal(&["Lineitem price"]),
    });

    MappedOrder {
        order_number: Some(external_order_id.clone()).filter(|id| !id.is_empty()),
        external_order_id,
        customer_email: optional(record.get("Email")),
        amount_cents: to_cents(record.decimal(&["Total"])),
        currency: record
            .first_of(&["Currency"])
            .unwrap_or(DEFAULT_CURRENCY)
            .to_string(),
        status: shopify_status(&record.text(&["Financial Status"])),
        shipping_address: shipping_address.present(),
        external_items: vec![item],
        created_at: optional(record.get("Created at")),
        imported_from: ImportSource::Shopify,
    }
}

/// Map a row by source; unknown sources use the EasyStore layout
pub fn map_order(record: &CsvRecord, source: ImportSource) -> MappedOrder {
    match source {
        ImportSource::Shopify => map_shopify_order(record),
        ImportSource::Easystore | ImportSource::Other => map_easystore_order(record),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    pub row: usize,
    pub field: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedOrder {
    pub row: usize,
    pub action: PlannedAction,
    pub order: MappedOrder,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderImportReport {
    pub success: bool,
    pub imported: usize,
    pub updated: usize,
    pub errors: Vec<RowError>,
    pub total_rows: usize,
    pub orders: Vec<PlannedOrder>,
}

/// Map every row and decide create or update by external order id
pub fn prepare_order_import(
    rows: &[CsvRecord],
    source: ImportSource,
    existing_ids: &HashSet<String>,
) -> OrderImportReport {
    let mut known: HashSet<String> = existing_ids.clone();
    let mut report = OrderImportReport {
        success: true,
        imported: 0,
        updated: 0,
        errors: Vec::new(),
        total_rows: rows.len(),
        orders: Vec::new(),
    };

    for (i, record) in rows.iter().enumerate() {
        let row = i + FIRST_DATA_ROW;
        let order = map_order(record, source);

        if order.external_order_id.is_empty() {
            report.errors.push(RowError {
                row,
                field: Some("external_order_id".to_string()),
                message: "Missing external order id".to_string(),
            });
            continue;
        }
        if order.amount_cents.is_none() {
            report.errors.push(RowError {
                row,
                field: Some("amount_cents".to_string()),
                message: "Order total is out of range".to_string(),
            });
            continue;
        }

        // Repeats within the same file update the order created by the earlier row
        let action = if known.insert(order.external_order_id.clone()) {
            report.imported += 1;
            PlannedAction::Create
        } else {
            report.updated += 1;
            PlannedAction::Update
        };

        report.orders.push(PlannedOrder { row, action, order });
    }

    report.success = report.errors.is_empty();

    if !report.success {
        tracing::warn!(
            "Order import has {} invalid rows out of {}",
            report.errors.len(),
            report.total_rows
        );
    }

    report
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPreview {
    pub columns: Vec<String>,
    pub preview: Vec<MappedOrder>,
}

pub fn preview_order_import(
    document: &CsvDocument,
    source: ImportSource,
    limit: usize,
) -> OrderPreview {
    OrderPreview {
        columns: document.headers.clone(),
        preview: document
            .rows
            .iter()
            .take(limit)
            .map(|record| map_order(record, source))
            .collect(),
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct OrderPreviewRequest {
    #[validate(length(min = 1))]
    pub csv: String,
    #[serde(default)]
    pub source: ImportSource,
    #[validate(range(min = 1, max = 100))]
    #[serde(default = "default_preview_limit")]
    pub limit: usize,
}

fn default_preview_limit() -> usize {
    5
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct OrderImportRequest {
    #[validate(length(min = 1))]
    pub csv: String,
    #[serde(default)]
    pub source: ImportSource,
    /// External order ids already stored
    #[serde(default)]
    pub existing_order_ids: Vec<String>,
}
