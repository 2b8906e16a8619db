// Product Import
//
// Maps EasyStore product exports onto product drafts. Rows sharing a Handle
// are one product; each row contributes a variant. Prices in the export are
// TWD and are converted to USD for the draft.

use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use validator::Validate;

use crate::import::csv::{parse_csv, CsvDocument, CsvRecord};
use crate::import::error::ImportResult;
use crate::models::round_money;

const TWD_PER_USD: i64 = 32;
const IMAGE_COLUMNS: usize = 12;
const COLLECTION_COLUMNS: usize = 3;
const OPTION_COLUMNS: usize = 3;
const DRAFT_MAX_CATEGORIES: usize = 5;
const DRAFT_MAX_IMAGES: usize = 5;
const PREVIEW_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantOption {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedVariant {
    pub sku: String,
    pub barcode: String,
    pub price: Decimal,
    pub compare_at_price: Decimal,
    pub inventory: i64,
    pub options: Vec<VariantOption>,
}

impl ImportedVariant {
    fn from_record(record: &CsvRecord) -> Self {
        let options = (1..=OPTION_COLUMNS)
            .filter_map(|i| {
                let value = record.get(&format!("Option{} Value", i))?;
                Some(VariantOption {
                    name: record
                        .get(&format!("Option{} Name", i))
                        .unwrap_or_default()
                        .to_string(),
                    value: value.to_string(),
                })
            })
            .collect();

        Self {
            sku: record.text(&["SKU"]),
            barcode: record.text(&["Barcode"]),
            price: record.decimal(&["Price"]),
            compare_at_price: record.decimal(&["Compare At Price"]),
            inventory: parse_quantity(record.get("Inventory")),
            options,
        }
    }
}

/// Export rows for one handle folded together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedProduct {
    pub handle: String,
    pub title: String,
    pub description_html: Option<String>,
    pub images: Vec<String>,
    pub collections: Vec<String>,
    pub tags: String,
    pub brand: String,
    pub published: bool,
    pub variants: Vec<ImportedVariant>,
}

impl MergedProduct {
    /// Product-level fields come from the first row of a handle
    fn from_first_row(handle: &str, record: &CsvRecord) -> Self {
        let images = (1..=IMAGE_COLUMNS)
            .filter_map(|i| record.get(&format!("Image{}", i)))
            .filter(|url| url.starts_with("http"))
            .map(str::to_string)
            .collect();

        let collections = (1..=COLLECTION_COLUMNS)
            .filter_map(|i| record.get(&format!("Collection{}", i)))
            .map(str::to_string)
            .collect();

        Self {
            handle: handle.to_string(),
            title: record.first_of(&["Title"]).unwrap_or(handle).to_string(),
            description_html: record.get("Body (HTML)").map(str::to_string),
            images,
            collections,
            tags: record.text(&["Tags"]),
            brand: record.text(&["Brands"]),
            published: record
                .get("Published")
                .map(|v| v.eq_ignore_ascii_case("yes"))
                .unwrap_or(false),
            variants: Vec::new(),
        }
    }

    /// Price of the first variant, in TWD
    pub fn list_price(&self) -> Decimal {
        self.variants
            .first()
            .map(|v| v.price)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn to_draft(&self, vendor_id: &str, cleaner: &HtmlCleaner) -> ProductDraft {
        let (price_in_usd, inventory) = if self.variants.is_empty() {
            (None, None)
        } else {
            (
                Some(convert_to_usd(self.list_price())),
                Some(self.variants.iter().map(|v| v.inventory).sum()),
            )
        };

        ProductDraft {
            slug: self.handle.clone(),
            title: self.title.clone(),
            vendor_id: vendor_id.to_string(),
            price_in_usd,
            inventory,
            description: self
                .description_html
                .as_deref()
                .map(|html| cleaner.paragraphs(html))
                .unwrap_or_default(),
            categories: self
                .collections
                .iter()
                .take(DRAFT_MAX_CATEGORIES)
                .cloned()
                .collect(),
            images: self.images.iter().take(DRAFT_MAX_IMAGES).cloned().collect(),
            enable_variants: self.variants.len() > 1,
            status: if self.published {
                ProductStatus::Published
            } else {
                ProductStatus::Draft
            },
        }
    }
}

/// Group export rows by Handle, keeping first-seen order
pub fn merge_rows_to_products(rows: &[CsvRecord]) -> Vec<MergedProduct> {
    let mut products: Vec<MergedProduct> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in rows {
        let Some(handle) = record.get("Handle") else {
            continue;
        };

        let position = match index.get(handle) {
            Some(&position) => position,
            None => {
                products.push(MergedProduct::from_first_row(handle, record));
                index.insert(handle.to_string(), products.len() - 1);
                products.len() - 1
            }
        };

        products[position]
            .variants
            .push(ImportedVariant::from_record(record));
    }

    products
}

/// Converts export HTML into plain text paragraphs
pub struct HtmlCleaner {
    breaks: Regex,
    tags: Regex,
}

impl HtmlCleaner {
    pub fn new() -> ImportResult<Self> {
        Ok(Self {
            breaks: Regex::new(r"(?i)</p>|<br\s*/?>")?,
            tags: Regex::new(r"<[^>]*>")?,
        })
    }

    pub fn paragraphs(&self, html: &str) -> Vec<String> {
        if html.trim().is_empty() {
            return Vec::new();
        }

        let decoded = html
            .replace("&nbsp;", " ")
            .replace("&amp;", "&")
            .replace("&lt;", "<")
            .replace("&gt;", ">");

        let mut paragraphs: Vec<String> = self
            .breaks
            .split(&decoded)
            .map(|p| self.tags.replace_all(p, "").trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        if paragraphs.is_empty() {
            let plain = self.tags.replace_all(html, "").trim().to_string();
            if !plain.is_empty() {
                paragraphs.push(plain);
            }
        }
        paragraphs
    }
}

pub fn html_to_paragraphs(html: &str) -> ImportResult<Vec<String>> {
    Ok(HtmlCleaner::new()?.paragraphs(html))
}

/// TWD to USD at the fixed store rate, rounded to cents
pub fn convert_to_usd(twd: Decimal) -> Decimal {
    round_money(twd / Decimal::from(TWD_PER_USD))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    Published,
    Draft,
}

/// Product ready to be written to the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDraft {
    pub slug: String,
    pub title: String,
    pub vendor_id: String,
    pub price_in_usd: Option<Decimal>,
    pub inventory: Option<i64>,
    pub description: Vec<String>,
    pub categories: Vec<String>,
    pub images: Vec<String>,
    pub enable_variants: bool,
    pub status: ProductStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlannedAction {
    Create,
    Update,
    Skip,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedProduct {
    pub action: PlannedAction,
    pub draft: ProductDraft,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductImportPlan {
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub products: Vec<PlannedProduct>,
}

/// Decide per product whether it is created, updated or skipped
pub fn plan_product_import(
    products: &[MergedProduct],
    existing_slugs: &HashSet<String>,
    vendor_id: &str,
    skip_existing: bool,
) -> ImportResult<ProductImportPlan> {
    let cleaner = HtmlCleaner::new()?;
    let mut plan = ProductImportPlan {
        total: products.len(),
        created: 0,
        updated: 0,
        skipped: 0,
        products: Vec::with_capacity(products.len()),
    };

    for product in products {
        let action = match (existing_slugs.contains(&product.handle), skip_existing) {
            (true, true) => {
                plan.skipped += 1;
                PlannedAction::Skip
            }
            (true, false) => {
                plan.updated += 1;
                PlannedAction::Update
            }
            (false, _) => {
                plan.created += 1;
                PlannedAction::Create
            }
        };

        plan.products.push(PlannedProduct {
            action,
            draft: product.to_draft(vendor_id, &cleaner),
        });
    }

    tracing::info!(
        "Planned product import: {} created, {} updated, {} skipped",
        plan.created,
        plan.updated,
        plan.skipped
    );

    Ok(plan)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub handle: String,
    pub title: String,
    pub variant_count: usize,
    pub image_count: usize,
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPreview {
    pub row_count: usize,
    pub product_count: usize,
    pub products: Vec<ProductSummary>,
}

pub fn preview_product_import(document: &CsvDocument) -> ProductPreview {
    let products = merge_rows_to_products(&document.rows);

    ProductPreview {
        row_count: document.rows.len(),
        product_count: products.len(),
        products: products
            .iter()
            .take(PREVIEW_LIMIT)
            .map(|p| ProductSummary {
                handle: p.handle.clone(),
                title: p.title.clone(),
                variant_count: p.variants.len(),
                image_count: p.images.len(),
                price: p.list_price(),
            })
            .collect(),
    }
}

/// Parse a product export; the Handle column is required
pub fn parse_product_export(input: &str) -> ImportResult<CsvDocument> {
    let document = parse_csv(input)?;
    document.require_column("Handle")?;
    Ok(document)
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProductPreviewRequest {
    #[validate(length(min = 1))]
    pub csv: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProductImportRequest {
    #[validate(length(min = 1))]
    pub csv: String,
    #[validate(length(min = 1))]
    pub vendor_id: String,
    #[serde(default = "default_skip_existing")]
    pub skip_existing: bool,
    /// Slugs already in the catalog
    #[serde(default)]
    pub existing_slugs: Vec<String>,
}

fn default_skip_existing() -> bool {
    true
}

fn parse_quantity(value: Option<&str>) -> i64 {
    value
        .and_then(|v| {
            v.parse::<i64>()
                .ok()
                .or_else(|| Decimal::from_str(v).ok().and_then(|d| d.trunc().to_i64()))
        })
        .unwrap_or(0)
}
