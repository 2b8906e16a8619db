// Import adapters
// Pure mappings from external CSV exports to internal product and order shapes

pub mod csv;
pub mod error;
pub mod handlers;
pub mod orders;
pub mod products;

pub use csv::{parse_csv, CsvDocument, CsvRecord};
pub use error::{ImportError, ImportResult};
pub use orders::{
    map_easystore_order, map_order, map_shopify_order, prepare_order_import,
    preview_order_import, ImportSource, MappedOrder, OrderImportReport,
};
pub use products::{
    convert_to_usd, html_to_paragraphs, merge_rows_to_products, plan_product_import,
    preview_product_import, MergedProduct, ProductDraft, ProductImportPlan, ProductPreview,
};
