// Handler tests for the storefront engine API
// Every test runs against in-memory repositories

use super::*;
use axum::http::StatusCode;
use axum_test::TestServer;
use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::import::ProductImportPlan;
use crate::loyalty::{PointTransaction, PointsBalance};
use crate::promotions::{DiscountResult, Promotion};

// ============================================================================
// Test Helpers
// ============================================================================

fn create_test_server() -> TestServer {
    let state = AppState::in_memory(Arc::new(LoyaltyConfigStore::default()));
    TestServer::new(create_router(state)).unwrap()
}

fn promotion_payload(name: &str, promotion_type: &str, value: &str) -> Value {
    let now = Utc::now();
    json!({
        "name": name,
        "promotion_type": promotion_type,
        "value": value,
        "start_date": (now - Duration::days(1)).to_rfc3339(),
        "end_date": (now + Duration::days(7)).to_rfc3339(),
        "status": "active"
    })
}

async fn create_promotion(server: &TestServer, payload: Value) -> Promotion {
    let response = server.post("/api/promotions").json(&payload).await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    response.json::<Promotion>()
}

fn cart_payload(unit_price: &str, quantity: u32) -> Value {
    json!({
        "items": [
            { "product_id": "oolong", "quantity": quantity, "unit_price": unit_price }
        ]
    })
}

/// Completes an order for a member through the status endpoint
async fn complete_order(server: &TestServer, member_id: Uuid, order_id: &str, amount: &str) -> Value {
    let response = server
        .post("/api/orders/status")
        .json(&json!({
            "order_id": order_id,
            "member_id": member_id,
            "previous_status": "processing",
            "status": "completed",
            "items": [{ "product_id": "oolong", "quantity": 1, "price": amount }],
            "order_amount": amount
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    response.json::<Value>()
}

async fn balance(server: &TestServer, member_id: Uuid) -> PointsBalance {
    let response = server
        .get(&format!("/api/members/{}/points", member_id))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    response.json::<PointsBalance>()
}

// ============================================================================
// Promotion management
// ============================================================================

#[tokio::test]
async fn test_create_and_get_promotion() {
    let server = create_test_server();
    let created = create_promotion(&server, promotion_payload("Spring", "percentage", "10")).await;
    assert_eq!(created.value, dec!(10));
    assert_eq!(created.used_count, 0);

    let response = server
        .get(&format!("/api/promotions/{}", created.id))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Promotion>().name, "Spring");

    let list = server.get("/api/promotions").await.json::<Vec<Promotion>>();
    assert_eq!(list.len(), 1);
}

#[tokio::test]
async fn test_create_promotion_percentage_over_100() {
    let server = create_test_server();
    let response = server
        .post("/api/promotions")
        .json(&promotion_payload("Too much", "percentage", "150"))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body = response.json::<Value>();
    assert_eq!(body["error_code"], "VALIDATION_ERROR");
    assert!(body["details"].is_object());
}

#[tokio::test]
async fn test_create_promotion_duplicate_code() {
    let server = create_test_server();
    let mut payload = promotion_payload("Welcome", "fixed", "5");
    payload["code"] = json!("WELCOME");
    create_promotion(&server, payload.clone()).await;

    payload["code"] = json!("welcome");
    let response = server.post("/api/promotions").json(&payload).await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
    assert_eq!(response.json::<Value>()["error_code"], "CONFLICT");
}

#[tokio::test]
async fn test_get_promotion_not_found() {
    let server = create_test_server();
    let response = server
        .get(&format!("/api/promotions/{}", Uuid::new_v4()))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["error_code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_update_promotion_status() {
    let server = create_test_server();
    let created = create_promotion(&server, promotion_payload("Fixed", "fixed", "10")).await;

    let response = server
        .put(&format!("/api/promotions/{}/status", created.id))
        .json(&json!({ "status": "expired" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    // Expired promotions no longer discount carts
    let result = server
        .post("/api/cart/discount")
        .json(&cart_payload("100", 1))
        .await
        .json::<DiscountResult>();
    assert!(result.applied_promotions.is_empty());
}

// ============================================================================
// Cart pricing
// ============================================================================

#[tokio::test]
async fn test_cart_discount_stacks_until_non_stackable() {
    let server = create_test_server();

    let mut percent = promotion_payload("Ten percent", "percentage", "10");
    percent["stackable"] = json!(true);
    percent["priority"] = json!(10);
    create_promotion(&server, percent).await;

    let mut halt = promotion_payload("Five off", "fixed", "5");
    halt["priority"] = json!(5);
    create_promotion(&server, halt).await;

    let mut never = promotion_payload("Hundred off", "fixed", "100");
    never["stackable"] = json!(true);
    never["priority"] = json!(1);
    create_promotion(&server, never).await;

    let response = server
        .post("/api/cart/discount")
        .json(&cart_payload("100", 2))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let result = response.json::<DiscountResult>();
    assert_eq!(result.original_total, dec!(200));
    assert_eq!(result.total_discount, dec!(25));
    assert_eq!(result.discounted_total, dec!(175));
    let names: Vec<&str> = result
        .applied_promotions
        .iter()
        .map(|p| p.promotion_name.as_str())
        .collect();
    assert_eq!(names, vec!["Ten percent", "Five off"]);
}

#[tokio::test]
async fn test_apply_discount_counts_usage() {
    let server = create_test_server();
    let created = create_promotion(&server, promotion_payload("Fixed", "fixed", "10")).await;

    server
        .post("/api/cart/discount")
        .json(&cart_payload("50", 1))
        .await;
    let promotion = server
        .get(&format!("/api/promotions/{}", created.id))
        .await
        .json::<Promotion>();
    assert_eq!(promotion.used_count, 0);

    let response = server
        .post("/api/cart/discount/apply")
        .json(&cart_payload("50", 1))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let promotion = server
        .get(&format!("/api/promotions/{}", created.id))
        .await
        .json::<Promotion>();
    assert_eq!(promotion.used_count, 1);
}

#[tokio::test]
async fn test_cart_discount_rejects_out_of_range_price() {
    let server = create_test_server();
    create_promotion(&server, promotion_payload("Ten percent", "percentage", "10")).await;

    let response = server
        .post("/api/cart/discount")
        .json(&cart_payload("79228162514264337593543950335", 2))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cart_discount_empty_cart() {
    let server = create_test_server();
    let response = server
        .post("/api/cart/discount")
        .json(&json!({ "items": [] }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Order events and points
// ============================================================================

#[tokio::test]
async fn test_order_completion_awards_points_and_level() {
    let server = create_test_server();
    let member_id = Uuid::new_v4();

    let body = complete_order(&server, member_id, "A-1", "600").await;
    assert_eq!(body["processed"], true);
    assert_eq!(body["outcome"]["points_awarded"], 6);
    assert_eq!(body["outcome"]["level_change"]["new_level"], "silver");

    let balance = balance(&server, member_id).await;
    assert_eq!(balance.balance, 6);
    assert_eq!(balance.member_level.as_deref(), Some("silver"));
    assert_eq!(balance.total_spent, dec!(600));
    assert_eq!(balance.transactions.len(), 1);
}

#[tokio::test]
async fn test_order_completion_is_idempotent() {
    let server = create_test_server();
    let member_id = Uuid::new_v4();

    complete_order(&server, member_id, "A-1", "600").await;
    let replay = complete_order(&server, member_id, "A-1", "600").await;
    assert_eq!(replay["outcome"]["already_processed"], true);
    assert_eq!(replay["outcome"]["points_awarded"], 0);

    let balance = balance(&server, member_id).await;
    assert_eq!(balance.balance, 6);
    assert_eq!(balance.total_spent, dec!(600));
}

#[tokio::test]
async fn test_guest_order_is_not_processed() {
    let server = create_test_server();
    let response = server
        .post("/api/orders/status")
        .json(&json!({
            "order_id": "G-1",
            "status": "completed",
            "order_amount": "300"
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["processed"], false);
}

#[tokio::test]
async fn test_refund_claws_back_points() {
    let server = create_test_server();
    let member_id = Uuid::new_v4();
    complete_order(&server, member_id, "R-1", "1000").await;

    let response = server
        .post("/api/orders/R-1/refund")
        .json(&json!({ "member_id": member_id }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["points_deducted"], 10);

    // A second refund deducts nothing
    let response = server
        .post("/api/orders/R-1/refund")
        .json(&json!({ "member_id": member_id }))
        .await;
    assert_eq!(response.json::<Value>()["points_deducted"], 0);

    assert_eq!(balance(&server, member_id).await.balance, 0);
}

#[tokio::test]
async fn test_adjust_and_redeem_points() {
    let server = create_test_server();
    let member_id = Uuid::new_v4();
    complete_order(&server, member_id, "B-1", "100").await;

    let response = server
        .post(&format!("/api/members/{}/points/adjust", member_id))
        .json(&json!({ "delta": 499, "operator_id": "admin", "reason": "welcome gift" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    assert_eq!(response.json::<PointTransaction>().balance_after, 500);

    let response = server
        .post(&format!("/api/members/{}/points/redeem", member_id))
        .json(&json!({ "points": 200, "order_amount": "1000", "order_id": "B-2" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    assert_eq!(response.json::<PointTransaction>().amount, -200);

    let history = server
        .get(&format!("/api/members/{}/points/history", member_id))
        .await
        .json::<Vec<PointTransaction>>();
    assert_eq!(history.len(), 3);
    assert_eq!(history.last().map(|r| r.balance_after), Some(300));
}

#[tokio::test]
async fn test_redeem_rejections() {
    let server = create_test_server();
    let member_id = Uuid::new_v4();
    complete_order(&server, member_id, "C-1", "1000").await;

    // Balance is 10
    let response = server
        .post(&format!("/api/members/{}/points/redeem", member_id))
        .json(&json!({ "points": 150, "order_amount": "1000" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.json::<Value>()["error_code"], "BUSINESS_RULE_VIOLATION");

    // Below the redemption minimum
    let response = server
        .post(&format!("/api/members/{}/points/redeem", member_id))
        .json(&json!({ "points": 5, "order_amount": "1000" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_unknown_member() {
    let server = create_test_server();
    let member_id = Uuid::new_v4();

    let response = server
        .get(&format!("/api/members/{}/points", member_id))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let response = server
        .post(&format!("/api/members/{}/points/adjust", member_id))
        .json(&json!({ "delta": 10, "operator_id": "admin", "reason": "test" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_adjust_zero_delta_is_invalid() {
    let server = create_test_server();
    let response = server
        .post(&format!("/api/members/{}/points/adjust", Uuid::new_v4()))
        .json(&json!({ "delta": 0, "operator_id": "admin", "reason": "test" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_calculate_points_quote() {
    let server = create_test_server();
    let response = server
        .post(&format!("/api/members/{}/points/calculate", Uuid::new_v4()))
        .json(&json!({
            "items": [
                { "product_id": "a", "quantity": 2, "price": "150" },
                { "product_id": "b", "quantity": 1, "price": "80", "original_price": "100" }
            ]
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let body = response.json::<Value>();
    assert_eq!(body["breakdown"]["regular_items"], 3);
    // 1% of 80 floors to 0
    assert_eq!(body["breakdown"]["discounted_items"], 0);
    assert_eq!(body["total_points"], 3);
}

#[tokio::test]
async fn test_recompute_level() {
    let server = create_test_server();
    let member_id = Uuid::new_v4();
    complete_order(&server, member_id, "L-1", "2500").await;

    let response = server
        .post(&format!("/api/members/{}/level/recompute", member_id))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let body = response.json::<Value>();
    assert_eq!(body["new_level"], "gold");
    assert_eq!(body["changed"], false);
}

// ============================================================================
// Loyalty configuration
// ============================================================================

#[tokio::test]
async fn test_settings_round_trip_and_validation() {
    let server = create_test_server();
    let mut settings = server.get("/api/loyalty/settings").await.json::<Value>();
    assert_eq!(settings["enabled"], true);

    settings["points_per_amount"] = json!("0");
    let response = server.put("/api/loyalty/settings").json(&settings).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    settings["points_per_amount"] = json!("50");
    let response = server.put("/api/loyalty/settings").json(&settings).await;
    assert_eq!(response.status_code(), StatusCode::OK);

    // New earn rate applies to the next order
    let member_id = Uuid::new_v4();
    let body = complete_order(&server, member_id, "S-1", "100").await;
    assert_eq!(body["outcome"]["points_awarded"], 2);
}

#[tokio::test]
async fn test_settings_reject_out_of_range_expiry() {
    let server = create_test_server();
    let mut settings = server.get("/api/loyalty/settings").await.json::<Value>();

    settings["advanced"]["points_expire_days"] = json!(1_000_000_000);
    let response = server.put("/api/loyalty/settings").json(&settings).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    // Orders still complete under the unchanged settings
    let body = complete_order(&server, Uuid::new_v4(), "E-1", "500").await;
    assert_eq!(body["outcome"]["points_awarded"], 5);
}

#[tokio::test]
async fn test_member_levels_update() {
    let server = create_test_server();
    let levels = server.get("/api/member-levels").await.json::<Vec<Value>>();
    assert_eq!(levels.len(), 4);

    let response = server.put("/api/member-levels").json(&json!([])).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let response = server
        .put("/api/member-levels")
        .json(&json!([
            { "code": "bronze", "name": "Bronze", "is_default": true },
            { "code": "gold", "name": "Gold", "order": 1, "min_spent": "300" }
        ]))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let member_id = Uuid::new_v4();
    let body = complete_order(&server, member_id, "M-1", "300").await;
    assert_eq!(body["outcome"]["level_change"]["new_level"], "gold");
}

// ============================================================================
// Imports and metrics
// ============================================================================

#[tokio::test]
async fn test_product_import_preview_and_plan() {
    let server = create_test_server();
    let csv = "Handle,Title,Price,Published\ntea,Green Tea,320,yes\ntea,,340,\nmug,Mug,640,no\n";

    let response = server
        .post("/api/import/products/preview")
        .json(&json!({ "csv": csv }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let preview = response.json::<Value>();
    assert_eq!(preview["row_count"], 3);
    assert_eq!(preview["product_count"], 2);
    assert_eq!(preview["products"][0]["variant_count"], 2);

    let response = server
        .post("/api/import/products/plan")
        .json(&json!({ "csv": csv, "vendor_id": "v1", "existing_slugs": ["mug"] }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let plan = response.json::<ProductImportPlan>();
    assert_eq!(plan.created, 1);
    assert_eq!(plan.skipped, 1);
    assert_eq!(plan.products[0].draft.price_in_usd, Some(dec!(10)));
}

#[tokio::test]
async fn test_product_import_requires_handle_column() {
    let server = create_test_server();
    let response = server
        .post("/api/import/products/preview")
        .json(&json!({ "csv": "Title\nTea\n" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error_code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_order_import_plan() {
    let server = create_test_server();
    let csv = "Name,Total,Financial Status\n#1001,45.99,paid\n,10,paid\n#1002,5,refunded\n";

    let response = server
        .post("/api/import/orders/plan")
        .json(&json!({ "csv": csv, "source": "shopify", "existing_order_ids": ["#1002"] }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let report = response.json::<Value>();
    assert_eq!(report["imported"], 1);
    assert_eq!(report["updated"], 1);
    assert_eq!(report["errors"][0]["row"], 3);
    assert_eq!(report["orders"][0]["order"]["amount_cents"], 4599);

    let response = server
        .post("/api/import/orders/preview")
        .json(&json!({ "csv": csv, "source": "shopify", "limit": 1 }))
        .await;
    assert_eq!(response.json::<Value>()["preview"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let server = create_test_server();
    server
        .post("/api/cart/discount")
        .json(&cart_payload("10", 1))
        .await;
    complete_order(&server, Uuid::new_v4(), "X-1", "100").await;

    let metrics = server.get("/api/metrics").await.json::<Value>();
    assert_eq!(metrics["discount_calculations"]["count"], 1);
    assert_eq!(metrics["points_awards"]["count"], 1);
    assert_eq!(metrics["level_recomputes"]["count"], 1);
}
