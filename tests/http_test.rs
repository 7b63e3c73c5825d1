mod common;

use axum::http::StatusCode;
use catalog_facets::entities::AttributeType;
use common::{attrs, item_input, variant_input, TestApp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;

async fn seeded() -> TestApp {
    let app = TestApp::new().await;
    let laptops = app.category("Laptops", "laptops", None).await;
    let dell = app.brand("Dell").await;
    app.bound_attribute(laptops.id, "ram", AttributeType::Int, true, 1).await;

    let mut xps = item_input("Dell XPS 13", laptops.id);
    xps.brand_id = Some(dell.id);
    xps.attributes = attrs(&[("ram", json!(16))]);
    xps.variants = vec![variant_input("XPS-1", dec!(1500), None)];
    app.create_item(xps).await;
    app
}

#[tokio::test]
async fn health_reports_database_status() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["database"], "healthy");
}

#[tokio::test]
async fn items_endpoint_accepts_repeated_filter_keys() {
    let app = seeded().await;

    let (status, body) = app
        .get("/api/v1/catalog/items?category=laptops&brand=hp&brand=dell&attr_ram_min=8")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_count"], 1);
    assert_eq!(body["items"][0]["slug"], "dell-xps-13");
    let price: Decimal = body["items"][0]["price_from"]
        .as_str()
        .and_then(|p| p.parse().ok())
        .expect("price_from should be a decimal string");
    assert_eq!(price, dec!(1500));
}

#[tokio::test]
async fn unknown_category_maps_to_404() {
    let app = seeded().await;
    let (status, _) = app.get("/api/v1/catalog/items?category=missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get("/api/v1/catalog/filters?category=missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn filters_endpoint_returns_option_sets() {
    let app = seeded().await;
    let (status, body) = app.get("/api/v1/catalog/filters?category=laptops").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["brands"][0]["slug"], "dell");
    assert_eq!(body["attributes_for_item"][0]["code"], "ram");
    assert_eq!(body["attributes_for_item"][0]["type"], "int");
}

#[tokio::test]
async fn item_detail_and_missing_item() {
    let app = seeded().await;
    let (status, body) = app.get("/api/v1/catalog/items/dell-xps-13").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["specs"][0]["value"], "16");

    let (status, _) = app.get("/api/v1/catalog/items/nothing-here").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn categories_reject_non_numeric_level() {
    let app = seeded().await;
    let (status, _) = app.get("/api/v1/catalog/categories?level=top").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.get("/api/v1/catalog/categories").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["slug"], "laptops");
}

#[tokio::test]
async fn admin_item_creation_reports_missing_attributes() {
    let app = seeded().await;
    let (status, body) = app
        .send_json(
            "POST",
            "/api/v1/catalog/admin/items",
            json!({ "name": "Bare", "category_id": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.to_string().contains("ram"));

    let (status, body) = app
        .send_json(
            "POST",
            "/api/v1/catalog/admin/items",
            json!({
                "name": "Complete",
                "category_id": 1,
                "attributes": { "attr_ram": "32" },
                "variants": [{ "sku": "CMP-1", "base_price": "999.90" }]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["item"]["slug"], "complete");
}

#[tokio::test]
async fn admin_attribute_write_returns_outcome() {
    let app = seeded().await;
    let (status, body) = app
        .send_json(
            "PUT",
            "/api/v1/catalog/admin/items/1/attributes",
            json!({ "ram": 16 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["unchanged"], json!(["ram"]));

    let (status, _) = app
        .send_json(
            "PUT",
            "/api/v1/catalog/admin/items/999/attributes",
            json!({ "ram": 16 }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/api-docs/openapi.json").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/api/v1/catalog/items"].is_object());
}
