//! Guest cart flows against the fake backend.

use reqwest::StatusCode;

use stride_core::Money;
use stride_integration_tests::{
    COUPON_CODE, COUPON_DISCOUNT_PIASTRES, SNEAKER_ID, SNEAKER_PRICE_PIASTRES, SNEAKER_SIZE_42,
    SNEAKER_SIZE_43, SNEAKER_STOCK, TestApp, money,
};

async fn add_sneakers(app: &TestApp, quantity: &str) -> reqwest::Response {
    app.post_form(
        "/cart/add",
        &[
            ("product_id", &SNEAKER_ID.to_string()),
            ("variant_id", &SNEAKER_SIZE_42.to_string()),
            ("quantity", quantity),
        ],
    )
    .await
}

#[tokio::test]
async fn test_guest_add_updates_count_and_total() {
    let app = TestApp::spawn().await;

    let before = app.get_json("/api/cart").await;
    assert_eq!(before["item_count"], 0);

    let response = add_sneakers(&app, "2").await;
    assert_eq!(response.status(), StatusCode::OK);

    let cart = app.get_json("/api/cart").await;
    assert_eq!(cart["item_count"], 2);
    assert_eq!(cart["lines"].as_array().map(Vec::len), Some(1));
    let expected = Money::from_piastres(SNEAKER_PRICE_PIASTRES).times(2);
    assert_eq!(money(&cart["subtotal"]), expected);
    assert_eq!(money(&cart["total"]), expected);

    let badge = app.get("/cart/count").await.text().await.unwrap_or_default();
    assert!(badge.contains(">2<"), "badge was {badge}");
}

#[tokio::test]
async fn test_adding_same_size_merges_lines() {
    let app = TestApp::spawn().await;

    add_sneakers(&app, "1").await;
    add_sneakers(&app, "2").await;

    let cart = app.get_json("/api/cart").await;
    assert_eq!(cart["lines"].as_array().map(Vec::len), Some(1));
    assert_eq!(cart["item_count"], 3);
}

#[tokio::test]
async fn test_sold_out_size_is_rejected() {
    let app = TestApp::spawn().await;

    let response = app
        .post_form(
            "/cart/add",
            &[
                ("product_id", &SNEAKER_ID.to_string()),
                ("variant_id", &SNEAKER_SIZE_43.to_string()),
                ("quantity", "1"),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let cart = app.get_json("/api/cart").await;
    assert_eq!(cart["item_count"], 0);
}

#[tokio::test]
async fn test_removing_last_item_shows_empty_cart() {
    let app = TestApp::spawn().await;
    add_sneakers(&app, "1").await;

    let cart = app.get_json("/api/cart").await;
    let line_id = cart["lines"][0]["id"].as_str().unwrap_or_default().to_string();
    assert!(!line_id.is_empty());

    let response = app.post_form("/cart/remove", &[("line_id", &line_id)]).await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = response.text().await.unwrap_or_default();
    assert!(page.contains("Your cart is empty."));

    let cart = app.get_json("/api/cart").await;
    assert_eq!(cart["item_count"], 0);
    assert_eq!(money(&cart["total"]), Money::ZERO);
}

#[tokio::test]
async fn test_empty_cart_never_asks_for_offers() {
    let app = TestApp::spawn().await;

    let cart = app.get_json("/api/cart").await;
    assert_eq!(cart["item_count"], 0);
    let offers = app.get_json("/api/offers").await;
    assert_eq!(money(&offers["total"]), Money::ZERO);
    assert_eq!(app.get("/cart").await.status(), StatusCode::OK);

    assert_eq!(app.backend.offer_calls(), 0);
}

#[tokio::test]
async fn test_unchanged_cart_reuses_offer_breakdown() {
    let app = TestApp::spawn().await;
    add_sneakers(&app, "1").await;
    let after_add = app.backend.offer_calls();
    assert!(after_add >= 1);

    app.get_json("/api/cart").await;
    app.get_json("/api/offers").await;
    assert_eq!(app.backend.offer_calls(), after_add);
}

#[tokio::test]
async fn test_adding_beyond_stock_counts_existing_line() {
    let app = TestApp::spawn().await;

    let response = add_sneakers(&app, &SNEAKER_STOCK.to_string()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = add_sneakers(&app, "1").await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let page = response.text().await.unwrap_or_default();
    assert!(page.contains("left in stock"), "page was {page}");

    let cart = app.get_json("/api/cart").await;
    assert_eq!(cart["item_count"], SNEAKER_STOCK);
}

#[tokio::test]
async fn test_updating_beyond_stock_is_rejected() {
    let app = TestApp::spawn().await;
    add_sneakers(&app, "1").await;

    let cart = app.get_json("/api/cart").await;
    let line_id = cart["lines"][0]["id"].as_str().unwrap_or_default().to_string();

    let too_many = (SNEAKER_STOCK + 1).to_string();
    let response = app
        .post_form("/cart/update", &[("line_id", &line_id), ("quantity", &too_many)])
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(app.get_json("/api/cart").await["item_count"], 1);

    let response = app
        .post_form("/cart/update", &[("line_id", &line_id), ("quantity", "3")])
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.get_json("/api/cart").await["item_count"], 3);
}

#[tokio::test]
async fn test_stock_failure_refetches_product() {
    let app = TestApp::spawn().await;
    add_sneakers(&app, &SNEAKER_STOCK.to_string()).await;

    // The storefront still holds the product with the old stock figure
    app.backend.set_sneaker_stock(SNEAKER_STOCK + 2);
    let response = add_sneakers(&app, "1").await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = add_sneakers(&app, "1").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.get_json("/api/cart").await["item_count"], SNEAKER_STOCK + 1);
}

#[tokio::test]
async fn test_failed_offer_calculation_is_not_retried() {
    let app =
        TestApp::spawn_with(&[("BACKEND_MAX_RETRIES", "3"), ("BACKEND_RETRY_BASE_MS", "1")]).await;
    app.backend.fail_offers();

    let response = add_sneakers(&app, "2").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.backend.offer_calls(), 1);

    let cart = app.get_json("/api/cart").await;
    let subtotal = Money::from_piastres(SNEAKER_PRICE_PIASTRES).times(2);
    assert_eq!(money(&cart["subtotal"]), subtotal);
    assert_eq!(money(&cart["total"]), subtotal);
    assert_eq!(app.backend.offer_calls(), 2);
}

#[tokio::test]
async fn test_coupon_is_refused_when_offers_block_it() {
    let app = TestApp::spawn().await;
    app.backend.block_coupons("Flash sale prices exclude coupons.");
    add_sneakers(&app, "1").await;

    let offers = app.get_json("/api/offers").await;
    assert_eq!(offers["coupons_blocked"], true);

    let response = app.post_form("/cart/coupon", &[("code", COUPON_CODE)]).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let page = response.text().await.unwrap_or_default();
    assert!(page.contains("Flash sale prices exclude coupons."), "page was {page}");

    assert_eq!(app.backend.coupon_checks(), 0);
    assert!(app.get_json("/api/cart").await["coupon"].is_null());
}

#[tokio::test]
async fn test_guest_coupon_reduces_total() {
    let app = TestApp::spawn().await;
    add_sneakers(&app, "1").await;

    let response = app
        .post_form("/cart/coupon", &[("code", &COUPON_CODE.to_lowercase())])
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.backend.coupon_checks(), 1);

    let cart = app.get_json("/api/cart").await;
    assert_eq!(cart["coupon"]["code"], COUPON_CODE);
    let expected = Money::from_piastres(SNEAKER_PRICE_PIASTRES - COUPON_DISCOUNT_PIASTRES);
    assert_eq!(money(&cart["total"]), expected);
}
