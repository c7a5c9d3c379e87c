//! Checkout, sign-in and token refresh flows against the fake backend.

use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};

use stride_integration_tests::{CartLine, RefreshMode, SNEAKER_ID, SNEAKER_SIZE_42, TestApp};

async fn add_sneakers(app: &TestApp, quantity: &str) {
    let response = app
        .post_form(
            "/cart/add",
            &[
                ("product_id", &SNEAKER_ID.to_string()),
                ("variant_id", &SNEAKER_SIZE_42.to_string()),
                ("quantity", quantity),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

fn delivery_form(payment_method: &'static str) -> Form {
    Form::new()
        .text("full_name", "Mona Adel")
        .text("phone", "0100 123 4567")
        .text("email", "mona@example.com")
        .text("governorate", "giza")
        .text("city", "Dokki")
        .text("address", "12 Tahrir Street, 3rd floor")
        .text("payment_method", payment_method)
}

#[tokio::test]
async fn test_cash_on_delivery_checkout_places_order() {
    let app = TestApp::spawn().await;
    add_sneakers(&app, "2").await;

    let response = app
        .post_multipart("/checkout", delivery_form("cash_on_delivery"))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.url().path(), "/orders/STR-1001/confirmation");
    let page = response.text().await.unwrap_or_default();
    assert!(page.contains("STR-1001"), "page was {page}");

    let orders = app.backend.placed_orders();
    assert_eq!(orders.len(), 1);
    let order = &orders[0];
    assert!(!order.signed_in);
    assert!(order.proof.is_none());
    assert_eq!(order.fields["payment_method"], "cash_on_delivery");
    assert_eq!(order.fields["governorate_id"], "giza");
    assert!(order.fields["shipping_address"].contains("Dokki"));
    let items = order.items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].quantity, 2);

    let cart = app.get_json("/api/cart").await;
    assert_eq!(cart["item_count"], 0);
}

#[tokio::test]
async fn test_wallet_checkout_uploads_receipt() {
    let app = TestApp::spawn().await;
    add_sneakers(&app, "1").await;

    let receipt = Part::bytes(vec![0x89, b'P', b'N', b'G', 0, 1, 2, 3])
        .file_name("receipt.png")
        .mime_str("image/png")
        .unwrap_or_else(|e| panic!("mime: {e}"));
    let form = delivery_form("vodafone_cash")
        .text("sender_phone", "01112345678")
        .part("payment_proof", receipt);

    let response = app.post_multipart("/checkout", form).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.url().path(), "/orders/STR-1001/confirmation");

    let orders = app.backend.placed_orders();
    let proof = orders[0]
        .proof
        .as_ref()
        .unwrap_or_else(|| panic!("receipt was not forwarded"));
    assert_eq!(proof.file_name, "receipt.png");
    assert_eq!(proof.content_type, "image/png");
    assert_eq!(proof.size, 8);
    assert_eq!(orders[0].fields["sender_phone"], "01112345678");
}

#[tokio::test]
async fn test_invalid_checkout_keeps_cart() {
    let app = TestApp::spawn().await;
    add_sneakers(&app, "1").await;

    let form = Form::new()
        .text("full_name", "Mo")
        .text("phone", "12345")
        .text("governorate", "giza")
        .text("city", "Dokki")
        .text("address", "short")
        .text("payment_method", "instapay");
    let response = app.post_multipart("/checkout", form).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let page = response.text().await.unwrap_or_default();
    assert!(page.contains("data-first-error=\"full_name\""), "page was {page}");

    assert!(app.backend.placed_orders().is_empty());
    assert_eq!(app.get_json("/api/cart").await["item_count"], 1);
}

#[tokio::test]
async fn test_confirmation_is_limited_to_the_ordering_session() {
    let app = TestApp::spawn().await;
    add_sneakers(&app, "1").await;
    let response = app
        .post_multipart("/checkout", delivery_form("cash_on_delivery"))
        .await;
    assert_eq!(response.url().path(), "/orders/STR-1001/confirmation");
    assert_eq!(response.status(), StatusCode::OK);

    let guest = app.another_visitor();
    let response = guest.get("/orders/STR-1001/confirmation").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let customer = app.another_visitor();
    assert_eq!(customer.sign_in().await.url().path(), "/account");
    let response = customer.get("/orders/STR-1001/confirmation").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_sign_in_merges_guest_cart_and_favorites() {
    let app = TestApp::spawn().await;
    add_sneakers(&app, "2").await;
    let response = app
        .post_htmx("/favorites/toggle", &[("product_id", &SNEAKER_ID.to_string())])
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.sign_in().await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.url().path(), "/account");

    assert_eq!(
        app.backend.merged_cart(),
        vec![CartLine {
            product_id: SNEAKER_ID,
            variant_id: Some(SNEAKER_SIZE_42),
            quantity: 2,
        }]
    );
    assert_eq!(app.backend.merged_favorites(), vec![SNEAKER_ID]);

    // The cart is now the account cart held by the backend
    let cart = app.get_json("/api/cart").await;
    assert_eq!(cart["item_count"], 2);
    assert_eq!(cart["lines"][0]["id"], "1");

    // Nothing left to merge on a second sign-in
    app.sign_in().await;
    assert_eq!(app.backend.merged_cart().len(), 1);
    assert_eq!(app.backend.merged_favorites().len(), 1);
}

#[tokio::test]
async fn test_expiring_token_is_refreshed_and_rotated() {
    let app = TestApp::spawn().await;
    app.backend.use_short_lived_tokens();

    let response = app.sign_in().await;
    assert_eq!(response.url().path(), "/account");
    let response = app.get("/account").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.url().path(), "/account");

    assert_eq!(app.backend.refresh_tokens(), vec!["refresh-1", "refresh-2"]);
}

#[tokio::test]
async fn test_throttled_refresh_keeps_customer_signed_in() {
    let app = TestApp::spawn().await;
    app.backend.use_short_lived_tokens();
    app.backend.set_refresh_mode(RefreshMode::RateLimited);

    let response = app.sign_in().await;
    assert_eq!(response.url().path(), "/account");
    let response = app.get("/account").await;
    assert_eq!(response.url().path(), "/account");
    assert_eq!(app.backend.refresh_tokens().len(), 2);
}

#[tokio::test]
async fn test_rejected_refresh_signs_customer_out() {
    let app = TestApp::spawn().await;
    app.backend.use_short_lived_tokens();
    app.backend.set_refresh_mode(RefreshMode::Reject);

    let response = app.sign_in().await;
    assert!(response.url().path().starts_with("/auth/login"));
    assert_eq!(response.url().query(), Some("next=%2Faccount"));

    let response = app.get("/account").await;
    assert!(response.url().path().starts_with("/auth/login"));
    assert_eq!(app.backend.refresh_tokens(), vec!["refresh-1"]);
}

#[tokio::test]
async fn test_order_history_forwards_page() {
    let app = TestApp::spawn().await;
    app.sign_in().await;

    let response = app.get("/orders?page=2").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.url().path(), "/orders");

    let pages = app.backend.order_pages();
    assert_eq!(pages.last(), Some(&Some("2".to_string())));
}
