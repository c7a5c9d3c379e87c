//! Shipping lookup and sign-in validation against the fake backend.

use reqwest::StatusCode;

use stride_integration_tests::{TestApp, money};
use stride_storefront::geography::Geography;

#[tokio::test]
async fn test_governorate_shipping_uses_dataset_cost() {
    let app = TestApp::spawn().await;
    let geography = Geography::egypt().unwrap_or_else(|e| panic!("dataset: {e}"));

    for id in ["cairo", "giza", "red-sea"] {
        let Some(expected) = geography.shipping_cost(id) else {
            continue;
        };
        let body = app.get_json(&format!("/api/shipping?governorate={id}")).await;
        assert_eq!(body["governorate_id"], id);
        assert_eq!(money(&body["shipping_cost"]), expected);
    }

    let unknown = app.get("/api/shipping?governorate=atlantis").await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_checkout_summary_fragment_shows_shipping() {
    let app = TestApp::spawn().await;
    let geography = Geography::egypt().unwrap_or_else(|e| panic!("dataset: {e}"));
    let cost = geography
        .shipping_cost("giza")
        .unwrap_or_else(|| panic!("giza is in the dataset"));

    let fragment = app
        .get("/checkout/shipping?governorate=giza")
        .await
        .text()
        .await
        .unwrap_or_default();
    assert!(fragment.contains(&cost.to_string()), "fragment was {fragment}");
}

#[tokio::test]
async fn test_address_search_finds_arabic_city() {
    let app = TestApp::spawn().await;

    let hits = app.get_json("/api/address-search?q=%D8%A7%D9%84%D8%AF%D9%82%D9%89").await;
    let hits = hits.as_array().cloned().unwrap_or_default();
    assert!(
        hits.iter().any(|hit| hit["city_en"] == "Dokki"),
        "hits were {hits:?}"
    );
}

#[tokio::test]
async fn test_invalid_login_never_reaches_backend() {
    let app = TestApp::spawn().await;

    let response = app
        .post_form("/auth/login", &[("email", "not-an-email"), ("password", "")])
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let page = response.text().await.unwrap_or_default();
    assert!(page.contains("field-error"));

    assert_eq!(app.backend.login_calls(), 0);
}

#[tokio::test]
async fn test_wrong_password_is_reported() {
    let app = TestApp::spawn().await;

    let response = app
        .post_form(
            "/auth/login",
            &[("email", "mona@example.com"), ("password", "wrong-password")],
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.backend.login_calls(), 1);
}

#[tokio::test]
async fn test_orders_require_sign_in() {
    let app = TestApp::spawn().await;

    let response = app.get("/orders").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.url().path().starts_with("/auth/login"));
    assert_eq!(response.url().query(), Some("next=%2Forders"));
}
