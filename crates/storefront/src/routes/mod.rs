//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                       - Home page (flash sales, new arrivals)
//! GET  /health                 - Health check
//!
//! # Products
//! GET  /products               - Product listing (?page, ?category, ?q, ?sort)
//! GET  /products/{id}          - Product detail
//!
//! # Cart (HTMX fragments when HX-Request is set)
//! GET  /cart                   - Cart page
//! POST /cart/add               - Add to cart (triggers cart-updated)
//! POST /cart/update            - Update quantity
//! POST /cart/remove            - Remove line
//! POST /cart/clear             - Empty the cart
//! POST /cart/coupon            - Apply coupon
//! POST /cart/coupon/remove     - Remove coupon
//! GET  /cart/count             - Cart count badge (fragment)
//!
//! # Favorites
//! GET  /favorites              - Favorites page
//! POST /favorites/toggle       - Toggle a product (heart fragment)
//! POST /favorites/remove       - Remove a product
//!
//! # Checkout
//! GET  /checkout               - Checkout form
//! POST /checkout               - Place order (multipart, payment receipt)
//! GET  /checkout/address-search - Address suggestions fragment
//! GET  /checkout/shipping      - Shipping and totals fragment
//!
//! # Orders
//! GET  /orders                 - Order history (auth)
//! GET  /orders/{id}            - Order detail (auth)
//! POST /orders/{id}/cancel     - Cancel order (auth)
//! GET  /orders/{number}/confirmation - Confirmation page (order number)
//! GET  /track                  - Public order tracking
//!
//! # Auth
//! GET  /auth/login             - Login page
//! POST /auth/login             - Login action
//! GET  /auth/register          - Register page
//! POST /auth/register          - Register action
//! POST /auth/logout            - Logout action
//!
//! # Account (requires auth)
//! GET  /account                - Profile and recent orders
//! POST /account                - Update profile
//! POST /account/password       - Change password
//!
//! # JSON API
//! GET  /api/cart, /api/offers, /api/favorites
//! GET  /api/address-search?q=, /api/shipping?governorate=
//! ```

pub mod account;
pub mod api;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod favorites;
pub mod home;
pub mod orders;
pub mod products;

use axum::{
    Router,
    extract::{DefaultBodyLimit, Request},
    http::HeaderMap,
    routing::{get, post},
};
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::middleware::{
    api_rate_limiter, auth_rate_limiter, checkout_rate_limiter, create_session_layer,
    request_id_middleware,
};
use crate::models::CurrentCustomer;
use crate::services::checkout::MAX_PROOF_BYTES;
use crate::state::AppState;

/// Layout data every full page needs.
#[derive(Debug, Clone, Default)]
pub struct Shell {
    /// Display name of the signed-in customer
    pub customer_name: Option<String>,
}

impl Shell {
    #[must_use]
    pub fn new(customer: Option<&CurrentCustomer>) -> Self {
        Self {
            customer_name: customer.map(|c| c.user.display_name()),
        }
    }
}

/// Whether the request came from HTMX and expects a fragment.
#[must_use]
pub fn is_htmx(headers: &HeaderMap) -> bool {
    headers
        .get("hx-request")
        .is_some_and(|value| value.as_bytes() == b"true")
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    let limited = Router::new()
        .route("/login", post(auth::login))
        .route("/register", post(auth::register))
        .layer(auth_rate_limiter());

    Router::new()
        .route("/login", get(auth::login_page))
        .route("/register", get(auth::register_page))
        .route("/logout", post(auth::logout))
        .merge(limited)
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{id}", get(products::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/clear", post(cart::clear))
        .route("/coupon", post(cart::apply_coupon))
        .route("/coupon/remove", post(cart::remove_coupon))
        .route("/count", get(cart::count))
}

/// Create the favorites routes router.
pub fn favorite_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(favorites::index))
        .route("/toggle", post(favorites::toggle))
        .route("/remove", post(favorites::remove))
}

/// Create the checkout routes router.
///
/// The order submission carries the payment receipt, so its body limit is
/// raised above the receipt size cap.
pub fn checkout_routes() -> Router<AppState> {
    let submit = Router::new()
        .route("/", post(checkout::submit))
        .layer(DefaultBodyLimit::max(MAX_PROOF_BYTES + 1024 * 1024))
        .layer(checkout_rate_limiter());

    Router::new()
        .route("/", get(checkout::show))
        .route("/address-search", get(checkout::address_search))
        .route("/shipping", get(checkout::shipping))
        .merge(submit)
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{id}", get(orders::show))
        .route("/{id}/cancel", post(orders::cancel))
        .route("/{id}/confirmation", get(orders::confirmation))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(account::index).post(account::update_profile))
        .route("/password", post(account::change_password))
}

/// Create the JSON API router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/cart", get(api::cart))
        .route("/offers", get(api::offers))
        .route("/favorites", get(api::favorites))
        .route("/address-search", get(api::address_search))
        .route("/shipping", get(api::shipping))
        .layer(api_rate_limiter())
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .route("/health", get(home::health))
        .route("/track", get(orders::track))
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .nest("/favorites", favorite_routes())
        .nest("/checkout", checkout_routes())
        .nest("/orders", order_routes())
        .nest("/account", account_routes())
        .nest("/auth", auth_routes())
        .nest("/api", api_routes())
}

/// The complete application with sessions, tracing and Sentry.
///
/// The server must be run with
/// `into_make_service_with_connect_info::<SocketAddr>()` so rate limiting can
/// fall back to the peer address.
pub fn app(state: AppState) -> Router {
    let session_layer = create_session_layer(state.config());

    Router::new()
        .merge(routes())
        .nest_service(
            "/static",
            ServeDir::new(concat!(env!("CARGO_MANIFEST_DIR"), "/static")),
        )
        .layer(session_layer)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            tracing::info_span!(
                "request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = tracing::field::Empty,
            )
        }))
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
