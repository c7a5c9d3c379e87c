//! End-to-end test harness for the Stride storefront.
//!
//! Each test spawns two servers on ephemeral ports:
//!
//! - a fake store backend (axum) serving a small catalog, a signed-in cart,
//!   coupons, orders and token issuing, and recording the calls it receives
//! - the real storefront application pointed at the fake backend
//!
//! Requests go through a `reqwest` client with a cookie store, so the
//! session (and with it the guest cart) survives between requests.
//!
//! ```rust,ignore
//! let app = TestApp::spawn().await;
//! let response = app.get("/api/cart").await;
//! assert_eq!(app.backend.offer_calls(), 0);
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use stride_core::Money;
use stride_storefront::backend::{OfferCalculation, OfferLine};
use stride_storefront::config::StorefrontConfig;
use stride_storefront::routes;
use stride_storefront::state::AppState;

/// Product sold in sizes 42 (in stock) and 43 (sold out).
pub const SNEAKER_ID: i64 = 1;
pub const SNEAKER_SIZE_42: i64 = 11;
pub const SNEAKER_SIZE_43: i64 = 12;
/// Price of the sneaker in piastres.
pub const SNEAKER_PRICE_PIASTRES: i64 = 125_000;
/// Units of size 42 on hand when the backend starts.
pub const SNEAKER_STOCK: u32 = 4;

/// The one account the fake backend knows.
pub const CUSTOMER_EMAIL: &str = "mona@example.com";
pub const CUSTOMER_PASSWORD: &str = "correct-horse-battery";

/// Coupon accepted by the fake backend, worth 100 EGP.
pub const COUPON_CODE: &str = "SAVE10";
pub const COUPON_DISCOUNT_PIASTRES: i64 = 10_000;

/// Access token lifetimes handed out at sign-in.
const LONG_TOKEN_SECS: i64 = 3600;
/// Inside the storefront's refresh margin, so every request refreshes.
const SHORT_TOKEN_SECS: i64 = 30;

/// How the fake backend answers token refreshes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RefreshMode {
    /// Issue a new access token and rotate the refresh token.
    #[default]
    Rotate,
    /// Answer 429.
    RateLimited,
    /// Answer 401 as for a revoked refresh token.
    Reject,
}

/// A cart line as the backend stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: i64,
    pub variant_id: Option<i64>,
    pub quantity: u32,
}

/// A receipt uploaded with an order.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub size: usize,
}

/// An order as the backend received it.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order_number: String,
    /// Text parts of the multipart body
    pub fields: HashMap<String, String>,
    pub proof: Option<UploadedFile>,
    pub signed_in: bool,
    response: Value,
}

impl PlacedOrder {
    /// The `items` part, decoded.
    ///
    /// # Panics
    ///
    /// Panics if the part is missing or not a list of lines.
    #[must_use]
    pub fn items(&self) -> Vec<OfferLine> {
        let raw = self.fields.get("items").expect("items part");
        serde_json::from_str(raw).expect("items JSON")
    }
}

/// What the fake backend has seen, and the knobs tests turn.
#[derive(Debug, Default)]
struct FakeState {
    offers: AtomicUsize,
    logins: AtomicUsize,
    coupon_checks: AtomicUsize,
    token_serial: AtomicUsize,
    sneaker_stock: AtomicU32,
    fail_offers: AtomicBool,
    short_lived_tokens: AtomicBool,
    coupon_block: Mutex<Option<String>>,
    refresh_mode: Mutex<RefreshMode>,
    refresh_tokens: Mutex<Vec<String>>,
    server_cart: Mutex<Vec<CartLine>>,
    merged_cart: Mutex<Vec<CartLine>>,
    merged_favorites: Mutex<Vec<i64>>,
    orders: Mutex<Vec<PlacedOrder>>,
    order_pages: Mutex<Vec<Option<String>>>,
}

type Shared = Arc<FakeState>;

fn locked<T: Clone>(value: &Mutex<T>) -> T {
    value.lock().expect("fake backend state").clone()
}

/// Handle on the running fake backend.
#[derive(Clone)]
pub struct FakeBackend {
    pub api_url: String,
    state: Shared,
}

impl FakeBackend {
    /// Number of offer calculations requested so far.
    #[must_use]
    pub fn offer_calls(&self) -> usize {
        self.state.offers.load(Ordering::SeqCst)
    }

    /// Number of sign-in attempts that reached the backend.
    #[must_use]
    pub fn login_calls(&self) -> usize {
        self.state.logins.load(Ordering::SeqCst)
    }

    /// Number of guest coupon validations.
    #[must_use]
    pub fn coupon_checks(&self) -> usize {
        self.state.coupon_checks.load(Ordering::SeqCst)
    }

    /// Refresh tokens presented, in order.
    #[must_use]
    pub fn refresh_tokens(&self) -> Vec<String> {
        locked(&self.state.refresh_tokens)
    }

    /// Lines replayed through `cart/merge/`.
    #[must_use]
    pub fn merged_cart(&self) -> Vec<CartLine> {
        locked(&self.state.merged_cart)
    }

    /// Product ids replayed through `favorites/merge/`.
    #[must_use]
    pub fn merged_favorites(&self) -> Vec<i64> {
        locked(&self.state.merged_favorites)
    }

    /// Orders created so far.
    #[must_use]
    pub fn placed_orders(&self) -> Vec<PlacedOrder> {
        locked(&self.state.orders)
    }

    /// The `page` parameter of every order history request.
    #[must_use]
    pub fn order_pages(&self) -> Vec<Option<String>> {
        locked(&self.state.order_pages)
    }

    /// Answer offer calculations with 503 from now on.
    pub fn fail_offers(&self) {
        self.state.fail_offers.store(true, Ordering::SeqCst);
    }

    /// Report that the cart's offers exclude coupons.
    pub fn block_coupons(&self, reason: &str) {
        *self.state.coupon_block.lock().expect("fake backend state") = Some(reason.to_string());
    }

    /// Change the units of size 42 on hand.
    pub fn set_sneaker_stock(&self, units: u32) {
        self.state.sneaker_stock.store(units, Ordering::SeqCst);
    }

    /// Issue access tokens that are already due for refresh.
    pub fn use_short_lived_tokens(&self) {
        self.state.short_lived_tokens.store(true, Ordering::SeqCst);
    }

    pub fn set_refresh_mode(&self, mode: RefreshMode) {
        *self.state.refresh_mode.lock().expect("fake backend state") = mode;
    }

    async fn spawn() -> Self {
        let state = Arc::new(FakeState::default());
        state.sneaker_stock.store(SNEAKER_STOCK, Ordering::SeqCst);

        let router = Router::new()
            .route("/api/products/{id}/", get(product))
            .route("/api/offers/calculate/", post(calculate_offers))
            .route("/api/offers/flash-sales/active/", get(|| async { Json(json!([])) }))
            .route("/api/auth/login/", post(login))
            .route("/api/auth/token/refresh/", post(refresh))
            .route("/api/cart/", get(server_cart))
            .route("/api/cart/items/", post(add_cart_item))
            .route("/api/cart/merge/", post(merge_cart))
            .route("/api/cart/clear/", post(clear_cart))
            .route("/api/coupons/validate/", post(validate_coupon))
            .route("/api/favorites/merge/", post(merge_favorites))
            .route("/api/orders/orders/", get(list_orders).post(create_order))
            .route("/api/orders/track/{number}/", get(track_order))
            .with_state(Arc::clone(&state));

        let listener = bind().await;
        let addr = listener.local_addr().expect("fake backend address");
        tokio::spawn(async move {
            axum::serve(listener, router)
                .await
                .expect("fake backend server");
        });

        Self {
            api_url: format!("http://{addr}/api/"),
            state,
        }
    }
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

fn unauthorized() -> Response {
    detail(
        StatusCode::UNAUTHORIZED,
        "Authentication credentials were not provided.",
    )
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

fn sneaker_price() -> Money {
    Money::from_piastres(SNEAKER_PRICE_PIASTRES)
}

// =============================================================================
// Catalog and offers
// =============================================================================

async fn product(State(state): State<Shared>, Path(id): Path<i64>) -> Response {
    if id != SNEAKER_ID {
        return detail(StatusCode::NOT_FOUND, "Not found.");
    }
    let stock = state.sneaker_stock.load(Ordering::SeqCst);
    Json(json!({
        "id": SNEAKER_ID,
        "name": "Nile Runner",
        "slug": "nile-runner",
        "description": "Lightweight daily trainer",
        "price": sneaker_price(),
        "images": [],
        "variants": [
            {"id": SNEAKER_SIZE_42, "size": "42", "color": "Black", "stock": stock},
            {"id": SNEAKER_SIZE_43, "size": "43", "color": "Black", "stock": 0}
        ],
        "in_stock": true
    }))
    .into_response()
}

#[derive(Deserialize)]
struct OfferBody {
    items: Vec<OfferLine>,
}

/// No offers configured: totals come back undiscounted.
async fn calculate_offers(State(state): State<Shared>, Json(body): Json<OfferBody>) -> Response {
    state.offers.fetch_add(1, Ordering::SeqCst);
    if state.fail_offers.load(Ordering::SeqCst) {
        return detail(StatusCode::SERVICE_UNAVAILABLE, "Offer engine unavailable");
    }

    let total: Money = body
        .items
        .iter()
        .map(|line| line.unit_price.times(line.quantity))
        .sum();
    let blocking_reason = locked(&state.coupon_block);
    Json(OfferCalculation {
        original_total: total,
        discounted_total: total,
        coupons_blocked: blocking_reason.is_some(),
        blocking_reason,
        ..OfferCalculation::empty()
    })
    .into_response()
}

// =============================================================================
// Auth
// =============================================================================

/// A JWT-shaped token whose payload carries `exp`. The signature is never checked.
fn access_token(state: &FakeState) -> String {
    let ttl = if state.short_lived_tokens.load(Ordering::SeqCst) {
        SHORT_TOKEN_SECS
    } else {
        LONG_TOKEN_SECS
    };
    let serial = state.token_serial.fetch_add(1, Ordering::SeqCst) + 1;
    let claims = json!({
        "token_type": "access",
        "exp": Utc::now().timestamp() + ttl,
        "jti": serial,
    });
    format!(
        "eyJhbGciOiJIUzI1NiJ9.{}.signature",
        URL_SAFE_NO_PAD.encode(claims.to_string())
    )
}

#[derive(Deserialize)]
struct LoginBody {
    email: String,
    password: String,
}

async fn login(State(state): State<Shared>, Json(body): Json<LoginBody>) -> Response {
    state.logins.fetch_add(1, Ordering::SeqCst);
    if body.email != CUSTOMER_EMAIL || body.password != CUSTOMER_PASSWORD {
        return detail(
            StatusCode::UNAUTHORIZED,
            "No active account found with the given credentials",
        );
    }

    Json(json!({
        "access": access_token(&state),
        "refresh": "refresh-1",
        "user": {
            "id": 7,
            "email": CUSTOMER_EMAIL,
            "first_name": "Mona",
            "last_name": "Adel",
            "phone": "01001234567"
        }
    }))
    .into_response()
}

#[derive(Deserialize)]
struct RefreshBody {
    refresh: String,
}

async fn refresh(State(state): State<Shared>, Json(body): Json<RefreshBody>) -> Response {
    let seen = {
        let mut tokens = state.refresh_tokens.lock().expect("fake backend state");
        tokens.push(body.refresh);
        tokens.len()
    };

    match locked(&state.refresh_mode) {
        RefreshMode::Rotate => Json(json!({
            "access": access_token(&state),
            "refresh": format!("refresh-{}", seen + 1),
        }))
        .into_response(),
        RefreshMode::RateLimited => (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, "30")],
            Json(json!({ "detail": "Request was throttled." })),
        )
            .into_response(),
        RefreshMode::Reject => detail(StatusCode::UNAUTHORIZED, "Token is invalid or expired"),
    }
}

// =============================================================================
// Signed-in cart and coupons
// =============================================================================

fn cart_json(lines: &[CartLine]) -> Value {
    let items: Vec<Value> = lines
        .iter()
        .enumerate()
        .map(|(index, line)| {
            let size = if line.variant_id == Some(SNEAKER_SIZE_43) { "43" } else { "42" };
            json!({
                "id": index + 1,
                "product": {"id": line.product_id, "name": "Nile Runner", "slug": "nile-runner"},
                "variant": line.variant_id.map(|id| json!({"id": id, "size": size, "color": "Black"})),
                "quantity": line.quantity,
                "unit_price": sneaker_price(),
                "line_total": sneaker_price().times(line.quantity),
            })
        })
        .collect();
    let subtotal: Money = lines.iter().map(|l| sneaker_price().times(l.quantity)).sum();
    json!({
        "items": items,
        "summary": {
            "subtotal": subtotal,
            "discount": Money::ZERO,
            "total": subtotal,
            "item_count": lines.iter().map(|l| l.quantity).sum::<u32>(),
        }
    })
}

fn add_lines(cart: &mut Vec<CartLine>, incoming: &[CartLine]) {
    for line in incoming {
        match cart
            .iter_mut()
            .find(|l| l.product_id == line.product_id && l.variant_id == line.variant_id)
        {
            Some(existing) => existing.quantity += line.quantity,
            None => cart.push(line.clone()),
        }
    }
}

async fn server_cart(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if bearer(&headers).is_none() {
        return unauthorized();
    }
    Json(cart_json(&locked(&state.server_cart))).into_response()
}

async fn add_cart_item(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(line): Json<CartLine>,
) -> Response {
    if bearer(&headers).is_none() {
        return unauthorized();
    }
    let mut cart = state.server_cart.lock().expect("fake backend state");
    add_lines(&mut cart, &[line]);
    Json(cart_json(&cart)).into_response()
}

#[derive(Deserialize)]
struct MergeCartBody {
    items: Vec<CartLine>,
}

async fn merge_cart(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<MergeCartBody>,
) -> Response {
    if bearer(&headers).is_none() {
        return unauthorized();
    }
    state
        .merged_cart
        .lock()
        .expect("fake backend state")
        .extend(body.items.iter().cloned());
    let mut cart = state.server_cart.lock().expect("fake backend state");
    add_lines(&mut cart, &body.items);
    Json(cart_json(&cart)).into_response()
}

async fn clear_cart(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if bearer(&headers).is_none() {
        return unauthorized();
    }
    state.server_cart.lock().expect("fake backend state").clear();
    StatusCode::NO_CONTENT.into_response()
}

#[derive(Deserialize)]
struct CouponBody {
    code: String,
}

async fn validate_coupon(State(state): State<Shared>, Json(body): Json<CouponBody>) -> Json<Value> {
    state.coupon_checks.fetch_add(1, Ordering::SeqCst);
    if body.code == COUPON_CODE {
        Json(json!({
            "valid": true,
            "discount_amount": Money::from_piastres(COUPON_DISCOUNT_PIASTRES),
        }))
    } else {
        Json(json!({ "valid": false, "message": "This coupon has expired." }))
    }
}

// =============================================================================
// Favorites
// =============================================================================

#[derive(Deserialize)]
struct MergeFavoritesBody {
    product_ids: Vec<i64>,
}

async fn merge_favorites(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<MergeFavoritesBody>,
) -> Response {
    if bearer(&headers).is_none() {
        return unauthorized();
    }
    state
        .merged_favorites
        .lock()
        .expect("fake backend state")
        .extend(body.product_ids);
    StatusCode::NO_CONTENT.into_response()
}

// =============================================================================
// Orders
// =============================================================================

async fn create_order(
    State(state): State<Shared>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let mut fields = HashMap::new();
    let mut proof = None;
    while let Some(field) = multipart.next_field().await.expect("multipart field") {
        let name = field.name().unwrap_or_default().to_string();
        if let Some(file_name) = field.file_name().map(str::to_string) {
            let content_type = field.content_type().unwrap_or_default().to_string();
            let size = field.bytes().await.expect("file part").len();
            proof = Some(UploadedFile {
                file_name,
                content_type,
                size,
            });
        } else {
            fields.insert(name, field.text().await.expect("text part"));
        }
    }

    let items: Vec<OfferLine> = fields
        .get("items")
        .and_then(|raw| serde_json::from_str(raw).ok())
        .unwrap_or_default();
    let address: Value = fields
        .get("shipping_address")
        .and_then(|raw| serde_json::from_str(raw).ok())
        .unwrap_or(Value::Null);
    let subtotal: Money = items.iter().map(|l| l.unit_price.times(l.quantity)).sum();

    let mut orders = state.orders.lock().expect("fake backend state");
    let id = orders.len() + 1;
    let order_number = format!("STR-{}", 1000 + id);
    let response = json!({
        "id": id,
        "order_number": order_number,
        "status": "pending",
        "payment_method": fields.get("payment_method"),
        "items": items.iter().map(|line| json!({
            "product_name": "Nile Runner",
            "variant_label": "42",
            "quantity": line.quantity,
            "unit_price": line.unit_price,
            "line_total": line.unit_price.times(line.quantity),
        })).collect::<Vec<_>>(),
        "subtotal": subtotal,
        "shipping_cost": Money::ZERO,
        "discount": Money::ZERO,
        "total": subtotal,
        "shipping_address": address,
        "created_at": Utc::now(),
    });
    orders.push(PlacedOrder {
        order_number,
        fields,
        proof,
        signed_in: bearer(&headers).is_some(),
        response: response.clone(),
    });

    (StatusCode::CREATED, Json(response)).into_response()
}

async fn list_orders(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if bearer(&headers).is_none() {
        return unauthorized();
    }
    state
        .order_pages
        .lock()
        .expect("fake backend state")
        .push(query.get("page").cloned());

    let results: Vec<Value> = locked(&state.orders)
        .into_iter()
        .filter(|order| order.signed_in)
        .map(|order| order.response)
        .collect();
    Json(json!({
        "count": results.len(),
        "next": null,
        "previous": null,
        "results": results,
    }))
    .into_response()
}

async fn track_order(State(state): State<Shared>, Path(number): Path<String>) -> Response {
    locked(&state.orders)
        .into_iter()
        .find(|order| order.order_number == number)
        .map_or_else(
            || detail(StatusCode::NOT_FOUND, "Not found."),
            |order| Json(order.response).into_response(),
        )
}

async fn bind() -> tokio::net::TcpListener {
    tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port")
}

// =============================================================================
// Storefront
// =============================================================================

/// The storefront running against a [`FakeBackend`].
pub struct TestApp {
    pub base_url: String,
    pub client: Client,
    pub backend: FakeBackend,
}

impl TestApp {
    /// Start a fake backend and a storefront that talks to it.
    ///
    /// # Panics
    ///
    /// Panics if either server cannot be started.
    pub async fn spawn() -> Self {
        Self::spawn_with(&[]).await
    }

    /// Like [`TestApp::spawn`], with extra environment settings for the
    /// storefront.
    ///
    /// # Panics
    ///
    /// Panics if either server cannot be started.
    pub async fn spawn_with(settings: &[(&str, &str)]) -> Self {
        let backend = FakeBackend::spawn().await;

        let api_url = backend.api_url.clone();
        let config = StorefrontConfig::from_lookup(|key| {
            if let Some((_, value)) = settings.iter().find(|(name, _)| *name == key) {
                return Some((*value).to_string());
            }
            match key {
                "STOREFRONT_BASE_URL" => Some("http://127.0.0.1".to_string()),
                "BACKEND_API_URL" => Some(api_url.clone()),
                "BACKEND_TIMEOUT_SECS" => Some("5".to_string()),
                "BACKEND_MAX_RETRIES" => Some("0".to_string()),
                _ => None,
            }
        })
        .expect("test configuration");
        let state = AppState::new(config).expect("application state");
        let app = routes::app(state);

        let listener = bind().await;
        let addr = listener.local_addr().expect("storefront address");
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .expect("storefront server");
        });

        Self {
            base_url: format!("http://{addr}"),
            client: cookie_client(),
            backend,
        }
    }

    /// A second browser on the same storefront, with its own session.
    #[must_use]
    pub fn another_visitor(&self) -> Self {
        Self {
            base_url: self.base_url.clone(),
            client: cookie_client(),
            backend: self.backend.clone(),
        }
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// GET a path, following redirects.
    ///
    /// # Panics
    ///
    /// Panics if the request fails.
    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request")
    }

    /// POST a urlencoded form, following redirects.
    ///
    /// # Panics
    ///
    /// Panics if the request fails.
    pub async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .form(form)
            .send()
            .await
            .expect("POST request")
    }

    /// POST a urlencoded form the way HTMX does.
    ///
    /// # Panics
    ///
    /// Panics if the request fails.
    pub async fn post_htmx(&self, path: &str, form: &[(&str, &str)]) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .header("HX-Request", "true")
            .form(form)
            .send()
            .await
            .expect("POST request")
    }

    /// POST a multipart form, following redirects.
    ///
    /// # Panics
    ///
    /// Panics if the request fails.
    pub async fn post_multipart(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .multipart(form)
            .send()
            .await
            .expect("POST request")
    }

    /// GET a JSON endpoint.
    ///
    /// # Panics
    ///
    /// Panics if the request fails or the body is not JSON.
    pub async fn get_json(&self, path: &str) -> serde_json::Value {
        self.get(path).await.json().await.expect("JSON body")
    }

    /// Sign in as [`CUSTOMER_EMAIL`], landing on the account page.
    ///
    /// # Panics
    ///
    /// Panics if the request fails.
    pub async fn sign_in(&self) -> reqwest::Response {
        self.post_form(
            "/auth/login",
            &[("email", CUSTOMER_EMAIL), ("password", CUSTOMER_PASSWORD)],
        )
        .await
    }
}

fn cookie_client() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("HTTP client")
}

/// Parse a money amount from a JSON value.
///
/// # Panics
///
/// Panics if the value is not a money amount.
#[must_use]
pub fn money(value: &serde_json::Value) -> Money {
    serde_json::from_value(value.clone()).expect("money amount")
}
