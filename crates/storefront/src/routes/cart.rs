//! Cart route handlers.
//!
//! Cart operations answer HTMX requests with fragments and an `HX-Trigger`
//! header so the badge refreshes; plain form posts redirect back to the cart.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use stride_core::{ProductId, VariantId};

use super::{Shell, is_htmx};
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::OptionalAuth;
use crate::models::{CurrentCustomer, MAX_LINE_QUANTITY};
use crate::services::{CartError, CartService, CartView};
use crate::state::AppState;

const CART_UPDATED: (&str, &str) = ("HX-Trigger", "cart-updated");

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: ProductId,
    /// Empty when the product has no size options
    #[serde(default)]
    pub variant_id: String,
    pub quantity: Option<u32>,
}

/// Update cart form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub line_id: String,
    pub quantity: u32,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub line_id: String,
}

/// Coupon form data.
#[derive(Debug, Deserialize)]
pub struct CouponForm {
    pub code: String,
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub shell: Shell,
    pub cart: CartView,
    pub error: Option<String>,
    pub max_quantity: u32,
}

/// Cart items fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_items.html")]
pub struct CartItemsTemplate {
    pub cart: CartView,
    pub error: Option<String>,
    pub max_quantity: u32,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
}

/// Inline message fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/notice.html")]
pub struct NoticeTemplate {
    pub message: String,
    pub is_error: bool,
}

fn parse_variant(raw: &str) -> std::result::Result<Option<VariantId>, CartError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse().map(Some).map_err(|_| CartError::UnknownVariant)
}

/// Render the outcome of a cart change.
///
/// Customer mistakes are shown next to the cart; anything else becomes an
/// error response.
async fn cart_response(
    state: &AppState,
    session: &Session,
    customer: Option<&CurrentCustomer>,
    headers: &HeaderMap,
    outcome: std::result::Result<(), CartError>,
) -> Result<Response> {
    let error = match outcome {
        Ok(()) => None,
        Err(err) if err.is_user_error() => Some(err.user_message()),
        Err(err) => return Err(err.into()),
    };

    if !is_htmx(headers) && error.is_none() {
        return Ok(Redirect::to("/cart").into_response());
    }

    let cart = CartService::new(state.backend(), session, customer)
        .view()
        .await?;

    if is_htmx(headers) {
        let fragment = CartItemsTemplate {
            cart,
            max_quantity: MAX_LINE_QUANTITY,
            error: error.clone(),
        };
        return Ok(if error.is_none() {
            (AppendHeaders([CART_UPDATED]), fragment).into_response()
        } else {
            fragment.into_response()
        });
    }

    Ok((
        StatusCode::UNPROCESSABLE_ENTITY,
        CartShowTemplate {
            shell: Shell::new(customer),
            cart,
            error,
            max_quantity: MAX_LINE_QUANTITY,
        },
    )
        .into_response())
}

/// Display cart page.
#[instrument(skip_all)]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(customer): OptionalAuth,
) -> Result<impl IntoResponse> {
    let cart = CartService::new(state.backend(), &session, customer.as_ref())
        .view()
        .await?;

    Ok(CartShowTemplate {
        shell: Shell::new(customer.as_ref()),
        cart,
        error: None,
        max_quantity: MAX_LINE_QUANTITY,
    })
}

/// Add item to cart.
///
/// HTMX requests get the new badge count and a `cart-updated` trigger.
#[instrument(skip(state, session, customer, headers))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(customer): OptionalAuth,
    headers: HeaderMap,
    Form(form): Form<AddToCartForm>,
) -> Result<Response> {
    let service = CartService::new(state.backend(), &session, customer.as_ref());
    let outcome = match parse_variant(&form.variant_id) {
        Ok(variant_id) => {
            service
                .add(form.product_id, variant_id, form.quantity.unwrap_or(1))
                .await
        }
        Err(err) => Err(err),
    };

    if !is_htmx(&headers) {
        return cart_response(&state, &session, customer.as_ref(), &headers, outcome).await;
    }

    match outcome {
        Ok(()) => {
            let count = service.count().await?;
            Ok((
                AppendHeaders([CART_UPDATED]),
                NoticeTemplate {
                    message: format!("Added to cart ({count} items)"),
                    is_error: false,
                },
            )
                .into_response())
        }
        Err(err) if err.is_user_error() => Ok(NoticeTemplate {
            message: err.user_message(),
            is_error: true,
        }
        .into_response()),
        Err(err) => Err(AppError::from(err)),
    }
}

/// Update cart line quantity.
#[instrument(skip(state, session, customer, headers))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(customer): OptionalAuth,
    headers: HeaderMap,
    Form(form): Form<UpdateCartForm>,
) -> Result<Response> {
    let outcome = CartService::new(state.backend(), &session, customer.as_ref())
        .update(&form.line_id, form.quantity)
        .await;
    cart_response(&state, &session, customer.as_ref(), &headers, outcome).await
}

/// Remove a cart line.
#[instrument(skip(state, session, customer, headers))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(customer): OptionalAuth,
    headers: HeaderMap,
    Form(form): Form<RemoveFromCartForm>,
) -> Result<Response> {
    let outcome = CartService::new(state.backend(), &session, customer.as_ref())
        .remove(&form.line_id)
        .await;
    cart_response(&state, &session, customer.as_ref(), &headers, outcome).await
}

/// Empty the cart.
#[instrument(skip_all)]
pub async fn clear(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(customer): OptionalAuth,
    headers: HeaderMap,
) -> Result<Response> {
    let outcome = CartService::new(state.backend(), &session, customer.as_ref())
        .clear()
        .await;
    cart_response(&state, &session, customer.as_ref(), &headers, outcome).await
}

/// Apply a coupon code.
#[instrument(skip(state, session, customer, headers))]
pub async fn apply_coupon(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(customer): OptionalAuth,
    headers: HeaderMap,
    Form(form): Form<CouponForm>,
) -> Result<Response> {
    let outcome = CartService::new(state.backend(), &session, customer.as_ref())
        .apply_coupon(&form.code)
        .await;
    cart_response(&state, &session, customer.as_ref(), &headers, outcome).await
}

/// Remove the applied coupon.
#[instrument(skip_all)]
pub async fn remove_coupon(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(customer): OptionalAuth,
    headers: HeaderMap,
) -> Result<Response> {
    let outcome = CartService::new(state.backend(), &session, customer.as_ref())
        .remove_coupon()
        .await;
    cart_response(&state, &session, customer.as_ref(), &headers, outcome).await
}

/// Get cart count badge (HTMX).
///
/// The badge is decorative, so failures render as zero.
#[instrument(skip_all)]
pub async fn count(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(customer): OptionalAuth,
) -> impl IntoResponse {
    let count = CartService::new(state.backend(), &session, customer.as_ref())
        .count()
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to count cart");
            0
        });

    CartCountTemplate { count }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_variant() {
        assert_eq!(parse_variant("").unwrap_or(None), None);
        assert_eq!(parse_variant(" 42 ").ok().flatten(), Some(VariantId::new(42)));
        assert!(matches!(parse_variant("xl"), Err(CartError::UnknownVariant)));
    }
}
