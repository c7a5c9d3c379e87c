//! JSON endpoints for scripts on the storefront pages.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use stride_core::Money;

use crate::backend::AppliedOffer;
use crate::error::{AppError, Result};
use crate::geography::AddressMatch;
use crate::middleware::OptionalAuth;
use crate::services::favorites::FavoriteView;
use crate::services::{CartService, CartView, FavoritesService};
use crate::state::AppState;

/// Most suggestions returned by the address search.
const MAX_SUGGESTIONS: usize = 8;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ShippingQuery {
    pub governorate: String,
}

/// Offer breakdown for the current cart.
#[derive(Debug, Serialize)]
pub struct OffersResponse {
    pub subtotal: Money,
    pub offer_discount: Money,
    pub total: Money,
    pub free_shipping: bool,
    pub coupons_blocked: bool,
    pub blocking_reason: Option<String>,
    pub applied_offers: Vec<AppliedOffer>,
}

impl From<CartView> for OffersResponse {
    fn from(cart: CartView) -> Self {
        Self {
            subtotal: cart.subtotal,
            offer_discount: cart.offer_discount,
            total: cart.total,
            free_shipping: cart.free_shipping,
            coupons_blocked: cart.coupons_blocked.is_some(),
            blocking_reason: cart.coupons_blocked,
            applied_offers: cart.applied_offers,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ShippingResponse {
    pub governorate_id: String,
    pub shipping_cost: Money,
}

/// The current cart with totals.
#[instrument(skip_all)]
pub async fn cart(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(customer): OptionalAuth,
) -> Result<Json<CartView>> {
    let cart = CartService::new(state.backend(), &session, customer.as_ref())
        .view()
        .await?;
    Ok(Json(cart))
}

/// Offers applied to the current cart.
#[instrument(skip_all)]
pub async fn offers(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(customer): OptionalAuth,
) -> Result<Json<OffersResponse>> {
    let cart = CartService::new(state.backend(), &session, customer.as_ref())
        .view()
        .await?;
    Ok(Json(cart.into()))
}

/// Favorited products, newest first.
#[instrument(skip_all)]
pub async fn favorites(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(customer): OptionalAuth,
) -> Result<Json<Vec<FavoriteView>>> {
    let favorites = FavoritesService::new(state.backend(), &session, customer.as_ref())
        .list()
        .await?;
    Ok(Json(favorites))
}

/// Governorate and city suggestions.
#[instrument(skip(state))]
pub async fn address_search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<AddressMatch>>> {
    let limit = query.limit.unwrap_or(MAX_SUGGESTIONS).clamp(1, MAX_SUGGESTIONS);
    Ok(Json(state.geography().search(&query.q, limit)?))
}

/// Shipping cost for a governorate.
#[instrument(skip(state))]
pub async fn shipping(
    State(state): State<AppState>,
    Query(query): Query<ShippingQuery>,
) -> Result<Json<ShippingResponse>> {
    let id = query.governorate.trim();
    let shipping_cost = state
        .geography()
        .shipping_cost(id)
        .ok_or_else(|| AppError::NotFound(format!("governorate {id}")))?;
    Ok(Json(ShippingResponse {
        governorate_id: id.to_string(),
        shipping_cost,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offers_response_reports_block_reason() {
        let cart = CartView {
            coupons_blocked: Some("Flash sale items can't take coupons".into()),
            ..CartView::empty()
        };
        let response = OffersResponse::from(cart);
        assert!(response.coupons_blocked);
        assert_eq!(
            response.blocking_reason.as_deref(),
            Some("Flash sale items can't take coupons")
        );
    }
}
