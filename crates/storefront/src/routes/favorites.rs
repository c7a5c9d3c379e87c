//! Favorites route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::HeaderMap,
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use stride_core::ProductId;

use super::{Shell, is_htmx};
use crate::error::Result;
use crate::filters;
use crate::middleware::OptionalAuth;
use crate::services::FavoritesService;
use crate::services::favorites::FavoriteView;
use crate::state::AppState;

/// Favorite toggle/remove form data.
#[derive(Debug, Deserialize)]
pub struct FavoriteForm {
    pub product_id: ProductId,
}

/// Favorites page template.
#[derive(Template, WebTemplate)]
#[template(path = "favorites/index.html")]
pub struct FavoritesTemplate {
    pub shell: Shell,
    pub favorites: Vec<FavoriteView>,
}

/// Heart button fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/favorite_button.html")]
pub struct FavoriteButtonTemplate {
    pub product_id: ProductId,
    pub is_favorite: bool,
}

/// Display favorites page.
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(customer): OptionalAuth,
) -> Result<impl IntoResponse> {
    let favorites = FavoritesService::new(state.backend(), &session, customer.as_ref())
        .list()
        .await?;

    Ok(FavoritesTemplate {
        shell: Shell::new(customer.as_ref()),
        favorites,
    })
}

/// Toggle a product's favorite state.
#[instrument(skip(state, session, customer, headers))]
pub async fn toggle(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(customer): OptionalAuth,
    headers: HeaderMap,
    Form(form): Form<FavoriteForm>,
) -> Result<Response> {
    let is_favorite = FavoritesService::new(state.backend(), &session, customer.as_ref())
        .toggle(form.product_id)
        .await?;

    if is_htmx(&headers) {
        return Ok((
            AppendHeaders([("HX-Trigger", "favorites-updated")]),
            FavoriteButtonTemplate {
                product_id: form.product_id,
                is_favorite,
            },
        )
            .into_response());
    }

    Ok(Redirect::to(&format!("/products/{}", form.product_id)).into_response())
}

/// Remove a product from favorites.
#[instrument(skip(state, session, customer))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(customer): OptionalAuth,
    Form(form): Form<FavoriteForm>,
) -> Result<Redirect> {
    FavoritesService::new(state.backend(), &session, customer.as_ref())
        .remove(form.product_id)
        .await?;
    Ok(Redirect::to("/favorites"))
}
