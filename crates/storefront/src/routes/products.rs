//! Product route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use stride_core::ProductId;

use super::Shell;
use crate::backend::{BackendError, Category, Page, Product, ProductQuery, ProductSort};
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::OptionalAuth;
use crate::models::MAX_LINE_QUANTITY;
use crate::services::FavoritesService;
use crate::state::AppState;

/// Query parameters for the product listing.
#[derive(Debug, Default, Deserialize)]
pub struct ListingParams {
    pub page: Option<u32>,
    pub category: Option<String>,
    pub q: Option<String>,
    pub sort: Option<ProductSort>,
}

impl ListingParams {
    fn to_query(&self) -> ProductQuery {
        ProductQuery {
            page: self.page,
            category: self.category.clone(),
            search: self.q.clone(),
            sort: self.sort,
        }
    }

    /// Query string for another page of the same listing.
    #[must_use]
    pub fn page_link(&self, page: u32) -> String {
        let mut link = format!("/products?page={page}");
        if let Some(category) = self.category.as_deref().filter(|c| !c.is_empty()) {
            link.push_str(&format!("&category={}", urlencoding::encode(category)));
        }
        if let Some(q) = self.q.as_deref().filter(|q| !q.is_empty()) {
            link.push_str(&format!("&q={}", urlencoding::encode(q)));
        }
        if let Some(sort) = self.sort {
            link.push_str(&format!("&sort={}", sort.as_str()));
        }
        link
    }

    #[must_use]
    pub fn current_page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    #[must_use]
    pub fn current_sort(&self) -> ProductSort {
        self.sort.unwrap_or_default()
    }

    #[must_use]
    pub fn search_text(&self) -> &str {
        self.q.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn is_category(&self, slug: &str) -> bool {
        self.category.as_deref() == Some(slug)
    }
}

/// Product listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub shell: Shell,
    pub page: Page<Product>,
    pub categories: Vec<Category>,
    pub params: ListingParams,
    pub sorts: [ProductSort; 4],
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub shell: Shell,
    pub product: Product,
    pub is_favorite: bool,
    pub max_quantity: u32,
}

/// Display product listing page.
#[instrument(skip(state, customer))]
pub async fn index(
    State(state): State<AppState>,
    OptionalAuth(customer): OptionalAuth,
    Query(params): Query<ListingParams>,
) -> Result<impl IntoResponse> {
    let page = state.backend().list_products(&params.to_query()).await?;
    let categories = state.backend().list_categories().await.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load categories");
        Vec::new()
    });

    Ok(ProductsIndexTemplate {
        shell: Shell::new(customer.as_ref()),
        page,
        categories,
        params,
        sorts: ProductSort::ALL,
    })
}

/// Display product detail page.
#[instrument(skip(state, session, customer))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(customer): OptionalAuth,
    Path(id): Path<ProductId>,
) -> Result<impl IntoResponse> {
    let product = state
        .backend()
        .get_product(id)
        .await
        .map_err(|err| match err {
            BackendError::NotFound => AppError::NotFound(format!("product {id}")),
            other => AppError::Backend(other),
        })?;

    let is_favorite = FavoritesService::new(state.backend(), &session, customer.as_ref())
        .contains(id)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to load favorite state");
            false
        });

    Ok(ProductShowTemplate {
        shell: Shell::new(customer.as_ref()),
        product,
        is_favorite,
        max_quantity: MAX_LINE_QUANTITY,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_link_keeps_filters() {
        let params = ListingParams {
            page: Some(1),
            category: Some("running".into()),
            q: Some("air max".into()),
            sort: Some(ProductSort::PriceAsc),
        };
        assert_eq!(
            params.page_link(2),
            "/products?page=2&category=running&q=air%20max&sort=price-asc"
        );
        assert_eq!(ListingParams::default().page_link(3), "/products?page=3");
    }
}
