//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use chrono::Utc;
use tracing::instrument;

use super::Shell;
use crate::backend::{FlashSale, Product, ProductQuery, ProductSort};
use crate::filters;
use crate::middleware::OptionalAuth;
use crate::state::AppState;

/// Number of new arrivals shown on the home page.
const NEW_ARRIVALS: usize = 8;

/// A running flash sale with its countdown.
pub struct FlashSaleView {
    pub sale: FlashSale,
    pub seconds_remaining: i64,
}

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub shell: Shell,
    pub flash_sales: Vec<FlashSaleView>,
    pub new_arrivals: Vec<Product>,
}

/// Display the home page.
///
/// Both sections degrade to empty when the backend is unavailable.
#[instrument(skip_all)]
pub async fn home(State(state): State<AppState>, OptionalAuth(customer): OptionalAuth) -> impl IntoResponse {
    let now = Utc::now();
    let flash_sales = match state.backend().active_flash_sales().await {
        Ok(sales) => sales
            .into_iter()
            .filter(|sale| sale.is_running(now))
            .map(|sale| FlashSaleView {
                seconds_remaining: sale.seconds_remaining(now),
                sale,
            })
            .collect(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load flash sales");
            Vec::new()
        }
    };

    let query = ProductQuery {
        sort: Some(ProductSort::Newest),
        ..ProductQuery::default()
    };
    let new_arrivals = match state.backend().list_products(&query).await {
        Ok(page) => page.results.into_iter().take(NEW_ARRIVALS).collect(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load new arrivals");
            Vec::new()
        }
    };

    HomeTemplate {
        shell: Shell::new(customer.as_ref()),
        flash_sales,
        new_arrivals,
    }
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check the backend.
pub async fn health() -> &'static str {
    "ok"
}
