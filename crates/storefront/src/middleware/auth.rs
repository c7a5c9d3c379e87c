//! Authentication extractors.
//!
//! Both extractors read the customer from the session and refresh the access
//! token when it is close to expiry, so handlers always see a usable token.

use axum::{
    extract::{FromRequestParts, OriginalUri},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::models::{CurrentCustomer, keys};
use crate::services::AuthService;
use crate::state::AppState;

/// Extractor that requires a signed-in customer.
///
/// If the customer is not logged in, returns a redirect to the login page.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(customer): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", customer.user.display_name())
/// }
/// ```
pub struct RequireAuth(pub CurrentCustomer);

/// Error returned when authentication is required but the customer is not logged in.
pub enum AuthRejection {
    /// Redirect to login page (for HTML requests).
    RedirectToLogin(String),
    /// Unauthorized response (for API requests).
    Unauthorized,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin(next) => {
                let target = format!("/auth/login?next={}", urlencoding::encode(&next));
                Redirect::to(&target).into_response()
            }
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
        }
    }
}

/// Load the customer from the session, refreshing tokens as needed.
async fn current_customer(parts: &Parts, state: &AppState) -> Option<CurrentCustomer> {
    let session = parts.extensions.get::<Session>()?;
    let customer = session
        .get::<CurrentCustomer>(keys::CURRENT_CUSTOMER)
        .await
        .ok()
        .flatten()?;

    AuthService::new(state.backend(), session, state.config().access_token_ttl)
        .ensure_fresh(customer)
        .await
        .ok()
}

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(customer) = current_customer(parts, state).await {
            return Ok(Self(customer));
        }

        // Nested routers see a stripped URI; the original has the full path
        let path = parts
            .extensions
            .get::<OriginalUri>()
            .map_or_else(|| parts.uri.path().to_string(), |uri| uri.path().to_string());
        if path.starts_with("/api/") {
            Err(AuthRejection::Unauthorized)
        } else {
            Err(AuthRejection::RedirectToLogin(path))
        }
    }
}

/// Extractor that optionally gets the current customer.
///
/// Guests get `None`; an expired session also degrades to `None`.
pub struct OptionalAuth(pub Option<CurrentCustomer>);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(current_customer(parts, state).await))
    }
}
