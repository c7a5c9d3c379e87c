//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server errors to Sentry
//! before responding to the client. Route handlers return `Result<T>`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::backend::{BackendError, ErrorKind};
use crate::geography::GeographyError;
use crate::services::{AuthError, CartError, CheckoutError, FavoritesError};

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Backend REST call failed.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Favorites error: {0}")]
    Favorites(#[from] FavoritesError),

    #[error("Address search error: {0}")]
    Geography(#[from] GeographyError),

    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Template rendering failed.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

const fn backend_status(err: &BackendError) -> StatusCode {
    match err {
        BackendError::NotFound => StatusCode::NOT_FOUND,
        BackendError::Unauthorized => StatusCode::UNAUTHORIZED,
        BackendError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
        BackendError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        _ => match err.kind() {
            ErrorKind::Client => StatusCode::BAD_REQUEST,
            ErrorKind::Network | ErrorKind::Server | ErrorKind::Timeout => StatusCode::BAD_GATEWAY,
        },
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Backend(err) => backend_status(err),
            Self::Cart(CartError::Backend(err))
            | Self::Checkout(CheckoutError::Backend(err))
            | Self::Checkout(CheckoutError::Cart(CartError::Backend(err)))
            | Self::Auth(AuthError::Backend(err))
            | Self::Favorites(FavoritesError::Backend(err)) => backend_status(err),
            Self::Cart(CartError::LineNotFound) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Cart(CartError::Session(_))
            | Self::Checkout(CheckoutError::Session(_) | CheckoutError::Cart(CartError::Session(_)))
            | Self::Auth(AuthError::Session(_))
            | Self::Favorites(FavoritesError::Session(_))
            | Self::Session(_)
            | Self::Geography(_)
            | Self::Template(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(AuthError::InvalidCredentials | AuthError::SessionExpired) => {
                StatusCode::UNAUTHORIZED
            }
            Self::Cart(_) | Self::Checkout(_) | Self::Auth(_) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
        }
    }

    /// Message safe to show to customers.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Backend(err) => err.user_message(),
            Self::Cart(err) => err.user_message(),
            Self::Checkout(err) => err.user_message(),
            Self::Auth(err) => err.user_message(),
            Self::Favorites(err) => err.user_message(),
            Self::NotFound(_) => "Page not found".to_string(),
            Self::BadRequest(msg) => msg.clone(),
            Self::Session(_) | Self::Geography(_) | Self::Template(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        (status, self.user_message()).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product 123".to_string());
        assert_eq!(err.to_string(), "Not found: product 123");
    }

    #[test]
    fn test_backend_errors_map_to_gateway_statuses() {
        assert_eq!(
            status_of(AppError::Backend(BackendError::Timeout)),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_of(AppError::Backend(BackendError::Network("refused".into()))),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(AppError::Backend(BackendError::NotFound)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(AppError::Cart(CartError::Backend(BackendError::Status {
                status: 400,
                message: Some("Out of stock".into()),
            }))),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_customer_errors_are_bad_requests() {
        assert_eq!(
            status_of(AppError::Cart(CartError::OutOfStock)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(AppError::Auth(AuthError::InvalidCredentials)),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(AppError::Internal("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_details_hidden() {
        let err = AppError::Internal("database password wrong".into());
        assert_eq!(err.user_message(), "Internal server error");
    }
}
