//! REST client for the Stride store backend.
//!
//! # Architecture
//!
//! - The backend is the source of truth for catalog, carts, offers and orders
//! - `reqwest` with JSON bodies, bearer-token auth for customer endpoints
//! - Idempotent GETs are retried with exponential backoff (see [`retry`])
//! - Catalog reads and active flash sales are cached in memory via `moka`
//!
//! # Example
//!
//! ```rust,ignore
//! use stride_storefront::backend::BackendClient;
//!
//! let client = BackendClient::new(&config.backend)?;
//! let product = client.get_product(ProductId::new(12)).await?;
//! let cart = client.add_cart_item(token, &AddCartItem { .. }).await?;
//! ```

mod auth;
mod cart;
mod catalog;
mod client;
mod favorites;
mod offers;
mod orders;
pub mod retry;
pub mod types;

pub use client::BackendClient;
pub use retry::RetryPolicy;
pub use types::*;

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur when talking to the store backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend could not be reached.
    #[error("Network error: {0}")]
    Network(String),

    /// The request did not complete within the configured timeout.
    #[error("Request timed out")]
    Timeout,

    /// The access token was missing, expired or rejected.
    #[error("Unauthorized")]
    Unauthorized,

    /// The requested resource does not exist.
    #[error("Not found")]
    NotFound,

    /// Too many requests, retry after the given number of seconds.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Any other non-success response.
    #[error("API error: {status} - {}", .message.as_deref().unwrap_or("(no details)"))]
    Status {
        status: u16,
        message: Option<String>,
    },

    /// The response body was not what we expected.
    #[error("Decode error: {0}")]
    Decode(String),
}

/// Coarse error categories used to pick a user-facing message and decide
/// whether an operation can be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Timeout,
    Client,
    Server,
}

impl BackendError {
    /// Map a non-success HTTP status and its body to an error.
    #[must_use]
    pub fn from_status(status: StatusCode, body: &str, retry_after: Option<u64>) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => Self::Unauthorized,
            StatusCode::NOT_FOUND => Self::NotFound,
            StatusCode::TOO_MANY_REQUESTS => Self::RateLimited(retry_after.unwrap_or(1)),
            _ => Self::Status {
                status: status.as_u16(),
                message: extract_error_message(body),
            },
        }
    }

    /// Category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) => ErrorKind::Network,
            Self::Timeout => ErrorKind::Timeout,
            Self::Unauthorized | Self::NotFound | Self::RateLimited(_) => ErrorKind::Client,
            Self::Status { status, .. } if *status < 500 => ErrorKind::Client,
            Self::Status { .. } | Self::Decode(_) => ErrorKind::Server,
        }
    }

    /// Transient failures worth retrying for idempotent requests.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout | Self::RateLimited(_) => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Unauthorized | Self::NotFound | Self::Decode(_) => false,
        }
    }

    /// HTTP status reported by the backend, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized => Some(401),
            Self::NotFound => Some(404),
            Self::RateLimited(_) => Some(429),
            Self::Status { status, .. } => Some(*status),
            Self::Network(_) | Self::Timeout | Self::Decode(_) => None,
        }
    }

    /// Message safe to show to customers.
    ///
    /// Validation messages from 4xx responses are passed through; server
    /// and transport failures get a generic message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => {
                "We couldn't reach the store. Check your connection and try again.".to_string()
            }
            Self::Timeout => "The store took too long to respond. Please try again.".to_string(),
            Self::Unauthorized => "Your session has expired. Please sign in again.".to_string(),
            Self::NotFound => "We couldn't find what you were looking for.".to_string(),
            Self::RateLimited(_) => {
                "Too many requests. Please wait a moment and try again.".to_string()
            }
            Self::Status {
                status, message, ..
            } if *status < 500 => message
                .clone()
                .unwrap_or_else(|| "The request could not be completed.".to_string()),
            Self::Status { .. } | Self::Decode(_) => {
                "Something went wrong on our side. Please try again later.".to_string()
            }
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Flatten a DRF-style error body into one readable message.
///
/// Handles `{"detail": ".."}`, `{"message": ".."}`, `{"error": ".."}`,
/// `{"non_field_errors": [..]}` and per-field lists such as
/// `{"email": ["Already registered."]}`.
#[must_use]
pub fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let message = flatten_errors(&value, None);
    if message.is_empty() {
        None
    } else {
        Some(message.join(" "))
    }
}

fn flatten_errors(value: &serde_json::Value, field: Option<&str>) -> Vec<String> {
    use serde_json::Value;

    match value {
        Value::String(text) => {
            let text = text.trim();
            if text.is_empty() {
                return Vec::new();
            }
            match field {
                Some(name) => vec![format!("{}: {text}", humanize_field(name))],
                None => vec![text.to_string()],
            }
        }
        Value::Array(items) => items
            .iter()
            .flat_map(|item| flatten_errors(item, field))
            .collect(),
        Value::Object(map) => {
            for key in ["detail", "message", "error"] {
                if let Some(Value::String(text)) = map.get(key) {
                    return flatten_errors(&Value::String(text.clone()), None);
                }
            }
            map.iter()
                .filter(|(key, _)| key.as_str() != "code" && key.as_str() != "status")
                .flat_map(|(key, nested)| {
                    let field = (key != "non_field_errors").then_some(key.as_str());
                    flatten_errors(nested, field)
                })
                .collect()
        }
        _ => Vec::new(),
    }
}

fn humanize_field(name: &str) -> String {
    let spaced = name.replace('_', " ");
    let mut chars = spaced.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_message() {
        assert_eq!(
            extract_error_message(r#"{"detail": "Coupon expired."}"#).as_deref(),
            Some("Coupon expired.")
        );
    }

    #[test]
    fn test_field_errors_are_labelled() {
        let message =
            extract_error_message(r#"{"email": ["A user with that email already exists."]}"#);
        assert_eq!(
            message.as_deref(),
            Some("Email: A user with that email already exists.")
        );
    }

    #[test]
    fn test_non_field_errors_unlabelled() {
        let message = extract_error_message(
            r#"{"non_field_errors": ["Unable to log in.", "Check your credentials."]}"#,
        );
        assert_eq!(
            message.as_deref(),
            Some("Unable to log in. Check your credentials.")
        );
    }

    #[test]
    fn test_non_json_body() {
        assert_eq!(extract_error_message("<html>Bad Gateway</html>"), None);
        assert_eq!(extract_error_message("{}"), None);
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            BackendError::from_status(StatusCode::UNAUTHORIZED, "", None),
            BackendError::Unauthorized
        ));
        assert!(matches!(
            BackendError::from_status(StatusCode::TOO_MANY_REQUESTS, "", Some(7)),
            BackendError::RateLimited(7)
        ));
        let err = BackendError::from_status(
            StatusCode::BAD_REQUEST,
            r#"{"detail": "Out of stock"}"#,
            None,
        );
        assert_eq!(err.kind(), ErrorKind::Client);
        assert_eq!(err.user_message(), "Out of stock");
    }

    #[test]
    fn test_server_errors_hide_details() {
        let err = BackendError::from_status(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"detail": "IntegrityError at /orders/"}"#,
            None,
        );
        assert_eq!(err.kind(), ErrorKind::Server);
        assert!(err.is_retryable());
        assert!(!err.user_message().contains("IntegrityError"));
    }

    #[test]
    fn test_retryable_categories() {
        assert!(BackendError::Timeout.is_retryable());
        assert!(BackendError::Network("reset".into()).is_retryable());
        assert!(BackendError::RateLimited(1).is_retryable());
        assert!(!BackendError::NotFound.is_retryable());
        assert!(
            !BackendError::Status {
                status: 400,
                message: None
            }
            .is_retryable()
        );
    }
}
