//! Session-related types.
//!
//! Types stored in the session for authentication state.

use serde::{Deserialize, Serialize};

use crate::backend::UserProfile;

/// Access tokens are refreshed this many seconds before they expire.
pub const REFRESH_MARGIN_SECS: i64 = 60;

/// Backend JWT pair held server-side in the session.
///
/// Implements `Debug` manually to keep tokens out of logs.
#[derive(Clone, Serialize, Deserialize)]
pub struct SessionTokens {
    pub access: String,
    pub refresh: String,
    /// Unix timestamp (seconds) at which `access` expires.
    pub expires_at: i64,
}

impl SessionTokens {
    /// Whether the access token is expired or about to be.
    #[must_use]
    pub const fn needs_refresh(&self, now: i64) -> bool {
        now >= self.expires_at - REFRESH_MARGIN_SECS
    }
}

impl std::fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTokens")
            .field("access", &"[REDACTED]")
            .field("refresh", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Session-stored customer identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentCustomer {
    pub user: UserProfile,
    pub tokens: SessionTokens,
}

impl CurrentCustomer {
    /// Bearer token for backend calls.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.tokens.access
    }
}

/// Session keys.
pub mod keys {
    /// Key for storing the signed-in customer and their tokens.
    pub const CURRENT_CUSTOMER: &str = "current_customer";

    /// Key for the guest cart.
    pub const GUEST_CART: &str = "guest_cart";

    /// Key for guest favorites.
    pub const GUEST_FAVORITES: &str = "guest_favorites";

    /// Key for the last offer breakdown and the cart it was computed for.
    pub const OFFERS: &str = "offers";

    /// Key for the most recently placed order number.
    pub const LAST_ORDER: &str = "last_order";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(expires_at: i64) -> SessionTokens {
        SessionTokens {
            access: "header.payload.signature".to_string(),
            refresh: "refresh-token".to_string(),
            expires_at,
        }
    }

    #[test]
    fn test_needs_refresh_inside_margin() {
        let now = 1_700_000_000;
        assert!(!tokens(now + 300).needs_refresh(now));
        assert!(tokens(now + 30).needs_refresh(now));
        assert!(tokens(now - 5).needs_refresh(now));
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let output = format!("{:?}", tokens(0));
        assert!(!output.contains("refresh-token"));
        assert!(!output.contains("payload"));
    }
}
