//! JWT authentication and profile endpoints.

use reqwest::Method;
use serde_json::json;
use tracing::instrument;

use super::client::BackendClient;
use super::types::{
    AuthResponse, Credentials, ProfileUpdate, RefreshedTokens, Registration, UserProfile,
};
use super::BackendError;

impl BackendClient {
    /// Exchange credentials for a token pair.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Unauthorized` or a 400 status for bad credentials.
    #[instrument(skip_all)]
    pub async fn login(&self, credentials: &Credentials<'_>) -> Result<AuthResponse, BackendError> {
        self.send_json(Method::POST, "auth/login/", Some(credentials), None)
            .await
    }

    /// Create an account. The backend signs the new customer in.
    ///
    /// # Errors
    ///
    /// Returns a 400 status with field messages (e.g. email taken).
    #[instrument(skip_all)]
    pub async fn register(
        &self,
        registration: &Registration<'_>,
    ) -> Result<AuthResponse, BackendError> {
        self.send_json(Method::POST, "auth/register/", Some(registration), None)
            .await
    }

    /// Trade a refresh token for a new access token.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Unauthorized` when the refresh token is no
    /// longer valid.
    #[instrument(skip_all)]
    pub async fn refresh_token(&self, refresh: &str) -> Result<RefreshedTokens, BackendError> {
        self.send_json(
            Method::POST,
            "auth/token/refresh/",
            Some(&json!({ "refresh": refresh })),
            None,
        )
        .await
    }

    /// Blacklist the refresh token.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend request fails.
    #[instrument(skip_all)]
    pub async fn logout(&self, access: &str, refresh: &str) -> Result<(), BackendError> {
        self.send_no_content(
            Method::POST,
            "auth/logout/",
            Some(&json!({ "refresh": refresh })),
            Some(access),
        )
        .await
    }

    /// # Errors
    ///
    /// Returns an error if the backend request fails.
    #[instrument(skip_all)]
    pub async fn get_profile(&self, token: &str) -> Result<UserProfile, BackendError> {
        self.get_json("auth/profile/", &[], Some(token)).await
    }

    /// # Errors
    ///
    /// Returns an error if the backend rejects the update.
    #[instrument(skip_all)]
    pub async fn update_profile(
        &self,
        token: &str,
        update: &ProfileUpdate,
    ) -> Result<UserProfile, BackendError> {
        self.send_json(Method::PATCH, "auth/profile/", Some(update), Some(token))
            .await
    }

    /// # Errors
    ///
    /// Returns a 400 status if the current password is wrong.
    #[instrument(skip_all)]
    pub async fn change_password(
        &self,
        token: &str,
        current: &str,
        new: &str,
    ) -> Result<(), BackendError> {
        self.send_no_content(
            Method::POST,
            "auth/change-password/",
            Some(&json!({ "old_password": current, "new_password": new })),
            Some(token),
        )
        .await
    }
}
