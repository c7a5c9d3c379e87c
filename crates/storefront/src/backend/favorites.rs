//! Account favorites endpoints.

use reqwest::Method;
use serde_json::json;
use tracing::instrument;

use stride_core::{FavoriteId, ProductId};

use super::client::BackendClient;
use super::types::{Favorite, FavoriteToggle};
use super::BackendError;

impl BackendClient {
    /// # Errors
    ///
    /// Returns an error if the backend request fails.
    #[instrument(skip_all)]
    pub async fn list_favorites(&self, token: &str) -> Result<Vec<Favorite>, BackendError> {
        self.get_json("favorites/", &[], Some(token)).await
    }

    /// # Errors
    ///
    /// Returns an error if the backend request fails.
    #[instrument(skip(self, token), fields(product_id = %product_id))]
    pub async fn add_favorite(
        &self,
        token: &str,
        product_id: ProductId,
    ) -> Result<Favorite, BackendError> {
        self.send_json(
            Method::POST,
            "favorites/",
            Some(&json!({ "product_id": product_id })),
            Some(token),
        )
        .await
    }

    /// # Errors
    ///
    /// Returns an error if the backend request fails.
    #[instrument(skip(self, token), fields(favorite_id = %favorite_id))]
    pub async fn remove_favorite(
        &self,
        token: &str,
        favorite_id: FavoriteId,
    ) -> Result<(), BackendError> {
        self.send_no_content::<()>(
            Method::DELETE,
            &format!("favorites/{favorite_id}/"),
            None,
            Some(token),
        )
        .await
    }

    /// Flip a product's favorite state.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend request fails.
    #[instrument(skip(self, token), fields(product_id = %product_id))]
    pub async fn toggle_favorite(
        &self,
        token: &str,
        product_id: ProductId,
    ) -> Result<FavoriteToggle, BackendError> {
        self.send_json(
            Method::POST,
            "favorites/toggle/",
            Some(&json!({ "product_id": product_id })),
            Some(token),
        )
        .await
    }

    /// Copy guest favorites into the account after sign-in.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend request fails.
    #[instrument(skip(self, token, product_ids), fields(count = product_ids.len()))]
    pub async fn merge_favorites(
        &self,
        token: &str,
        product_ids: &[ProductId],
    ) -> Result<(), BackendError> {
        self.send_no_content(
            Method::POST,
            "favorites/merge/",
            Some(&json!({ "product_ids": product_ids })),
            Some(token),
        )
        .await
    }
}
