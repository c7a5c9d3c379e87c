//! Account cart endpoints (signed-in customers) and guest coupon checks.

use reqwest::Method;
use serde_json::json;
use tracing::instrument;

use stride_core::{CartItemId, Money};

use super::client::BackendClient;
use super::types::{AddCartItem, Cart, CouponValidation, MergeCartLine};
use super::BackendError;

impl BackendClient {
    /// Get the customer's cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend request fails.
    #[instrument(skip_all)]
    pub async fn get_cart(&self, token: &str) -> Result<Cart, BackendError> {
        self.get_json("cart/", &[], Some(token)).await
    }

    /// Add a line to the customer's cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the item (e.g. out of stock).
    #[instrument(skip(self, token), fields(product_id = %item.product_id, quantity = item.quantity))]
    pub async fn add_cart_item(&self, token: &str, item: &AddCartItem) -> Result<Cart, BackendError> {
        self.send_json(Method::POST, "cart/items/", Some(item), Some(token))
            .await
    }

    /// Set a line's quantity.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend request fails.
    #[instrument(skip(self, token), fields(item_id = %item_id))]
    pub async fn update_cart_item(
        &self,
        token: &str,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<Cart, BackendError> {
        self.send_json(
            Method::PATCH,
            &format!("cart/items/{item_id}/"),
            Some(&json!({ "quantity": quantity })),
            Some(token),
        )
        .await
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend request fails.
    #[instrument(skip(self, token), fields(item_id = %item_id))]
    pub async fn remove_cart_item(&self, token: &str, item_id: CartItemId) -> Result<(), BackendError> {
        self.send_no_content::<()>(
            Method::DELETE,
            &format!("cart/items/{item_id}/"),
            None,
            Some(token),
        )
        .await
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend request fails.
    #[instrument(skip_all)]
    pub async fn clear_cart(&self, token: &str) -> Result<(), BackendError> {
        self.send_no_content::<()>(Method::POST, "cart/clear/", None, Some(token))
            .await
    }

    /// Apply a coupon code to the customer's cart.
    ///
    /// # Errors
    ///
    /// Returns a 4xx `BackendError::Status` carrying the reason when the
    /// code is invalid or not applicable.
    #[instrument(skip(self, token))]
    pub async fn apply_coupon(&self, token: &str, code: &str) -> Result<Cart, BackendError> {
        self.send_json(
            Method::POST,
            "cart/apply-coupon/",
            Some(&json!({ "code": code })),
            Some(token),
        )
        .await
    }

    /// Remove the coupon from the customer's cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend request fails.
    #[instrument(skip_all)]
    pub async fn remove_coupon(&self, token: &str) -> Result<Cart, BackendError> {
        self.send_json::<(), _>(Method::POST, "cart/remove-coupon/", None, Some(token))
            .await
    }

    /// Merge guest lines into the customer's cart after sign-in.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend request fails.
    #[instrument(skip(self, token, lines), fields(lines = lines.len()))]
    pub async fn merge_cart(
        &self,
        token: &str,
        lines: &[MergeCartLine],
    ) -> Result<Cart, BackendError> {
        self.send_json(
            Method::POST,
            "cart/merge/",
            Some(&json!({ "items": lines })),
            Some(token),
        )
        .await
    }

    /// Check a coupon against a guest cart subtotal without applying it.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend request fails.
    #[instrument(skip(self))]
    pub async fn validate_coupon(
        &self,
        code: &str,
        subtotal: Money,
    ) -> Result<CouponValidation, BackendError> {
        self.send_json(
            Method::POST,
            "coupons/validate/",
            Some(&json!({ "code": code, "subtotal": subtotal })),
            None,
        )
        .await
    }
}
