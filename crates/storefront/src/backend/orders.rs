//! Order placement, history and public tracking.

use reqwest::Method;
use reqwest::multipart::{Form, Part};
use tracing::{info, instrument};

use stride_core::OrderId;

use super::client::BackendClient;
use super::types::{NewOrder, Order, Page};
use super::BackendError;

impl BackendClient {
    /// Place an order as a multipart form so a payment receipt can ride
    /// along. Guests omit the token.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the order.
    #[instrument(
        skip(self, token, order),
        fields(payment_method = %order.payment_method, lines = order.items.len())
    )]
    pub async fn create_order(
        &self,
        token: Option<&str>,
        order: NewOrder,
    ) -> Result<Order, BackendError> {
        let form = order_form(order)?;
        let request = self
            .request(Method::POST, "orders/orders/", token)?
            .multipart(form);
        let created: Order = self.send_request(request).await?;

        info!(order_number = %created.order_number, "Order placed");
        Ok(created)
    }

    /// The customer's order history, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend request fails.
    #[instrument(skip(self, token))]
    pub async fn list_orders(&self, token: &str, page: u32) -> Result<Page<Order>, BackendError> {
        let params = if page > 1 {
            vec![("page", page.to_string())]
        } else {
            Vec::new()
        };
        self.get_json("orders/orders/", &params, Some(token)).await
    }

    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if the order is not the customer's.
    #[instrument(skip(self, token))]
    pub async fn get_order(&self, token: &str, id: OrderId) -> Result<Order, BackendError> {
        self.get_json(&format!("orders/orders/{id}/"), &[], Some(token))
            .await
    }

    /// # Errors
    ///
    /// Returns a 4xx error if the order can no longer be cancelled.
    #[instrument(skip(self, token))]
    pub async fn cancel_order(&self, token: &str, id: OrderId) -> Result<Order, BackendError> {
        self.send_json::<(), _>(
            Method::POST,
            &format!("orders/orders/{id}/cancel/"),
            None,
            Some(token),
        )
        .await
    }

    /// Public tracking by order number.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` for unknown numbers.
    #[instrument(skip(self))]
    pub async fn track_order(&self, order_number: &str) -> Result<Order, BackendError> {
        let path = format!("orders/track/{}/", urlencoding::encode(order_number.trim()));
        self.get_json(&path, &[], None).await
    }
}

/// Build the multipart body. Nested data goes in as JSON text fields.
fn order_form(order: NewOrder) -> Result<Form, BackendError> {
    let NewOrder {
        shipping_address,
        governorate_id,
        payment_method,
        sender_phone,
        transaction_reference,
        coupon_code,
        items,
        payment_proof,
    } = order;

    let mut form = Form::new()
        .text("shipping_address", serde_json::to_string(&shipping_address)?)
        .text("items", serde_json::to_string(&items)?)
        .text("governorate_id", governorate_id)
        .text("payment_method", payment_method.as_str());

    if let Some(phone) = sender_phone {
        form = form.text("sender_phone", phone);
    }
    if let Some(reference) = transaction_reference {
        form = form.text("transaction_reference", reference);
    }
    if let Some(code) = coupon_code {
        form = form.text("coupon_code", code);
    }
    if let Some(proof) = payment_proof {
        let part = Part::bytes(proof.bytes)
            .file_name(proof.file_name)
            .mime_str(&proof.content_type)
            .map_err(|e| BackendError::Decode(format!("invalid payment proof type: {e}")))?;
        form = form.part("payment_proof", part);
    }

    Ok(form)
}
