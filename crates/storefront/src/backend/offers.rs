//! Server-side offer calculation.

use reqwest::Method;
use tracing::instrument;

use super::client::BackendClient;
use super::types::{OfferCalculation, OfferRequest};
use super::BackendError;

impl BackendClient {
    /// Ask the backend which offers apply to a set of cart lines.
    ///
    /// Sent once; callers fall back to undiscounted totals on failure.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend request fails.
    #[instrument(skip(self, request, token), fields(lines = request.items.len()))]
    pub async fn calculate_offers(
        &self,
        request: &OfferRequest,
        token: Option<&str>,
    ) -> Result<OfferCalculation, BackendError> {
        self.send_json(Method::POST, "offers/calculate/", Some(request), token)
            .await
    }
}
