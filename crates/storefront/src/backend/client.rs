//! HTTP plumbing shared by all backend endpoints.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::{Method, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error};
use url::Url;

use super::retry::{RetryPolicy, with_retry};
use super::types::{Category, FlashSale, Page, Product};
use super::BackendError;
use crate::config::BackendConfig;

/// Cached catalog responses.
#[derive(Debug, Clone)]
pub(super) enum CacheValue {
    Product(Box<Product>),
    Products(Page<Product>),
    Categories(Vec<Category>),
}

/// Client for the store REST backend.
///
/// Catalog reads are cached for 5 minutes, active flash sales for 60
/// seconds. Cart, favorites and order calls always hit the backend.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<BackendClientInner>,
}

struct BackendClientInner {
    client: reqwest::Client,
    base_url: Url,
    retry: RetryPolicy,
    cache: Cache<String, CacheValue>,
    flash_sales: Cache<&'static str, Vec<FlashSale>>,
}

impl BackendClient {
    /// Create a new backend client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("stride-storefront/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        let flash_sales = Cache::builder()
            .max_capacity(1)
            .time_to_live(Duration::from_secs(60))
            .build();

        Ok(Self {
            inner: Arc::new(BackendClientInner {
                client,
                base_url: config.api_url.clone(),
                retry: RetryPolicy::from_config(config),
                cache,
                flash_sales,
            }),
        })
    }

    pub(super) fn cache(&self) -> &Cache<String, CacheValue> {
        &self.inner.cache
    }

    pub(super) fn flash_sale_cache(&self) -> &Cache<&'static str, Vec<FlashSale>> {
        &self.inner.flash_sales
    }

    /// Resolve an endpoint path such as `cart/items/` against the base URL.
    fn url(&self, path: &str) -> Result<Url, BackendError> {
        self.inner
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| BackendError::Network(format!("invalid endpoint '{path}': {e}")))
    }

    pub(super) fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
    ) -> Result<RequestBuilder, BackendError> {
        let builder = self
            .inner
            .client
            .request(method, self.url(path)?)
            .header("Accept", "application/json");
        Ok(match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    /// GET with retries on transient failures.
    pub(super) async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        token: Option<&str>,
    ) -> Result<T, BackendError> {
        with_retry(&self.inner.retry, path, || async move {
            let request = self.request(Method::GET, path, token)?.query(query);
            let response = send(request).await?;
            read_json(response).await
        })
        .await
    }

    /// Non-idempotent JSON request, sent exactly once.
    pub(super) async fn send_json<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        token: Option<&str>,
    ) -> Result<T, BackendError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self.request(method, path, token)?;
        if let Some(body) = body {
            request = request.json(body);
        }
        read_json(send(request).await?).await
    }

    /// Request whose response body is ignored.
    pub(super) async fn send_no_content<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        token: Option<&str>,
    ) -> Result<(), BackendError>
    where
        B: Serialize + ?Sized,
    {
        let mut request = self.request(method, path, token)?;
        if let Some(body) = body {
            request = request.json(body);
        }
        send(request).await?;
        Ok(())
    }

    /// Send a prepared request (e.g. multipart) and decode the response.
    pub(super) async fn send_request<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, BackendError> {
        read_json(send(request).await?).await
    }
}

/// Send a request and turn non-success statuses into errors.
async fn send(request: RequestBuilder) -> Result<Response, BackendError> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get("Retry-After")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok());
    let url = response.url().path().to_string();
    let body = response.text().await.unwrap_or_default();

    if status.is_server_error() {
        error!(
            status = %status,
            path = %url,
            body = %body.chars().take(500).collect::<String>(),
            "Backend returned server error"
        );
    } else {
        debug!(status = %status, path = %url, "Backend returned client error");
    }

    Err(BackendError::from_status(status, &body, retry_after))
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
    let text = response.text().await?;
    // Some endpoints answer 204 or an empty body; treat it as JSON null.
    let text = if text.trim().is_empty() { "null" } else { &text };
    serde_json::from_str(text).map_err(|e| {
        error!(
            error = %e,
            body = %text.chars().take(500).collect::<String>(),
            "Failed to parse backend response"
        );
        BackendError::Decode(e.to_string())
    })
}
