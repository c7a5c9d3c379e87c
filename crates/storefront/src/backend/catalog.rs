//! Products, categories and flash sales.

use tracing::{debug, instrument};

use stride_core::ProductId;

use super::client::{BackendClient, CacheValue};
use super::types::{Category, FlashSale, Page, Product, ProductQuery};
use super::BackendError;

const FLASH_SALES_KEY: &str = "active";

impl BackendClient {
    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if the product does not exist.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_product(&self, id: ProductId) -> Result<Product, BackendError> {
        let cache_key = format!("product:{id}");

        if let Some(CacheValue::Product(product)) = self.cache().get(&cache_key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let product: Product = self
            .get_json(&format!("products/{id}/"), &[], None)
            .await?;

        self.cache()
            .insert(cache_key, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }

    /// List products with filters, sorting and pagination.
    ///
    /// Searches bypass the cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend request fails.
    #[instrument(skip(self), fields(page = ?query.page, category = ?query.category))]
    pub async fn list_products(&self, query: &ProductQuery) -> Result<Page<Product>, BackendError> {
        let params = query.to_params();
        let cache_key = format!("products:{params:?}");

        if query.is_cacheable()
            && let Some(CacheValue::Products(page)) = self.cache().get(&cache_key).await
        {
            debug!("Cache hit for product list");
            return Ok(page);
        }

        let page: Page<Product> = self.get_json("products/", &params, None).await?;

        if query.is_cacheable() {
            self.cache()
                .insert(cache_key, CacheValue::Products(page.clone()))
                .await;
        }

        Ok(page)
    }

    /// All product categories.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend request fails.
    #[instrument(skip(self))]
    pub async fn list_categories(&self) -> Result<Vec<Category>, BackendError> {
        let cache_key = "categories".to_string();

        if let Some(CacheValue::Categories(categories)) = self.cache().get(&cache_key).await {
            return Ok(categories);
        }

        let categories: Vec<Category> = self.get_json("products/categories/", &[], None).await?;
        self.cache()
            .insert(cache_key, CacheValue::Categories(categories.clone()))
            .await;

        Ok(categories)
    }

    /// Flash sales running right now, cached for 60 seconds.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend request fails.
    #[instrument(skip(self))]
    pub async fn active_flash_sales(&self) -> Result<Vec<FlashSale>, BackendError> {
        if let Some(sales) = self.flash_sale_cache().get(&FLASH_SALES_KEY).await {
            return Ok(sales);
        }

        let sales: Vec<FlashSale> = self
            .get_json("offers/flash-sales/active/", &[], None)
            .await?;
        self.flash_sale_cache()
            .insert(FLASH_SALES_KEY, sales.clone())
            .await;

        Ok(sales)
    }

    /// Drop a cached product, e.g. after a stock error.
    pub async fn invalidate_product(&self, id: ProductId) {
        self.cache().invalidate(&format!("product:{id}")).await;
    }
}
