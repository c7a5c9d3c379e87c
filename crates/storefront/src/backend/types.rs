//! Request and response shapes of the store backend.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use stride_core::{
    CartItemId, CategoryId, FavoriteId, FlashSaleId, Money, OfferId, OrderId, OrderStatus,
    PaymentMethod, PaymentStatus, ProductId, UserId, VariantId,
};

// =============================================================================
// Shared
// =============================================================================

/// Paginated list response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub count: u64,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.next.is_some()
    }

    #[must_use]
    pub const fn has_previous(&self) -> bool {
        self.previous.is_some()
    }
}

// =============================================================================
// Catalog
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub name_ar: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductImage {
    pub url: String,
    #[serde(default)]
    pub alt: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
}

/// One purchasable size/colour combination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductVariant {
    pub id: VariantId,
    pub size: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub price_override: Option<Money>,
}

impl ProductVariant {
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }

    /// Label such as `"42 / Black"`.
    #[must_use]
    pub fn label(&self) -> String {
        match &self.color {
            Some(color) => format!("{} / {color}", self.size),
            None => self.size.clone(),
        }
    }
}

/// Flash sale currently attached to a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlashSaleBadge {
    pub id: FlashSaleId,
    pub name: String,
    pub discount_percentage: Decimal,
    pub ends_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    pub price: Money,
    /// Server-computed sale price, if any
    #[serde(default)]
    pub sale_price: Option<Money>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub images: Vec<ProductImage>,
    #[serde(default)]
    pub variants: Vec<ProductVariant>,
    #[serde(default)]
    pub flash_sale: Option<FlashSaleBadge>,
    #[serde(default = "default_true")]
    pub in_stock: bool,
}

const fn default_true() -> bool {
    true
}

impl Product {
    /// The price a customer pays today.
    #[must_use]
    pub fn current_price(&self) -> Money {
        self.sale_price.unwrap_or(self.price)
    }

    #[must_use]
    pub fn is_on_sale(&self) -> bool {
        self.sale_price.is_some_and(|sale| sale < self.price)
    }

    /// Unit price for a specific variant, falling back to the product price.
    #[must_use]
    pub fn unit_price(&self, variant_id: Option<VariantId>) -> Money {
        variant_id
            .and_then(|id| self.variant(id))
            .and_then(|variant| variant.price_override)
            .unwrap_or_else(|| self.current_price())
    }

    #[must_use]
    pub fn variant(&self, id: VariantId) -> Option<&ProductVariant> {
        self.variants.iter().find(|variant| variant.id == id)
    }

    #[must_use]
    pub fn primary_image(&self) -> Option<&str> {
        self.images
            .iter()
            .find(|image| image.is_primary)
            .or_else(|| self.images.first())
            .map(|image| image.url.as_str())
    }

    /// Whether any variant (or the product itself) can be bought.
    #[must_use]
    pub fn is_available(&self) -> bool {
        if self.variants.is_empty() {
            self.in_stock
        } else {
            self.variants.iter().any(ProductVariant::in_stock)
        }
    }
}

/// Product list sort orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Popular,
}

impl ProductSort {
    pub const ALL: [Self; 4] = [Self::Newest, Self::PriceAsc, Self::PriceDesc, Self::Popular];

    /// Backend `ordering` parameter.
    #[must_use]
    pub const fn ordering(self) -> &'static str {
        match self {
            Self::Newest => "-created_at",
            Self::PriceAsc => "price",
            Self::PriceDesc => "-price",
            Self::Popular => "-sales_count",
        }
    }

    /// Value used in storefront query strings.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::PriceAsc => "price-asc",
            Self::PriceDesc => "price-desc",
            Self::Popular => "popular",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Newest => "Newest",
            Self::PriceAsc => "Price: low to high",
            Self::PriceDesc => "Price: high to low",
            Self::Popular => "Most popular",
        }
    }
}

/// Filters for the product list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductQuery {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub sort: Option<ProductSort>,
}

impl ProductQuery {
    /// Query parameters understood by the backend.
    #[must_use]
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![(
            "ordering",
            self.sort.unwrap_or_default().ordering().to_string(),
        )];
        if let Some(page) = self.page.filter(|page| *page > 1) {
            params.push(("page", page.to_string()));
        }
        if let Some(category) = self.category.as_deref().filter(|c| !c.is_empty()) {
            params.push(("category", category.to_string()));
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            params.push(("search", search.to_string()));
        }
        params
    }

    /// Whether the result may be served from the shared cache.
    #[must_use]
    pub fn is_cacheable(&self) -> bool {
        self.search.as_deref().is_none_or(|s| s.trim().is_empty())
    }
}

// =============================================================================
// Cart
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartProduct {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartVariant {
    pub id: VariantId,
    pub size: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub product: CartProduct,
    #[serde(default)]
    pub variant: Option<CartVariant>,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedCoupon {
    pub code: String,
    pub discount_amount: Money,
}

/// Server-computed cart totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartSummary {
    pub subtotal: Money,
    #[serde(default)]
    pub discount: Money,
    pub total: Money,
    pub item_count: u32,
    #[serde(default)]
    pub coupon: Option<AppliedCoupon>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    #[serde(default)]
    pub items: Vec<CartItem>,
    pub summary: CartSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddCartItem {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub quantity: u32,
}

/// One guest line replayed into the account cart after sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeCartLine {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub quantity: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CouponValidation {
    pub valid: bool,
    #[serde(default)]
    pub discount_amount: Money,
    #[serde(default)]
    pub message: Option<String>,
}

// =============================================================================
// Favorites
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FavoriteProduct {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub price: Money,
    #[serde(default)]
    pub sale_price: Option<Money>,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Favorite {
    pub id: FavoriteId,
    pub product: FavoriteProduct,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FavoriteToggle {
    pub is_favorite: bool,
    #[serde(default)]
    pub favorite_id: Option<FavoriteId>,
}

// =============================================================================
// Offers
// =============================================================================

/// A cart line as sent to the offer calculator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferLine {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub quantity: u32,
    pub unit_price: Money,
}

#[derive(Debug, Clone, Serialize)]
pub struct OfferRequest {
    pub items: Vec<OfferLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferKind {
    FlashSale,
    BuyXGetY,
    Bundle,
    FreeShipping,
    Percentage,
    FixedAmount,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedOffer {
    pub id: OfferId,
    pub name: String,
    pub offer_type: OfferKind,
    pub discount_amount: Money,
    #[serde(default)]
    pub affected_products: Vec<ProductId>,
}

/// Server-computed offer breakdown for a set of cart lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferCalculation {
    pub original_total: Money,
    pub discounted_total: Money,
    pub total_discount: Money,
    #[serde(default)]
    pub free_shipping: bool,
    #[serde(default)]
    pub coupons_blocked: bool,
    #[serde(default)]
    pub blocking_reason: Option<String>,
    #[serde(default)]
    pub applied_offers: Vec<AppliedOffer>,
}

impl OfferCalculation {
    /// Breakdown of an empty cart.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            original_total: Money::ZERO,
            discounted_total: Money::ZERO,
            total_discount: Money::ZERO,
            free_shipping: false,
            coupons_blocked: false,
            blocking_reason: None,
            applied_offers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlashSale {
    pub id: FlashSaleId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub discount_percentage: Decimal,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[serde(default)]
    pub products: Vec<Product>,
}

impl FlashSale {
    #[must_use]
    pub fn is_running(&self, now: DateTime<Utc>) -> bool {
        self.starts_at <= now && now < self.ends_at
    }

    /// Whole seconds left, zero once ended.
    #[must_use]
    pub fn seconds_remaining(&self, now: DateTime<Utc>) -> i64 {
        (self.ends_at - now).num_seconds().max(0)
    }
}

// =============================================================================
// Auth
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl UserProfile {
    /// Full name, or the email when no name is on file.
    #[must_use]
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        let name = name.trim();
        if name.is_empty() {
            self.email.clone()
        } else {
            name.to_string()
        }
    }
}

#[derive(Serialize)]
pub struct Credentials<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Serialize)]
pub struct Registration<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<&'a str>,
}

/// Token pair plus the signed-in user.
#[derive(Deserialize)]
pub struct AuthResponse {
    pub access: String,
    pub refresh: String,
    pub user: UserProfile,
}

/// Refresh response. `refresh` is present when the backend rotates tokens.
#[derive(Deserialize)]
pub struct RefreshedTokens {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileUpdate {
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub full_name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    pub governorate: String,
    pub city: String,
    pub address: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_name: String,
    #[serde(default)]
    pub variant_label: Option<String>,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEvent {
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    pub subtotal: Money,
    #[serde(default)]
    pub shipping_cost: Money,
    #[serde(default)]
    pub discount: Money,
    pub total: Money,
    pub shipping_address: ShippingAddress,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub status_history: Vec<StatusEvent>,
}

impl Order {
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}

/// Uploaded transfer receipt.
#[derive(Clone)]
pub struct PaymentProof {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for PaymentProof {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentProof")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Everything the backend needs to place an order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub shipping_address: ShippingAddress,
    pub governorate_id: String,
    pub payment_method: PaymentMethod,
    pub sender_phone: Option<String>,
    pub transaction_reference: Option<String>,
    pub coupon_code: Option<String>,
    pub items: Vec<OfferLine>,
    pub payment_proof: Option<PaymentProof>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product_json() -> &'static str {
        r#"{
            "id": 7,
            "name": "Runner Pro",
            "slug": "runner-pro",
            "price": "1200.00",
            "sale_price": "999.00",
            "images": [
                {"url": "/media/a.jpg"},
                {"url": "/media/b.jpg", "is_primary": true}
            ],
            "variants": [
                {"id": 70, "size": "42", "color": "Black", "stock": 3},
                {"id": 71, "size": "43", "stock": 0, "price_override": "1050.00"}
            ]
        }"#
    }

    #[test]
    fn test_product_prices() {
        let product: Product = serde_json::from_str(product_json()).unwrap();
        assert!(product.is_on_sale());
        assert_eq!(product.current_price(), Money::from_piastres(99_900));
        assert_eq!(
            product.unit_price(Some(VariantId::new(71))),
            Money::from_piastres(105_000)
        );
        assert_eq!(
            product.unit_price(Some(VariantId::new(70))),
            Money::from_piastres(99_900)
        );
        assert_eq!(product.primary_image(), Some("/media/b.jpg"));
        assert!(product.is_available());
    }

    #[test]
    fn test_variant_label() {
        let product: Product = serde_json::from_str(product_json()).unwrap();
        assert_eq!(product.variants[0].label(), "42 / Black");
        assert_eq!(product.variants[1].label(), "43");
    }

    #[test]
    fn test_product_query_params() {
        let query = ProductQuery {
            page: Some(2),
            category: Some("running".to_string()),
            search: Some("  ".to_string()),
            sort: Some(ProductSort::PriceAsc),
        };
        let params = query.to_params();
        assert!(params.contains(&("ordering", "price".to_string())));
        assert!(params.contains(&("page", "2".to_string())));
        assert!(params.contains(&("category", "running".to_string())));
        assert!(!params.iter().any(|(key, _)| *key == "search"));
        assert!(query.is_cacheable());
    }

    #[test]
    fn test_unknown_offer_kind() {
        let offer: AppliedOffer = serde_json::from_str(
            r#"{"id": 1, "name": "Loyalty", "offer_type": "loyalty_points", "discount_amount": "10"}"#,
        )
        .unwrap();
        assert_eq!(offer.offer_type, OfferKind::Other);
    }
}
