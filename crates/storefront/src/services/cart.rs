//! Cart operations for guests and signed-in customers.
//!
//! Signed-in customers use the backend cart. Guests keep their cart in the
//! session; it is merged into the account on sign-in. Both render through
//! the same [`CartView`], with totals taken from the backend's offer
//! calculation.

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tower_sessions::Session;
use tracing::{debug, info, instrument};

use stride_core::{CartItemId, Money, ProductId, VariantId};

use super::offers::OfferService;
use crate::backend::{
    AddCartItem, AppliedOffer, BackendClient, BackendError, Cart, ErrorKind, OfferLine, Product,
};
use crate::models::{
    CurrentCustomer, GuestCart, GuestCartLine, GuestCoupon, GuestLineId, MAX_LINE_QUANTITY, keys,
};

/// Errors that can occur during cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    #[error("quantity must be between 1 and {max}")]
    InvalidQuantity { max: u32 },

    #[error("a size must be selected")]
    VariantRequired,

    #[error("unknown variant")]
    UnknownVariant,

    #[error("out of stock")]
    OutOfStock,

    #[error("only {available} left in stock")]
    InsufficientStock { available: u32 },

    #[error("cart line not found")]
    LineNotFound,

    #[error("cart is empty")]
    EmptyCart,

    #[error("coupon code is empty")]
    EmptyCoupon,

    #[error("coupons blocked: {0}")]
    CouponsBlocked(String),

    #[error("coupon rejected: {0}")]
    CouponRejected(String),

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

impl CartError {
    /// Message safe to show to customers.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidQuantity { max } => format!("Please choose a quantity from 1 to {max}."),
            Self::VariantRequired => "Please choose a size.".to_string(),
            Self::UnknownVariant => "That size is not available for this product.".to_string(),
            Self::OutOfStock => "Sorry, this item is out of stock.".to_string(),
            Self::InsufficientStock { available } => {
                format!("Only {available} left in stock.")
            }
            Self::LineNotFound => "That item is no longer in your cart.".to_string(),
            Self::EmptyCart => "Your cart is empty.".to_string(),
            Self::EmptyCoupon => "Please enter a coupon code.".to_string(),
            Self::CouponsBlocked(reason) | Self::CouponRejected(reason) => reason.clone(),
            Self::Backend(err) => err.user_message(),
            Self::Session(_) => "Something went wrong. Please try again.".to_string(),
        }
    }

    /// Whether the customer can fix this by changing their input.
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        match self {
            Self::Backend(err) => err.kind() == ErrorKind::Client,
            Self::Session(_) => false,
            _ => true,
        }
    }
}

// =============================================================================
// Views
// =============================================================================

/// One cart line ready for display.
#[derive(Debug, Clone, Serialize)]
pub struct CartLineView {
    /// Backend item id or guest line id, as used in forms
    pub id: String,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub name: String,
    pub slug: String,
    pub variant_label: Option<String>,
    pub image: Option<String>,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
}

#[derive(Debug, Clone, Serialize)]
pub struct CouponView {
    pub code: String,
    pub discount: Money,
}

/// The cart with server-computed totals.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    pub item_count: u32,
    pub subtotal: Money,
    /// Discount from automatic offers
    pub offer_discount: Money,
    pub coupon: Option<CouponView>,
    pub total: Money,
    pub free_shipping: bool,
    pub applied_offers: Vec<AppliedOffer>,
    /// Why coupons can't be used right now, if they can't
    pub coupons_blocked: Option<String>,
}

impl CartView {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            lines: Vec::new(),
            item_count: 0,
            subtotal: Money::ZERO,
            offer_discount: Money::ZERO,
            coupon: None,
            total: Money::ZERO,
            free_shipping: false,
            applied_offers: Vec::new(),
            coupons_blocked: None,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Combined offer and coupon discount.
    #[must_use]
    pub fn discount(&self) -> Money {
        self.offer_discount + self.coupon.as_ref().map_or(Money::ZERO, |c| c.discount)
    }

    /// Lines in the shape the offer calculator and order endpoint expect.
    #[must_use]
    pub fn offer_lines(&self) -> Vec<OfferLine> {
        self.lines
            .iter()
            .map(|line| OfferLine {
                product_id: line.product_id,
                variant_id: line.variant_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
            })
            .collect()
    }

    /// Total including shipping. Offers may waive shipping.
    #[must_use]
    pub fn total_with_shipping(&self, shipping: Money) -> Money {
        if self.free_shipping {
            self.total
        } else {
            self.total + shipping
        }
    }
}

fn server_lines(cart: &Cart) -> Vec<CartLineView> {
    cart.items
        .iter()
        .map(|item| CartLineView {
            id: item.id.to_string(),
            product_id: item.product.id,
            variant_id: item.variant.as_ref().map(|v| v.id),
            name: item.product.name.clone(),
            slug: item.product.slug.clone(),
            variant_label: item.variant.as_ref().map(|v| match &v.color {
                Some(color) => format!("{} / {color}", v.size),
                None => v.size.clone(),
            }),
            image: item.product.image.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            line_total: item.line_total,
        })
        .collect()
}

fn guest_lines(cart: &GuestCart) -> Vec<CartLineView> {
    cart.lines
        .iter()
        .map(|line| CartLineView {
            id: line.id.to_string(),
            product_id: line.product_id,
            variant_id: line.variant_id,
            name: line.name.clone(),
            slug: line.slug.clone(),
            variant_label: line.variant_label.clone(),
            image: line.image.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
            line_total: line.line_total(),
        })
        .collect()
}

/// Check the quantity a line would hold after a change against product
/// stock.
///
/// # Errors
///
/// Returns the reason the product can't be added.
pub fn check_availability(
    product: &Product,
    variant_id: Option<VariantId>,
    quantity: u32,
) -> Result<(), CartError> {
    if !(1..=MAX_LINE_QUANTITY).contains(&quantity) {
        return Err(CartError::InvalidQuantity {
            max: MAX_LINE_QUANTITY,
        });
    }

    if product.variants.is_empty() {
        if variant_id.is_some() {
            return Err(CartError::UnknownVariant);
        }
        if !product.in_stock {
            return Err(CartError::OutOfStock);
        }
        return Ok(());
    }

    let variant_id = variant_id.ok_or(CartError::VariantRequired)?;
    let variant = product.variant(variant_id).ok_or(CartError::UnknownVariant)?;
    if !variant.in_stock() {
        return Err(CartError::OutOfStock);
    }
    if quantity > variant.stock {
        return Err(CartError::InsufficientStock {
            available: variant.stock,
        });
    }
    Ok(())
}

// =============================================================================
// CartService
// =============================================================================

/// Cart operations for the current visitor.
pub struct CartService<'a> {
    backend: &'a BackendClient,
    session: &'a Session,
    customer: Option<&'a CurrentCustomer>,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(
        backend: &'a BackendClient,
        session: &'a Session,
        customer: Option<&'a CurrentCustomer>,
    ) -> Self {
        Self {
            backend,
            session,
            customer,
        }
    }

    fn token(&self) -> Option<&'a str> {
        self.customer.map(CurrentCustomer::access_token)
    }

    async fn guest_cart(&self) -> Result<GuestCart, CartError> {
        Ok(self
            .session
            .get::<GuestCart>(keys::GUEST_CART)
            .await?
            .unwrap_or_default())
    }

    async fn save_guest_cart(&self, cart: &GuestCart) -> Result<(), CartError> {
        self.session.insert(keys::GUEST_CART, cart).await?;
        Ok(())
    }

    /// The cart with current offers applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cart cannot be loaded.
    #[instrument(skip(self))]
    pub async fn view(&self) -> Result<CartView, CartError> {
        let (lines, coupon) = match self.token() {
            Some(token) => {
                let cart = self.backend.get_cart(token).await?;
                let coupon = cart.summary.coupon.as_ref().map(|c| CouponView {
                    code: c.code.clone(),
                    discount: c.discount_amount,
                });
                (server_lines(&cart), coupon)
            }
            None => {
                let cart = self.guest_cart().await?;
                let coupon = cart.coupon.as_ref().map(|c| CouponView {
                    code: c.code.clone(),
                    discount: c.discount,
                });
                (guest_lines(&cart), coupon)
            }
        };

        if lines.is_empty() {
            OfferService::new(self.backend, self.session)
                .invalidate()
                .await;
            return Ok(CartView::empty());
        }

        let mut view = CartView {
            item_count: lines.iter().map(|l| l.quantity).sum(),
            subtotal: lines.iter().map(|l| l.line_total).sum(),
            lines,
            coupon,
            ..CartView::empty()
        };

        let offers = OfferService::new(self.backend, self.session);
        let calculation = offers
            .calculate(
                view.offer_lines(),
                view.coupon.as_ref().map(|c| c.code.as_str()),
                self.token(),
            )
            .await;

        view.offer_discount = calculation.total_discount;
        view.free_shipping = calculation.free_shipping;
        view.coupons_blocked = if calculation.coupons_blocked {
            offers.coupon_block().await
        } else {
            None
        };
        let coupon_discount = view.coupon.as_ref().map_or(Money::ZERO, |c| c.discount);
        view.total = calculation.discounted_total.saturating_sub(coupon_discount);
        view.applied_offers = calculation.applied_offers;

        Ok(view)
    }

    /// Number of units in the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cart cannot be loaded.
    pub async fn count(&self) -> Result<u32, CartError> {
        match self.token() {
            Some(token) => Ok(self.backend.get_cart(token).await?.summary.item_count),
            None => Ok(self.guest_cart().await?.item_count()),
        }
    }

    /// Add a product to the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the quantity is out of range, the product or
    /// variant is unavailable, or the backend rejects the item.
    #[instrument(skip(self))]
    pub async fn add(
        &self,
        product_id: ProductId,
        variant_id: Option<VariantId>,
        quantity: u32,
    ) -> Result<(), CartError> {
        if !(1..=MAX_LINE_QUANTITY).contains(&quantity) {
            return Err(CartError::InvalidQuantity {
                max: MAX_LINE_QUANTITY,
            });
        }

        if let Some(token) = self.token() {
            let item = AddCartItem {
                product_id,
                variant_id,
                quantity,
            };
            if let Err(err) = self.backend.add_cart_item(token, &item).await {
                if err.kind() == ErrorKind::Client {
                    // Our cached stock figures are likely stale
                    self.backend.invalidate_product(product_id).await;
                }
                return Err(err.into());
            }
            return Ok(());
        }

        let product = self.backend.get_product(product_id).await?;
        let mut cart = self.guest_cart().await?;
        let merged = (cart.quantity_of(product_id, variant_id) + quantity).min(MAX_LINE_QUANTITY);
        self.ensure_stock(&product, variant_id, merged).await?;

        cart.add(GuestCartLine {
            id: GuestLineId::new(),
            product_id,
            variant_id,
            name: product.name.clone(),
            slug: product.slug.clone(),
            variant_label: variant_id
                .and_then(|id| product.variant(id))
                .map(crate::backend::ProductVariant::label),
            image: product.primary_image().map(ToString::to_string),
            unit_price: product.unit_price(variant_id),
            quantity,
            added_at: Utc::now(),
        });
        self.save_guest_cart(&cart).await?;

        debug!(items = cart.item_count(), "Guest cart updated");
        Ok(())
    }

    /// Set a line's quantity. Zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns an error if the quantity is above the limit or the line does
    /// not exist.
    #[instrument(skip(self))]
    pub async fn update(&self, line_id: &str, quantity: u32) -> Result<(), CartError> {
        if quantity > MAX_LINE_QUANTITY {
            return Err(CartError::InvalidQuantity {
                max: MAX_LINE_QUANTITY,
            });
        }
        if quantity == 0 {
            return self.remove(line_id).await;
        }

        if let Some(token) = self.token() {
            let item_id: CartItemId = line_id.parse().map_err(|_| CartError::LineNotFound)?;
            self.backend
                .update_cart_item(token, item_id, quantity)
                .await
                .map_err(not_found_as_missing_line)?;
            return Ok(());
        }

        let id: GuestLineId = line_id.parse().map_err(|_| CartError::LineNotFound)?;
        let mut cart = self.guest_cart().await?;
        let (product_id, variant_id) = cart
            .line(id)
            .map(|line| (line.product_id, line.variant_id))
            .ok_or(CartError::LineNotFound)?;
        let product = self.backend.get_product(product_id).await?;
        self.ensure_stock(&product, variant_id, quantity).await?;

        cart.set_quantity(id, quantity);
        self.save_guest_cart(&cart).await
    }

    /// Stock check for a guest line. A failure drops the cached product so
    /// the next page shows current stock.
    async fn ensure_stock(
        &self,
        product: &Product,
        variant_id: Option<VariantId>,
        quantity: u32,
    ) -> Result<(), CartError> {
        let checked = check_availability(product, variant_id, quantity);
        if matches!(
            checked,
            Err(CartError::OutOfStock | CartError::InsufficientStock { .. })
        ) {
            self.backend.invalidate_product(product.id).await;
        }
        checked
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns an error if the line does not exist.
    #[instrument(skip(self))]
    pub async fn remove(&self, line_id: &str) -> Result<(), CartError> {
        if let Some(token) = self.token() {
            let item_id: CartItemId = line_id.parse().map_err(|_| CartError::LineNotFound)?;
            return self
                .backend
                .remove_cart_item(token, item_id)
                .await
                .map_err(not_found_as_missing_line);
        }

        let id: GuestLineId = line_id.parse().map_err(|_| CartError::LineNotFound)?;
        let mut cart = self.guest_cart().await?;
        if !cart.remove(id) {
            return Err(CartError::LineNotFound);
        }
        self.save_guest_cart(&cart).await
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cart cannot be cleared.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<(), CartError> {
        match self.token() {
            Some(token) => self.backend.clear_cart(token).await?,
            None => {
                self.session.remove_value(keys::GUEST_CART).await?;
            }
        }
        OfferService::new(self.backend, self.session)
            .invalidate()
            .await;
        Ok(())
    }

    /// Apply a coupon code.
    ///
    /// # Errors
    ///
    /// Returns `CartError::CouponsBlocked` while active offers exclude
    /// coupons, `CartError::CouponRejected` if the backend refuses the code.
    #[instrument(skip(self))]
    pub async fn apply_coupon(&self, code: &str) -> Result<(), CartError> {
        let code = code.trim().to_uppercase();
        if code.is_empty() {
            return Err(CartError::EmptyCoupon);
        }

        let view = self.view().await?;
        if view.is_empty() {
            return Err(CartError::EmptyCart);
        }
        if let Some(reason) = view.coupons_blocked {
            return Err(CartError::CouponsBlocked(reason));
        }

        if let Some(token) = self.token() {
            self.backend
                .apply_coupon(token, &code)
                .await
                .map_err(|err| match err {
                    BackendError::Status { status, .. } if status < 500 => {
                        CartError::CouponRejected(err.user_message())
                    }
                    BackendError::NotFound => {
                        CartError::CouponRejected("This coupon code is not valid.".to_string())
                    }
                    other => CartError::Backend(other),
                })?;
            info!(code = %code, "Coupon applied");
            return Ok(());
        }

        let validation = self.backend.validate_coupon(&code, view.subtotal).await?;
        if !validation.valid {
            return Err(CartError::CouponRejected(validation.message.unwrap_or_else(
                || "This coupon code is not valid.".to_string(),
            )));
        }

        let mut cart = self.guest_cart().await?;
        cart.coupon = Some(GuestCoupon {
            code: code.clone(),
            discount: validation.discount_amount,
        });
        self.save_guest_cart(&cart).await?;
        info!(code = %code, "Coupon applied to guest cart");
        Ok(())
    }

    /// Remove the applied coupon.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend request fails.
    #[instrument(skip(self))]
    pub async fn remove_coupon(&self) -> Result<(), CartError> {
        if let Some(token) = self.token() {
            self.backend.remove_coupon(token).await?;
            return Ok(());
        }

        let mut cart = self.guest_cart().await?;
        if cart.coupon.take().is_some() {
            self.save_guest_cart(&cart).await?;
        }
        Ok(())
    }

    /// Move the guest cart into the customer's account cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend merge fails; the guest cart is kept.
    pub async fn sync_guest_cart(
        backend: &BackendClient,
        session: &Session,
        customer: &CurrentCustomer,
    ) -> Result<(), CartError> {
        let Some(cart) = session.get::<GuestCart>(keys::GUEST_CART).await? else {
            return Ok(());
        };

        if !cart.is_empty() {
            let token = customer.access_token();
            backend.merge_cart(token, &cart.merge_lines()).await?;
            if let Some(coupon) = &cart.coupon
                && let Err(e) = backend.apply_coupon(token, &coupon.code).await
            {
                debug!(error = %e, "Guest coupon not carried over");
            }
            info!(lines = cart.lines.len(), "Guest cart merged into account");
        }

        session.remove_value(keys::GUEST_CART).await?;
        Ok(())
    }
}

fn not_found_as_missing_line(err: BackendError) -> CartError {
    match err {
        BackendError::NotFound => CartError::LineNotFound,
        other => CartError::Backend(other),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product(variants: &str, in_stock: bool) -> Product {
        serde_json::from_str(&format!(
            r#"{{"id": 1, "name": "Trail", "slug": "trail", "price": "800.00",
                "in_stock": {in_stock}, "variants": {variants}}}"#
        ))
        .unwrap()
    }

    #[test]
    fn test_quantity_limits() {
        let p = product("[]", true);
        assert!(matches!(
            check_availability(&p, None, 0),
            Err(CartError::InvalidQuantity { max: 10 })
        ));
        assert!(matches!(
            check_availability(&p, None, 11),
            Err(CartError::InvalidQuantity { .. })
        ));
        assert!(check_availability(&p, None, 10).is_ok());
    }

    #[test]
    fn test_variant_rules() {
        let p = product(
            r#"[{"id": 5, "size": "41", "stock": 2}, {"id": 6, "size": "42", "stock": 0}]"#,
            true,
        );
        assert!(matches!(
            check_availability(&p, None, 1),
            Err(CartError::VariantRequired)
        ));
        assert!(matches!(
            check_availability(&p, Some(VariantId::new(9)), 1),
            Err(CartError::UnknownVariant)
        ));
        assert!(matches!(
            check_availability(&p, Some(VariantId::new(6)), 1),
            Err(CartError::OutOfStock)
        ));
        assert!(matches!(
            check_availability(&p, Some(VariantId::new(5)), 3),
            Err(CartError::InsufficientStock { available: 2 })
        ));
        assert!(check_availability(&p, Some(VariantId::new(5)), 2).is_ok());
    }

    #[test]
    fn test_sold_out_simple_product() {
        let p = product("[]", false);
        assert!(matches!(
            check_availability(&p, None, 1),
            Err(CartError::OutOfStock)
        ));
    }

    #[test]
    fn test_view_discount_and_shipping() {
        let view = CartView {
            subtotal: Money::from_piastres(100_000),
            offer_discount: Money::from_piastres(10_000),
            coupon: Some(CouponView {
                code: "SAVE5".to_string(),
                discount: Money::from_piastres(5_000),
            }),
            total: Money::from_piastres(85_000),
            ..CartView::empty()
        };
        assert_eq!(view.discount(), Money::from_piastres(15_000));
        assert_eq!(
            view.total_with_shipping(Money::from_piastres(6_000)),
            Money::from_piastres(91_000)
        );

        let free = CartView {
            free_shipping: true,
            ..view
        };
        assert_eq!(
            free.total_with_shipping(Money::from_piastres(6_000)),
            Money::from_piastres(85_000)
        );
    }

    #[test]
    fn test_user_errors() {
        assert!(CartError::OutOfStock.is_user_error());
        assert!(CartError::Backend(BackendError::NotFound).is_user_error());
        assert!(!CartError::Backend(BackendError::Timeout).is_user_error());
        assert_eq!(
            CartError::CouponsBlocked("Flash sale items exclude coupons.".into()).user_message(),
            "Flash sale items exclude coupons."
        );
    }
}
