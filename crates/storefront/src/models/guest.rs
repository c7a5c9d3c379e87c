//! Cart and favorites kept in the session for visitors who are not signed in.
//!
//! Guest state is merged into the customer's account on sign-in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stride_core::{Money, ProductId, VariantId};

use crate::backend::MergeCartLine;

/// Most units of one line a cart may hold.
pub const MAX_LINE_QUANTITY: u32 = 10;

/// Identifier of a guest cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuestLineId(Uuid);

impl GuestLineId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GuestLineId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for GuestLineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for GuestLineId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// One line of the guest cart, with the product details needed to render it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestCartLine {
    pub id: GuestLineId,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub name: String,
    pub slug: String,
    pub variant_label: Option<String>,
    pub image: Option<String>,
    pub unit_price: Money,
    pub quantity: u32,
    pub added_at: DateTime<Utc>,
}

impl GuestCartLine {
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.unit_price.times(self.quantity)
    }
}

/// A coupon the backend confirmed for the guest cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestCoupon {
    pub code: String,
    pub discount: Money,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestCart {
    pub lines: Vec<GuestCartLine>,
    #[serde(default)]
    pub coupon: Option<GuestCoupon>,
}

impl GuestCart {
    /// Add a line. A line for the same product and variant absorbs the new
    /// quantity (capped at [`MAX_LINE_QUANTITY`]) and takes the newer price.
    ///
    /// Returns the id of the line that now holds the item.
    pub fn add(&mut self, line: GuestCartLine) -> GuestLineId {
        if let Some(existing) = self
            .lines
            .iter_mut()
            .find(|l| l.product_id == line.product_id && l.variant_id == line.variant_id)
        {
            existing.quantity = (existing.quantity + line.quantity).min(MAX_LINE_QUANTITY);
            existing.unit_price = line.unit_price;
            return existing.id;
        }

        let id = line.id;
        self.lines.push(GuestCartLine {
            quantity: line.quantity.min(MAX_LINE_QUANTITY),
            ..line
        });
        id
    }

    /// Set a line's quantity; zero removes it. Returns `false` if no such line.
    pub fn set_quantity(&mut self, id: GuestLineId, quantity: u32) -> bool {
        if quantity == 0 {
            return self.remove(id);
        }
        match self.lines.iter_mut().find(|line| line.id == id) {
            Some(line) => {
                line.quantity = quantity.min(MAX_LINE_QUANTITY);
                true
            }
            None => false,
        }
    }

    /// Remove a line. Returns `false` if no such line.
    pub fn remove(&mut self, id: GuestLineId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|line| line.id != id);
        let removed = self.lines.len() != before;
        if self.lines.is_empty() {
            self.coupon = None;
        }
        removed
    }

    #[must_use]
    pub fn line(&self, id: GuestLineId) -> Option<&GuestCartLine> {
        self.lines.iter().find(|line| line.id == id)
    }

    /// Units already held for a product and variant.
    #[must_use]
    pub fn quantity_of(&self, product_id: ProductId, variant_id: Option<VariantId>) -> u32 {
        self.lines
            .iter()
            .filter(|l| l.product_id == product_id && l.variant_id == variant_id)
            .map(|l| l.quantity)
            .sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }

    #[must_use]
    pub fn subtotal(&self) -> Money {
        self.lines.iter().map(GuestCartLine::line_total).sum()
    }

    /// Lines in the shape the cart merge endpoint expects.
    #[must_use]
    pub fn merge_lines(&self) -> Vec<MergeCartLine> {
        self.lines
            .iter()
            .map(|line| MergeCartLine {
                product_id: line.product_id,
                variant_id: line.variant_id,
                quantity: line.quantity,
            })
            .collect()
    }
}

/// A product the guest marked as a favorite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestFavorite {
    pub product_id: ProductId,
    pub name: String,
    pub slug: String,
    pub price: Money,
    pub sale_price: Option<Money>,
    pub image: Option<String>,
    pub added_at: DateTime<Utc>,
}

/// Guest favorites, newest first. A product appears at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestFavorites {
    pub items: Vec<GuestFavorite>,
}

impl GuestFavorites {
    #[must_use]
    pub fn contains(&self, product_id: ProductId) -> bool {
        self.items.iter().any(|item| item.product_id == product_id)
    }

    /// Returns `false` if the product was already a favorite.
    pub fn add(&mut self, favorite: GuestFavorite) -> bool {
        if self.contains(favorite.product_id) {
            return false;
        }
        self.items.insert(0, favorite);
        true
    }

    /// Returns `false` if the product was not a favorite.
    pub fn remove(&mut self, product_id: ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.product_id != product_id);
        self.items.len() != before
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn product_ids(&self) -> Vec<ProductId> {
        self.items.iter().map(|item| item.product_id).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(product: i64, variant: Option<i64>, price_piastres: i64, quantity: u32) -> GuestCartLine {
        GuestCartLine {
            id: GuestLineId::new(),
            product_id: ProductId::new(product),
            variant_id: variant.map(VariantId::new),
            name: format!("Product {product}"),
            slug: format!("product-{product}"),
            variant_label: None,
            image: None,
            unit_price: Money::from_piastres(price_piastres),
            quantity,
            added_at: Utc::now(),
        }
    }

    fn favorite(product: i64) -> GuestFavorite {
        GuestFavorite {
            product_id: ProductId::new(product),
            name: format!("Product {product}"),
            slug: format!("product-{product}"),
            price: Money::from_piastres(50_000),
            sale_price: None,
            image: None,
            added_at: Utc::now(),
        }
    }

    #[test]
    fn test_add_increases_count_and_subtotal() {
        let mut cart = GuestCart::default();
        cart.add(line(1, Some(10), 75_000, 2));
        assert_eq!(cart.item_count(), 2);
        assert_eq!(cart.subtotal(), Money::from_piastres(150_000));

        cart.add(line(2, None, 30_000, 1));
        assert_eq!(cart.item_count(), 3);
        assert_eq!(cart.subtotal(), Money::from_piastres(180_000));
    }

    #[test]
    fn test_same_variant_merges_into_one_line() {
        let mut cart = GuestCart::default();
        let first = cart.add(line(1, Some(10), 75_000, 2));
        let second = cart.add(line(1, Some(10), 70_000, 3));
        assert_eq!(first, second);
        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.lines[0].quantity, 5);
        assert_eq!(cart.lines[0].unit_price, Money::from_piastres(70_000));

        cart.add(line(1, Some(11), 75_000, 1));
        assert_eq!(cart.lines.len(), 2);
    }

    #[test]
    fn test_quantity_is_capped() {
        let mut cart = GuestCart::default();
        let id = cart.add(line(1, None, 10_000, 8));
        cart.add(line(1, None, 10_000, 8));
        assert_eq!(cart.item_count(), MAX_LINE_QUANTITY);
        assert!(cart.set_quantity(id, 25));
        assert_eq!(cart.item_count(), MAX_LINE_QUANTITY);
    }

    #[test]
    fn test_quantity_of_counts_matching_line_only() {
        let mut cart = GuestCart::default();
        let id = cart.add(line(1, Some(10), 75_000, 3));
        cart.add(line(1, Some(11), 75_000, 2));
        assert_eq!(cart.quantity_of(ProductId::new(1), Some(VariantId::new(10))), 3);
        assert_eq!(cart.quantity_of(ProductId::new(1), None), 0);
        assert_eq!(cart.line(id).map(|l| l.quantity), Some(3));
    }

    #[test]
    fn test_zero_quantity_removes_line() {
        let mut cart = GuestCart::default();
        let id = cart.add(line(1, None, 10_000, 1));
        cart.coupon = Some(GuestCoupon {
            code: "SAVE10".to_string(),
            discount: Money::from_piastres(1_000),
        });
        assert!(cart.set_quantity(id, 0));
        assert!(cart.is_empty());
        assert!(cart.coupon.is_none());
        assert!(!cart.remove(id));
    }

    #[test]
    fn test_line_id_round_trips_through_forms() {
        let id = GuestLineId::new();
        assert_eq!(id.to_string().parse::<GuestLineId>().unwrap(), id);
        assert!("not-a-line".parse::<GuestLineId>().is_err());
    }

    #[test]
    fn test_favorites_are_unique_newest_first() {
        let mut favorites = GuestFavorites::default();
        assert!(favorites.add(favorite(1)));
        assert!(favorites.add(favorite(2)));
        assert!(!favorites.add(favorite(1)));
        assert_eq!(favorites.product_ids(), vec![ProductId::new(2), ProductId::new(1)]);
        assert!(favorites.remove(ProductId::new(2)));
        assert!(!favorites.contains(ProductId::new(2)));
        assert_eq!(favorites.len(), 1);
    }
}
