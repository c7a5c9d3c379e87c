//! Favorites for guests and signed-in customers.

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tower_sessions::Session;
use tracing::{info, instrument};

use stride_core::{Money, ProductId};

use crate::backend::{BackendClient, BackendError, Favorite};
use crate::models::{CurrentCustomer, GuestFavorite, GuestFavorites, keys};

#[derive(Debug, Error)]
pub enum FavoritesError {
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

impl FavoritesError {
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Backend(err) => err.user_message(),
            Self::Session(_) => "Something went wrong. Please try again.".to_string(),
        }
    }
}

/// A favorite ready for display.
#[derive(Debug, Clone, Serialize)]
pub struct FavoriteView {
    pub product_id: ProductId,
    pub name: String,
    pub slug: String,
    pub price: Money,
    pub sale_price: Option<Money>,
    pub image: Option<String>,
}

impl FavoriteView {
    #[must_use]
    pub fn current_price(&self) -> Money {
        self.sale_price.unwrap_or(self.price)
    }
}

impl From<Favorite> for FavoriteView {
    fn from(favorite: Favorite) -> Self {
        let product = favorite.product;
        Self {
            product_id: product.id,
            name: product.name,
            slug: product.slug,
            price: product.price,
            sale_price: product.sale_price,
            image: product.image,
        }
    }
}

impl From<GuestFavorite> for FavoriteView {
    fn from(favorite: GuestFavorite) -> Self {
        Self {
            product_id: favorite.product_id,
            name: favorite.name,
            slug: favorite.slug,
            price: favorite.price,
            sale_price: favorite.sale_price,
            image: favorite.image,
        }
    }
}

pub struct FavoritesService<'a> {
    backend: &'a BackendClient,
    session: &'a Session,
    customer: Option<&'a CurrentCustomer>,
}

impl<'a> FavoritesService<'a> {
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

    async fn guest_favorites(&self) -> Result<GuestFavorites, FavoritesError> {
        Ok(self
            .session
            .get::<GuestFavorites>(keys::GUEST_FAVORITES)
            .await?
            .unwrap_or_default())
    }

    async fn save_guest_favorites(&self, favorites: &GuestFavorites) -> Result<(), FavoritesError> {
        self.session.insert(keys::GUEST_FAVORITES, favorites).await?;
        Ok(())
    }

    /// Favorites, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend list cannot be loaded.
    pub async fn list(&self) -> Result<Vec<FavoriteView>, FavoritesError> {
        match self.customer {
            Some(customer) => {
                let mut favorites = self
                    .backend
                    .list_favorites(customer.access_token())
                    .await?;
                favorites.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                Ok(favorites.into_iter().map(FavoriteView::from).collect())
            }
            None => Ok(self
                .guest_favorites()
                .await?
                .items
                .into_iter()
                .map(FavoriteView::from)
                .collect()),
        }
    }

    /// Product ids of all favorites, used to mark hearts on listings.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend list cannot be loaded.
    pub async fn product_ids(&self) -> Result<Vec<ProductId>, FavoritesError> {
        Ok(self.list().await?.into_iter().map(|f| f.product_id).collect())
    }

    /// # Errors
    ///
    /// Returns an error if the backend list cannot be loaded.
    pub async fn contains(&self, product_id: ProductId) -> Result<bool, FavoritesError> {
        match self.customer {
            Some(_) => Ok(self.product_ids().await?.contains(&product_id)),
            None => Ok(self.guest_favorites().await?.contains(product_id)),
        }
    }

    /// # Errors
    ///
    /// Returns an error if the backend list cannot be loaded.
    pub async fn count(&self) -> Result<usize, FavoritesError> {
        match self.customer {
            Some(_) => Ok(self.list().await?.len()),
            None => Ok(self.guest_favorites().await?.len()),
        }
    }

    /// Flip a product's favorite state. Returns whether it is now a favorite.
    ///
    /// # Errors
    ///
    /// Returns an error if the product cannot be loaded or the backend
    /// rejects the change.
    #[instrument(skip(self))]
    pub async fn toggle(&self, product_id: ProductId) -> Result<bool, FavoritesError> {
        if let Some(customer) = self.customer {
            let result = self
                .backend
                .toggle_favorite(customer.access_token(), product_id)
                .await?;
            return Ok(result.is_favorite);
        }

        let mut favorites = self.guest_favorites().await?;
        let now_favorite = if favorites.remove(product_id) {
            false
        } else {
            let product = self.backend.get_product(product_id).await?;
            favorites.add(GuestFavorite {
                product_id,
                name: product.name.clone(),
                slug: product.slug.clone(),
                price: product.price,
                sale_price: product.sale_price,
                image: product.primary_image().map(ToString::to_string),
                added_at: Utc::now(),
            })
        };
        self.save_guest_favorites(&favorites).await?;
        Ok(now_favorite)
    }

    /// Make sure a product is a favorite.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the change.
    pub async fn add(&self, product_id: ProductId) -> Result<(), FavoritesError> {
        if self.contains(product_id).await? {
            return Ok(());
        }
        if let Some(customer) = self.customer {
            self.backend
                .add_favorite(customer.access_token(), product_id)
                .await?;
            return Ok(());
        }
        self.toggle(product_id).await.map(|_| ())
    }

    /// Make sure a product is not a favorite.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the change.
    pub async fn remove(&self, product_id: ProductId) -> Result<(), FavoritesError> {
        if let Some(customer) = self.customer {
            let token = customer.access_token();
            let favorites = self.backend.list_favorites(token).await?;
            if let Some(favorite) = favorites.iter().find(|f| f.product.id == product_id) {
                self.backend.remove_favorite(token, favorite.id).await?;
            }
            return Ok(());
        }

        let mut favorites = self.guest_favorites().await?;
        if favorites.remove(product_id) {
            self.save_guest_favorites(&favorites).await?;
        }
        Ok(())
    }

    /// Move guest favorites into the customer's account.
    ///
    /// # Errors
    ///
    /// Returns an error if the merge fails; the guest favorites are kept.
    pub async fn sync_guest_favorites(
        backend: &BackendClient,
        session: &Session,
        customer: &CurrentCustomer,
    ) -> Result<(), FavoritesError> {
        let Some(favorites) = session
            .get::<GuestFavorites>(keys::GUEST_FAVORITES)
            .await?
        else {
            return Ok(());
        };

        if !favorites.is_empty() {
            backend
                .merge_favorites(customer.access_token(), &favorites.product_ids())
                .await?;
            info!(count = favorites.len(), "Guest favorites merged into account");
        }

        session.remove_value(keys::GUEST_FAVORITES).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_view_from_backend_favorite() {
        let favorite: Favorite = serde_json::from_str(
            r#"{"id": 3, "created_at": "2026-03-01T10:00:00Z",
                "product": {"id": 12, "name": "Court Classic", "slug": "court-classic",
                            "price": "650.00", "sale_price": "520.00"}}"#,
        )
        .unwrap();

        let view = FavoriteView::from(favorite);
        assert_eq!(view.product_id, ProductId::new(12));
        assert_eq!(view.current_price(), Money::from_piastres(52_000));
        assert!(view.image.is_none());
    }
}
