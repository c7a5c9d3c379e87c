//! Business logic services for the storefront.
//!
//! Each service is built per request from the shared backend client and the
//! visitor's session. Signed-in customers work against the backend; guests
//! work against state kept in the session.
//!
//! # Services
//!
//! - `auth` - Login, registration, token refresh and profile changes
//! - `cart` - Cart operations for both modes
//! - `favorites` - Favorites for both modes
//! - `offers` - Server-computed discount breakdown and coupon blocking
//! - `checkout` - Checkout validation and order placement

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod favorites;
pub mod offers;
pub mod validation;

pub use auth::{AuthError, AuthService};
pub use cart::{CartError, CartService, CartView};
pub use checkout::{CheckoutError, CheckoutForm, CheckoutService};
pub use favorites::{FavoritesError, FavoritesService};
pub use offers::OfferService;
pub use validation::{FieldError, ValidationErrors};
