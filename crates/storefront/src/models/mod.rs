//! Session-held state for the storefront.

pub mod guest;
pub mod session;

pub use guest::{
    GuestCart, GuestCartLine, GuestCoupon, GuestFavorite, GuestFavorites, GuestLineId,
    MAX_LINE_QUANTITY,
};
pub use session::{CurrentCustomer, SessionTokens, keys};
