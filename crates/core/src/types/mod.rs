//! Core types for Stride.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod money;
pub mod password;
pub mod phone;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::{CURRENCY_CODE, Money};
pub use password::{Password, PasswordError};
pub use phone::{PhoneError, PhoneNumber};
pub use status::*;
