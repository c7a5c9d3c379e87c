//! Stride Core - Shared types library.
//!
//! This crate provides the domain types shared by the Stride components:
//! - `storefront` - Public-facing footwear store
//! - `integration-tests` - End-to-end tests against a fake backend
//!
//! # Architecture
//!
//! The core crate contains only types and validation - no I/O, no HTTP
//! clients. The authoritative data lives in the external REST backend; these
//! types describe the projections the storefront works with.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, money, contact details and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
