//! Stride Storefront library.
//!
//! This crate provides the storefront functionality as a library,
//! allowing it to be tested end to end and reused by the binary.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod config;
pub mod error;
pub mod filters;
pub mod geography;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
