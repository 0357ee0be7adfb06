//! Storefront commerce backend.
//!
//! A REST API for a small online store:
//!
//! - accounts with bearer-token authentication and an admin role
//! - a catalog of categories and products with filtering and paging
//! - one cart per user, priced from live product data
//! - orders placed from the cart with atomic stock reservation
//! - a payment bridge to the card gateway with signature verification
//!
//! [`router`] assembles the HTTP surface over an [`AppState`].

pub mod api;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod messaging;
pub mod payment;
pub mod services;
pub mod state;
pub mod store;

pub use api::router;
pub use state::AppState;
